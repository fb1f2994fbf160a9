use crate::{
    Mp4mError, Result, VIDEO_TIMESCALE,
    annexb::{NAL_PPS, NAL_SPS, Nal, is_keyframe, to_avcc},
};
use mp4::{AvcConfig, MediaConfig, Mp4Config, Mp4Sample, Mp4Writer, TrackConfig, TrackType};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

const VIDEO_TRACK_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoTrack {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoTrack {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Duration of one sample in the 90 kHz timescale.
    pub fn sample_duration(&self) -> Result<u32> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(Mp4mError::InvalidFps(self.fps));
        }

        Ok(((VIDEO_TIMESCALE as f64 / self.fps).round() as u32).max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MuxStats {
    pub frames: u64,
    pub keyframes: u64,
    pub skipped: u64,
    pub duration: Duration,
    pub fps: f64,
}

pub struct Mp4Muxer {
    path: PathBuf,
    track: VideoTrack,
    sample_duration: u32,
    writer: Mp4Writer<BufWriter<File>>,
    track_added: bool,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
    next_start_time: u64,
    frames: u64,
    keyframes: u64,
    skipped: u64,
}

impl Mp4Muxer {
    pub fn new(path: impl AsRef<Path>, track: VideoTrack) -> Result<Self> {
        let sample_duration = track.sample_duration()?;
        let path = path.as_ref().to_path_buf();

        let file = File::create(&path).map_err(|e| {
            Mp4mError::Io(std::io::Error::other(format!(
                "create `{}` failed. error: {e}",
                path.display()
            )))
        })?;

        let mp4_config = Mp4Config {
            major_brand: "isom".parse()?,
            minor_version: 512,
            compatible_brands: vec![
                "isom".parse()?,
                "iso2".parse()?,
                "avc1".parse()?,
                "mp41".parse()?,
            ],
            timescale: VIDEO_TIMESCALE,
        };

        let writer = Mp4Writer::write_start(BufWriter::new(file), &mp4_config)?;

        Ok(Self {
            path,
            track,
            sample_duration,
            writer,
            track_added: false,
            sps: None,
            pps: None,
            next_start_time: 0,
            frames: 0,
            keyframes: 0,
            skipped: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_access_unit(&mut self, access_unit: &[Nal]) -> Result<()> {
        for nal in access_unit {
            match nal.nal_type() {
                NAL_SPS if self.sps.is_none() => self.sps = Some(nal.data.clone()),
                NAL_PPS if self.pps.is_none() => self.pps = Some(nal.data.clone()),
                _ => (),
            }
        }

        if !self.track_added && !self.try_add_track()? {
            self.skipped += 1;
            log::debug!("skip access unit received before SPS/PPS");
            return Ok(());
        }

        let bytes = to_avcc(access_unit);
        if bytes.is_empty() {
            return Ok(());
        }

        let is_sync = is_keyframe(access_unit);
        let sample = Mp4Sample {
            start_time: self.next_start_time,
            duration: self.sample_duration,
            rendering_offset: 0,
            is_sync,
            bytes: bytes.into(),
        };

        self.writer.write_sample(VIDEO_TRACK_ID, &sample)?;
        self.next_start_time += self.sample_duration as u64;
        self.frames += 1;
        if is_sync {
            self.keyframes += 1;
        }

        Ok(())
    }

    fn try_add_track(&mut self) -> Result<bool> {
        let (Some(sps), Some(pps)) = (self.sps.clone(), self.pps.clone()) else {
            return Ok(false);
        };

        log::debug!(
            "add video track: {}x{} @ {:.2}fps. SPS {} bytes, PPS {} bytes",
            self.track.width,
            self.track.height,
            self.track.fps,
            sps.len(),
            pps.len()
        );

        self.writer.add_track(&TrackConfig {
            track_type: TrackType::Video,
            timescale: VIDEO_TIMESCALE,
            language: "und".to_string(),
            media_conf: MediaConfig::AvcConfig(AvcConfig {
                width: self.track.width as u16,
                height: self.track.height as u16,
                seq_param_set: sps,
                pic_param_set: pps,
            }),
        })?;

        self.track_added = true;
        Ok(true)
    }

    pub fn finish(mut self) -> Result<MuxStats> {
        if !self.track_added {
            return Err(Mp4mError::MissingParameterSets);
        }

        self.writer.write_end()?;
        self.writer.into_writer().flush()?;

        let stats = MuxStats {
            frames: self.frames,
            keyframes: self.keyframes,
            skipped: self.skipped,
            duration: Duration::from_secs_f64(
                self.next_start_time as f64 / VIDEO_TIMESCALE as f64,
            ),
            fps: self.track.fps,
        };

        log::info!(
            "Write mp4 `{}`: {} frames ({} keyframes), {:.2?} @ {:.2}fps",
            self.path.display(),
            stats.frames,
            stats.keyframes,
            stats.duration,
            stats.fps
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_duration() {
        assert_eq!(VideoTrack::new(640, 480, 30.0).sample_duration().unwrap(), 3000);
        assert_eq!(VideoTrack::new(640, 480, 25.0).sample_duration().unwrap(), 3600);
        assert_eq!(VideoTrack::new(640, 480, 29.97).sample_duration().unwrap(), 3003);
    }

    #[test]
    fn test_sample_duration_rejects_bad_fps() {
        for fps in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                VideoTrack::new(640, 480, fps).sample_duration(),
                Err(Mp4mError::InvalidFps(_))
            ));
        }
    }

    #[test]
    fn test_finish_without_parameter_sets_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut muxer =
            Mp4Muxer::new(dir.path().join("out.mp4"), VideoTrack::new(64, 64, 30.0)).unwrap();

        muxer
            .write_access_unit(&[Nal::new(vec![0x65, 0x88, 0x84])])
            .unwrap();

        assert!(matches!(
            muxer.finish(),
            Err(Mp4mError::MissingParameterSets)
        ));
    }
}
