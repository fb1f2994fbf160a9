use super::{
    MP4PlayerError, Result,
    metadata::{self, VideoMetadata},
};
use derive_setters::Setters;
use image::RgbImage;
use spin_sleep::SpinSleeper;
use std::{
    fs::File,
    io::BufReader,
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use video_codec::H264Decoder;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

#[derive(Debug)]
pub struct VideoFrame {
    pub index: u32,
    pub image: RgbImage,
    pub timestamp: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackSummary {
    pub frames_shown: u64,
    pub loops: u32,
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct PlayerConfig {
    #[setters(skip)]
    file_path: PathBuf,

    /// Frame rate used for pacing instead of the container's.
    #[setters(strip_option)]
    fps_override: Option<f64>,

    /// Restart from the first frame after the last one.
    looping: bool,

    stop_sig: Arc<AtomicBool>,
}

impl PlayerConfig {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            fps_override: None,
            looping: false,
            stop_sig: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub struct Mp4Player {
    config: PlayerConfig,
    metadata: VideoMetadata,
    fps: f64,
}

impl Mp4Player {
    pub fn new(config: PlayerConfig) -> Result<Self> {
        let metadata = metadata::parse(&config.file_path)?;
        let fps = config.fps_override.unwrap_or(metadata.frame_rate);

        if !fps.is_finite() || fps <= 0.0 {
            return Err(MP4PlayerError::InvalidFps(fps));
        }

        if metadata.sample_count == 0 {
            return Err(MP4PlayerError::TrackError(
                "Video track has no samples".to_string(),
            ));
        }

        log::info!(
            "Open `{}`: {}x{}, {} frames, container {:.2}fps, playback {:.2}fps",
            config.file_path.display(),
            metadata.width,
            metadata.height,
            metadata.sample_count,
            metadata.frame_rate,
            fps
        );

        Ok(Self {
            config,
            metadata,
            fps,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn stop_sig(&self) -> Arc<AtomicBool> {
        self.config.stop_sig.clone()
    }

    pub fn stop(&self) {
        self.config.stop_sig.store(true, Ordering::Relaxed);
    }

    /// Decodes the video track in order and hands each frame to `on_frame`,
    /// paced at the playback frame rate. Returns when the track ends (and
    /// looping is off), when the stop signal is set, or when `on_frame`
    /// breaks.
    pub fn play(
        &mut self,
        mut on_frame: impl FnMut(VideoFrame) -> ControlFlow<()>,
    ) -> Result<PlaybackSummary> {
        let file = File::open(&self.config.file_path)?;
        let size = file.metadata()?.len();
        let mut mp4_reader = mp4::Mp4Reader::read_header(BufReader::new(file), size)?;

        let mut decoder = H264Decoder::new()?;
        let frame_duration = Duration::from_secs_f64(1.0 / self.fps);
        let sleeper = SpinSleeper::default();
        let mut summary = PlaybackSummary::default();

        'outer: loop {
            let loop_start = Instant::now();

            for sample_id in 1..=self.metadata.sample_count {
                if self.config.stop_sig.load(Ordering::Relaxed) {
                    break 'outer;
                }

                let Some(sample) = mp4_reader.read_sample(self.metadata.track_id, sample_id)?
                else {
                    log::warn!("No found sample #{sample_id}");
                    continue;
                };

                let annexb = self.sample_to_annexb(&sample.bytes, sample.is_sync);
                let image = match decoder.decode(&annexb) {
                    Ok(Some(image)) => image,
                    Ok(None) => continue,
                    Err(e) => {
                        log::warn!("decode sample #{sample_id} failed: {e}");
                        continue;
                    }
                };

                let index = sample_id - 1;
                let due = frame_duration.mul_f64(index as f64);
                let elapsed = loop_start.elapsed();
                if due > elapsed {
                    sleeper.sleep(due - elapsed);
                }

                summary.frames_shown += 1;
                let frame = VideoFrame {
                    index,
                    image,
                    timestamp: due,
                };

                if on_frame(frame).is_break() {
                    break 'outer;
                }
            }

            if !self.config.looping {
                break;
            }

            summary.loops += 1;
            log::debug!("Restart playback. loop: {}", summary.loops);
        }

        Ok(summary)
    }

    // MP4 samples are length-prefixed; the decoder wants start codes. Key
    // frames get the parameter sets from the `avcC` box in front.
    fn sample_to_annexb(&self, data: &[u8], is_sync: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 64);

        if is_sync {
            for ps in [&self.metadata.sps, &self.metadata.pps] {
                out.extend_from_slice(&START_CODE);
                out.extend_from_slice(ps);
            }
        }

        let mut i = 0;
        while i + 4 <= data.len() {
            let length =
                u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]) as usize;

            if length == 0 || i + 4 + length > data.len() {
                log::debug!("Invalid NAL length: {} at position {}", length, i);
                break;
            }

            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(&data[i + 4..i + 4 + length]);
            i += 4 + length;
        }

        out
    }
}
