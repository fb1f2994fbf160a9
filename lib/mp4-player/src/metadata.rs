use super::{MP4PlayerError, Result};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub track_id: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub timescale: u32,
    pub duration: Duration,
    pub sample_count: u32,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

pub fn parse<P: AsRef<Path>>(file_path: P) -> Result<VideoMetadata> {
    let file = File::open(file_path.as_ref())?;
    let file_size = file.metadata()?.len();
    let mp4_reader = mp4::Mp4Reader::read_header(BufReader::new(file), file_size)?;

    log::debug!(
        "Parsed MP4 header from `{}`. {file_size} bytes. major brand: {}. Found {} tracks",
        file_path.as_ref().display(),
        mp4_reader.ftyp.major_brand,
        mp4_reader.tracks().len(),
    );

    let mut video_metadata = None;

    for (track_id, track) in mp4_reader.tracks() {
        match track.track_type() {
            Ok(mp4::TrackType::Video) => (),
            Ok(track_type) => {
                log::info!("Skip track #{track_id} of type {track_type:?}");
                continue;
            }
            Err(e) => {
                log::warn!("Could not determine track type for track {track_id}: {e}, skipping");
                continue;
            }
        }

        if video_metadata.is_some() {
            return Err(MP4PlayerError::TrackError(
                "Found two video tracks".to_string(),
            ));
        }

        let duration = track.duration();
        let sample_count = track.sample_count();

        // `Mp4Track::frame_rate` rounds down to whole frames per second.
        let frame_rate = if duration.is_zero() {
            0.0
        } else {
            sample_count as f64 / duration.as_secs_f64()
        };

        video_metadata = Some(VideoMetadata {
            track_id: *track_id,
            width: track.width() as u32,
            height: track.height() as u32,
            frame_rate,
            timescale: track.timescale(),
            duration,
            sample_count,
            sps: track.sequence_parameter_set()?.to_vec(),
            pps: track.picture_parameter_set()?.to_vec(),
        });
    }

    video_metadata.ok_or_else(|| MP4PlayerError::TrackError("No found video track".to_string()))
}
