//! Re-containering of raw H.264 streams into MP4 files.
//!
//! The recorder writes an Annex B elementary stream while it runs. Once the
//! real frame rate is known, [`remux_h264_file`] splits that stream into
//! access units and writes them into an MP4 whose sample durations carry
//! the measured rate.

pub mod annexb;
pub mod muxer;
pub mod remux;

pub use annexb::{AccessUnitBuilder, Nal, NalStream, split_annexb, to_annexb};
pub use muxer::{Mp4Muxer, MuxStats, VideoTrack};
pub use remux::{remux_annexb, remux_h264_file};

pub const VIDEO_TIMESCALE: u32 = 90000;

pub type Result<T> = std::result::Result<T, Mp4mError>;

#[derive(thiserror::Error, Debug)]
pub enum Mp4mError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MP4 muxing error: {0}")]
    Mp4(#[from] mp4::Error),

    #[error("No SPS/PPS found before the first frame")]
    MissingParameterSets,

    #[error("No video frame found in `{0}`")]
    EmptyStream(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFps(f64),
}
