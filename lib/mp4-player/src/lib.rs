use thiserror::Error;

pub mod metadata;
pub mod player;

pub use metadata::VideoMetadata;
pub use player::{PlayerConfig, Mp4Player, PlaybackSummary, VideoFrame};

pub type Result<T> = std::result::Result<T, MP4PlayerError>;

#[derive(Error, Debug)]
pub enum MP4PlayerError {
    #[error("Failed to open MP4 file: {0}")]
    FileOpenError(#[from] std::io::Error),

    #[error("MP4 parsing error: {0}")]
    ParseError(#[from] mp4::Error),

    #[error("Decode error: {0}")]
    DecodeError(#[from] video_codec::CodecError),

    #[error("Tracker error: {0}")]
    TrackError(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFps(f64),
}
