use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Already recording.")]
    AlreadyRecording,

    #[error("Not recording.")]
    NotRecording,

    #[error("Invalid recording name `{0}`: only ASCII letters and digits are allowed")]
    InvalidName(String),

    #[error("Invalid configuration parameters: {0}")]
    InvalidConfig(String),

    #[error("Camera failed: {0}")]
    Camera(#[from] camera::CameraError),

    #[error("Face detection failed: {0}")]
    FaceDetection(#[from] face_detector::Error),

    #[error("Video encoding failed: {0}")]
    Codec(#[from] video_codec::CodecError),

    #[error("Remux failed: {0}")]
    Remux(#[from] mp4m::Mp4mError),

    #[error("Read video failed: {0}")]
    Player(#[from] mp4_player::MP4PlayerError),

    #[error("File operation failed: {0}")]
    FileOperationFailed(#[from] std::io::Error),

    #[error("Load font failed: {0}")]
    Font(String),

    #[error("Writer thread failed: {0}")]
    WriterFailed(String),
}
