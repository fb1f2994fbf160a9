pub mod camera_info;
pub mod picamera;
pub mod resize;
pub mod webcam;

pub use camera_info::{CameraInfo, probe_cameras};
pub use image::RgbImage;
pub use picamera::{PiCameraOptions, PiCameraSource};
pub use resize::fit_frame;
pub use webcam::WebcamSource;

use derivative::Derivative;
use derive_setters::Setters;
use std::{fmt, str::FromStr, time::Duration};

pub type CameraResult<T> = Result<T, CameraError>;

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("Failed to initialize camera: {0}")]
    InitializationError(String),

    #[error("Failed to start camera: {0}")]
    StartError(String),

    #[error("Failed to stop camera: {0}")]
    StopError(String),

    #[error("Camera is not opened")]
    NotOpened,

    #[error("No frame available")]
    NoFrameAvailable,

    #[error("Camera process error: {0}")]
    Process(String),

    #[error("Unknown camera backend: {0}")]
    UnknownBackend(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Fast image buffer error: {0}")]
    FastImageBufferError(#[from] fast_image_resize::ImageBufferError),

    #[error("Fast image resize error: {0}")]
    FastImageResizeError(#[from] fast_image_resize::ResizeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    NokhwaError(#[from] nokhwa::NokhwaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Derivative, Setters)]
#[derivative(Default)]
#[setters(prefix = "with_")]
#[non_exhaustive]
pub struct CameraConfig {
    #[derivative(Default(value = "640"))]
    pub width: u32,

    #[derivative(Default(value = "480"))]
    pub height: u32,

    #[derivative(Default(value = "30"))]
    pub fps: u32,
}

impl CameraConfig {
    /// Time between two frames at the nominal rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

/// A camera stream producing RGB frames.
pub trait FrameSource {
    fn open(&mut self) -> CameraResult<()>;

    /// `Ok(None)` means the stream has ended.
    fn read_frame(&mut self) -> CameraResult<Option<RgbImage>>;

    fn info(&self) -> &CameraInfo;

    fn close(&mut self) -> CameraResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraBackend {
    #[default]
    Webcam,
    PiCamera,
}

impl CameraBackend {
    pub fn build(
        self,
        index: u32,
        config: CameraConfig,
        options: PiCameraOptions,
    ) -> Box<dyn FrameSource> {
        match self {
            CameraBackend::Webcam => Box::new(WebcamSource::new(index, config)),
            CameraBackend::PiCamera => Box::new(PiCameraSource::new(index, config, options)),
        }
    }
}

impl FromStr for CameraBackend {
    type Err = CameraError;

    fn from_str(s: &str) -> CameraResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "webcam" => Ok(CameraBackend::Webcam),
            "picam" | "picamera" => Ok(CameraBackend::PiCamera),
            _ => Err(CameraError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for CameraBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraBackend::Webcam => write!(f, "webcam"),
            CameraBackend::PiCamera => write!(f, "picam"),
        }
    }
}

pub fn init() {
    #[cfg(target_os = "macos")]
    nokhwa::nokhwa_initialize(|granted| {
        log::info!("User said {} for nokhwa", granted);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(
            "webcam".parse::<CameraBackend>().unwrap(),
            CameraBackend::Webcam
        );
        assert_eq!(
            " PiCam ".parse::<CameraBackend>().unwrap(),
            CameraBackend::PiCamera
        );
        assert!(matches!(
            "usb".parse::<CameraBackend>(),
            Err(CameraError::UnknownBackend(_))
        ));
        assert_eq!(CameraBackend::PiCamera.to_string(), "picam");
    }

    #[test]
    fn test_frame_interval() {
        let config = CameraConfig::default().with_fps(25);
        assert_eq!(config.frame_interval(), Duration::from_millis(40));
        assert_eq!((config.width, config.height), (640, 480));
    }
}
