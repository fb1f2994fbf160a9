pub mod detector;
pub mod postprocess;

pub use detector::UltraFaceDetector;
pub use postprocess::{DetectorOptions, decode_detections, iou, nms};

use image::RgbImage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(std::path::PathBuf),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::Error),

    #[error("Image resize error: {0}")]
    ImageResize(#[from] fast_image_resize::ResizeError),

    #[error("Image buffer error: {0}")]
    ImageBufferError(#[from] fast_image_resize::ImageBufferError),
}

/// A detected face in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl FaceBox {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

pub trait FaceDetect {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>>;
}
