use crate::{DetectorOptions, Error, FaceBox, FaceDetect, Result, decode_detections};
use fast_image_resize::{PixelType, ResizeOptions, Resizer, images::Image as FrImage};
use image::RgbImage;
use ndarray::Array;
use ort::{session::Session, value::TensorRef};
use std::path::Path;

// UltraFace RFB-320 input layout.
pub const INPUT_WIDTH: u32 = 320;
pub const INPUT_HEIGHT: u32 = 240;

const MEAN: f32 = 127.0;
const SCALE: f32 = 1.0 / 128.0;

/// Face detector running an UltraFace ONNX model.
#[derive(Debug)]
pub struct UltraFaceDetector {
    session: Session,
    options: DetectorOptions,
    input_name: String,
}

impl UltraFaceDetector {
    pub fn new<P: AsRef<Path>>(model_path: P, options: DetectorOptions) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            return Err(Error::ModelNotFound(model_path.to_path_buf()));
        }

        log::info!("Loading face detection model from: {}", model_path.display());

        let session = Session::builder()?.commit_from_file(model_path)?;
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .unwrap_or_else(|| "input".to_string());

        Ok(Self {
            session,
            options,
            input_name,
        })
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    fn resize(image: &RgbImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let src = FrImage::from_vec_u8(width, height, image.as_raw().clone(), PixelType::U8x3)?;
        let mut dst = FrImage::new(INPUT_WIDTH, INPUT_HEIGHT, PixelType::U8x3);
        Resizer::new().resize(&src, &mut dst, &ResizeOptions::new())?;

        RgbImage::from_raw(INPUT_WIDTH, INPUT_HEIGHT, dst.into_vec())
            .ok_or_else(|| Error::ImageProcessing("Failed to create resized image".to_string()))
    }

    fn preprocess(image: &RgbImage) -> Array<f32, ndarray::Ix4> {
        let (width, height) = image.dimensions();
        let mut array = Array::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                array[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - MEAN) * SCALE;
            }
        }

        array
    }
}

impl FaceDetect for UltraFaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(vec![]);
        }

        let input = Self::preprocess(&Self::resize(image)?);
        let input_tensor = TensorRef::from_array_view(input.view())?;
        let outputs = self
            .session
            .run(ort::inputs! { &self.input_name => input_tensor })?;

        if !outputs.contains_key("scores") || !outputs.contains_key("boxes") {
            return Err(Error::InvalidOutput(
                "expected `scores` and `boxes` outputs".to_string(),
            ));
        }

        let scores: Vec<f32> = outputs["scores"]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .collect();
        let boxes: Vec<f32> = outputs["boxes"]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .collect();

        if scores.len() / 2 != boxes.len() / 4 {
            return Err(Error::InvalidOutput(format!(
                "{} scores do not match {} boxes",
                scores.len() / 2,
                boxes.len() / 4
            )));
        }

        Ok(decode_detections(&scores, &boxes, width, height, &self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_missing_model() {
        let err = UltraFaceDetector::new("/no/such/model.onnx", DetectorOptions::default());
        assert!(matches!(err, Err(Error::ModelNotFound(_))));
    }

    #[test]
    fn test_preprocess_layout() {
        let mut img = RgbImage::from_pixel(INPUT_WIDTH, INPUT_HEIGHT, Rgb([127, 127, 127]));
        img.put_pixel(3, 2, Rgb([255, 0, 127]));

        let array = UltraFaceDetector::preprocess(&img);
        assert_eq!(array.shape(), &[1, 3, 240, 320]);
        assert_eq!(array[[0, 0, 0, 0]], 0.0);
        assert_eq!(array[[0, 0, 2, 3]], 1.0);
        assert_eq!(array[[0, 1, 2, 3]], -127.0 / 128.0);
    }

    #[test]
    fn test_resize_to_model_input() {
        let img = RgbImage::new(640, 480);
        let resized = UltraFaceDetector::resize(&img).unwrap();
        assert_eq!(resized.dimensions(), (INPUT_WIDTH, INPUT_HEIGHT));
    }
}
