use crate::{CameraError, CameraResult};
use fast_image_resize::{PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image as FastImage};
use image::RgbImage;

/// Scales `image` to exactly `width` x `height`. Frames that already have
/// that size are returned untouched.
pub fn fit_frame(image: RgbImage, width: u32, height: u32) -> CameraResult<RgbImage> {
    if image.dimensions() == (width, height) {
        return Ok(image);
    }

    if width == 0 || height == 0 {
        return Err(CameraError::ImageError(format!(
            "invalid target size {width}x{height}"
        )));
    }

    let (src_width, src_height) = image.dimensions();
    let src = FastImage::from_vec_u8(src_width, src_height, image.into_raw(), PixelType::U8x3)?;
    let mut dst = FastImage::new(width, height, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));
    Resizer::new().resize(&src, &mut dst, &options)?;

    RgbImage::from_raw(width, height, dst.into_vec())
        .ok_or(CameraError::ImageError("New ImageBuffer failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_same_size_is_untouched() {
        let img = RgbImage::from_pixel(4, 2, Rgb([1, 2, 3]));
        let out = fit_frame(img.clone(), 4, 2).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn test_scale_to_target() {
        let img = RgbImage::from_pixel(64, 48, Rgb([10, 200, 30]));
        let out = fit_frame(img, 32, 24).unwrap();
        assert_eq!(out.dimensions(), (32, 24));
        let px = out.get_pixel(10, 10);
        for (got, want) in px.0.iter().zip([10u8, 200, 30]) {
            assert!(got.abs_diff(want) <= 1);
        }
    }

    #[test]
    fn test_zero_target_is_rejected() {
        let img = RgbImage::new(4, 4);
        assert!(fit_frame(img, 0, 4).is_err());
    }
}
