//! H.264 encoding and decoding for camera frames.
//!
//! Frames travel through the recorder as [`RgbImage`]s. The encoder turns
//! them into Annex B byte streams (start-code delimited NAL units) and the
//! decoder turns Annex B NAL units back into RGB images.

mod decoder;
mod encoder;

pub use decoder::H264Decoder;
pub use encoder::{EncoderConfig, H264Encoder};
pub use image::RgbImage;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("Image processing failed: {0}")]
    ImageProcessingFailed(String),

    #[error("Video encoding failed: {0}")]
    VideoEncodingFailed(String),

    #[error("Video decoding failed: {0}")]
    VideoDecodingFailed(String),

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(String),
}

pub fn rgb_to_i420(rgb_data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    use yuv::{
        YuvChromaSubsampling, YuvConversionMode, YuvPlanarImageMut, YuvRange, YuvStandardMatrix,
        rgb_to_yuv420,
    };

    if width % 2 != 0 || height % 2 != 0 {
        return Err(CodecError::InvalidFrameSize(format!(
            "I420 needs even dimensions. current size: {width}x{height}"
        )));
    }

    let expected = (width * height * 3) as usize;
    if rgb_data.len() != expected {
        return Err(CodecError::InvalidFrameSize(format!(
            "RGB buffer has {} bytes. expect {expected} bytes",
            rgb_data.len()
        )));
    }

    let frame_size = (width * height) as usize;
    let mut planar_image =
        YuvPlanarImageMut::<u8>::alloc(width, height, YuvChromaSubsampling::Yuv420);

    rgb_to_yuv420(
        &mut planar_image,
        rgb_data,
        width * 3,
        YuvRange::Limited,
        YuvStandardMatrix::Bt601,
        YuvConversionMode::Balanced,
    )
    .map_err(|e| {
        CodecError::ImageProcessingFailed(format!("RGB to YUV conversion failed: {:?}", e))
    })?;

    let mut yuv_data = vec![0u8; frame_size * 3 / 2];
    let u_plane_end = frame_size + frame_size / 4;
    yuv_data[0..frame_size].copy_from_slice(planar_image.y_plane.borrow());
    yuv_data[frame_size..u_plane_end].copy_from_slice(planar_image.u_plane.borrow());
    yuv_data[u_plane_end..].copy_from_slice(planar_image.v_plane.borrow());

    Ok(yuv_data)
}

/// Planes may be padded, so each one comes with its own stride.
pub struct I420Planes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub strides: (usize, usize, usize),
}

pub fn i420_to_rgb(planes: I420Planes<'_>, width: u32, height: u32) -> Result<RgbImage> {
    use yuv::{YuvPlanarImage, YuvRange, YuvStandardMatrix, yuv420_to_rgb};

    let yuv_planar_image = YuvPlanarImage {
        y_plane: planes.y,
        y_stride: planes.strides.0 as u32,
        u_plane: planes.u,
        u_stride: planes.strides.1 as u32,
        v_plane: planes.v,
        v_stride: planes.strides.2 as u32,
        width,
        height,
    };

    let mut rgb_data = vec![0u8; (width * height * 3) as usize];
    yuv420_to_rgb(
        &yuv_planar_image,
        &mut rgb_data,
        width * 3,
        YuvRange::Limited,
        YuvStandardMatrix::Bt601,
    )
    .map_err(|e| {
        CodecError::ImageProcessingFailed(format!("YUV to RGB conversion failed: {:?}", e))
    })?;

    RgbImage::from_raw(width, height, rgb_data).ok_or_else(|| {
        CodecError::ImageProcessingFailed("Failed to create RGB image buffer".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_i420_size() {
        let rgb = vec![128u8; 16 * 8 * 3];
        let yuv = rgb_to_i420(&rgb, 16, 8).unwrap();
        assert_eq!(yuv.len(), 16 * 8 * 3 / 2);
    }

    #[test]
    fn test_rgb_to_i420_rejects_odd_size() {
        let rgb = vec![0u8; 15 * 8 * 3];
        assert!(matches!(
            rgb_to_i420(&rgb, 15, 8),
            Err(CodecError::InvalidFrameSize(_))
        ));
    }

    #[test]
    fn test_rgb_to_i420_rejects_short_buffer() {
        let rgb = vec![0u8; 10];
        assert!(rgb_to_i420(&rgb, 16, 8).is_err());
    }

    #[test]
    fn test_gray_survives_conversion() {
        let (width, height) = (16u32, 16u32);
        let rgb = vec![128u8; (width * height * 3) as usize];
        let yuv = rgb_to_i420(&rgb, width, height).unwrap();

        let frame_size = (width * height) as usize;
        let planes = I420Planes {
            y: &yuv[..frame_size],
            u: &yuv[frame_size..frame_size + frame_size / 4],
            v: &yuv[frame_size + frame_size / 4..],
            strides: (width as usize, width as usize / 2, width as usize / 2),
        };

        let img = i420_to_rgb(planes, width, height).unwrap();
        for pixel in img.pixels() {
            for channel in pixel.0 {
                assert!((channel as i32 - 128).abs() <= 3, "channel {channel}");
            }
        }
    }
}
