use crate::{CodecError, Result, RgbImage, rgb_to_i420};
use derive_setters::Setters;
use openh264::{
    OpenH264API,
    encoder::{BitRate, Encoder, EncoderConfig as OpenH264Config, FrameRate},
    formats::YUVBuffer,
};

#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_")]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub bitrate: u32,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: 30.0,
            bitrate: 2_000_000,
        }
    }
}

pub struct H264Encoder {
    config: EncoderConfig,
    encoder: Encoder,
    frame_index: u64,
}

impl H264Encoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(CodecError::InvalidFrameSize(format!(
                "{}x{}",
                config.width, config.height
            )));
        }

        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(CodecError::InvalidFrameSize(format!(
                "H.264 needs even dimensions. current size: {}x{}",
                config.width, config.height
            )));
        }

        let encoder_config = OpenH264Config::new()
            .bitrate(BitRate::from_bps(config.bitrate))
            .max_frame_rate(FrameRate::from_hz(config.fps))
            .skip_frames(false);

        let encoder = Encoder::with_api_config(OpenH264API::from_source(), encoder_config)
            .map_err(|e| {
                CodecError::VideoEncodingFailed(format!(
                    "Failed to create OpenH264 encoder: {:?}",
                    e
                ))
            })?;

        log::debug!(
            "OpenH264 encoder created: {}x{} @ {:.2}fps, {} bps",
            config.width,
            config.height,
            config.fps,
            config.bitrate
        );

        Ok(Self {
            config,
            encoder,
            frame_index: 0,
        })
    }

    /// Encodes one frame and returns its Annex B bytes. Key frames carry
    /// SPS and PPS in front of the slice data.
    pub fn encode(&mut self, img: &RgbImage) -> Result<Vec<u8>> {
        let (img_width, img_height) = img.dimensions();
        if img_width != self.config.width || img_height != self.config.height {
            return Err(CodecError::InvalidFrameSize(format!(
                "current size: {}x{}. expect size: {}x{}",
                img_width, img_height, self.config.width, self.config.height
            )));
        }

        let i420 = rgb_to_i420(img.as_raw(), img_width, img_height)?;
        let yuv_buffer = YUVBuffer::from_vec(i420, img_width as usize, img_height as usize);

        let bitstream = self.encoder.encode(&yuv_buffer).map_err(|e| {
            CodecError::VideoEncodingFailed(format!("OpenH264 encoding failed: {:?}", e))
        })?;

        let data = bitstream.to_vec();
        self.frame_index += 1;
        Ok(data)
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frame_index
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        })
    }

    #[test]
    fn test_encode_produces_annexb() {
        let mut encoder = H264Encoder::new(EncoderConfig::new(64, 64)).unwrap();
        let data = encoder.encode(&gradient(64, 64)).unwrap();

        assert!(!data.is_empty());
        assert!(data.starts_with(&[0, 0, 0, 1]) || data.starts_with(&[0, 0, 1]));
        assert_eq!(encoder.frames_encoded(), 1);
    }

    #[test]
    fn test_encode_rejects_wrong_size() {
        let mut encoder = H264Encoder::new(EncoderConfig::new(64, 64)).unwrap();
        assert!(matches!(
            encoder.encode(&gradient(32, 32)),
            Err(CodecError::InvalidFrameSize(_))
        ));
    }

    #[test]
    fn test_new_rejects_odd_dimensions() {
        assert!(H264Encoder::new(EncoderConfig::new(63, 64)).is_err());
        assert!(H264Encoder::new(EncoderConfig::new(0, 64)).is_err());
    }
}
