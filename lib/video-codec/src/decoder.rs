use crate::{CodecError, I420Planes, Result, RgbImage, i420_to_rgb};
use openh264::{decoder::Decoder, formats::YUVSource, nal_units};

pub struct H264Decoder {
    decoder: Decoder,
    frames_decoded: u64,
}

impl H264Decoder {
    pub fn new() -> Result<Self> {
        let decoder = Decoder::new().map_err(|e| {
            CodecError::VideoDecodingFailed(format!("Failed to create OpenH264 decoder: {:?}", e))
        })?;

        Ok(Self {
            decoder,
            frames_decoded: 0,
        })
    }

    /// Feeds Annex B data, which may hold several NAL units, and returns the
    /// last picture completed by them.
    pub fn decode(&mut self, annexb: &[u8]) -> Result<Option<RgbImage>> {
        let mut picture = None;

        for packet in nal_units(annexb) {
            match self.decoder.decode(packet) {
                Ok(Some(yuv)) => {
                    let (width, height) = yuv.dimensions();
                    let planes = I420Planes {
                        y: yuv.y(),
                        u: yuv.u(),
                        v: yuv.v(),
                        strides: yuv.strides(),
                    };
                    picture = Some(i420_to_rgb(planes, width as u32, height as u32)?);
                    self.frames_decoded += 1;
                }
                Ok(None) => continue,
                Err(e) => log::debug!("skip undecodable NAL unit ({} bytes): {e}", packet.len()),
            }
        }

        Ok(picture)
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EncoderConfig, H264Encoder};
    use image::Rgb;

    #[test]
    fn test_decode_encoded_frame_keeps_dimensions() {
        let img = RgbImage::from_pixel(64, 48, Rgb([200, 40, 40]));
        let mut encoder = H264Encoder::new(EncoderConfig::new(64, 48)).unwrap();
        let data = encoder.encode(&img).unwrap();

        let mut decoder = H264Decoder::new().unwrap();
        let decoded = decoder.decode(&data).unwrap().expect("a decoded picture");

        assert_eq!(decoded.dimensions(), (64, 48));
        assert_eq!(decoder.frames_decoded(), 1);
    }

    #[test]
    fn test_decode_garbage_yields_nothing() {
        let mut decoder = H264Decoder::new().unwrap();
        let out = decoder.decode(&[0, 0, 0, 1, 0x09, 0xf0]).unwrap();
        assert!(out.is_none());
    }
}
