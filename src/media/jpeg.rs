//! JPEG frame decoding
//!
//! Frames travel as complete JPEG images. The default decoder hands the
//! payload to the `image` crate and yields RGB pixels. A frame whose data
//! stops before the end-of-image marker is rejected up front, since the
//! entropy decoder tolerates a cut-off scan and would return a partly
//! blank picture.

use bytes::Bytes;
use image::{ImageFormat, RgbImage};

use crate::error::DecodeError;
use crate::playback::FrameDecoder;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// A decoded frame
#[derive(Debug, Clone)]
pub struct JpegImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbImage,
}

impl JpegImage {
    /// Decode an encoded JPEG
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if !data.starts_with(&SOI) {
            return Err(DecodeError::NotJpeg);
        }

        // Encoders may pad the last block with zeros after EOI
        let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        if !data[..end].ends_with(&EOI) {
            return Err(DecodeError::Truncated);
        }

        let pixels = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| DecodeError::Backend(e.to_string()))?
            .into_rgb8();

        Ok(Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        })
    }
}

/// Default frame decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl FrameDecoder for JpegDecoder {
    type Image = JpegImage;

    fn decode(&self, payload: Bytes) -> Result<JpegImage, DecodeError> {
        JpegImage::decode(&payload)
    }
}

#[cfg(test)]
pub(crate) fn test_jpeg(width: u32, height: u32) -> Bytes {
    use image::codecs::jpeg::JpegEncoder;

    let pixels = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, 80)
        .encode_image(&pixels)
        .unwrap();
    Bytes::from(data)
}
