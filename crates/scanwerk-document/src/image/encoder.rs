// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wraps a raw scanner frame in a `DynamicImage` and writes it
// out as PNG using the `image` crate.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Frame, PixelFormat};
use tracing::{debug, instrument};

/// MIME type of everything this module produces.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// An encoded image, ready to be stored or served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// A decoded scanner frame awaiting encoding.
///
/// ```ignore
/// let png = ImageEncoder::from_frame(frame)?.to_png()?;
/// ```
pub struct ImageEncoder {
    image: DynamicImage,
}

impl ImageEncoder {
    /// Interpret a raw frame.
    ///
    /// Fails when the frame has no pixels or its data does not match its
    /// declared geometry.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height, format = ?frame.format))]
    pub fn from_frame(frame: Frame) -> Result<Self> {
        if frame.width == 0 || frame.height == 0 {
            return Err(ScanwerkError::Encoding(format!(
                "frame has no pixels ({}x{})",
                frame.width, frame.height
            )));
        }
        let expected = frame.expected_len();
        if frame.data.len() != expected {
            return Err(ScanwerkError::Encoding(format!(
                "frame data is {} bytes, {}x{} {:?} needs {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.format,
                expected
            )));
        }

        let Frame {
            width,
            height,
            format,
            data,
        } = frame;

        let image = match format {
            PixelFormat::Gray8 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            PixelFormat::Rgb8 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            PixelFormat::Lineart => GrayImage::from_raw(
                width,
                height,
                unpack_lineart(&data, width, height),
            )
            .map(DynamicImage::ImageLuma8),
        }
        .ok_or_else(|| ScanwerkError::Encoding("frame buffer too small".into()))?;

        debug!("frame wrapped for encoding");
        Ok(Self { image })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Encode as PNG.
    #[instrument(skip_all)]
    pub fn to_png(&self) -> Result<EncodedImage> {
        let mut bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut bytes);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| ScanwerkError::Encoding(format!("PNG encoding failed: {err}")))?;

        debug!(bytes = bytes.len(), "PNG encoded");
        Ok(EncodedImage {
            width: self.width(),
            height: self.height(),
            content_type: PNG_CONTENT_TYPE,
            bytes,
        })
    }
}

/// Expand packed 1-bit rows (MSB first, set bit = black) to 8-bit luma.
fn unpack_lineart(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let width = width as usize;
    let stride = width.div_ceil(8);
    let mut out = Vec::with_capacity(width * height as usize);
    for row in data.chunks_exact(stride) {
        for x in 0..width {
            let black = row[x / 8] & (0x80 >> (x % 8)) != 0;
            out.push(if black { 0x00 } else { 0xFF });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Frame {
        Frame {
            width,
            height,
            format,
            data,
        }
    }

    #[test]
    fn rgb_frame_encodes_to_png() {
        let encoded = ImageEncoder::from_frame(frame(4, 2, PixelFormat::Rgb8, vec![0x40; 24]))
            .expect("wrap")
            .to_png()
            .expect("encode");
        assert_eq!((encoded.width, encoded.height), (4, 2));
        assert_eq!(encoded.content_type, "image/png");
        assert_eq!(&encoded.bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_decodes_back_to_the_same_pixels() {
        let data: Vec<u8> = (0..12u8).collect();
        let encoded = ImageEncoder::from_frame(frame(4, 3, PixelFormat::Gray8, data.clone()))
            .expect("wrap")
            .to_png()
            .expect("encode");
        let decoded = image::load_from_memory(&encoded.bytes).expect("decode");
        assert_eq!(decoded.to_luma8().into_raw(), data);
    }

    #[test]
    fn lineart_set_bits_become_black() {
        // 10 pixels wide: two bytes per row, first pixel and tenth pixel set.
        let data = vec![0b1000_0000, 0b0100_0000];
        let encoder = ImageEncoder::from_frame(frame(10, 1, PixelFormat::Lineart, data)).expect("wrap");
        let luma = encoder.as_dynamic().to_luma8();
        assert_eq!(luma.get_pixel(0, 0).0[0], 0x00);
        assert_eq!(luma.get_pixel(1, 0).0[0], 0xFF);
        assert_eq!(luma.get_pixel(9, 0).0[0], 0x00);
    }

    #[test]
    fn short_buffer_is_an_encoding_error() {
        let result = ImageEncoder::from_frame(frame(4, 4, PixelFormat::Rgb8, vec![0; 10]));
        assert!(matches!(result, Err(ScanwerkError::Encoding(_))));
    }

    #[test]
    fn empty_frame_is_an_encoding_error() {
        let result = ImageEncoder::from_frame(frame(0, 4, PixelFormat::Gray8, Vec::new()));
        assert!(matches!(result, Err(ScanwerkError::Encoding(_))));
    }
}
