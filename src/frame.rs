//! Captured frames.
//!
//! A `CapturedFrame` is one still image sampled from the live stream at the
//! stream's native resolution. Frames are transient: each one is encoded,
//! submitted to the classifier, and dropped. Nothing here touches the disk.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// Prefix of a JPEG data-URL. The classify request strips this before the
/// payload goes on the wire.
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// One RGB frame at native resolution.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    /// Wrap a packed RGB24 buffer. The buffer length must match the
    /// dimensions exactly.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "pixel buffer size {} does not match {}x{} rgb frame ({} bytes)",
                pixels.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Encode the frame as JPEG at the given quality (1..=100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let image = RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| {
                anyhow!("pixel buffer does not form a {}x{} image", self.width, self.height)
            })?;
        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
        encoder.encode_image(&image).context("encode frame as jpeg")?;
        Ok(jpeg)
    }

    /// Encode the frame as a base64 JPEG data-URL.
    pub fn to_data_url(&self, quality: u8) -> Result<String> {
        let jpeg = self.encode_jpeg(quality)?;
        Ok(format!("{}{}", DATA_URL_PREFIX, BASE64_STANDARD.encode(jpeg)))
    }
}
