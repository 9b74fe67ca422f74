use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use log::debug;

use crate::error::{Error, Result};

/// Side length of the square input the card model expects
pub const TARGET_SIZE: u32 = 224;

/// An image brought to the model's input shape
pub struct NormalizedImage {
    /// 224x224 RGB pixels
    pixels: RgbImage,

    /// The same pixels encoded as PNG, for persistence
    png: Vec<u8>,
}

impl NormalizedImage {
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Pixel grid as rows of columns of RGB triples, i.e. shape (224, 224, 3)
    pub fn tensor(&self) -> Vec<Vec<[u8; 3]>> {
        self.pixels
            .rows()
            .map(|row| row.map(|pixel| pixel.0).collect())
            .collect()
    }
}

/// Decode a base64 payload and normalize the image inside it. Whitespace
/// anywhere in the payload is ignored, so line-wrapped encodings are fine.
pub fn normalize_base64(encoded: &str) -> Result<NormalizedImage> {
    let compact: String = encoded.split_ascii_whitespace().collect();
    let raw = base64::decode(compact)?;
    debug!("Decoded {} bytes of image data", raw.len());

    normalize_bytes(&raw)
}

pub fn normalize_bytes(data: &[u8]) -> Result<NormalizedImage> {
    let image = image::load_from_memory(data)?;
    debug!(
        "Loaded {}x{} image ({:?})",
        image.width(),
        image.height(),
        image.color()
    );

    let rgb = image.to_rgb8();

    // The model needs exact dimensions, aspect ratio is not kept
    let pixels = image::imageops::resize(&rgb, TARGET_SIZE, TARGET_SIZE, FilterType::CatmullRom);

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(pixels.clone())
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(Error::ImageFormat)?;

    Ok(NormalizedImage { pixels, png })
}
