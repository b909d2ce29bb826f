//! Still-image encoding for previews and exports.
//!
//! [`ImageFormat`] names the export formats and [`encode_image`] renders an
//! RGB frame into one of them in memory.

use std::{fmt, io::Cursor, str::FromStr};

use image::{
    ExtendedColorType, ImageEncoder, ImageError, RgbImage,
    codecs::{bmp::BmpEncoder, jpeg::JpegEncoder, png::PngEncoder, tiff::TiffEncoder},
    error::{EncodingError, ImageFormatHint},
};
use serde::{Deserialize, Serialize};

use crate::error::FramePickError;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG.
    Png,
    /// JPEG at a chosen quality.
    Jpg,
    /// Lossless TIFF.
    Tiff,
    /// Lossy WebP at a chosen quality.
    #[serde(rename = "webp")]
    WebP,
    /// Uncompressed BMP.
    Bmp,
}

impl ImageFormat {
    /// Every supported format, in the order clients list them.
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Jpg,
        ImageFormat::Png,
        ImageFormat::Tiff,
        ImageFormat::WebP,
        ImageFormat::Bmp,
    ];

    /// File extension including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Jpg => ".jpg",
            ImageFormat::Tiff => ".tiff",
            ImageFormat::WebP => ".webp",
            ImageFormat::Bmp => ".bmp",
        }
    }

    /// Whether the `quality` setting applies to this format.
    pub fn is_lossy(self) -> bool {
        matches!(self, ImageFormat::Jpg | ImageFormat::WebP)
    }

    /// Canonical name (`"png"`, `"jpg"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Tiff => "tiff",
            ImageFormat::WebP => "webp",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// MIME type of the encoded output.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpg => "image/jpeg",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageFormat {
    type Err = FramePickError;

    /// Case-insensitive; accepts `jpeg` and `tif` as aliases and an optional
    /// leading dot.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            "webp" => Ok(ImageFormat::WebP),
            "bmp" => Ok(ImageFormat::Bmp),
            _ => Err(FramePickError::InvalidFormat(value.to_string())),
        }
    }
}

/// Check a quality value for `format`. Lossless formats accept anything.
pub(crate) fn validate_quality(format: ImageFormat, quality: u32) -> Result<(), FramePickError> {
    if format.is_lossy() && !(1..=100).contains(&quality) {
        return Err(FramePickError::InvalidQuality(quality));
    }
    Ok(())
}

/// Encode `image` as `format`.
///
/// `quality` (1–100) is honored by JPEG and WebP.
pub fn encode_image(image: &RgbImage, format: ImageFormat, quality: u32) -> Result<Vec<u8>, FramePickError> {
    validate_quality(format, quality)?;
    let (width, height) = image.dimensions();
    let pixels = image.as_raw();
    let mut output = Cursor::new(Vec::new());

    match format {
        ImageFormat::Png => {
            PngEncoder::new(&mut output).write_image(pixels, width, height, ExtendedColorType::Rgb8)?;
        }
        ImageFormat::Jpg => {
            let quality = quality.clamp(1, 100) as u8;
            JpegEncoder::new_with_quality(&mut output, quality).write_image(
                pixels,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        ImageFormat::Tiff => {
            TiffEncoder::new(&mut output).write_image(pixels, width, height, ExtendedColorType::Rgb8)?;
        }
        ImageFormat::WebP => {
            let encoded = webp::Encoder::from_rgb(pixels, width, height)
                .encode_simple(false, quality as f32)
                .map_err(|error| {
                    ImageError::Encoding(EncodingError::new(
                        ImageFormatHint::Exact(image::ImageFormat::WebP),
                        format!("libwebp failed: {error:?}"),
                    ))
                })?;
            return Ok(encoded.to_vec());
        }
        ImageFormat::Bmp => {
            BmpEncoder::new(&mut output).write_image(pixels, width, height, ExtendedColorType::Rgb8)?;
        }
    }

    Ok(output.into_inner())
}
