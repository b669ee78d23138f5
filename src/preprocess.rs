use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView as _};

use crate::{error::ContextError, validation::ImageUpload};

/// How far an uploaded image is shrunk before it is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    /// The target size of the encoded image in bytes.
    pub max_size_bytes: usize,
    /// The longest side of the image in pixels.
    pub max_width_or_height: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        CompressOptions {
            max_size_bytes: 512 * 1024,
            max_width_or_height: 1200,
        }
    }
}

/// The image that is actually uploaded to the object store.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub const CONTENT_TYPE: &'static str = "image/jpeg";
    pub const EXTENSION: &'static str = "jpg";

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

const INITIAL_QUALITY: u8 = 85;
const MINIMUM_QUALITY: u8 = 35;
const QUALITY_STEP: u8 = 10;
const MAXIMUM_DOWNSCALES: u32 = 4;

/// Decodes the raw bytes of an image, whatever its format among the supported ones.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ContextError> {
    image::load_from_memory(bytes)
        .map_err(|error| ContextError::with_error("Invalid image file", &error))
}

/// Makes sure the image is at least `minimum_width`×`minimum_height` pixels and returns its dimensions.
pub fn validate_image_dimensions(
    image: &DynamicImage,
    minimum_width: u32,
    minimum_height: u32,
) -> Result<(u32, u32), ContextError> {
    let (width, height) = image.dimensions();
    if width < minimum_width || height < minimum_height {
        return Err(ContextError::with_context(format!(
            "Image too small. Minimum {minimum_width}x{minimum_height}px required"
        )));
    }

    Ok((width, height))
}

/// Validates, resizes and re-encodes an uploaded image as JPEG, lowering the quality and then the
/// resolution until it fits in `options.max_size_bytes`. The result is best effort: if the image
/// still does not fit after the last attempt, the smallest encoding is returned.
pub fn compress_image(
    upload: &ImageUpload,
    options: &CompressOptions,
) -> Result<PreparedImage, ContextError> {
    let decoded = decode_image(&upload.bytes)?;
    validate_image_dimensions(&decoded, 200, 200)?;

    let mut image = fit_within(decoded, options.max_width_or_height);
    let mut smallest: Option<PreparedImage> = None;

    for _ in 0..=MAXIMUM_DOWNSCALES {
        let mut quality = INITIAL_QUALITY;
        loop {
            let candidate = encode_jpeg(&image, quality)?;
            let fits = candidate.bytes.len() <= options.max_size_bytes;
            if smallest
                .as_ref()
                .map_or(true, |smallest| candidate.bytes.len() < smallest.bytes.len())
            {
                smallest = Some(candidate);
            }
            if fits {
                return finish(upload, smallest);
            }
            if quality <= MINIMUM_QUALITY {
                break;
            }
            quality = quality.saturating_sub(QUALITY_STEP).max(MINIMUM_QUALITY);
        }

        let (width, height) = image.dimensions();
        image = image.resize(width * 4 / 5, height * 4 / 5, FilterType::Triangle);
    }

    finish(upload, smallest)
}

fn finish(
    upload: &ImageUpload,
    prepared: Option<PreparedImage>,
) -> Result<PreparedImage, ContextError> {
    let prepared =
        prepared.ok_or_else(|| ContextError::with_context("Failed to compress image"))?;
    log::debug!(
        "Image {:?} compressed from {} to {}",
        upload.file_name,
        format_file_size(upload.bytes.len() as u64),
        format_file_size(prepared.size())
    );

    Ok(prepared)
}

/// Shrinks the image so that its longest side is at most `max_side`, keeping the aspect ratio.
pub fn fit_within(image: DynamicImage, max_side: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_side && height <= max_side {
        return image;
    }
    image.resize(max_side, max_side, FilterType::Lanczos3)
}

/// Encodes the image as a baseline RGB JPEG at the given quality.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<PreparedImage, ContextError> {
    let rgb_image = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut bytes = Vec::new();
    rgb_image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
        .map_err(|error| ContextError::with_error("Failed to compress image", &error))?;

    Ok(PreparedImage {
        bytes,
        width: rgb_image.width(),
        height: rgb_image.height(),
    })
}

/// Formats a byte count the way the admin surface shows it, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exponent = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_upload(width: u32, height: u32) -> ImageUpload {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        ImageUpload {
            file_name: "mug.png".into(),
            content_type: "image/png".into(),
            bytes,
        }
    }

    #[test]
    fn large_images_are_resized_to_the_longest_side() {
        let prepared = compress_image(&png_upload(1600, 800), &CompressOptions::default()).unwrap();

        assert_eq!((prepared.width, prepared.height), (1200, 600));
        assert!(decode_image(&prepared.bytes).is_ok());
    }

    #[test]
    fn small_images_are_rejected() {
        let error = compress_image(&png_upload(150, 400), &CompressOptions::default()).unwrap_err();

        assert_eq!(error.context, "Image too small. Minimum 200x200px required");
    }

    #[test]
    fn compression_respects_the_size_budget() {
        let options = CompressOptions {
            max_size_bytes: 20 * 1024,
            max_width_or_height: 1200,
        };
        let prepared = compress_image(&png_upload(900, 900), &options).unwrap();

        assert!(prepared.size() <= 20 * 1024, "{} bytes", prepared.size());
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn human_readable_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }
}
