//! Shared test utilities.
//!
//! Synthetic image fixtures written with the `image` crate encoders, plus
//! lookup helpers over processed results that panic with a clear message on
//! miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let path = tmp.path().join("hero.jpg");
//! create_test_jpeg(&path, 1000, 750);
//!
//! let entry = pipeline.process(&path).unwrap();
//! assert_eq!(src_set_widths(&entry.manifest), vec![640, 750]);
//! let webp = find_variant(&entry, ".webp");
//! ```

use crate::manifest::ProcessedImageManifest;
use crate::pipeline::{AssetEntry, NamedVariant};
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;

// =========================================================================
// Fixture images
// =========================================================================

/// Write a valid JPEG with a gradient pattern.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a PNG with a half-transparent alpha channel.
pub fn create_test_png_rgba(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 200, if x < width / 2 { 0 } else { 255 }])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::png::PngEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
}

/// Write a file with an image extension but no decodable content.
pub fn write_corrupt_image(path: &Path) {
    std::fs::write(path, b"\xFF\xD8\xFF\xE0 truncated jpeg").unwrap();
}

// =========================================================================
// Result lookups
// =========================================================================

/// Responsive candidate widths in manifest order.
pub fn src_set_widths(manifest: &ProcessedImageManifest) -> Vec<u32> {
    manifest.src_set.iter().map(|c| c.width).collect()
}

/// Find an encoded derivative whose filename ends with `suffix`.
/// Panics if not found.
pub fn find_variant<'a>(entry: &'a AssetEntry, suffix: &str) -> &'a NamedVariant {
    entry
        .variants
        .iter()
        .find(|v| v.filename.ends_with(suffix))
        .unwrap_or_else(|| {
            let names: Vec<&str> = entry.variants.iter().map(|v| v.filename.as_str()).collect();
            panic!("no variant ending in '{suffix}'. Available: {names:?}")
        })
}
