//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Resize | `image::DynamicImage` resize family with `Lanczos3` |
//! | Letterbox (`contain`) | `image::imageops::overlay` onto a transparent canvas |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Placeholder blur | `image::DynamicImage::blur` |

use super::backend::{BackendError, Dimensions, ImageBackend, OptimizedVariant, SourceAsset};
use super::params::{EncodeParams, FitMode, OutputFormat, PlaceholderParams, Quality, ResizeParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in and known to work.
///
/// AVIF is excluded: the `image` crate's `"avif"` feature only enables the
/// **encoder** (rav1e), so AVIF can be produced but not read.
const SOURCE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SOURCE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has an extension this backend can decode.
pub fn is_supported_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::Decode {
        source_id: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn encode_error(format: OutputFormat, reason: impl ToString) -> BackendError {
    BackendError::Encode {
        format,
        reason: reason.to_string(),
    }
}

/// Apply a resolved resize instruction.
fn apply_resize(img: &DynamicImage, resize: &ResizeParams) -> DynamicImage {
    let ResizeParams { width, height, fit } = *resize;
    match fit {
        FitMode::Cover => img.resize_to_fill(width, height, FilterType::Lanczos3),
        FitMode::Fill | FitMode::Inside | FitMode::Outside => {
            // Inside/outside boxes are already aspect-correct
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        FitMode::Contain => {
            let fitted = img.resize(width, height, FilterType::Lanczos3).to_rgba8();
            let mut canvas = RgbaImage::new(width, height);
            let x = (width - fitted.width()) / 2;
            let y = (height - fitted.height()) / 2;
            image::imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);
            DynamicImage::ImageRgba8(canvas)
        }
    }
}

/// Encode into an in-memory buffer.
///
/// JPEG has no alpha channel, so it always receives RGB8. The other encoders
/// get RGBA8 only when the image actually carries alpha.
fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let q = u8::try_from(quality.value()).unwrap_or(100);
    let pixels = match format {
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    };

    let result = match format {
        OutputFormat::Jpeg => pixels.write_with_encoder(
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, q),
        ),
        OutputFormat::Avif => pixels.write_with_encoder(
            image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, q),
        ),
        // The pure-Rust WebP encoder is lossless only; quality has no effect
        OutputFormat::Webp => {
            pixels.write_with_encoder(image::codecs::webp::WebPEncoder::new_lossless(&mut buf))
        }
        OutputFormat::Png => {
            pixels.write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf))
        }
    };
    result.map_err(|e| encode_error(format, e))?;
    Ok(buf)
}

/// Map a sniffed container format to its canonical extension.
fn format_name(format: Option<ImageFormat>) -> String {
    format
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("unknown")
        .to_string()
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn decode(&self, path: &Path) -> Result<SourceAsset<DynamicImage>, BackendError> {
        let bytes = std::fs::read(path)?;
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(BackendError::Io)?;
        let native_format = format_name(reader.format());
        let image = reader.decode().map_err(|e| decode_error(path, e))?;

        Ok(SourceAsset {
            id: path.display().to_string(),
            dimensions: Dimensions {
                width: image.width(),
                height: image.height(),
            },
            native_format,
            image,
        })
    }

    fn encode(
        &self,
        asset: &SourceAsset<DynamicImage>,
        params: &EncodeParams,
    ) -> Result<OptimizedVariant, BackendError> {
        let resized;
        let img = match &params.resize {
            Some(resize) => {
                resized = apply_resize(&asset.image, resize);
                &resized
            }
            None => &asset.image,
        };

        let bytes = encode_image(img, params.format, params.quality)?;
        Ok(OptimizedVariant {
            bytes,
            dimensions: Dimensions {
                width: img.width(),
                height: img.height(),
            },
            format: params.format,
        })
    }

    fn placeholder(
        &self,
        asset: &SourceAsset<DynamicImage>,
        params: &PlaceholderParams,
    ) -> Result<Vec<u8>, BackendError> {
        let small = asset
            .image
            .resize(params.width, params.height, FilterType::Triangle);
        let blurred = small.blur(params.sigma);
        encode_image(&blurred, OutputFormat::Jpeg, params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_jpeg, create_test_png_rgba};

    fn decode_dims(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).unwrap();
        (img.width(), img.height())
    }

    fn encode_params(format: OutputFormat, resize: Option<ResizeParams>) -> EncodeParams {
        EncodeParams {
            resize,
            format,
            quality: Quality::new(80),
        }
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
        assert!(!exts.contains(&"avif"));
    }

    #[test]
    fn is_supported_source_ignores_case() {
        assert!(is_supported_source(Path::new("a/B.JPG")));
        assert!(!is_supported_source(Path::new("a/readme.md")));
        assert!(!is_supported_source(Path::new("a/noext")));
    }

    #[test]
    fn decode_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let asset = RustBackend::new().decode(&path).unwrap();
        assert_eq!(asset.dimensions.as_tuple(), (200, 150));
        assert_eq!(asset.native_format, "jpg");
        assert_eq!(asset.id, path.display().to_string());
    }

    #[test]
    fn decode_sniffs_format_regardless_of_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("actually-a-jpeg.png");
        create_test_jpeg(&path, 40, 30);

        let asset = RustBackend::new().decode(&path).unwrap();
        assert_eq!(asset.native_format, "jpg");
    }

    #[test]
    fn decode_nonexistent_file_is_io_error() {
        let result = RustBackend::new().decode(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = RustBackend::new().decode(&path);
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn encode_each_format_without_resize() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.jpg");
        create_test_jpeg(&path, 64, 48);
        let backend = RustBackend::new();
        let asset = backend.decode(&path).unwrap();

        for format in [OutputFormat::Webp, OutputFormat::Jpeg, OutputFormat::Png] {
            let variant = backend
                .encode(&asset, &encode_params(format, None))
                .unwrap();
            assert_eq!(variant.format, format);
            assert_eq!(variant.dimensions.as_tuple(), (64, 48));
            assert_eq!(decode_dims(&variant.bytes), (64, 48), "{format}");
        }
    }

    #[test]
    fn encode_avif_produces_bytes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.jpg");
        create_test_jpeg(&path, 32, 24);
        let backend = RustBackend::new();
        let asset = backend.decode(&path).unwrap();

        let variant = backend
            .encode(&asset, &encode_params(OutputFormat::Avif, None))
            .unwrap();
        assert!(variant.byte_len() > 0);
        assert_eq!(variant.dimensions.as_tuple(), (32, 24));
    }

    #[test]
    fn encode_cover_crops_to_exact_box() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.jpg");
        create_test_jpeg(&path, 400, 300);
        let backend = RustBackend::new();
        let asset = backend.decode(&path).unwrap();

        let variant = backend
            .encode(
                &asset,
                &encode_params(
                    OutputFormat::Png,
                    Some(ResizeParams {
                        width: 100,
                        height: 100,
                        fit: FitMode::Cover,
                    }),
                ),
            )
            .unwrap();
        assert_eq!(variant.dimensions.as_tuple(), (100, 100));
        assert_eq!(decode_dims(&variant.bytes), (100, 100));
    }

    #[test]
    fn encode_contain_letterboxes_to_exact_box() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.jpg");
        create_test_jpeg(&path, 400, 200);
        let backend = RustBackend::new();
        let asset = backend.decode(&path).unwrap();

        let variant = backend
            .encode(
                &asset,
                &encode_params(
                    OutputFormat::Png,
                    Some(ResizeParams {
                        width: 100,
                        height: 100,
                        fit: FitMode::Contain,
                    }),
                ),
            )
            .unwrap();
        assert_eq!(variant.dimensions.as_tuple(), (100, 100));

        // Top rows are padding
        let decoded = image::load_from_memory(&variant.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(50, 0).0[3], 0);
    }

    #[test]
    fn encode_jpeg_flattens_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("alpha.png");
        create_test_png_rgba(&path, 50, 50);
        let backend = RustBackend::new();
        let asset = backend.decode(&path).unwrap();

        let variant = backend
            .encode(&asset, &encode_params(OutputFormat::Jpeg, None))
            .unwrap();
        assert_eq!(decode_dims(&variant.bytes), (50, 50));
    }

    #[test]
    fn placeholder_is_tiny_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.jpg");
        create_test_jpeg(&path, 400, 300);
        let backend = RustBackend::new();
        let asset = backend.decode(&path).unwrap();

        let bytes = backend
            .placeholder(&asset, &PlaceholderParams::new(20, 15))
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(decode_dims(&bytes), (20, 15));
    }
}
