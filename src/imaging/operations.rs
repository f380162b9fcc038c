//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! decoded [`SourceAsset`] and transform options, compute the resize plan,
//! and call the backend. The source is never decoded here: callers decode
//! once and pass the same asset to every operation.

use super::backend::{BackendError, ImageBackend, OptimizedVariant, SourceAsset};
use super::calculations::{
    calculate_output_dimensions, calculate_placeholder_dimensions, calculate_responsive_widths,
};
use super::params::{EncodeParams, OutputFormat, PlaceholderParams, Quality, ResizeParams, TransformOptions};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Placeholder edge length in pixels.
pub const PLACEHOLDER_EDGE: u32 = 20;

/// Static placeholder used when synthesis fails: a 20×20 `#f3f4f6` SVG.
pub const FALLBACK_PLACEHOLDER: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMjAiIGhlaWdodD0iMjAiIHZpZXdCb3g9IjAgMCAyMCAyMCIgZmlsbD0ibm9uZSIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj4KPHJlY3Qgd2lkdGg9IjEwMCUiIGhlaWdodD0iMTAwJSIgZmlsbD0iI2YzZjRmNiIvPgo8L3N2Zz4K";

/// Plan an encode without executing it.
///
/// Resolves the requested box against the source dimensions. No resize is
/// planned when the options carry neither width nor height.
pub fn plan_encode(source: (u32, u32), options: &TransformOptions) -> EncodeParams {
    let resize = options.wants_resize().then(|| {
        let (width, height) =
            calculate_output_dimensions(source, options.width, options.height, options.fit);
        ResizeParams {
            width,
            height,
            fit: options.fit,
        }
    });

    EncodeParams {
        resize,
        format: options.format,
        quality: options.quality,
    }
}

/// Produce one derivative of an already decoded source.
pub fn generate<B: ImageBackend>(
    backend: &B,
    asset: &SourceAsset<B::Image>,
    options: &TransformOptions,
) -> Result<OptimizedVariant> {
    let params = plan_encode(asset.dimensions.as_tuple(), options);
    backend.encode(asset, &params)
}

/// Outcome of a responsive-set run.
///
/// Candidates that failed to encode are reported separately so the caller
/// can log them; they never abort the rest of the set.
#[derive(Debug, Default)]
pub struct ResponsiveSet {
    /// Emitted variants, in candidate order.
    pub variants: Vec<(u32, OptimizedVariant)>,
    /// Candidate widths whose encode failed.
    pub failures: Vec<(u32, BackendError)>,
}

/// Create width-bound derivatives for each candidate width.
///
/// Candidates wider than the source are skipped.
pub fn generate_responsive_set<B: ImageBackend>(
    backend: &B,
    asset: &SourceAsset<B::Image>,
    sizes: &[u32],
    format: OutputFormat,
    quality: Quality,
) -> ResponsiveSet {
    let mut set = ResponsiveSet::default();

    for width in calculate_responsive_widths(asset.dimensions.width, sizes) {
        let options = TransformOptions::width(format, quality, width);
        match generate(backend, asset, &options) {
            Ok(variant) => set.variants.push((width, variant)),
            Err(e) => set.failures.push((width, e)),
        }
    }

    set
}

/// Encode raw JPEG bytes as a `data:` URI.
pub fn jpeg_data_uri(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(bytes))
}

/// Synthesize a blurred inline placeholder of an explicit size.
///
/// Never fails: on any backend error the static [`FALLBACK_PLACEHOLDER`]
/// is returned instead and the error is logged.
pub fn synthesize_placeholder_sized<B: ImageBackend>(
    backend: &B,
    asset: &SourceAsset<B::Image>,
    width: u32,
    height: u32,
) -> String {
    match backend.placeholder(asset, &PlaceholderParams::new(width, height)) {
        Ok(bytes) => jpeg_data_uri(&bytes),
        Err(e) => {
            tracing::warn!(source = %asset.id, error = %e, "placeholder synthesis failed, using fallback");
            FALLBACK_PLACEHOLDER.to_string()
        }
    }
}

/// Synthesize a blurred inline placeholder at the standard size.
///
/// The placeholder is [`PLACEHOLDER_EDGE`] pixels wide with height following
/// the source aspect ratio. Degenerate sources get the fallback.
pub fn synthesize_placeholder<B: ImageBackend>(
    backend: &B,
    asset: &SourceAsset<B::Image>,
) -> String {
    let dims = asset.dimensions;
    if dims.width == 0 || dims.height == 0 {
        return FALLBACK_PLACEHOLDER.to_string();
    }
    let (width, height) = calculate_placeholder_dimensions(dims.as_tuple(), PLACEHOLDER_EDGE);
    synthesize_placeholder_sized(backend, asset, width, height)
}
