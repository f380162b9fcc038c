//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are the interface
//! between the high-level [`operations`](super::operations) module (which
//! decides which derivatives to create) and the [`backend`](super::backend)
//! (which does the pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`OutputFormat`]: Target encoder: WebP, AVIF, JPEG or PNG.
//! - [`FitMode`]: How a requested box is reconciled with the source aspect ratio.
//! - [`TransformOptions`]: One full derivative request: quality, format, box, fit.
//! - [`ResizeParams`] / [`EncodeParams`]: Resolved instructions handed to a backend.
//! - [`PlaceholderParams`]: Box, blur and quality for a placeholder thumbnail.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
///
/// Every construction path, deserialization included, goes through
/// [`Quality::new`], so the value is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// Deliberately low quality used for blur placeholders.
    pub fn placeholder() -> Self {
        Self(20)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Encoded output format of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Avif,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Lowercase name, also used as the file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for reconciling a requested box with the source aspect ratio.
///
/// - `Cover`: fill the box exactly, cropping the overflow (centered).
/// - `Contain`: fit inside the box and letterbox the rest.
/// - `Fill`: stretch to the box, ignoring aspect ratio.
/// - `Inside`: preserve aspect ratio, both edges ≤ the box.
/// - `Outside`: preserve aspect ratio, both edges ≥ the box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    #[default]
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

/// A single derivative request.
///
/// Value semantics: two option sets with equal fields are interchangeable.
/// Absent dimensions are skipped during serialization so the fingerprint of
/// `{format: webp}` does not depend on how the caller spelled "no width".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub quality: Quality,
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub fit: FitMode,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            format: OutputFormat::Webp,
            width: None,
            height: None,
            fit: FitMode::default(),
        }
    }
}

impl TransformOptions {
    /// Full-size re-encode into `format`.
    pub fn encode(format: OutputFormat, quality: Quality) -> Self {
        Self {
            quality,
            format,
            ..Self::default()
        }
    }

    /// Width-bound re-encode, height following the aspect ratio.
    pub fn width(format: OutputFormat, quality: Quality, width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::encode(format, quality)
        }
    }

    pub fn wants_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Resolved resize instruction: the exact box and how to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub fit: FitMode,
}

/// Everything a backend needs to produce one encoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    /// `None` keeps the native dimensions.
    pub resize: Option<ResizeParams>,
    pub format: OutputFormat,
    pub quality: Quality,
}

/// Placeholder thumbnail parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderParams {
    pub width: u32,
    pub height: u32,
    /// Gaussian blur sigma.
    pub sigma: f32,
    pub quality: Quality,
}

impl PlaceholderParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sigma: 5.0,
            quality: Quality::placeholder(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_deserialization_clamps() {
        let q: Quality = serde_json::from_str("300").unwrap();
        assert_eq!(q.value(), 100);
        let opts: TransformOptions = serde_json::from_str(r#"{"quality": 0}"#).unwrap();
        assert_eq!(opts.quality.value(), 1);
        assert_eq!(serde_json::to_string(&Quality::new(80)).unwrap(), "80");
    }

    #[test]
    fn quality_defaults() {
        assert_eq!(Quality::default().value(), 75);
        assert_eq!(Quality::placeholder().value(), 20);
    }

    #[test]
    fn transform_options_defaults() {
        let opts = TransformOptions::default();
        assert_eq!(opts.quality.value(), 75);
        assert_eq!(opts.format, OutputFormat::Webp);
        assert_eq!(opts.fit, FitMode::Cover);
        assert!(!opts.wants_resize());
    }

    #[test]
    fn absent_dimensions_are_not_serialized() {
        let json = serde_json::to_string(&TransformOptions::default()).unwrap();
        assert!(!json.contains("width"));
        assert!(!json.contains("height"));
        assert!(json.contains(r#""format":"webp""#));
    }

    #[test]
    fn options_deserialize_from_partial_json() {
        let opts: TransformOptions =
            serde_json::from_str(r#"{"format": "avif", "width": 640, "fit": "inside"}"#).unwrap();
        assert_eq!(opts.format, OutputFormat::Avif);
        assert_eq!(opts.width, Some(640));
        assert_eq!(opts.height, None);
        assert_eq!(opts.fit, FitMode::Inside);
        assert_eq!(opts.quality, Quality::default());
    }

    #[test]
    fn format_names_and_mime_types() {
        assert_eq!(OutputFormat::Jpeg.to_string(), "jpeg");
        assert_eq!(OutputFormat::Avif.mime_type(), "image/avif");
    }

    #[test]
    fn placeholder_params_use_low_quality_blur() {
        let p = PlaceholderParams::new(20, 15);
        assert_eq!((p.width, p.height), (20, 15));
        assert_eq!(p.sigma, 5.0);
        assert_eq!(p.quality.value(), 20);
    }
}
