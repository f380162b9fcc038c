//! Centralized filename convention for derivatives.
//!
//! Every derivative of a source is named from the source's file stem and the
//! short fingerprint of the (source, config) pair:
//!
//! - `hero-1a2b3c4d.webp`: full-size derivative in one format
//! - `hero-1a2b3c4d-640w.webp`: responsive candidate at 640 px wide
//!
//! The fingerprint segment changes whenever the source path or any
//! transformation setting changes, which makes every filename safe to serve
//! with far-future cache headers.

use crate::imaging::OutputFormat;
use std::path::Path;

/// Stem used when a path has no usable file name.
const FALLBACK_STEM: &str = "image";

/// File stem of a source path: `photos/hero.final.jpg` → `hero.final`.
pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string())
}

/// Filename of one derivative. `width` is set for responsive candidates.
pub fn derivative_filename(
    stem: &str,
    hash: &str,
    format: OutputFormat,
    width: Option<u32>,
) -> String {
    match width {
        Some(w) => format!("{}-{}-{}w.{}", stem, hash, w, format),
        None => format!("{}-{}.{}", stem, hash, format),
    }
}

/// Public URL of a derivative under `public_path`.
///
/// A trailing slash on `public_path` is tolerated; an empty `public_path`
/// yields a root-relative URL.
pub fn derivative_url(public_path: &str, filename: &str) -> String {
    format!("{}/{}", public_path.trim_end_matches('/'), filename)
}
