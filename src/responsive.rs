//! Presentational helpers for the markup layer.
//!
//! These build the attribute strings a `<img>`/`<picture>` element needs from
//! a manifest: `srcset`, `sizes`, a preload hint, and an inline SVG used as a
//! solid-colour stand-in when no blurred placeholder exists.

use crate::imaging::OutputFormat;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Default stand-in colour for [`generate_blur_svg`].
pub const DEFAULT_BLUR_COLOR: &str = "#f3f4f6";

/// Intrinsic size of the longer edge of a blur SVG.
const BLUR_SVG_EDGE: f64 = 20.0;

/// Build a `srcset` value from a base URL and ascending widths.
///
/// The base URL's extension is replaced: `/images/photo.jpg` at 640 in
/// `webp` becomes `/images/photo-640w.webp 640w`.
pub fn generate_src_set(base_src: &str, sizes: &[u32], format: OutputFormat) -> String {
    let base = strip_extension(base_src);
    sizes
        .iter()
        .map(|size| format!("{}-{}w.{} {}w", base, size, format, size))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drop a trailing `.ext` from the last path segment, if any.
fn strip_extension(src: &str) -> &str {
    let segment_start = src.rfind('/').map(|i| i + 1).unwrap_or(0);
    match src[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => &src[..segment_start + dot],
        _ => src,
    }
}

/// One `sizes` entry: up to `max_width` pixels the image is shown at `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub max_width: u32,
    pub size: String,
}

impl Breakpoint {
    pub fn new(max_width: u32, size: impl Into<String>) -> Self {
        Self {
            max_width,
            size: size.into(),
        }
    }
}

/// Build a `sizes` value. The last breakpoint is the unconditional default
/// and carries no media query.
pub fn generate_sizes(breakpoints: &[Breakpoint]) -> String {
    let last = breakpoints.len().saturating_sub(1);
    breakpoints
        .iter()
        .enumerate()
        .map(|(i, bp)| {
            if i == last {
                bp.size.clone()
            } else {
                format!("(max-width: {}px) {}", bp.max_width, bp.size)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Mobile, tablet and desktop breakpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsiveBreakpoints {
    pub mobile: Breakpoint,
    pub tablet: Breakpoint,
    pub desktop: Breakpoint,
}

impl Default for ResponsiveBreakpoints {
    fn default() -> Self {
        Self {
            mobile: Breakpoint::new(640, "100vw"),
            tablet: Breakpoint::new(1024, "50vw"),
            desktop: Breakpoint::new(1920, "33vw"),
        }
    }
}

/// `sizes` value for a three-tier layout.
pub fn create_responsive_sizes(breakpoints: &ResponsiveBreakpoints) -> String {
    generate_sizes(&[
        breakpoints.mobile.clone(),
        breakpoints.tablet.clone(),
        breakpoints.desktop.clone(),
    ])
}

/// Solid-colour SVG data URI with the aspect ratio of `width`×`height`.
///
/// The longer edge is 20 units. Zero dimensions yield a 20×20 square.
pub fn generate_blur_svg(width: u32, height: u32, color: &str) -> String {
    let (svg_w, svg_h) = if width == 0 || height == 0 {
        (BLUR_SVG_EDGE, BLUR_SVG_EDGE)
    } else {
        let aspect = f64::from(width) / f64::from(height);
        if aspect > 1.0 {
            (BLUR_SVG_EDGE, BLUR_SVG_EDGE / aspect)
        } else {
            (BLUR_SVG_EDGE * aspect, BLUR_SVG_EDGE)
        }
    };
    let svg = format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" fill="none" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="{color}"/></svg>"#,
        w = svg_w,
        h = svg_h,
        color = escape_attr(color),
    );
    format!("data:image/svg+xml;base64,{}", BASE64.encode(svg))
}

/// `<link rel="preload">` hint for an above-the-fold image.
pub fn preload_link(src: &str, src_set: Option<&str>, sizes: Option<&str>) -> String {
    let mut tag = format!(r#"<link rel="preload" as="image" href="{}""#, escape_attr(src));
    if let Some(set) = src_set.filter(|s| !s.is_empty()) {
        tag.push_str(&format!(r#" imagesrcset="{}""#, escape_attr(set)));
    }
    if let Some(sizes) = sizes.filter(|s| !s.is_empty()) {
        tag.push_str(&format!(r#" imagesizes="{}""#, escape_attr(sizes)));
    }
    tag.push('>');
    tag
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
