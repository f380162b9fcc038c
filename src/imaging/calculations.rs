//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::FitMode;

/// Scale `value` by `num / den`, rounded, never below one pixel.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    ((value as f64 * num as f64 / den as f64).round() as u32).max(1)
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(1);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(1);
        (w, h)
    }
}

/// Calculate the largest dimensions that fit inside a target area while
/// maintaining the source aspect ratio. One dimension matches exactly.
pub fn calculate_inside_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: width is the binding edge
        (tgt_w, scale(tgt_w, src_h, src_w))
    } else {
        (scale(tgt_h, src_w, src_h), tgt_h)
    }
}

/// Resolve the output box for a transform request.
///
/// A single requested edge keeps the aspect ratio regardless of fit mode.
/// With both edges, `cover`/`contain`/`fill` produce the exact box while
/// `inside`/`outside` bound one edge and derive the other.
///
/// Derivatives are never wider than the source: a box whose width would
/// exceed the native width is scaled down proportionally.
pub fn calculate_output_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: FitMode,
) -> (u32, u32) {
    let (src_w, src_h) = source;

    let (out_w, out_h) = match (width, height) {
        (None, None) => (src_w, src_h),
        (Some(w), None) => (w, scale(w, src_h, src_w)),
        (None, Some(h)) => (scale(h, src_w, src_h), h),
        (Some(w), Some(h)) => match fit {
            FitMode::Cover | FitMode::Contain | FitMode::Fill => (w, h),
            FitMode::Inside => calculate_inside_dimensions(source, (w, h)),
            FitMode::Outside => calculate_fill_dimensions(source, (w, h)),
        },
    };

    if out_w > src_w {
        (src_w, scale(out_h, src_w, out_w))
    } else {
        (out_w.max(1), out_h.max(1))
    }
}

/// Select which candidate widths to emit for a responsive set.
///
/// Candidates wider than the source are dropped, never upscaled. The result
/// keeps the candidates' input order and may be empty.
pub fn calculate_responsive_widths(native_width: u32, candidates: &[u32]) -> Vec<u32> {
    candidates
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= native_width)
        .collect()
}

/// Placeholder box: fixed width, height following the source aspect ratio.
///
/// # Examples
/// ```
/// # use asset_derivatives::imaging::calculations::calculate_placeholder_dimensions;
/// assert_eq!(calculate_placeholder_dimensions((1000, 750), 20), (20, 15));
/// ```
pub fn calculate_placeholder_dimensions(source: (u32, u32), edge: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    (edge, scale(edge, src_h, src_w))
}
