//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Each asset leads with its file name and resolved size; the full source
//! path and per-derivative outcomes are indented context lines underneath.
//!
//! # Output Format
//!
//! ## Progress
//!
//! ```text
//! Processing 3 images
//! hero.jpg: computed
//!     Source: /site/src/img/hero.jpg
//!     webp: encoded
//!     avif: failed
//!     webp 640w: encoded
//!     placeholder: encoded
//! logo.png: cached
//!     Source: /site/src/img/logo.png
//! ```
//!
//! ## Build
//!
//! ```text
//! 001 hero.jpg (1000x750)
//!     Source: /site/src/img/hero.jpg
//!     src: /images/hero-1a2b3c4d.webp
//!     srcSet: 640w, 750w
//!     formats: webp, jpeg
//! 002 broken.jpg (degraded)
//!     Source: /site/src/img/broken.jpg
//!
//! Generated 2 optimized images (1 degraded), 4 files, 1.2 MB → dist/images
//! Cache: 1 cached, 2 computed (3 total)
//! ```
//!
//! # Architecture
//!
//! Every `format_*` function returns `Vec<String>` for testability, and a
//! `print_*` wrapper writes to stdout. Format functions are pure: no I/O,
//! no side effects.

use crate::cache::CacheStats;
use crate::pipeline::{AssetEntry, AssetStatus, BuildSummary, ProcessEvent, VariantStatus};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Last path component, or the whole path when there is none.
fn display_name(source_path: &str) -> String {
    Path::new(source_path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_path.to_string())
}

/// Human-readable byte count: `512 B`, `3.4 KB`, `1.2 MB`.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn status_label(status: AssetStatus) -> &'static str {
    match status {
        AssetStatus::Computed => "computed",
        AssetStatus::Cached => "cached",
        AssetStatus::Shared => "shared",
        AssetStatus::Degraded => "degraded",
    }
}

// ============================================================================
// Progress events
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { count } => {
            let noun = if *count == 1 { "image" } else { "images" };
            vec![format!("Processing {} {}", count, noun)]
        }
        ProcessEvent::AssetResolved {
            source_path,
            status,
            variants,
        } => {
            let mut lines = vec![
                format!("{}: {}", display_name(source_path), status_label(*status)),
                format!("{}Source: {}", indent(1), source_path),
            ];
            for variant in variants {
                let status_str = match variant.status {
                    VariantStatus::Encoded => "encoded",
                    VariantStatus::Failed => "failed",
                    VariantStatus::Fallback => "fallback",
                };
                lines.push(format!("{}{}: {}", indent(1), variant.label, status_str));
            }
            lines
        }
    }
}

pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format one processed asset as a header plus context lines.
pub fn format_asset(index: usize, entry: &AssetEntry) -> Vec<String> {
    let m = &entry.manifest;
    let name = display_name(&entry.source_id);
    let mut lines = Vec::new();

    if m.is_degraded() {
        lines.push(format!("{} {} (degraded)", format_index(index), name));
        lines.push(format!("{}Source: {}", indent(1), entry.source_id));
        return lines;
    }

    lines.push(format!(
        "{} {} ({}x{})",
        format_index(index),
        name,
        m.width,
        m.height
    ));
    lines.push(format!("{}Source: {}", indent(1), entry.source_id));
    lines.push(format!("{}src: {}", indent(1), m.src));
    if !m.src_set.is_empty() {
        let widths: Vec<String> = m.src_set.iter().map(|c| format!("{}w", c.width)).collect();
        lines.push(format!("{}srcSet: {}", indent(1), widths.join(", ")));
    }
    let formats: Vec<String> = m.formats.keys().map(|f| f.to_string()).collect();
    lines.push(format!("{}formats: {}", indent(1), formats.join(", ")));
    lines
}

/// Format the finalize summary and cache statistics.
pub fn format_build_summary(summary: &BuildSummary, cache: &CacheStats) -> Vec<String> {
    let noun = if summary.assets == 1 { "image" } else { "images" };
    let degraded = if summary.degraded > 0 {
        format!(" ({} degraded)", summary.degraded)
    } else {
        String::new()
    };
    vec![
        format!(
            "Generated {} optimized {}{}, {} files, {} → {}",
            summary.assets,
            noun,
            degraded,
            summary.files_written,
            format_bytes(summary.bytes_written),
            summary.output_dir.display()
        ),
        format!("Cache: {}", cache),
    ]
}

/// Format the build result: one block per asset, then the summary.
pub fn format_build_output(
    entries: &[&AssetEntry],
    summary: &BuildSummary,
    cache: &CacheStats,
) -> Vec<String> {
    let mut lines: Vec<String> = entries
        .iter()
        .enumerate()
        .flat_map(|(i, entry)| format_asset(i + 1, entry))
        .collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.extend(format_build_summary(summary, cache));
    lines
}

pub fn print_build_output(entries: &[&AssetEntry], summary: &BuildSummary, cache: &CacheStats) {
    for line in format_build_output(entries, summary, cache) {
        println!("{}", line);
    }
}
