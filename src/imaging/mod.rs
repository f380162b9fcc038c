//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from bytes) |
//! | **Resize** | Lanczos3, per [`FitMode`] |
//! | **Encode** | WebP / AVIF (rav1e) / JPEG / PNG encoders from `image` |
//! | **Placeholder** | tiny resize + Gaussian blur + JPEG q20, base64 data URI |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Variant generation and placeholder synthesis on top of a backend

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, OptimizedVariant, SourceAsset};
pub use operations::{
    FALLBACK_PLACEHOLDER, ResponsiveSet, generate, generate_responsive_set, synthesize_placeholder,
};
pub use params::{
    EncodeParams, FitMode, OutputFormat, PlaceholderParams, Quality, ResizeParams,
    TransformOptions,
};
pub use rust_backend::RustBackend;
