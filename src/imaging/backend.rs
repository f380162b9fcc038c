//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: decode, encode, and placeholder. Decoding happens once per asset;
//! the decoded [`SourceAsset`] is then borrowed for every derivative of that
//! asset, so the expensive decode never repeats inside one pipeline run.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) on the `image` crate.
//! Tests use the recording `MockBackend` below.

use super::params::{EncodeParams, OutputFormat, PlaceholderParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {source_id}: {reason}")]
    Decode { source_id: String, reason: String },
    #[error("Failed to encode {format}: {reason}")]
    Encode {
        format: OutputFormat,
        reason: String,
    },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A decoded source image.
///
/// Immutable once read and owned by the pipeline invocation that decoded it.
/// `image` is backend-specific pixel data (the mock backend carries `()`).
#[derive(Debug, Clone)]
pub struct SourceAsset<I> {
    /// Stable identifier, normally the resolved filesystem path.
    pub id: String,
    pub dimensions: Dimensions,
    /// Native format name as sniffed from the bytes, e.g. `"jpg"` or `"png"`.
    pub native_format: String,
    pub image: I,
}

/// One encoded derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedVariant {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
}

impl OptimizedVariant {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared by rayon workers.
pub trait ImageBackend: Sync {
    /// Decoded pixel representation carried inside a [`SourceAsset`].
    type Image: Send + Sync;

    /// Read and decode a source image.
    fn decode(&self, path: &Path) -> Result<SourceAsset<Self::Image>, BackendError>;

    /// Resize (optionally) and encode one derivative.
    fn encode(
        &self,
        asset: &SourceAsset<Self::Image>,
        params: &EncodeParams,
    ) -> Result<OptimizedVariant, BackendError>;

    /// Produce a tiny blurred JPEG for use as an inline placeholder.
    fn placeholder(
        &self,
        asset: &SourceAsset<Self::Image>,
        params: &PlaceholderParams,
    ) -> Result<Vec<u8>, BackendError>;
}
