//! The externally visible result for one processed source.
//!
//! [`ProcessedImageManifest`] is the structured form used inside the crate
//! and cached by the pipeline. At the boundary to a build tool it is
//! flattened into [`ManifestModule`], whose camelCase JSON shape is what a
//! bundler receives:
//!
//! ```json
//! {
//!   "src": "/images/hero-1a2b3c4d.webp",
//!   "srcSet": "/images/hero-1a2b3c4d-640w.webp 640w, /images/hero-1a2b3c4d-750w.webp 750w",
//!   "placeholder": "data:image/jpeg;base64,...",
//!   "width": 1000,
//!   "height": 750,
//!   "formats": { "webp": "/images/hero-1a2b3c4d.webp", "avif": "..." },
//!   "blurDataURL": "data:image/jpeg;base64,..."
//! }
//! ```

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `srcSet` entry: a derivative URL and its pixel width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveCandidate {
    pub url: String,
    pub width: u32,
}

impl ResponsiveCandidate {
    /// `"<url> <width>w"`
    pub fn descriptor(&self) -> String {
        format!("{} {}w", self.url, self.width)
    }
}

/// All derivatives, placeholder and metadata for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedImageManifest {
    /// Primary derivative reference. For a degraded manifest, the source path.
    pub src: String,
    /// Responsive candidates in ascending width order.
    pub src_set: Vec<ResponsiveCandidate>,
    /// Full-size derivative per successfully encoded format.
    pub formats: BTreeMap<OutputFormat, String>,
    pub placeholder: Option<String>,
    /// Source width in pixels, 0 for a degraded manifest.
    pub width: u32,
    /// Source height in pixels, 0 for a degraded manifest.
    pub height: u32,
}

impl ProcessedImageManifest {
    /// Manifest for a source that could not be processed: references the
    /// original file, no derivatives, no placeholder.
    pub fn degraded(source_path: &str) -> Self {
        Self {
            src: source_path.to_string(),
            src_set: Vec::new(),
            formats: BTreeMap::new(),
            placeholder: None,
            width: 0,
            height: 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.formats.is_empty()
    }

    /// `srcSet` attribute value: comma-joined `"<url> <width>w"` entries.
    pub fn src_set_attr(&self) -> String {
        self.src_set
            .iter()
            .map(ResponsiveCandidate::descriptor)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Flatten into the boundary shape.
    pub fn to_module(&self) -> ManifestModule {
        ManifestModule {
            src: self.src.clone(),
            src_set: self.src_set_attr(),
            placeholder: self.placeholder.clone(),
            width: self.width,
            height: self.height,
            formats: self
                .formats
                .iter()
                .map(|(format, url)| (format.to_string(), url.clone()))
                .collect(),
            blur_data_url: self.placeholder.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_module())
    }

    /// Script-loadable module source: `export default {...}`.
    pub fn to_module_source(&self) -> Result<String, serde_json::Error> {
        Ok(format!("export default {}", self.to_json()?))
    }
}

/// Boundary serialization of a manifest.
///
/// `placeholder` and `blurDataURL` carry the same value and are omitted
/// together when no placeholder exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestModule {
    pub src: String,
    pub src_set: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub width: u32,
    pub height: u32,
    pub formats: BTreeMap<String, String>,
    #[serde(
        rename = "blurDataURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub blur_data_url: Option<String>,
}
