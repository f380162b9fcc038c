//! Build-tool integration: reference parsing, caching, derivative generation.
//!
//! A build tool drives the [`Pipeline`] through three hooks:
//!
//! 1. [`config_resolved`](Pipeline::config_resolved): once, before any asset.
//!    Creates the on-disk cache directory for production builds.
//! 2. [`load`](Pipeline::load): once per module reference. References ending
//!    in `?optimized` are processed and answered with a script module
//!    (`export default {...}`); everything else is declined with `Ok(None)`.
//! 3. [`finalize`](Pipeline::finalize): once, after every asset resolved.
//!    Writes every derivative into the output directory and reports a count.
//!
//! ## Per-asset processing
//!
//! ```text
//! reference ──▶ source path ──▶ fingerprint ──▶ cache hit? ──▶ manifest
//!                                                   │ miss
//!                                                   ▼
//!                      decode ▶ formats ▶ responsive set ▶ placeholder
//! ```
//!
//! The source is decoded once per asset. Each configured format gets a
//! full-size derivative; the primary (first) format also gets one derivative
//! per configured width that fits inside the source. A placeholder is added
//! when enabled.
//!
//! ## Failure policy
//!
//! Only a missing source file surfaces as an error. A source that fails to
//! decode produces a *degraded* manifest pointing at the original file, which
//! is cached like any other result so a broken asset is not retried on every
//! reference. Individual encode failures drop that derivative and are logged;
//! a failed placeholder falls back to a static SVG.
//!
//! ## Parallel Processing
//!
//! [`process_all`](Pipeline::process_all) fans references out over the rayon
//! pool. Concurrent requests for the same asset share one computation through
//! the cache's single-flight guard.

use crate::cache::{CacheStats, ContentCache, Lookup};
use crate::config::PipelineConfig;
use crate::fingerprint::{self, Fingerprint};
use crate::imaging::operations::synthesize_placeholder;
use crate::imaging::{
    ImageBackend, OptimizedVariant, OutputFormat, RustBackend, TransformOptions, generate,
    generate_responsive_set,
};
use crate::manifest::{ProcessedImageManifest, ResponsiveCandidate};
use crate::naming::{derivative_filename, derivative_url, source_stem};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Marker that opts a module reference into processing.
pub const REFERENCE_MARKER: &str = "?optimized";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source image not found: {}", .0.display())]
    AssetNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The build-tool command the pipeline runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Development server: nothing is persisted.
    Serve,
    /// Production build.
    Build,
}

/// Extract the source path from a module reference.
///
/// Returns `None` for references without [`REFERENCE_MARKER`]. The path is
/// everything before the first `?`.
///
/// ```
/// # use asset_derivatives::pipeline::parse_reference;
/// assert_eq!(parse_reference("./img/hero.jpg?optimized"), Some("./img/hero.jpg"));
/// assert_eq!(parse_reference("./img/hero.jpg"), None);
/// ```
pub fn parse_reference(reference: &str) -> Option<&str> {
    if !reference.contains(REFERENCE_MARKER) {
        return None;
    }
    reference.split('?').next()
}

/// Settings that shape a manifest. Anything here changes the fingerprint.
#[derive(Serialize)]
struct DerivationKey<'a> {
    quality: u32,
    formats: &'a [OutputFormat],
    sizes: &'a [u32],
    placeholder: bool,
    public_path: &'a str,
}

impl<'a> From<&'a PipelineConfig> for DerivationKey<'a> {
    fn from(config: &'a PipelineConfig) -> Self {
        Self {
            quality: config.quality,
            formats: &config.formats,
            sizes: &config.sizes,
            placeholder: config.placeholder,
            public_path: &config.public_path,
        }
    }
}

/// An encoded derivative and the filename it is written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedVariant {
    pub filename: String,
    pub variant: OptimizedVariant,
}

/// Outcome of one derivative, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    Encoded,
    Failed,
    /// Placeholder synthesis failed and the static fallback was used.
    Fallback,
}

/// One line of per-asset progress: `webp`, `webp 640w`, `placeholder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    pub label: String,
    pub status: VariantStatus,
}

/// How an asset request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Computed,
    Cached,
    /// Joined a concurrent computation of the same asset.
    Shared,
    Degraded,
}

/// Progress events sent during processing.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// A batch of references is about to be processed.
    BatchStarted { count: usize },
    /// An asset request has been answered.
    AssetResolved {
        source_path: String,
        status: AssetStatus,
        /// Per-derivative outcomes; empty unless this request computed.
        variants: Vec<VariantInfo>,
    },
}

/// Everything the pipeline computed for one source.
#[derive(Debug, Clone)]
pub struct AssetEntry {
    pub source_id: String,
    pub fingerprint: Fingerprint,
    pub manifest: ProcessedImageManifest,
    /// Encoded derivatives, written to the output directory at finalize.
    pub variants: Vec<NamedVariant>,
    pub report: Vec<VariantInfo>,
}

impl AssetEntry {
    fn degraded(source_id: &str, fingerprint: Fingerprint) -> Self {
        Self {
            source_id: source_id.to_string(),
            fingerprint,
            manifest: ProcessedImageManifest::degraded(source_id),
            variants: Vec::new(),
            report: Vec::new(),
        }
    }
}

/// Result of the finalize hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub output_dir: PathBuf,
    /// Distinct assets processed during the build pass.
    pub assets: usize,
    /// Assets that fell back to a degraded manifest.
    pub degraded: usize,
    pub files_written: usize,
    pub bytes_written: u64,
}

/// Turns asset references into manifests, caching by fingerprint.
pub struct Pipeline<B: ImageBackend = RustBackend> {
    backend: B,
    config: PipelineConfig,
    cache: ContentCache<AssetEntry>,
    /// Every entry handed out during the build pass. Unlike the cache this
    /// is never evicted, so finalize writes each file a manifest points at.
    resolved: Mutex<BTreeMap<Fingerprint, Arc<AssetEntry>>>,
    events: Option<Sender<ProcessEvent>>,
}

impl Pipeline<RustBackend> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_backend(RustBackend::new(), config)
    }
}

impl<B: ImageBackend> Pipeline<B> {
    /// Pipeline on a specific backend (allows testing with mock).
    pub fn with_backend(backend: B, config: PipelineConfig) -> Self {
        let cache = ContentCache::with_capacity(config.cache_capacity);
        Self {
            backend,
            config,
            cache,
            resolved: Mutex::new(BTreeMap::new()),
            events: None,
        }
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: Sender<ProcessEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached results. Assets already resolved in this build pass are
    /// still written by [`finalize`](Self::finalize).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn record_resolved(&self, entry: &Arc<AssetEntry>) {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entry.fingerprint.clone())
            .or_insert_with(|| Arc::clone(entry));
    }

    fn resolved_entries(&self) -> Vec<Arc<AssetEntry>> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = tx.send(event);
        }
    }

    /// Configuration hook. Creates the cache directory for production builds.
    pub fn config_resolved(&self, mode: BuildMode) -> Result<(), PipelineError> {
        if mode == BuildMode::Build {
            fs::create_dir_all(&self.config.cache_dir)?;
        }
        Ok(())
    }

    /// Load hook: answer a module reference with script source.
    ///
    /// Declines (returns `Ok(None)`) references without the marker.
    pub fn load(&self, reference: &str) -> Result<Option<String>, PipelineError> {
        match self.load_entry(reference)? {
            Some(entry) => Ok(Some(entry.manifest.to_module_source()?)),
            None => Ok(None),
        }
    }

    /// Like [`load`](Self::load) but returns the structured result.
    pub fn load_entry(&self, reference: &str) -> Result<Option<Arc<AssetEntry>>, PipelineError> {
        let Some(path) = parse_reference(reference) else {
            return Ok(None);
        };
        let resolved = std::path::absolute(path)
            .map_err(|_| PipelineError::AssetNotFound(PathBuf::from(path)))?;
        self.process(&resolved).map(Some)
    }

    /// Process one source file, consulting the cache first.
    pub fn process(&self, source: &Path) -> Result<Arc<AssetEntry>, PipelineError> {
        if !source.is_file() {
            return Err(PipelineError::AssetNotFound(source.to_path_buf()));
        }
        let source_id = source.to_string_lossy().to_string();
        let key = fingerprint::derive(&source_id, &DerivationKey::from(&self.config))?;

        let (entry, lookup) = self
            .cache
            .get_or_compute(&key, || self.compute(source, &source_id, &key));

        let status = match lookup {
            _ if entry.manifest.is_degraded() => AssetStatus::Degraded,
            Lookup::Computed => AssetStatus::Computed,
            Lookup::Hit => AssetStatus::Cached,
            Lookup::Joined => AssetStatus::Shared,
        };
        tracing::debug!(source = %source_id, key = %key.short(), ?lookup, "asset resolved");
        self.record_resolved(&entry);

        self.emit(ProcessEvent::AssetResolved {
            source_path: source_id,
            status,
            variants: match lookup {
                Lookup::Computed => entry.report.clone(),
                _ => Vec::new(),
            },
        });
        Ok(entry)
    }

    /// Resolve many references in parallel.
    ///
    /// Results are returned in input order; one reference failing never
    /// affects the others.
    pub fn process_all(
        &self,
        references: &[String],
    ) -> Vec<Result<Option<Arc<AssetEntry>>, PipelineError>> {
        self.emit(ProcessEvent::BatchStarted {
            count: references.len(),
        });
        references
            .par_iter()
            .map(|reference| self.load_entry(reference))
            .collect()
    }

    /// Decode once, then generate every derivative and the placeholder.
    fn compute(&self, path: &Path, source_id: &str, key: &Fingerprint) -> AssetEntry {
        let asset = match self.backend.decode(path) {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!(source = %source_id, error = %e, "decode failed, using degraded manifest");
                return AssetEntry::degraded(source_id, key.clone());
            }
        };

        let stem = source_stem(path);
        let hash = key.short();
        let quality = self.config.quality();
        let primary = self.config.primary_format();

        let mut variants = Vec::new();
        let mut report = Vec::new();
        let mut formats = BTreeMap::new();

        for &format in &self.config.formats {
            match generate(
                &self.backend,
                &asset,
                &TransformOptions::encode(format, quality),
            ) {
                Ok(variant) => {
                    let filename = derivative_filename(&stem, hash, format, None);
                    formats.insert(format, derivative_url(&self.config.public_path, &filename));
                    variants.push(NamedVariant { filename, variant });
                    report.push(VariantInfo {
                        label: format.to_string(),
                        status: VariantStatus::Encoded,
                    });
                }
                Err(e) => {
                    tracing::warn!(source = %source_id, %format, error = %e, "encode failed, skipping format");
                    report.push(VariantInfo {
                        label: format.to_string(),
                        status: VariantStatus::Failed,
                    });
                }
            }
        }

        if formats.is_empty() {
            tracing::warn!(source = %source_id, "no format could be encoded, using degraded manifest");
            return AssetEntry {
                report,
                ..AssetEntry::degraded(source_id, key.clone())
            };
        }

        let set = generate_responsive_set(&self.backend, &asset, &self.config.sizes, primary, quality);
        let mut src_set = Vec::with_capacity(set.variants.len());
        for (width, variant) in set.variants {
            let filename = derivative_filename(&stem, hash, primary, Some(width));
            src_set.push(ResponsiveCandidate {
                url: derivative_url(&self.config.public_path, &filename),
                width,
            });
            variants.push(NamedVariant { filename, variant });
            report.push(VariantInfo {
                label: format!("{} {}w", primary, width),
                status: VariantStatus::Encoded,
            });
        }
        for (width, e) in set.failures {
            tracing::warn!(source = %source_id, format = %primary, width, error = %e, "encode failed, skipping candidate");
            report.push(VariantInfo {
                label: format!("{} {}w", primary, width),
                status: VariantStatus::Failed,
            });
        }

        let placeholder = self.config.placeholder.then(|| {
            let uri = synthesize_placeholder(&self.backend, &asset);
            let status = if uri.starts_with("data:image/jpeg") {
                VariantStatus::Encoded
            } else {
                VariantStatus::Fallback
            };
            report.push(VariantInfo {
                label: "placeholder".to_string(),
                status,
            });
            uri
        });

        let src = formats
            .get(&primary)
            .cloned()
            .or_else(|| {
                self.config
                    .formats
                    .iter()
                    .find_map(|f| formats.get(f).cloned())
            })
            .unwrap_or_else(|| source_id.to_string());

        AssetEntry {
            source_id: source_id.to_string(),
            fingerprint: key.clone(),
            manifest: ProcessedImageManifest {
                src,
                src_set,
                formats,
                placeholder,
                width: asset.dimensions.width,
                height: asset.dimensions.height,
            },
            variants,
            report,
        }
    }

    /// Finalize hook: write the derivatives of every asset resolved during
    /// the build pass into the output directory, whether or not it is still
    /// cached.
    ///
    /// Idempotent: running it again rewrites the same files with the same
    /// bytes.
    pub fn finalize(&self) -> Result<BuildSummary, PipelineError> {
        let output_dir = PathBuf::from(&self.config.output_dir);
        fs::create_dir_all(&output_dir)?;

        let entries = self.resolved_entries();
        let written: Vec<(usize, u64)> = entries
            .par_iter()
            .map(|entry| -> Result<(usize, u64), PipelineError> {
                let mut bytes = 0u64;
                for named in &entry.variants {
                    fs::write(output_dir.join(&named.filename), &named.variant.bytes)?;
                    bytes += named.variant.byte_len() as u64;
                }
                Ok((entry.variants.len(), bytes))
            })
            .collect::<Result<_, _>>()?;

        let summary = BuildSummary {
            assets: entries.len(),
            degraded: entries.iter().filter(|e| e.manifest.is_degraded()).count(),
            files_written: written.iter().map(|(files, _)| files).sum(),
            bytes_written: written.iter().map(|(_, bytes)| bytes).sum(),
            output_dir,
        };
        tracing::info!(
            assets = summary.assets,
            files = summary.files_written,
            "Generated {} optimized images",
            summary.assets
        );
        Ok(summary)
    }
}
