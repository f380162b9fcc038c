//! # Asset Derivatives
//!
//! A build-time image pipeline. Source images referenced with an `?optimized`
//! marker are turned into a set of optimized derivatives and described by a
//! manifest a bundler can import as a module.
//!
//! # Architecture
//!
//! ```text
//! reference ─▶ pipeline ─▶ fingerprint ─▶ cache ──hit──▶ manifest
//!                                           │
//!                                          miss
//!                                           ▼
//!                     imaging: decode ─▶ encode × formats
//!                                     ─▶ encode × responsive widths
//!                                     ─▶ blurred placeholder
//! ```
//!
//! At the end of a build pass the pipeline's finalize hook writes every
//! derivative into the output directory.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Build-tool hooks: reference parsing, cache lookup, compute, finalize |
//! | [`imaging`] | Pure-Rust image operations: decode, resize by fit mode, encode, placeholder |
//! | [`fingerprint`] | Deterministic SHA-256 keys over (source, canonical options) |
//! | [`cache`] | Process-lifetime content-addressed cache with single-flight and optional LRU bound |
//! | [`manifest`] | The per-asset result and its boundary serialization |
//! | [`naming`] | Derivative filename convention |
//! | [`responsive`] | `srcset`/`sizes` builders, blur SVG, preload hint |
//! | [`loader`] | Lazy-loading state machine for the markup layer |
//! | [`config`] | `asset-derivatives.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Decode Once
//!
//! Decoding dominates for large JPEGs, so an asset is decoded exactly once
//! and the decoded [`imaging::SourceAsset`] is borrowed by every encode. The
//! [`imaging::ImageBackend`] trait makes this shape explicit and lets the
//! pipeline be tested with a recording mock instead of real pixels.
//!
//! ## Content-Addressed, Single-Flight Cache
//!
//! Results are keyed by a digest of the source path and every setting that
//! shapes the manifest, so a config change is a cache miss and nothing else
//! is. Concurrent requests for the same key share one computation rather than
//! racing to encode the same image twice.
//!
//! ## Degrade, Don't Fail
//!
//! A build should not stop because one image is corrupt. Anything that goes
//! wrong after the source file was found is logged and absorbed: a dropped
//! derivative, a fallback placeholder, or at worst a degraded manifest that
//! points at the original file.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, rav1e
//! for AVIF). No system libraries, so the binary is self-contained.

pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod imaging;
pub mod loader;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod responsive;

#[cfg(test)]
pub(crate) mod test_helpers;
