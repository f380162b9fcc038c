//! Deterministic cache keys.
//!
//! A [`Fingerprint`] identifies one (source, options) pair. It is the SHA-256
//! of the source identifier and a canonical JSON rendering of the options:
//!
//! ```text
//! sha256( source_id ‖ 0x00 ‖ canonical_json(options) )
//! ```
//!
//! Canonical JSON sorts object keys at every level and omits insignificant
//! whitespace, so two logically equal option values hash identically no
//! matter how they were built. The digest does not depend on process state,
//! so keys are stable across restarts.
//!
//! The full 64-character digest keys the in-memory cache. Only the 8-character
//! [`short`](Fingerprint::short) prefix appears in derivative filenames, where
//! a collision costs a cache-busting rename rather than a wrong manifest.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the display/filename form of a fingerprint.
pub const SHORT_LEN: usize = 8;

/// Full SHA-256 digest of a (source, options) pair, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Full 64-character hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First [`SHORT_LEN`] hex characters, for human-visible filenames.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint for `source_id` under `options`.
///
/// `options` may be any serializable value: transform options, a pipeline
/// config, or a raw [`serde_json::Value`].
pub fn derive<T: Serialize + ?Sized>(
    source_id: &str,
    options: &T,
) -> Result<Fingerprint, serde_json::Error> {
    let value = serde_json::to_value(options)?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical.as_bytes());
    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

/// Render `value` as JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}
