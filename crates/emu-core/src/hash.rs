//! Content hashes and report rounding.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::EmuError;
use crate::serde::to_canonical_json_bytes;

/// Hex SHA-256 of the canonical JSON form of `value`.
///
/// Key order is normalised first, so two configurations that differ only in
/// field order hash the same.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, EmuError> {
    let digest = Sha256::digest(to_canonical_json_bytes(value)?);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Rounds to nine decimals, the precision of summary fields in reports.
pub fn round_f64(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}
