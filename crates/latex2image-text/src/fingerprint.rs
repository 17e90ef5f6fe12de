//! Content fingerprints used as render cache keys.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::NormalizedSource;

/// Longest externally supplied fingerprint accepted (a SHA-512 hex digest).
const MAX_FINGERPRINT_LEN: usize = 128;

/// Lowercase hex digest identifying a normalized snippet.
///
/// Fingerprints produced here are SHA-256 (64 hex characters). Parsed
/// fingerprints accept any hex digest up to 128 characters so that caches
/// keyed by older, shorter digests stay addressable. Either way the value
/// is safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

/// Returned when a string cannot be used as a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    #[error("fingerprint is empty")]
    Empty,

    #[error("fingerprint is {0} characters long, at most 128 allowed")]
    TooLong(usize),

    #[error("fingerprint contains non-hex character {0:?}")]
    NotHex(char),
}

impl Fingerprint {
    /// Length of fingerprints computed by this crate.
    pub const LEN: usize = 64;

    /// Validate and lowercase an externally supplied digest.
    pub fn parse(value: &str) -> Result<Self, FingerprintError> {
        if value.is_empty() {
            return Err(FingerprintError::Empty);
        }
        if value.len() > MAX_FINGERPRINT_LEN {
            return Err(FingerprintError::TooLong(value.len()));
        }
        if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(FingerprintError::NotHex(bad));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this fingerprint with the given extension.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fingerprint a normalized snippet.
pub fn fingerprint(source: &NormalizedSource) -> Fingerprint {
    fingerprint_str(source.as_str())
}

/// Fingerprint arbitrary text by hashing its UTF-8 bytes.
pub fn fingerprint_str(text: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
