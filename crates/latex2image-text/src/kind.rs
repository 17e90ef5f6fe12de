//! Picture kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The category of a LaTeX snippet.
///
/// The kind selects the document template, the normalization passes that
/// apply, and the cache subdirectory (`<cache_root>/<kind>/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureKind {
    Equation,
    Pspicture,
    Tikzpicture,
}

impl PictureKind {
    /// All kinds, in template order.
    pub const ALL: [PictureKind; 3] = [
        PictureKind::Equation,
        PictureKind::Pspicture,
        PictureKind::Tikzpicture,
    ];

    /// Lowercase name, also used as the cache directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PictureKind::Equation => "equation",
            PictureKind::Pspicture => "pspicture",
            PictureKind::Tikzpicture => "tikzpicture",
        }
    }
}

impl fmt::Display for PictureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a kind name is not one of the supported kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown picture kind: {0}")]
pub struct UnknownKindError(pub String);

impl FromStr for PictureKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PictureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKindError(s.to_string()))
    }
}
