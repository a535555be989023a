//! Parameter types for image operations.
//!
//! These structs describe *what* to encode, not *how*. They sit between the
//! [`optimizer`](super::optimizer) (which decides which files to produce) and
//! the [`backend`](super::backend) (which does the pixel work), so tests can
//! swap in a mock backend without touching planning logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Encoded output format for an image variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless WebP.
    Webp,
    Jpeg,
    Avif,
}

impl OutputFormat {
    /// File extension written to disk.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Avif => "avif",
        }
    }

    /// MIME type used in `<source type>` and preload hints.
    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Avif => "image/avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parameters for encoding one source image into one format at its
/// original resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub quality: Quality,
}
