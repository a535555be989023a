//! Encoded image cache for incremental builds.
//!
//! Encoding every referenced image in every configured format is the slowest
//! part of a build. The optimizer consults this cache before each encode and
//! skips it when the same source bytes were already encoded with the same
//! parameters.
//!
//! The manifest maps a **variant key** to the output file holding that
//! encode:
//!
//! - `source`: SHA-256 of the source file contents. Content-based so it
//!   survives `git checkout` and editor saves that do not change pixels.
//! - `params`: SHA-256 of (format, quality).
//!
//! Looking up by content rather than by output path means a renamed or moved
//! image costs a copy, not a re-encode. Each output path belongs to at most
//! one variant key: recording a new encode into a path drops every older key
//! still pointing there, so an edited image can never be served for its
//! previous contents.
//!
//! The manifest lives next to the encoded files
//! (`<images output>/.cache-manifest.json`), inside the `assets` tree the
//! pre-build clean keeps.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Bump to invalidate every existing manifest.
const MANIFEST_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    /// `"{source}:{params}"` → output path relative to the images output
    /// folder, `/`-separated.
    pub variants: BTreeMap<String, String>,
}

fn variant_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            variants: BTreeMap::new(),
        }
    }

    /// Read the manifest from `output_dir`. Anything unreadable (missing
    /// file, bad JSON, other version) yields an empty manifest.
    pub fn load(output_dir: &Path) -> Self {
        std::fs::read_to_string(manifest_path(output_dir))
            .ok()
            .and_then(|json| serde_json::from_str::<Self>(&json).ok())
            .filter(|manifest| manifest.version == MANIFEST_VERSION)
            .unwrap_or_else(Self::empty)
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(output_dir), json)
    }

    /// Output path of an earlier encode of the same source bytes with the
    /// same parameters, if that file is still on disk. It may differ from
    /// the path the caller is about to write.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<String> {
        self.variants
            .get(&variant_key(source_hash, params_hash))
            .filter(|stored| output_dir.join(stored.as_str()).is_file())
            .cloned()
    }

    /// Record that `output` now holds the given encode.
    pub fn insert(&mut self, source_hash: &str, params_hash: &str, output: String) {
        self.variants.retain(|_, stored| *stored != output);
        self.variants
            .insert(variant_key(source_hash, params_hash), output);
    }
}

/// SHA-256 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// SHA-256 of the parameters of one encoded variant.
pub fn hash_encode_params(format: OutputFormat, quality: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format.extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(quality.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

/// Per-build counts of how each variant was produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Output already on disk with the right contents.
    pub hits: u32,
    /// Copied from another output with the same contents.
    pub copies: u32,
    /// Encoded.
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hits, self.copies) {
            (0, 0) => write!(f, "{} encoded", self.misses),
            (hits, 0) => write!(
                f,
                "{hits} cached, {} encoded ({} total)",
                self.misses,
                self.total()
            ),
            (hits, copies) => write!(
                f,
                "{hits} cached, {copies} copied, {} encoded ({} total)",
                self.misses,
                self.total()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "data").unwrap();
    }

    #[test]
    fn finds_variant_whose_output_exists() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "2024/rack.webp");
        let mut m = CacheManifest::empty();
        m.insert("src", "webp80", "2024/rack.webp".into());

        assert_eq!(
            m.find_cached("src", "webp80", tmp.path()),
            Some("2024/rack.webp".to_string())
        );
        assert_eq!(m.find_cached("src", "jpeg80", tmp.path()), None);
        assert_eq!(m.find_cached("other", "webp80", tmp.path()), None);
    }

    #[test]
    fn deleted_output_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("src", "webp80", "gone.webp".into());

        assert_eq!(m.find_cached("src", "webp80", tmp.path()), None);
    }

    #[test]
    fn moved_content_points_at_new_output() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "new/rack.webp");
        let mut m = CacheManifest::empty();
        m.insert("src", "webp80", "old/rack.webp".into());
        m.insert("src", "webp80", "new/rack.webp".into());

        assert_eq!(m.variants.len(), 1);
        assert_eq!(
            m.find_cached("src", "webp80", tmp.path()),
            Some("new/rack.webp".to_string())
        );
    }

    #[test]
    fn reencoding_a_path_forgets_its_previous_contents() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "rack.webp");
        let mut m = CacheManifest::empty();
        m.insert("before-edit", "webp80", "rack.webp".into());
        m.insert("after-edit", "webp80", "rack.webp".into());

        assert_eq!(m.find_cached("before-edit", "webp80", tmp.path()), None);
        assert_eq!(
            m.find_cached("after-edit", "webp80", tmp.path()),
            Some("rack.webp".to_string())
        );
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("s1", "p1", "a.webp".into());
        m.insert("s2", "p2", "b/c.jpeg".into());
        m.save(tmp.path()).unwrap();

        assert_eq!(CacheManifest::load(tmp.path()), m);
    }

    #[test]
    fn unreadable_manifest_loads_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(CacheManifest::load(tmp.path()), CacheManifest::empty());

        fs::write(manifest_path(tmp.path()), "not json").unwrap();
        assert_eq!(CacheManifest::load(tmp.path()), CacheManifest::empty());

        let stale = format!(
            r#"{{"version": {}, "variants": {{"s:p": "a.webp"}}}}"#,
            MANIFEST_VERSION - 1
        );
        fs::write(manifest_path(tmp.path()), stale).unwrap();
        assert_eq!(CacheManifest::load(tmp.path()), CacheManifest::empty());
    }

    #[test]
    fn file_hash_follows_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rack.jpg");

        fs::write(&path, b"v1").unwrap();
        let first = hash_file(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(hash_file(&path).unwrap(), first);

        fs::write(&path, b"v2").unwrap();
        assert_ne!(hash_file(&path).unwrap(), first);
    }

    #[test]
    fn params_hash_covers_format_and_quality() {
        let webp = hash_encode_params(OutputFormat::Webp, 80);
        assert_eq!(webp, hash_encode_params(OutputFormat::Webp, 80));
        assert_ne!(webp, hash_encode_params(OutputFormat::Jpeg, 80));
        assert_ne!(
            hash_encode_params(OutputFormat::Jpeg, 75),
            hash_encode_params(OutputFormat::Jpeg, 90)
        );
    }

    #[test]
    fn stats_display() {
        let encoded = CacheStats {
            misses: 3,
            ..Default::default()
        };
        assert_eq!(encoded.to_string(), "3 encoded");

        let cached = CacheStats {
            hits: 5,
            copies: 0,
            misses: 2,
        };
        assert_eq!(cached.to_string(), "5 cached, 2 encoded (7 total)");

        let copied = CacheStats {
            hits: 3,
            copies: 2,
            misses: 1,
        };
        assert_eq!(copied.to_string(), "3 cached, 2 copied, 1 encoded (6 total)");
    }
}
