//! Per-build image optimizer.
//!
//! One [`Optimizer`] is shared by every page of a build. For each local
//! source image it produces one encoded file per configured format at the
//! original resolution, under the images output folder, preserving the
//! image's sub-path below the source images folder.
//!
//! Results are memoized per source path: a picture referenced from ten pages
//! is identified and encoded once, and concurrent pages asking for the same
//! image wait on the first one instead of racing. Failures are memoized too,
//! so a broken image is reported once per page but decoded only once.
//!
//! Output names drop the source extension (`rack.jpg` → `rack.webp`) unless
//! another file in the same source folder shares the stem, in which case the
//! source extension stays in the name (`rack.jpg.webp`, `rack.png.webp`).
//! Every output base is claimed by exactly one source per build; a second
//! source mapping to a claimed base fails instead of overwriting it.
//!
//! Encodes go through the content-addressed [`CacheManifest`], so unchanged
//! images are not re-encoded across builds.

use super::backend::{BackendError, ImageBackend};
use super::operations::{ImageDescriptor, ImageVariant};
use super::params::{EncodeParams, OutputFormat, Quality};
use crate::cache::{self, CacheManifest, CacheStats};
use crate::config::{ProjectPaths, SiteConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Where images come from and where their variants go.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    /// Source images folder, e.g. `src/assets/images`.
    pub source_root: PathBuf,
    /// Output images folder, e.g. `docs/assets/images`.
    pub output_root: PathBuf,
    /// Public URL of `output_root`, e.g. `/assets/images`.
    pub url_prefix: String,
    pub formats: Vec<OutputFormat>,
    pub quality: Quality,
}

impl OptimizerSettings {
    pub fn from_config(config: &SiteConfig, paths: &ProjectPaths) -> Self {
        let assets = config.paths.assets_url.trim_matches('/');
        let images = config.paths.images_dir.trim_matches('/');
        Self {
            source_root: paths.source.join(assets).join(images),
            output_root: paths.output.join(assets).join(images),
            url_prefix: config.paths.images_url(),
            formats: config.images.formats.clone(),
            quality: Quality::new(config.images.quality),
        }
    }
}

type Slot = Arc<Mutex<Option<Result<ImageDescriptor, String>>>>;

pub struct Optimizer<'a> {
    backend: &'a dyn ImageBackend,
    settings: OptimizerSettings,
    memo: Mutex<HashMap<PathBuf, Slot>>,
    /// Output base (relative, without format extension) → source owning it.
    claims: Mutex<HashMap<PathBuf, PathBuf>>,
    cache: Mutex<CacheManifest>,
    stats: Mutex<CacheStats>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<'a> Optimizer<'a> {
    /// Create an optimizer. With `use_cache` false the previous manifest is
    /// ignored and every variant is re-encoded.
    pub fn new(
        backend: &'a dyn ImageBackend,
        settings: OptimizerSettings,
        use_cache: bool,
    ) -> Self {
        let manifest = if use_cache {
            CacheManifest::load(&settings.output_root)
        } else {
            CacheManifest::empty()
        };
        Self {
            backend,
            settings,
            memo: Mutex::new(HashMap::new()),
            claims: Mutex::new(HashMap::new()),
            cache: Mutex::new(manifest),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Produce (or reuse) all format variants of `source`.
    pub fn optimize(&self, source: &Path) -> Result<ImageDescriptor, BackendError> {
        let slot = lock(&self.memo)
            .entry(source.to_path_buf())
            .or_default()
            .clone();

        let mut entry = lock(&slot);
        match entry.get_or_insert_with(|| self.encode_all(source).map_err(|e| e.to_string())) {
            Ok(descriptor) => Ok(descriptor.clone()),
            Err(message) => Err(BackendError::ProcessingFailed(message.clone())),
        }
    }

    fn encode_all(&self, source: &Path) -> Result<ImageDescriptor, BackendError> {
        let dims = self.backend.identify(source)?;
        let source_hash = cache::hash_file(source)?;
        let base = self.output_base(source);
        self.claim(&base, source)?;

        let mut variants = Vec::with_capacity(self.settings.formats.len());
        for &format in &self.settings.formats {
            let relative_output = with_format_extension(&base, format);
            let output = self.settings.output_root.join(&relative_output);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.encode_variant(source, &source_hash, &relative_output, &output, format)?;
            variants.push(ImageVariant {
                format,
                width: dims.width,
                height: dims.height,
                url: self.url_for(&relative_output),
                path: output,
            });
        }

        Ok(ImageDescriptor {
            width: dims.width,
            height: dims.height,
            variants,
        })
    }

    fn encode_variant(
        &self,
        source: &Path,
        source_hash: &str,
        relative_output: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> Result<(), BackendError> {
        let key = slash_path(relative_output);
        let params_hash = cache::hash_encode_params(format, self.settings.quality.value());
        let cached = lock(&self.cache).find_cached(source_hash, &params_hash, &self.settings.output_root);

        match cached {
            Some(stored) if stored == key => {
                debug!(output = %key, "cache hit");
                lock(&self.stats).hit();
                return Ok(());
            }
            Some(stored) => {
                debug!(from = %stored, to = %key, "cache copy");
                std::fs::copy(self.settings.output_root.join(&stored), output)?;
                lock(&self.stats).copy();
            }
            None => {
                debug!(source = %source.display(), %format, "encoding");
                self.backend.encode(&EncodeParams {
                    source: source.to_path_buf(),
                    output: output.to_path_buf(),
                    format,
                    quality: self.settings.quality,
                })?;
                lock(&self.stats).miss();
            }
        }

        lock(&self.cache).insert(source_hash, &params_hash, key);
        Ok(())
    }

    /// Relative output path of `source` without the format extension.
    ///
    /// Based on the sub-path below the source images folder, or just the
    /// file name for images stored elsewhere.
    fn output_base(&self, source: &Path) -> PathBuf {
        let relative = match source.strip_prefix(&self.settings.source_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => source
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| source.to_path_buf()),
        };
        if has_stem_sibling(source) {
            relative
        } else {
            relative.with_extension("")
        }
    }

    fn claim(&self, base: &Path, source: &Path) -> Result<(), BackendError> {
        let mut claims = lock(&self.claims);
        match claims.get(base) {
            Some(owner) if owner != source => Err(BackendError::ProcessingFailed(format!(
                "output name {} is already used by {}",
                slash_path(base),
                owner.display()
            ))),
            Some(_) => Ok(()),
            None => {
                claims.insert(base.to_path_buf(), source.to_path_buf());
                Ok(())
            }
        }
    }

    fn url_for(&self, relative_output: &Path) -> String {
        format!(
            "{}/{}",
            self.settings.url_prefix.trim_end_matches('/'),
            slash_path(relative_output)
        )
    }

    pub fn cache_stats(&self) -> CacheStats {
        *lock(&self.stats)
    }

    /// Persist the cache manifest. A build that touched no images leaves the
    /// output untouched.
    pub fn save_cache(&self) -> std::io::Result<()> {
        if self.cache_stats().total() == 0 {
            return Ok(());
        }
        std::fs::create_dir_all(&self.settings.output_root)?;
        lock(&self.cache).save(&self.settings.output_root)?;
        debug!(
            path = %cache::manifest_path(&self.settings.output_root).display(),
            "saved cache manifest"
        );
        Ok(())
    }
}

/// Whether another file next to `source` has the same stem, e.g. `rack.png`
/// beside `rack.jpg`.
fn has_stem_sibling(source: &Path) -> bool {
    let (Some(dir), Some(name), Some(stem)) =
        (source.parent(), source.file_name(), source.file_stem())
    else {
        return false;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let path = entry.path();
        entry.file_name() != name && path.file_stem() == Some(stem) && path.is_file()
    })
}

/// `base` plus the format extension, keeping any dots already in the name.
fn with_format_extension(base: &Path, format: OutputFormat) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use std::fs;
    use tempfile::TempDir;

    fn settings(tmp: &Path) -> OptimizerSettings {
        OptimizerSettings {
            source_root: tmp.join("src/assets/images"),
            output_root: tmp.join("docs/assets/images"),
            url_prefix: "/assets/images".to_string(),
            formats: vec![OutputFormat::Webp, OutputFormat::Jpeg],
            quality: Quality::new(80),
        }
    }

    fn source_image(tmp: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = tmp.join("src/assets/images").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn settings_from_default_config() {
        let config = SiteConfig::default();
        let paths = config.resolve_paths(Path::new("/blog"));
        let s = OptimizerSettings::from_config(&config, &paths);
        assert_eq!(s.source_root, PathBuf::from("/blog/src/assets/images"));
        assert_eq!(s.output_root, PathBuf::from("/blog/docs/assets/images"));
        assert_eq!(s.url_prefix, "/assets/images");
        assert_eq!(s.quality, Quality::new(80));
    }

    #[test]
    fn encodes_every_format_at_original_size() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "diagram.png", b"png");
        let backend = MockBackend::with_dimensions(1200, 800);
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);

        let desc = optimizer.optimize(&src).unwrap();

        assert_eq!((desc.width, desc.height), (1200, 800));
        let urls: Vec<_> = desc.variants.iter().map(|v| v.url.as_str()).collect();
        assert_eq!(
            urls,
            ["/assets/images/diagram.webp", "/assets/images/diagram.jpeg"]
        );
        assert!(tmp.path().join("docs/assets/images/diagram.webp").exists());
        assert_eq!(backend.encode_count(), 2);
    }

    #[test]
    fn preserves_subdirectories() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "2024/setup/rack.jpg", b"jpg");
        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);

        let desc = optimizer.optimize(&src).unwrap();

        assert_eq!(desc.variants[0].url, "/assets/images/2024/setup/rack.webp");
        assert_eq!(
            desc.variants[1].path,
            tmp.path().join("docs/assets/images/2024/setup/rack.jpeg")
        );
    }

    #[test]
    fn same_source_is_encoded_once_per_build() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "logo.png", b"png");
        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);

        let first = optimizer.optimize(&src).unwrap();
        let second = optimizer.optimize(&src).unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.encode_count(), 2);
        let identifies = backend
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Identify(_)))
            .count();
        assert_eq!(identifies, 1);
    }

    #[test]
    fn failure_is_reported_and_memoized() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "broken.png", b"png");
        let backend = MockBackend::new().failing_on("broken.png");
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);

        assert!(optimizer.optimize(&src).is_err());
        assert!(optimizer.optimize(&src).is_err());
        let identifies = backend
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Identify(_)))
            .count();
        assert_eq!(identifies, 1);
    }

    #[test]
    fn second_build_hits_cache() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "photo.jpg", b"jpg");

        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);
        optimizer.optimize(&src).unwrap();
        optimizer.save_cache().unwrap();

        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);
        optimizer.optimize(&src).unwrap();

        assert_eq!(backend.encode_count(), 0);
        assert_eq!(optimizer.cache_stats().hits, 2);
    }

    #[test]
    fn renamed_source_is_copied_not_encoded() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "before.jpg", b"same bytes");

        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);
        optimizer.optimize(&src).unwrap();
        optimizer.save_cache().unwrap();

        let renamed = source_image(tmp.path(), "after.jpg", b"same bytes");
        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);
        optimizer.optimize(&renamed).unwrap();

        assert_eq!(backend.encode_count(), 0);
        assert_eq!(optimizer.cache_stats().copies, 2);
        assert!(tmp.path().join("docs/assets/images/after.webp").exists());
    }

    #[test]
    fn no_cache_reencodes() {
        let tmp = TempDir::new().unwrap();
        let src = source_image(tmp.path(), "photo.jpg", b"jpg");

        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);
        optimizer.optimize(&src).unwrap();
        optimizer.save_cache().unwrap();

        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), false);
        optimizer.optimize(&src).unwrap();

        assert_eq!(backend.encode_count(), 2);
    }

    #[test]
    fn same_stem_sources_get_distinct_outputs_across_builds() {
        use crate::imaging::RustBackend;
        use crate::test_helpers::{write_test_jpeg, write_test_png};

        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("src/assets/images");
        write_test_png(&images.join("photo.png"), 10, 10);
        write_test_jpeg(&images.join("photo.jpg"), 30, 20);
        let backend = RustBackend::new();

        for build in 0..2 {
            let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);
            let png = optimizer.optimize(&images.join("photo.png")).unwrap();
            let jpg = optimizer.optimize(&images.join("photo.jpg")).unwrap();

            let png_urls: Vec<_> = png.variants.iter().map(|v| v.url.as_str()).collect();
            let jpg_urls: Vec<_> = jpg.variants.iter().map(|v| v.url.as_str()).collect();
            assert_eq!(
                png_urls,
                ["/assets/images/photo.png.webp", "/assets/images/photo.png.jpeg"]
            );
            assert_eq!(
                jpg_urls,
                ["/assets/images/photo.jpg.webp", "/assets/images/photo.jpg.jpeg"]
            );
            for variant in png.variants.iter().chain(&jpg.variants) {
                let desc = if variant.url.contains(".png.") { &png } else { &jpg };
                assert_eq!(
                    image::image_dimensions(&variant.path).unwrap(),
                    (desc.width, desc.height),
                    "build {build}: {}",
                    variant.url
                );
            }
            if build == 1 {
                assert_eq!(optimizer.cache_stats().hits, 4);
            }
            optimizer.save_cache().unwrap();
        }
    }

    #[test]
    fn second_source_for_a_claimed_output_fails() {
        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("elsewhere");
        for dir in ["a", "b"] {
            fs::create_dir_all(outside.join(dir)).unwrap();
            fs::write(outside.join(dir).join("logo.png"), dir).unwrap();
        }
        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);

        let first = optimizer.optimize(&outside.join("a/logo.png")).unwrap();
        let second = optimizer.optimize(&outside.join("b/logo.png"));

        assert_eq!(first.variants[0].url, "/assets/images/logo.webp");
        assert!(second.unwrap_err().to_string().contains("already used"));
        assert_eq!(backend.encode_count(), 2);
    }

    #[test]
    fn save_without_images_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let optimizer = Optimizer::new(&backend, settings(tmp.path()), true);

        optimizer.save_cache().unwrap();

        assert!(!tmp.path().join("docs/assets/images").exists());
    }
}
