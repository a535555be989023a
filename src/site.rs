//! Site-level build steps around the page pipeline.
//!
//! ```text
//! clean      docs/*  (except keep-list)  →  removed
//! process    passthrough copy, then every docs/**/*.html → transform pipeline
//! ```
//!
//! Pages are independent, so they are processed in parallel on the global
//! rayon pool. Images shared between pages are deduplicated by the
//! [`Optimizer`]. A page is written back only when the pipeline changed it,
//! which keeps file timestamps stable for unchanged pages.
//!
//! HTML files below the keep-list and passthrough destinations are copied
//! assets, not rendered pages, and are skipped.

use crate::cache::CacheStats;
use crate::config::{BuildMode, PassthroughEntry, ProjectPaths, SiteConfig};
use crate::imaging::{ImageBackend, Optimizer, OptimizerSettings};
use crate::transform::{PageContext, PageReport, process_page};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Output directory not found: {0}")]
    OutputMissing(PathBuf),
}

/// Options for one `process` run.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub mode: BuildMode,
    /// Reuse previously encoded images from the cache manifest.
    pub use_cache: bool,
}

/// Outcome for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Path relative to the output directory.
    pub path: PathBuf,
    pub report: PageReport,
    /// Whether the file on disk was rewritten.
    pub written: bool,
}

/// One passthrough entry that was copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughCopy {
    pub entry: PassthroughEntry,
    pub files: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub pages: Vec<PageResult>,
    pub passthrough: Vec<PassthroughCopy>,
    pub cache: CacheStats,
}

impl BuildReport {
    /// Counts summed over all pages.
    pub fn totals(&self) -> PageReport {
        let mut total = PageReport::default();
        for page in &self.pages {
            total.absorb(&page.report);
        }
        total
    }

    pub fn written_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.written).count()
    }
}

// ============================================================================
// Clean
// ============================================================================

/// Remove everything in `output` except the top-level entries named in
/// `keep`. Returns the removed paths, sorted. A missing output directory is
/// not an error.
pub fn clean_output(output: &Path, keep: &[String]) -> Result<Vec<PathBuf>, SiteError> {
    if !output.is_dir() {
        debug!(output = %output.display(), "nothing to clean");
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(output)? {
        let entry = entry?;
        let name = entry.file_name();
        if keep.iter().any(|k| name == k.as_str()) {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}

// ============================================================================
// Passthrough
// ============================================================================

/// Copy configured files and directories from the project into the output.
///
/// Missing sources are skipped.
pub fn copy_passthrough(
    root: &Path,
    output: &Path,
    entries: &[PassthroughEntry],
) -> Result<Vec<PassthroughCopy>, SiteError> {
    let mut copied = Vec::new();
    for entry in entries {
        let from = root.join(&entry.from);
        let to = output.join(&entry.to);
        if !from.exists() {
            debug!(from = %entry.from, "passthrough source missing, skipping");
            continue;
        }
        let files = if from.is_dir() {
            copy_dir(&from, &to)?
        } else {
            copy_file(&from, &to)?;
            1
        };
        copied.push(PassthroughCopy {
            entry: entry.clone(),
            files,
        });
    }
    Ok(copied)
}

fn copy_dir(from: &Path, to: &Path) -> Result<usize, SiteError> {
    let mut files = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), SiteError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

// ============================================================================
// Page processing
// ============================================================================

/// All rendered `.html` pages below `output`, sorted, relative to `output`.
///
/// Directories listed in `skip` (relative to `output`) are not descended.
pub fn find_pages(output: &Path, skip: &[PathBuf]) -> Result<Vec<PathBuf>, SiteError> {
    let mut pages = Vec::new();
    let walker = WalkDir::new(output)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let relative = e.path().strip_prefix(output).unwrap_or(e.path());
            !skip.iter().any(|s| relative == s.as_path())
        });
    for entry in walker {
        let entry = entry?;
        let is_html = entry.path().extension().is_some_and(|ext| ext == "html");
        if entry.file_type().is_file() && is_html {
            let relative = entry.path().strip_prefix(output).unwrap_or(entry.path());
            pages.push(relative.to_path_buf());
        }
    }
    Ok(pages)
}

/// Output-relative paths that hold copied files rather than rendered pages.
fn copied_trees(config: &SiteConfig) -> Vec<PathBuf> {
    config
        .clean
        .keep
        .iter()
        .chain(config.passthrough.iter().map(|p| &p.to))
        .map(|p| PathBuf::from(p.trim_matches('/')))
        .collect()
}

fn process_page_file(
    output: &Path,
    relative: &Path,
    ctx: &PageContext<'_>,
) -> Result<PageResult, SiteError> {
    let path = output.join(relative);
    let original = fs::read_to_string(&path)?;
    let (html, report) = process_page(&original, ctx);
    let written = html != original;
    if written {
        fs::write(&path, html)?;
        debug!(page = %relative.display(), "rewrote page");
    }
    Ok(PageResult {
        path: relative.to_path_buf(),
        report,
        written,
    })
}

/// Copy passthrough files, then run the transform pipeline over every page.
///
/// Each finished page is also sent to `progress`, if given, so callers can
/// print results while the build is still running.
pub fn process_site(
    paths: &ProjectPaths,
    config: &SiteConfig,
    backend: &dyn ImageBackend,
    options: BuildOptions,
    progress: Option<Sender<PageResult>>,
) -> Result<BuildReport, SiteError> {
    if !paths.output.is_dir() {
        return Err(SiteError::OutputMissing(paths.output.clone()));
    }

    let passthrough = copy_passthrough(&paths.root, &paths.output, &config.passthrough)?;
    let pages = find_pages(&paths.output, &copied_trees(config))?;
    info!(pages = pages.len(), mode = %options.mode, "processing pages");

    let optimizer = Optimizer::new(
        backend,
        OptimizerSettings::from_config(config, paths),
        options.use_cache,
    );
    let ctx = PageContext::new(config, options.mode, &paths.source).with_optimizer(&optimizer);

    let results = pages
        .par_iter()
        .map(|relative| {
            let result = process_page_file(&paths.output, relative, &ctx)?;
            if let Some(tx) = &progress {
                tx.send(result.clone()).ok();
            }
            Ok(result)
        })
        .collect::<Result<Vec<_>, SiteError>>()?;

    optimizer.save_cache()?;

    Ok(BuildReport {
        pages: results,
        passthrough,
        cache: optimizer.cache_stats(),
    })
}
