//! Site configuration module.
//!
//! Handles loading, validating, and merging `noisepress.toml`. The file lives
//! at the project root and is layered over stock defaults, so a user file only
//! needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! repository = "https://github.com/richard-weiss/richard-weiss.github.io"
//! branch = "main"
//!
//! [paths]
//! source_dir = "src"        # Templating input; images are read from here
//! output_dir = "docs"       # Rendered site; pages are rewritten in place
//! posts_dir = "src/posts"   # Markdown post sources (for llms.txt export)
//! posts_url = "posts"       # Output subdirectory holding one dir per post
//! assets_url = "/assets"    # URL prefix of the asset tree
//! images_dir = "images"     # Image folder below the asset tree
//! repo_assets_path = "src/assets"  # Asset tree path inside the repository
//!
//! [images]
//! formats = ["webp", "jpeg"] # Encoded variants; the last one is the <img> fallback
//! quality = 80               # JPEG/AVIF quality (0-100)
//!
//! [assets]
//! categories = ["code/", "css/", "fonts/", "js/"]  # Non-image asset folders
//!
//! [details]
//! collapse_control = true   # Append a "Collapse" control to <details> bodies
//!
//! [export]
//! filename = "llms.txt"     # Plain-text sidecar written next to each post
//! rewrite_links = true      # Turn relative markdown links into absolute URLs
//!
//! [clean]
//! keep = ["assets"]         # Output entries that survive the pre-build clean
//!
//! [[passthrough]]
//! from = "src/assets/fonts"
//! to = "assets/fonts"
//!
//! [processing]
//! max_processes = 4         # Max parallel pages (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Name of the config file looked up in the project root.
pub const CONFIG_FILENAME: &str = "noisepress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Whether generated links point at the local dev server or at the hosted
/// source repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Local,
    Published,
}

impl BuildMode {
    pub fn is_published(self) -> bool {
        self == BuildMode::Published
    }
}

impl FromStr for BuildMode {
    type Err = String;

    /// Accepts the CLI names plus the environment spellings used by CI
    /// (`NOISEPRESS_ENV=production`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "development" | "dev" => Ok(BuildMode::Local),
            "published" | "production" | "prod" => Ok(BuildMode::Published),
            other => Err(format!(
                "unknown build mode '{other}' (expected local or published)"
            )),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Local => write!(f, "local"),
            BuildMode::Published => write!(f, "published"),
        }
    }
}

/// Site configuration loaded from `noisepress.toml`.
///
/// All fields have defaults matching the blog this tool was built for.
/// Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site metadata used for absolute URLs.
    pub site: SiteMeta,
    /// Where sources and output live, and how asset URLs are laid out.
    pub paths: PathsConfig,
    /// Responsive image encoding.
    pub images: ImagesConfig,
    /// Asset link classification.
    pub assets: AssetsConfig,
    /// `<details>` post-processing.
    pub details: DetailsConfig,
    /// Post-build plain-text export.
    pub export: ExportConfig,
    /// Pre-build clean of the output directory.
    pub clean: CleanConfig,
    /// Files and directories copied verbatim into the output.
    pub passthrough: Vec<PassthroughEntry>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site: SiteMeta::default(),
            paths: PathsConfig::default(),
            images: ImagesConfig::default(),
            assets: AssetsConfig::default(),
            details: DetailsConfig::default(),
            export: ExportConfig::default(),
            clean: CleanConfig::default(),
            passthrough: default_passthrough(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 0-100".into(),
            ));
        }
        if self.images.formats.is_empty() {
            return Err(ConfigError::Validation(
                "images.formats must not be empty".into(),
            ));
        }
        for (i, format) in self.images.formats.iter().enumerate() {
            if self.images.formats[..i].contains(format) {
                return Err(ConfigError::Validation(format!(
                    "images.formats lists '{format}' more than once"
                )));
            }
        }
        if self.paths.images_dir.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "paths.images_dir must not be empty".into(),
            ));
        }
        if self.assets.categories.iter().any(|c| c.trim_matches('/').is_empty()) {
            return Err(ConfigError::Validation(
                "assets.categories entries must not be empty".into(),
            ));
        }
        if self.export.filename.is_empty() || self.export.filename.contains('/') {
            return Err(ConfigError::Validation(
                "export.filename must be a plain file name".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the configured directories against the project root.
    pub fn resolve_paths(&self, root: &Path) -> ProjectPaths {
        ProjectPaths {
            root: root.to_path_buf(),
            source: root.join(&self.paths.source_dir),
            output: root.join(&self.paths.output_dir),
            posts: root.join(&self.paths.posts_dir),
        }
    }
}

/// Absolute (root-joined) locations derived from [`PathsConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub source: PathBuf,
    pub output: PathBuf,
    pub posts: PathBuf,
}

/// Where published asset links point.
///
/// Local-mode URLs are root-relative, so the site's own base URL is not
/// needed here. Title, author and the like belong to the templating step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteMeta {
    /// Browsable source repository, e.g. `https://github.com/user/repo`.
    pub repository: String,
    /// Branch used in repository URLs.
    pub branch: String,
    /// Raw-content host for the repository. Derived from `repository` when
    /// absent (`github.com` → `raw.githubusercontent.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_base: Option<String>,
}

impl Default for SiteMeta {
    fn default() -> Self {
        Self {
            repository: "https://github.com/richard-weiss/richard-weiss.github.io".to_string(),
            branch: "main".to_string(),
            raw_base: None,
        }
    }
}

impl SiteMeta {
    /// Raw-content base URL for the repository.
    pub fn raw_base(&self) -> String {
        match &self.raw_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => self
                .repository
                .trim_end_matches('/')
                .replacen("github.com", "raw.githubusercontent.com", 1),
        }
    }
}

/// Directory and URL layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source_dir: String,
    pub output_dir: String,
    pub posts_dir: String,
    pub posts_url: String,
    pub assets_url: String,
    pub images_dir: String,
    pub repo_assets_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: "src".to_string(),
            output_dir: "docs".to_string(),
            posts_dir: "src/posts".to_string(),
            posts_url: "posts".to_string(),
            assets_url: "/assets".to_string(),
            images_dir: "images".to_string(),
            repo_assets_path: "src/assets".to_string(),
        }
    }
}

impl PathsConfig {
    /// URL prefix under which optimized images are published, e.g. `/assets/images`.
    pub fn images_url(&self) -> String {
        format!(
            "{}/{}",
            self.assets_url.trim_end_matches('/'),
            self.images_dir.trim_matches('/')
        )
    }
}

/// Responsive image encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Formats to encode, in `<source>` order. The last one becomes the
    /// `<img>` fallback.
    pub formats: Vec<OutputFormat>,
    /// Lossy encoding quality (0 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Webp, OutputFormat::Jpeg],
            quality: 80,
        }
    }
}

/// Asset link classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Top-level asset folders that are *not* images. Relative links starting
    /// with one of these keep their path; everything else is an image.
    pub categories: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            categories: ["code/", "css/", "fonts/", "js/"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// `<details>` post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetailsConfig {
    pub collapse_control: bool,
}

impl Default for DetailsConfig {
    fn default() -> Self {
        Self {
            collapse_control: true,
        }
    }
}

/// Post-build plain-text export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub filename: String,
    pub rewrite_links: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename: "llms.txt".to_string(),
            rewrite_links: true,
        }
    }
}

/// Pre-build clean of the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanConfig {
    /// Top-level output entries left in place (built by other tools).
    pub keep: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            keep: vec!["assets".to_string()],
        }
    }
}

/// A file or directory copied verbatim from the project into the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassthroughEntry {
    /// Path relative to the project root.
    pub from: String,
    /// Path relative to the output directory.
    pub to: String,
}

fn default_passthrough() -> Vec<PassthroughEntry> {
    [
        ("src/assets/fonts", "assets/fonts"),
        ("src/assets/code", "assets/code"),
        ("src/icon32.png", "icon32.png"),
        ("src/icon64.png", "icon64.png"),
        ("src/og-image.png", "og-image.png"),
        ("src/llms.txt", "llms.txt"),
    ]
    .iter()
    .map(|(from, to)| PassthroughEntry {
        from: from.to_string(),
        to: to.to_string(),
    })
    .collect()
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of pages processed in parallel.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays included.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `noisepress.toml` from the project root, falling back to defaults.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    load_config_file(&root.join(CONFIG_FILENAME))
}

/// Load a specific config file over the stock defaults.
pub fn load_config_file(config_path: &Path) -> Result<SiteConfig, ConfigError> {
    let overlay = load_raw_config(config_path)?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `noisepress.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# noisepress configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Source repository
# ---------------------------------------------------------------------------
[site]
# Source repository. Published asset links point at its blob view, llms.txt
# links at its raw-content host.
repository = "https://github.com/richard-weiss/richard-weiss.github.io"
branch = "main"
# Override the raw-content host (defaults to repository with github.com
# replaced by raw.githubusercontent.com).
# raw_base = "https://raw.githubusercontent.com/richard-weiss/richard-weiss.github.io"

# ---------------------------------------------------------------------------
# Layout
# ---------------------------------------------------------------------------
[paths]
source_dir = "src"
output_dir = "docs"
posts_dir = "src/posts"
posts_url = "posts"
assets_url = "/assets"
images_dir = "images"
repo_assets_path = "src/assets"

# ---------------------------------------------------------------------------
# Responsive images
# ---------------------------------------------------------------------------
[images]
# Encoded variants, in <source> order. The last one is the <img> fallback.
# Available: "webp" (lossless), "jpeg", "avif".
formats = ["webp", "jpeg"]
# JPEG/AVIF quality (0 = worst, 100 = best).
quality = 80

# ---------------------------------------------------------------------------
# Asset links
# ---------------------------------------------------------------------------
[assets]
# Top-level asset folders that are not images. Any other relative link is
# treated as an image under paths.images_dir.
categories = ["code/", "css/", "fonts/", "js/"]

# ---------------------------------------------------------------------------
# <details> blocks
# ---------------------------------------------------------------------------
[details]
# Append a "Collapse" control that closes the block and scrolls back to it.
collapse_control = true

# ---------------------------------------------------------------------------
# Plain-text export
# ---------------------------------------------------------------------------
[export]
filename = "llms.txt"
rewrite_links = true

# ---------------------------------------------------------------------------
# Pre-build clean
# ---------------------------------------------------------------------------
[clean]
# Output entries that survive `noisepress clean`.
keep = ["assets"]

# ---------------------------------------------------------------------------
# Passthrough copies (from = project-relative, to = output-relative)
# ---------------------------------------------------------------------------
[[passthrough]]
from = "src/assets/fonts"
to = "assets/fonts"

[[passthrough]]
from = "src/assets/code"
to = "assets/code"

[[passthrough]]
from = "src/icon32.png"
to = "icon32.png"

[[passthrough]]
from = "src/icon64.png"
to = "icon64.png"

[[passthrough]]
from = "src/og-image.png"
to = "og-image.png"

[[passthrough]]
from = "src/llms.txt"
to = "llms.txt"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum pages processed in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
