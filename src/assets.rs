//! Asset URL resolution.
//!
//! Posts link to files in the asset tree with short relative targets like
//! `code/setup.sh` or `diagram.png`. [`AssetResolver`] turns such a target
//! into an absolute URL for the current [`BuildMode`]:
//!
//! | Mode | Style | URL |
//! |---|---|---|
//! | Local | any | `<assets_url>/<path>` |
//! | Published | browse | `<repository>/blob/<branch>/<repo_assets_path>/<path>` |
//! | Published | raw | `<raw_base>/<branch>/<repo_assets_path>/<path>` |
//!
//! A target that starts with one of the configured asset categories keeps
//! its path. Anything else is treated as an image and gains the images
//! folder prefix.

use crate::config::{BuildMode, SiteConfig};
use std::borrow::Cow;

/// Whether a published URL points at the repository's HTML view or at the
/// raw file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStyle {
    Browse,
    Raw,
}

/// Resolves relative asset targets against one site configuration.
#[derive(Debug, Clone)]
pub struct AssetResolver<'a> {
    config: &'a SiteConfig,
    categories: Vec<String>,
}

impl<'a> AssetResolver<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        let categories = config
            .assets
            .categories
            .iter()
            .map(|c| format!("{}/", c.trim_matches('/')))
            .collect();
        Self { config, categories }
    }

    /// Path of `target` inside the asset tree.
    pub fn asset_path(&self, target: &str) -> String {
        if self.categories.iter().any(|c| target.starts_with(c.as_str())) {
            target.to_string()
        } else {
            format!("{}/{}", self.config.paths.images_dir.trim_matches('/'), target)
        }
    }

    /// Absolute URL of a relative asset target.
    pub fn url(&self, target: &str, mode: BuildMode, style: UrlStyle) -> String {
        let path = self.asset_path(target);
        let site = &self.config.site;
        let repo_assets = self.config.paths.repo_assets_path.trim_matches('/');
        match (mode, style) {
            (BuildMode::Local, _) => {
                format!("{}/{}", self.config.paths.assets_url.trim_end_matches('/'), path)
            }
            (BuildMode::Published, UrlStyle::Browse) => format!(
                "{}/blob/{}/{}/{}",
                site.repository.trim_end_matches('/'),
                site.branch,
                repo_assets,
                path
            ),
            (BuildMode::Published, UrlStyle::Raw) => {
                format!("{}/{}/{}/{}", site.raw_base(), site.branch, repo_assets, path)
            }
        }
    }

    /// Public URL for an image `src` as written by the author.
    ///
    /// Rooted paths and absolute URLs are kept. Bare file names resolve under
    /// the images URL, e.g. `diagram.png` → `/assets/images/diagram.png`.
    pub fn image_src<'s>(&self, src: &'s str) -> Cow<'s, str> {
        if src.starts_with('/') || is_external(src) {
            Cow::Borrowed(src)
        } else {
            Cow::Owned(format!("{}/{}", self.config.paths.images_url(), src))
        }
    }
}

/// Link target that should be resolved against the asset tree: not rooted,
/// not a fragment and without a URL scheme.
pub fn is_relative_target(target: &str) -> bool {
    !target.is_empty()
        && !target.starts_with('/')
        && !target.starts_with('#')
        && !has_scheme(target)
}

/// `http://` or `https://` image source.
pub fn is_external(src: &str) -> bool {
    let lower = src.get(..8).unwrap_or(src).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// True for `scheme:` prefixes such as `https:`, `mailto:` or `tel:`.
///
/// The scheme must come before any `/`, `?` or `#` so relative paths that
/// merely contain a colon later on are not mistaken for URLs.
fn has_scheme(target: &str) -> bool {
    let Some(colon) = target.find(':') else {
        return false;
    };
    let scheme = &target[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}
