//! Plain-text post export.
//!
//! After the site is generated, every markdown post gets a copy of its
//! source written next to its rendered page as `llms.txt`, so language
//! models and scrapers can read the post without parsing HTML.
//!
//! ```text
//! src/posts/homelab-dns.md  →  docs/posts/homelab-dns/llms.txt
//! ```
//!
//! Relative link targets in the markdown are rewritten to absolute URLs:
//! raw repository URLs in published mode, local asset URLs otherwise.
//! Files starting with `_` are drafts or partials and are skipped, as are
//! posts that have no rendered output directory.

use crate::assets::{AssetResolver, UrlStyle, is_relative_target};
use crate::config::{BuildMode, ProjectPaths, SiteConfig};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// SAFETY: pattern is a compile-time literal
static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(([^)]*)\)").unwrap());

/// A markdown post source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSource {
    /// File stem, which is also the post's output directory name.
    pub slug: String,
    pub path: PathBuf,
}

/// What the export did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Sidecar files written.
    pub written: Vec<PathBuf>,
    /// Slugs without an output directory.
    pub skipped: Vec<String>,
}

/// Markdown posts directly inside `posts_dir`, sorted by slug.
///
/// A missing directory yields no posts.
pub fn discover_posts(posts_dir: &Path) -> Result<Vec<PostSource>, ExportError> {
    if !posts_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut posts = Vec::new();
    for entry in fs::read_dir(posts_dir)? {
        let path = entry?.path();
        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if !path.is_file() || !is_markdown || stem.starts_with('_') {
            continue;
        }
        posts.push(PostSource { slug: stem, path });
    }
    posts.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(posts)
}

/// Rewrite relative `](target)` link targets to absolute asset URLs.
pub fn rewrite_markdown_links(markdown: &str, assets: &AssetResolver<'_>, mode: BuildMode) -> String {
    MD_LINK_RE
        .replace_all(markdown, |caps: &Captures| {
            let target = &caps[1];
            if !is_relative_target(target) {
                return caps[0].to_string();
            }
            format!("]({})", assets.url(target, mode, UrlStyle::Raw))
        })
        .into_owned()
}

/// Write the sidecar for every post that has a rendered directory.
pub fn export_posts(
    paths: &ProjectPaths,
    config: &SiteConfig,
    mode: BuildMode,
) -> Result<ExportReport, ExportError> {
    let assets = AssetResolver::new(config);
    let posts_out = paths.output.join(config.paths.posts_url.trim_matches('/'));
    let mut report = ExportReport::default();

    for post in discover_posts(&paths.posts)? {
        let dir = posts_out.join(&post.slug);
        if !dir.is_dir() {
            debug!(slug = %post.slug, "no rendered output, skipping export");
            report.skipped.push(post.slug);
            continue;
        }
        let markdown = fs::read_to_string(&post.path)?;
        let text = if config.export.rewrite_links {
            rewrite_markdown_links(&markdown, &assets, mode)
        } else {
            markdown
        };
        let target = dir.join(&config.export.filename);
        fs::write(&target, text)?;
        report.written.push(target);
    }
    Ok(report)
}
