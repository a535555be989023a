//! Per-page HTML transforms.
//!
//! Every rendered page runs through the same ordered chain:
//!
//! 1. [`carousel`]: `:::carousel` fences → slide markup + script
//! 2. [`images`]: `<img>` → optimized `<picture>`
//! 3. [`preload`]: preload hint for the page's priority image
//! 4. [`links`]: relative asset links → absolute URLs
//! 5. [`details`]: `<details>` body wrapping + collapse control
//!
//! The order matters. Carousel slides are plain `<img>` tags that the image
//! stage then optimizes, and the preload stage looks for the
//! `fetchpriority="high"` marker the image stage leaves behind.
//!
//! Transforms are regex-driven text rewrites over the whole page. They do
//! not parse HTML; anything their patterns do not match passes through
//! untouched.

pub mod carousel;
pub mod details;
pub mod images;
pub mod links;
pub mod preload;

use crate::assets::AssetResolver;
use crate::config::{BuildMode, SiteConfig};
use crate::imaging::Optimizer;
use std::path::Path;
use tracing::debug;

/// Everything a transform may consult besides the page text.
pub struct PageContext<'a> {
    pub config: &'a SiteConfig,
    pub mode: BuildMode,
    /// Templating input directory; image `src` paths resolve below it.
    pub source_dir: &'a Path,
    pub assets: AssetResolver<'a>,
    /// Without an optimizer, images only get their `src` rewritten.
    pub optimizer: Option<&'a Optimizer<'a>>,
}

impl<'a> PageContext<'a> {
    pub fn new(config: &'a SiteConfig, mode: BuildMode, source_dir: &'a Path) -> Self {
        Self {
            config,
            mode,
            source_dir,
            assets: AssetResolver::new(config),
            optimizer: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: &'a Optimizer<'a>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }
}

/// One step of the page pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Carousel,
    Images,
    Preload,
    AssetLinks,
    Details,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [
        Stage::Carousel,
        Stage::Images,
        Stage::Preload,
        Stage::AssetLinks,
        Stage::Details,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Carousel => "carousel",
            Stage::Images => "images",
            Stage::Preload => "preload",
            Stage::AssetLinks => "asset-links",
            Stage::Details => "details",
        }
    }

    fn apply(self, page: &str, ctx: &PageContext<'_>, report: &mut PageReport) -> String {
        match self {
            Stage::Carousel => {
                let rewrite = carousel::rewrite_carousels(page);
                report.carousels += rewrite.count;
                rewrite.html
            }
            Stage::Images => {
                let rewrite = images::rewrite_images(page, ctx);
                report.images_optimized += rewrite.optimized;
                report.images_missing += rewrite.missing;
                report.images_failed += rewrite.failed;
                rewrite.html
            }
            Stage::Preload => {
                let rewrite = preload::inject_preload(page);
                report.preloaded |= rewrite.count > 0;
                rewrite.html
            }
            Stage::AssetLinks => {
                let rewrite = links::rewrite_asset_links(page, &ctx.assets, ctx.mode);
                report.links += rewrite.count;
                rewrite.html
            }
            Stage::Details => {
                let rewrite = details::rewrite_details(page, &ctx.config.details);
                report.details += rewrite.count;
                rewrite.html
            }
        }
    }
}

/// Output of a counting transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub html: String,
    /// Number of constructs rewritten.
    pub count: usize,
}

impl Rewrite {
    fn unchanged(page: &str) -> Self {
        Self {
            html: page.to_string(),
            count: 0,
        }
    }
}

/// What the pipeline did to one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    pub carousels: usize,
    pub images_optimized: usize,
    pub images_missing: usize,
    pub images_failed: usize,
    pub preloaded: bool,
    pub links: usize,
    pub details: usize,
}

impl PageReport {
    /// Fold another page's counts into this one.
    pub fn absorb(&mut self, other: &PageReport) {
        self.carousels += other.carousels;
        self.images_optimized += other.images_optimized;
        self.images_missing += other.images_missing;
        self.images_failed += other.images_failed;
        self.preloaded |= other.preloaded;
        self.links += other.links;
        self.details += other.details;
    }
}

/// Run every stage over one page, in [`Stage::ORDER`].
pub fn process_page(page: &str, ctx: &PageContext<'_>) -> (String, PageReport) {
    let mut report = PageReport::default();
    let mut html = page.to_string();
    for stage in Stage::ORDER {
        let next = stage.apply(&html, ctx, &mut report);
        if next != html {
            debug!(stage = stage.name(), "page rewritten");
        }
        html = next;
    }
    (html, report)
}

/// Value of a double-quoted attribute inside a tag's attribute text.
///
/// Matches whole attribute names only, so looking up `src` ignores
/// `data-src`.
pub(crate) fn attr_value<'t>(tag: &'t str, name: &str) -> Option<&'t str> {
    let needle = format!("{name}=\"");
    let mut from = 0;
    while let Some(pos) = tag[from..].find(&needle) {
        let start = from + pos;
        let value_start = start + needle.len();
        let at_boundary = tag[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || c == '<');
        if at_boundary {
            let len = tag[value_start..].find('"')?;
            return Some(&tag[value_start..value_start + len]);
        }
        from = value_start;
    }
    None
}
