//! Asset links.
//!
//! Posts link to downloadable assets with short relative targets
//! (`[script](code/setup.sh)`). Rendered pages live several directories deep,
//! so those targets are rewritten to absolute URLs and opened in a new tab.

use super::Rewrite;
use crate::assets::{AssetResolver, UrlStyle, is_relative_target};
use crate::config::BuildMode;
use regex::{Captures, Regex};
use std::sync::LazyLock;

// SAFETY: pattern is a compile-time literal
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href="([^"]*)"([^>]*)>([^<]*)</a>"#).unwrap()
});

/// Rewrite relative `<a href>` targets whose text contains no markup.
///
/// Absolute URLs, rooted paths, fragments and scheme links (`mailto:`) are
/// left alone. Published links also get `rel="noopener"`.
pub fn rewrite_asset_links(page: &str, assets: &AssetResolver<'_>, mode: BuildMode) -> Rewrite {
    let mut count = 0;
    let html = LINK_RE.replace_all(page, |caps: &Captures| {
        let (target, attrs, text) = (&caps[1], &caps[2], &caps[3]);
        if !is_relative_target(target) {
            return caps[0].to_string();
        }
        count += 1;

        let url = assets.url(target, mode, UrlStyle::Browse);
        let target_attr = if attrs.contains("target=") {
            ""
        } else {
            r#" target="_blank""#
        };
        let rel = if mode.is_published() && !attrs.contains("rel=") {
            r#" rel="noopener""#
        } else {
            ""
        };
        format!(r#"<a href="{url}"{attrs}{target_attr}{rel}>{text}</a>"#)
    });

    Rewrite {
        html: html.into_owned(),
        count,
    }
}
