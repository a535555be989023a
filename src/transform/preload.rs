//! LCP preload hint.
//!
//! The image stage marks the first optimized image of a page with
//! `fetchpriority="high"`. This stage mirrors that image into a
//! `<link rel="preload">` in `<head>` so the browser starts fetching it
//! before layout.

use super::{Rewrite, attr_value};
use regex::Regex;
use std::sync::LazyLock;

// SAFETY: pattern is a compile-time literal
static PICTURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<picture\b[^>]*>[\s\S]*?</picture>").unwrap());

// SAFETY: pattern is a compile-time literal
static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<source\b[^>]*>").unwrap());

// SAFETY: pattern is a compile-time literal
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());

const PRIORITY: &str = r#"fetchpriority="high""#;

/// What to preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTarget {
    pub href: String,
    pub mime: Option<String>,
}

impl PreloadTarget {
    pub fn link_tag(&self) -> String {
        match &self.mime {
            Some(mime) => format!(
                r#"<link rel="preload" as="image" type="{mime}" href="{}" fetchpriority="high">"#,
                self.href
            ),
            None => format!(
                r#"<link rel="preload" as="image" href="{}" fetchpriority="high">"#,
                self.href
            ),
        }
    }
}

/// Find the page's priority image.
///
/// The first `<picture>` containing the priority marker wins: its first
/// `<source>` gives the type and the first `srcset` candidate, or its `<img>`
/// gives the `src` when there is no usable source. Failing that, the first
/// bare `<img>` carrying the marker is used.
pub fn find_priority_image(page: &str) -> Option<PreloadTarget> {
    PICTURE_RE
        .find_iter(page)
        .map(|m| m.as_str())
        .find(|p| p.contains(PRIORITY))
        .and_then(|picture| picture_source(picture).or_else(|| first_img_src(picture)))
        .or_else(|| {
            IMG_RE
                .find_iter(page)
                .map(|m| m.as_str())
                .filter(|tag| attr_value(tag, "fetchpriority") == Some("high"))
                .find_map(|tag| attr_value(tag, "src"))
                .map(|src| PreloadTarget {
                    href: src.to_string(),
                    mime: None,
                })
        })
}

fn picture_source(picture: &str) -> Option<PreloadTarget> {
    let tag = SOURCE_RE.find(picture)?.as_str();
    let href = attr_value(tag, "srcset")
        .and_then(|set| set.split(',').next())
        .and_then(|candidate| candidate.split_whitespace().next())?;
    Some(PreloadTarget {
        href: href.to_string(),
        mime: attr_value(tag, "type").map(str::to_string),
    })
}

fn first_img_src(picture: &str) -> Option<PreloadTarget> {
    let img = IMG_RE.find(picture)?;
    attr_value(img.as_str(), "src").map(|src| PreloadTarget {
        href: src.to_string(),
        mime: None,
    })
}

/// Insert the preload link before the first `</head>`.
///
/// Pages without a priority image or without `</head>` are returned as is,
/// as are pages that already carry the same hint.
pub fn inject_preload(page: &str) -> Rewrite {
    let Some(target) = find_priority_image(page) else {
        return Rewrite::unchanged(page);
    };
    let link = target.link_tag();
    if !page.contains("</head>") || page.contains(&link) {
        return Rewrite::unchanged(page);
    }
    Rewrite {
        html: page.replacen("</head>", &format!("  {link}\n</head>"), 1),
        count: 1,
    }
}
