//! Carousel fences.
//!
//! Markdown rendering turns
//!
//! ```text
//! :::carousel Build log
//! ![](rack.png){The rack}
//! ![](cables.png)
//! :::
//! ```
//!
//! into a single paragraph of `<img>` tags between fence lines. This stage
//! replaces that paragraph with slide markup and, once per page, appends the
//! carousel script before `</body>`.

use super::Rewrite;
use crate::imaging::with_caption;
use maud::{Markup, PreEscaped, html};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const CAROUSEL_JS: &str = include_str!("../../static/carousel.js");

// SAFETY: pattern is a compile-time literal
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<p>\s*:::carousel[ \t]*(.*?)\n([\s\S]*?)\n\s*:::\s*</p>").unwrap()
});

// SAFETY: pattern is a compile-time literal
static SLIDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img([^>]*)>(?:\{([^}]+)\})?").unwrap());

/// One image of a carousel, with its optional caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub image_tag: String,
    pub caption: Option<String>,
}

/// Extract the slides of a fence body in document order.
pub fn parse_slides(body: &str) -> Vec<Slide> {
    SLIDE_RE
        .captures_iter(body)
        .map(|caps| Slide {
            image_tag: format!("<img{}>", &caps[1]),
            caption: caps.get(2).map(|m| m.as_str().to_string()),
        })
        .collect()
}

pub fn render_carousel(title: &str, slides: &[Slide]) -> Markup {
    html! {
        div.carousel {
            @if !title.is_empty() {
                div.carousel-title { (PreEscaped(title)) }
            }
            div.carousel-track {
                @for slide in slides {
                    div.carousel-slide {
                        @match &slide.caption {
                            Some(caption) => {
                                (PreEscaped(with_caption(&slide.image_tag, caption)))
                            }
                            None => { (PreEscaped(&slide.image_tag)) }
                        }
                    }
                }
            }
            button.carousel-prev aria-label="Previous" { "‹" }
            button.carousel-next aria-label="Next" { "›" }
            div.carousel-dots {}
        }
    }
}

/// Replace every carousel fence that holds at least one image.
///
/// Fences without images are left as written and not counted. The script is
/// injected before the first `</body>` when anything was rewritten.
pub fn rewrite_carousels(page: &str) -> Rewrite {
    let mut count = 0;
    let rewritten = FENCE_RE.replace_all(page, |caps: &Captures| {
        let slides = parse_slides(&caps[2]);
        if slides.is_empty() {
            return caps[0].to_string();
        }
        count += 1;
        render_carousel(caps[1].trim(), &slides).into_string()
    });

    if count == 0 {
        return Rewrite::unchanged(page);
    }

    let html = rewritten.replacen(
        "</body>",
        &format!("<script>{CAROUSEL_JS}</script>\n</body>"),
        1,
    );
    Rewrite { html, count }
}
