//! Responsive image markup.
//!
//! Turns an [`ImageDescriptor`] produced by the
//! [`Optimizer`](super::optimizer::Optimizer) into a `<picture>` element.
//! Every configured format except the last becomes a `<source>`; the last
//! format is the `<img>` fallback and carries the intrinsic size and the
//! loading hints.

use super::params::OutputFormat;
use maud::{Markup, PreEscaped, html};
use std::path::PathBuf;

/// One encoded file of a source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVariant {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Where the encoded file lives on disk.
    pub path: PathBuf,
    /// Public URL, e.g. `/assets/images/diagram.webp`.
    pub url: String,
}

impl ImageVariant {
    /// `srcset` candidate with a width descriptor.
    pub fn srcset(&self) -> String {
        format!("{} {}w", self.url, self.width)
    }
}

/// All variants of one source image, in configured format order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub variants: Vec<ImageVariant>,
}

impl ImageDescriptor {
    pub fn fallback(&self) -> Option<&ImageVariant> {
        self.variants.last()
    }
}

/// Render a `<picture>` element.
///
/// `alt` is inserted verbatim: it comes from an attribute of the rendered
/// page and is already escaped. The first optimized image of a page is the
/// `priority` one: eagerly loaded with a high fetch priority. All others are
/// lazy.
pub fn render_picture(descriptor: &ImageDescriptor, alt: &str, priority: bool) -> Markup {
    let Some(fallback) = descriptor.fallback() else {
        return html! {};
    };
    let sources = &descriptor.variants[..descriptor.variants.len() - 1];
    let loading = if priority { "eager" } else { "lazy" };

    html! {
        picture {
            @for variant in sources {
                source type=(variant.format.mime()) srcset=(variant.srcset());
            }
            img src=(fallback.url) alt=(PreEscaped(alt)) width=(descriptor.width)
                height=(descriptor.height) loading=(loading)
                fetchpriority=[priority.then_some("high")] decoding="async";
        }
    }
}

/// Wrap already-rendered image markup in a `<figure>` with a caption.
///
/// Captions come from the `{caption}` suffix in the page source and are kept
/// as authored.
pub fn with_caption(inner: &str, caption: &str) -> String {
    let figure = html! {
        figure {
            (PreEscaped(inner))
            figcaption { (PreEscaped(caption)) }
        }
    };
    figure.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(format: OutputFormat, url: &str) -> ImageVariant {
        ImageVariant {
            format,
            width: 1200,
            height: 800,
            path: PathBuf::from(url.trim_start_matches('/')),
            url: url.to_string(),
        }
    }

    fn descriptor() -> ImageDescriptor {
        ImageDescriptor {
            width: 1200,
            height: 800,
            variants: vec![
                variant(OutputFormat::Webp, "/assets/images/a.webp"),
                variant(OutputFormat::Jpeg, "/assets/images/a.jpeg"),
            ],
        }
    }

    #[test]
    fn picture_lists_sources_then_fallback_img() {
        let html = render_picture(&descriptor(), "A diagram", false).into_string();

        assert!(html.starts_with("<picture>"));
        assert!(html.contains(
            r#"<source type="image/webp" srcset="/assets/images/a.webp 1200w">"#
        ));
        assert!(!html.contains(r#"type="image/jpeg""#));
        assert!(html.contains(r#"src="/assets/images/a.jpeg""#));
        assert!(html.contains(r#"width="1200" height="800""#));
        assert!(html.contains(r#"alt="A diagram""#));
    }

    #[test]
    fn priority_picture_is_eager_and_high() {
        let html = render_picture(&descriptor(), "", true).into_string();
        assert!(html.contains(r#"loading="eager""#));
        assert!(html.contains(r#"fetchpriority="high""#));
        assert!(html.contains(r#"decoding="async""#));
    }

    #[test]
    fn later_pictures_are_lazy_without_priority() {
        let html = render_picture(&descriptor(), "", false).into_string();
        assert!(html.contains(r#"loading="lazy""#));
        assert!(!html.contains("fetchpriority"));
    }

    #[test]
    fn alt_is_not_double_escaped() {
        let html = render_picture(&descriptor(), "Fish &amp; chips", false).into_string();
        assert!(html.contains(r#"alt="Fish &amp; chips""#));
    }

    #[test]
    fn single_format_has_no_sources() {
        let desc = ImageDescriptor {
            width: 10,
            height: 10,
            variants: vec![variant(OutputFormat::Webp, "/assets/images/a.webp")],
        };
        let html = render_picture(&desc, "", false).into_string();
        assert!(!html.contains("<source"));
        assert!(html.contains(r#"src="/assets/images/a.webp""#));
    }

    #[test]
    fn caption_wraps_in_figure() {
        let html = with_caption("<img src=\"x.png\">", "Figure 1: <em>setup</em>");
        assert_eq!(
            html,
            "<figure><img src=\"x.png\"><figcaption>Figure 1: <em>setup</em></figcaption></figure>"
        );
    }
}
