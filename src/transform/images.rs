//! Responsive images.
//!
//! Every local `<img>` whose source file exists is replaced by a `<picture>`
//! built from the optimizer's variants. External images are left alone.
//! Images that are missing or fail to optimize keep a plain `<img>` with the
//! normalized `src`, so a broken picture never fails the page.

use super::{PageContext, attr_value};
use crate::assets::is_external;
use crate::imaging::{render_picture, with_caption};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::{debug, warn};

// SAFETY: pattern is a compile-time literal
static IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img([^>]*)\ssrc="([^"]+)"([^>]*)>(?:\{([^}]+)\})?"#).unwrap()
});

/// Output of the image stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagesRewrite {
    pub html: String,
    pub optimized: usize,
    /// Local images with no source file; only their path was rewritten.
    pub missing: usize,
    /// Images the optimizer could not process; only their path was rewritten.
    pub failed: usize,
}

pub fn rewrite_images(page: &str, ctx: &PageContext<'_>) -> ImagesRewrite {
    let mut optimized = 0;
    let mut missing = 0;
    let mut failed = 0;

    let html = IMG_RE.replace_all(page, |caps: &Captures| {
        let (before, src, after) = (&caps[1], &caps[2], &caps[3]);
        if is_external(src) {
            return caps[0].to_string();
        }

        let url = ctx.assets.image_src(src);
        let plain = format!(r#"<img{before} src="{url}"{after}>"#);
        let disk = ctx.source_dir.join(url.trim_start_matches('/'));

        let rendered = if !disk.is_file() {
            debug!(src = %url, "image source not found, rewriting path only");
            missing += 1;
            plain
        } else if let Some(optimizer) = ctx.optimizer {
            match optimizer.optimize(&disk) {
                Ok(descriptor) => {
                    let alt = attr_value(before, "alt")
                        .or_else(|| attr_value(after, "alt"))
                        .unwrap_or("");
                    let picture = render_picture(&descriptor, alt, optimized == 0);
                    optimized += 1;
                    picture.into_string()
                }
                Err(e) => {
                    warn!(src = %url, error = %e, "image optimization failed, keeping original");
                    failed += 1;
                    plain
                }
            }
        } else {
            plain
        };

        match caps.get(4) {
            Some(caption) => with_caption(&rendered, caption.as_str()),
            None => rendered,
        }
    });

    ImagesRewrite {
        html: html.into_owned(),
        optimized,
        missing,
        failed,
    }
}
