//! Collapsible sections.
//!
//! Wraps the body of each `<details>` block in a `<div>` so it can be styled
//! as one unit, and appends a control that closes the block and scrolls back
//! to its summary. Running the stage twice produces the same page.

use super::Rewrite;
use crate::config::DetailsConfig;
use regex::{Captures, Regex};
use std::sync::LazyLock;

pub const COLLAPSE_CONTROL: &str = concat!(
    r#"<div class="details-collapse" onclick="var d=this.parentElement;d.removeAttribute('open');"#,
    r#"d.scrollIntoView({behavior:'smooth',block:'start'})">Collapse ▲</div>"#
);

// SAFETY: pattern is a compile-time literal
static DETAILS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<details([^>]*)>\s*<summary([^>]*)>([\s\S]*?)</summary>([\s\S]*?)</details>")
        .unwrap()
});

/// Rewrite every `<details>` block.
///
/// Nested blocks are not supported: the match ends at the first
/// `</details>`.
pub fn rewrite_details(page: &str, config: &DetailsConfig) -> Rewrite {
    let mut count = 0;
    let html = DETAILS_RE.replace_all(page, |caps: &Captures| {
        let (details_attrs, summary_attrs, summary, body) = (&caps[1], &caps[2], &caps[3], &caps[4]);
        let trimmed = body.trim();

        let wrapped = trimmed.starts_with("<div>") || trimmed.starts_with("<div ");
        let has_control = trimmed.ends_with(COLLAPSE_CONTROL);
        let add_control = config.collapse_control && !has_control;

        let rewritten_body = if wrapped {
            body.to_string()
        } else {
            format!("<div>{body}</div>")
        };
        let control = if add_control { COLLAPSE_CONTROL } else { "" };

        let out = format!(
            "<details{details_attrs}><summary{summary_attrs}>{summary}</summary>{rewritten_body}{control}</details>"
        );
        if out != caps[0] {
            count += 1;
        }
        out
    });

    Rewrite {
        html: html.into_owned(),
        count,
    }
}
