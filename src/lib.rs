//! # noisepress
//!
//! The post-processing half of a personal blog build. A templating step
//! renders markdown posts into HTML pages under the output directory;
//! noisepress then rewrites those pages in place, optimizes the images they
//! reference and exports a plain-text copy of every post.
//!
//! # Architecture
//!
//! ```text
//! clean     docs/                 →  docs/ minus generated output
//! (templating step renders src/ → docs/)
//! process   docs/**/*.html        →  transformed pages + docs/assets/images/*
//! export    src/posts/*.md        →  docs/posts/<slug>/llms.txt
//! ```
//!
//! Each page goes through a fixed chain of text transforms (see
//! [`transform`]). Transforms are pure functions of the page text and a
//! [`transform::PageContext`]; the only side effect is image encoding, which
//! goes through the shared [`imaging::Optimizer`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `noisepress.toml` loading, validation, merging; build mode |
//! | [`transform`] | Ordered per-page pipeline: carousel, images, preload, asset links, details |
//! | [`imaging`] | Image backend, memoized optimizer, `<picture>` markup |
//! | [`cache`] | Content-addressed cache of encoded images across builds |
//! | [`assets`] | Relative asset target → local / repository URL resolution |
//! | [`site`] | Pre-build clean, passthrough copy, parallel page processing |
//! | [`export`] | `llms.txt` sidecars for rendered posts |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Build Mode
//!
//! Whether links point at the local dev server or at the hosted repository
//! is a [`config::BuildMode`] value passed to every transform, not an
//! environment lookup buried in a helper. The CLI still reads
//! `NOISEPRESS_ENV` so CI can flip it without changing the command line.
//!
//! ## Regex Transforms Over an HTML Parser
//!
//! The pages are produced by one known templating setup, and every rewrite
//! targets a narrow, predictable shape (`<img … src="…">`, `<details>`
//! blocks, a carousel fence paragraph). Text rewrites keep everything the
//! patterns do not match byte-for-byte identical, so unchanged pages are
//! never written back.
//!
//! ## Pure-Rust Imaging
//!
//! Image decoding and encoding use the `image` crate (with rav1e for AVIF).
//! No ImageMagick, no sharp, no system libraries.

pub mod assets;
pub mod cache;
pub mod config;
pub mod export;
pub mod imaging;
pub mod output;
pub mod site;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
