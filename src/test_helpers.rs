//! Shared test utilities.
//!
//! Synthetic image writers and a throwaway site layout that mirrors the
//! default config: `src/assets/images/` for sources, `docs/` for rendered
//! output and `src/posts/` for markdown.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new();
//! site.image("diagram.png", 64, 48);
//! site.page("posts/hello/index.html", "<html><head></head><body></body></html>");
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a small valid JPEG with a gradient pattern.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let writer = std::io::BufWriter::new(fs::File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a small valid PNG with a half-transparent alpha channel.
pub fn write_test_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, if x < width / 2 { 255 } else { 0 }])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
}

/// A temporary project root laid out like the default config expects.
pub struct TestSite {
    pub tmp: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        for dir in ["src/assets/images", "src/posts", "docs"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    /// Write a PNG under `src/assets/images/`.
    pub fn image(&self, rel: &str, width: u32, height: u32) -> PathBuf {
        let path = self.root().join("src/assets/images").join(rel);
        write_test_png(&path, width, height);
        path
    }

    /// Write a rendered page under `docs/`.
    pub fn page(&self, rel: &str, html: &str) -> PathBuf {
        self.write(&format!("docs/{rel}"), html)
    }

    /// Write a markdown post under `src/posts/`.
    pub fn post(&self, rel: &str, markdown: &str) -> PathBuf {
        self.write(&format!("src/posts/{rel}"), markdown)
    }

    /// Write any file relative to the project root.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        ensure_parent(&path);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).unwrap()
    }
}

/// Wrap a body fragment in a minimal page.
pub fn page_with_body(body: &str) -> String {
    format!("<html><head><title>t</title></head><body>{body}</body></html>")
}
