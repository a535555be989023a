//! Image processing: pure Rust, no external binaries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Encode → WebP** | lossless `WebPEncoder` |
//! | **Encode → JPEG** | `JpegEncoder` with quality |
//! | **Encode → AVIF** | rav1e via `AvifEncoder` |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Optimizer**: per-build memoized, cached variant production
//! - **Operations**: `<picture>` markup for an optimized image

pub mod backend;
pub mod operations;
pub mod optimizer;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use operations::{ImageDescriptor, ImageVariant, render_picture, with_caption};
pub use optimizer::{Optimizer, OptimizerSettings};
pub use params::{EncodeParams, OutputFormat, Quality};
pub use rust_backend::RustBackend;
