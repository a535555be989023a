//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the optimizer needs:
//! identify (read dimensions) and encode (write one format at original
//! resolution). The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::EncodeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` because pages are processed on a rayon pool and share one backend.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Encode the source image into `params.format` at `params.output`.
    fn encode(&self, params: &EncodeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{OutputFormat, Quality};
    use std::sync::Mutex;

    /// Mock backend that records operations instead of decoding pixels.
    ///
    /// `encode` touches the output file so cache lookups find it on disk.
    /// Sources whose file name appears in `failing` make `encode` error.
    pub struct MockBackend {
        pub dimensions: Dimensions,
        pub failing: Vec<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Encode {
            source: String,
            output: String,
            format: OutputFormat,
            quality: u32,
        },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::with_dimensions(800, 600)
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                dimensions: Dimensions { width, height },
                failing: Vec::new(),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_on(mut self, file_name: &str) -> Self {
            self.failing.push(file_name.to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Encode { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));
            Ok(self.dimensions)
        }

        fn encode(&self, params: &EncodeParams) -> Result<(), BackendError> {
            let name = params
                .source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if self.failing.contains(&name) {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure for {name}"
                )));
            }
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                format: params.format,
                quality: params.quality.value(),
            });
            std::fs::write(&params.output, b"")?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(640, 480);
        let dims = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(dims, Dimensions { width: 640, height: 480 });

        let ops = backend.get_operations();
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_records_encode_and_touches_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.webp");
        let backend = MockBackend::new();

        backend
            .encode(&EncodeParams {
                source: "/source.png".into(),
                output: output.clone(),
                format: OutputFormat::Webp,
                quality: Quality::new(80),
            })
            .unwrap();

        assert!(output.exists());
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Encode {
                format: OutputFormat::Webp,
                quality: 80,
                ..
            }
        ));
    }

    #[test]
    fn mock_fails_on_listed_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new().failing_on("broken.png");
        let result = backend.encode(&EncodeParams {
            source: "/images/broken.png".into(),
            output: tmp.path().join("broken.jpeg"),
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
        });
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
        assert_eq!(backend.encode_count(), 0);
    }
}
