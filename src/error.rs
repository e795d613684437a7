// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the annotation pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Main error type for the annotation pipeline.
///
/// Every variant is terminal for the request that produced it; nothing in
/// the crate retries.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Filename has no extension or one outside the allow-set.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Filename is empty or would escape its storage namespace.
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    /// Bytes could not be decoded into a raster image.
    #[error("Decode error: {0}")]
    DecodeError(String),
    /// The pose model rejected its input or failed internally.
    #[error("Inference error: {0}")]
    InferenceError(String),
    /// The storage medium rejected a write.
    #[error("Persist error: {0}")]
    PersistError(String),
    /// No artifact has been stored under the requested name.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Error loading the ONNX model.
    #[error("Model load error: {0}")]
    ModelLoadError(String),
    /// Invalid configuration provided.
    #[error("Config error: {0}")]
    ConfigError(String),
    /// Viewer window error.
    #[error("Visualizer error: {0}")]
    VisualizerError(String),
    /// Wrapped `std::io::Error`.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnnotateError {
    /// Whether the error was caused by the caller's input rather than the
    /// environment.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::InvalidFilename(_) | Self::DecodeError(_)
        )
    }
}

impl From<image::ImageError> for AnnotateError {
    fn from(err: image::ImageError) -> Self {
        Self::DecodeError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnnotateError::UnsupportedFormat("notes.txt".to_string());
        assert_eq!(err.to_string(), "Unsupported format: notes.txt");

        let err = AnnotateError::InferenceError("test".to_string());
        assert_eq!(err.to_string(), "Inference error: test");
    }

    #[test]
    fn test_client_errors() {
        assert!(AnnotateError::DecodeError(String::new()).is_client_error());
        assert!(AnnotateError::InvalidFilename(String::new()).is_client_error());
        assert!(!AnnotateError::PersistError(String::new()).is_client_error());
        assert!(!AnnotateError::NotFound(String::new()).is_client_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AnnotateError = io.into();
        assert!(matches!(err, AnnotateError::Io(_)));
    }
}
