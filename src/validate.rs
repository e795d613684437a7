// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Upload validation: filename checks and decoding.

use std::io::Cursor;
use std::path::Path;

use crate::error::{AnnotateError, Result};
use crate::raster::ImageBuffer;

/// File extensions accepted for upload (compared lowercase).
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Encoded image formats the pipeline can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics (lossless).
    Png,
    /// JPEG (lossy).
    Jpeg,
}

impl ImageFormat {
    /// Determine the format from a filename's final dot-delimited segment.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if there is no extension or it is not in
    /// [`ALLOWED_EXTENSIONS`].
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .ok_or_else(|| {
                AnnotateError::UnsupportedFormat(format!("'{filename}' has no file extension"))
            })?;

        match ext.as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(AnnotateError::UnsupportedFormat(format!(
                "'.{ext}' is not one of {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))),
        }
    }

    /// MIME type for serving the encoded bytes.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Check if a filename has an allowed image extension.
#[must_use]
pub fn allowed_file(filename: &str) -> bool {
    ImageFormat::from_filename(filename).is_ok()
}

/// Reject names that are empty or that could address anything outside a
/// single flat directory.
///
/// # Errors
///
/// Returns `InvalidFilename` for empty names, names containing `/` or `\`,
/// and the `.` and `..` components.
pub fn check_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(AnnotateError::InvalidFilename("filename is empty".to_string()));
    }
    if filename.contains(['/', '\\', '\0']) || filename == "." || filename == ".." {
        return Err(AnnotateError::InvalidFilename(format!(
            "'{filename}' is not a plain file name"
        )));
    }
    // Catch platform-specific prefixes (e.g. `C:` on Windows).
    if Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
        return Err(AnnotateError::InvalidFilename(format!(
            "'{filename}' is not a plain file name"
        )));
    }
    Ok(())
}

/// Validate an upload and decode it into an [`ImageBuffer`].
///
/// The extension is checked before the bytes are looked at, so a `.txt`
/// upload is rejected whatever it contains. Once the extension is allowed,
/// the decoder is picked from the content, so PNG bytes named `.jpg` still
/// decode.
///
/// # Errors
///
/// * `InvalidFilename` - empty or path-like filename.
/// * `UnsupportedFormat` - missing or disallowed extension.
/// * `DecodeError` - empty, truncated or non-image bytes.
pub fn validate(filename: &str, bytes: &[u8]) -> Result<ImageBuffer> {
    check_filename(filename)?;
    ImageFormat::from_filename(filename)?;

    if bytes.is_empty() {
        return Err(AnnotateError::DecodeError(format!("'{filename}' is empty")));
    }

    let decode_error = |e: &dyn std::fmt::Display| {
        AnnotateError::DecodeError(format!("failed to decode '{filename}': {e}"))
    };
    let decoded = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_error(&e))?
        .decode()
        .map_err(|e| decode_error(&e))?;

    ImageBuffer::from_dynamic(&decoded)
}
