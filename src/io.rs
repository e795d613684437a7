// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! On-disk storage: the `uploads/` and `outputs/` namespaces and the output
//! store that encodes and persists annotated images.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;

use crate::error::{AnnotateError, Result};
use crate::raster::ImageBuffer;
use crate::validate::{ImageFormat, check_filename};

/// Directory holding raw uploads, relative to the workspace root.
pub const UPLOADS_DIR: &str = "uploads";

/// Directory holding annotated artifacts, relative to the workspace root.
pub const OUTPUTS_DIR: &str = "outputs";

/// JPEG quality used for every annotated artifact.
pub const JPEG_QUALITY: u8 = 95;

/// A flat directory of files addressed by plain filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    dir: PathBuf,
}

impl Namespace {
    /// Address an existing directory. Nothing is created.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory backing this namespace.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path for `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilename` if `name` is not a plain file name.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        check_filename(name)?;
        Ok(self.dir.join(name))
    }

    /// Atomically write `bytes` under `name`, replacing any previous file.
    ///
    /// Bytes go to a temporary file in the same directory which is renamed
    /// over the target once fully written; on failure the temporary file is
    /// removed and the target is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilename` for a bad name and `PersistError` if the
    /// medium rejects the write.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.path(name)?;
        let persist_err = |e: std::io::Error| {
            AnnotateError::PersistError(format!("Failed to write {}: {e}", target.display()))
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(persist_err)?;
        tmp.write_all(bytes).map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(&target).map_err(|e| persist_err(e.error))?;

        Ok(target)
    }

    /// Read the file stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AnnotateError::NotFound(name.to_string()),
            _ => AnnotateError::Io(e),
        })
    }

    /// Remove the file stored under `name`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if an existing file cannot be removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AnnotateError::PersistError(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

/// The image to persist for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotatedImage {
    /// Pixels with an overlay drawn; encoded on store.
    Rendered(ImageBuffer),
    /// The upload's original encoded bytes, stored verbatim so that lossy
    /// formats round-trip exactly.
    Original(Vec<u8>),
}

/// Handle to an artifact written by [`OutputStore::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Filename the artifact is retrievable under.
    pub filename: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Encoded format.
    pub format: ImageFormat,
    /// Size in bytes.
    pub size: usize,
}

/// Encodes annotated images and keeps them in the outputs namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStore {
    namespace: Namespace,
}

impl OutputStore {
    /// Create a store over a namespace.
    #[must_use]
    pub const fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    /// Underlying namespace.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Encode `image` by the filename's extension and write it under
    /// `filename`. Last write wins.
    ///
    /// # Errors
    ///
    /// * `InvalidFilename` / `UnsupportedFormat` - unusable filename.
    /// * `PersistError` - encoding or writing failed; nothing is stored.
    pub fn store(&self, filename: &str, image: AnnotatedImage) -> Result<StoredArtifact> {
        check_filename(filename)?;
        let format = ImageFormat::from_filename(filename)?;

        let bytes = match image {
            AnnotatedImage::Rendered(buffer) => encode(buffer, format)?,
            AnnotatedImage::Original(bytes) => bytes,
        };

        let path = self.namespace.write(filename, &bytes)?;
        tracing::info!(filename, path = %path.display(), size = bytes.len(), "artifact stored");

        Ok(StoredArtifact {
            filename: filename.to_string(),
            path,
            format,
            size: bytes.len(),
        })
    }

    /// Bytes of the artifact stored under `filename`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no artifact has been stored under that name.
    pub fn retrieve(&self, filename: &str) -> Result<Vec<u8>> {
        self.namespace.read(filename)
    }

    /// Drop any artifact stored under `filename`.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if an existing artifact cannot be removed.
    pub fn discard(&self, filename: &str) -> Result<()> {
        if self.namespace.remove(filename)? {
            tracing::debug!(filename, "stale artifact discarded");
        }
        Ok(())
    }
}

/// Encode an image. PNG is lossless; JPEG uses [`JPEG_QUALITY`].
///
/// # Errors
///
/// Returns `PersistError` if the encoder fails.
pub fn encode(image: ImageBuffer, format: ImageFormat) -> Result<Vec<u8>> {
    let rgb = image.into_rgb_image();
    let (width, height) = rgb.dimensions();
    let mut bytes = Vec::new();

    let result = match format {
        ImageFormat::Png => PngEncoder::new(&mut bytes).write_image(
            rgb.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        ),
        ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).write_image(
            rgb.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        ),
    };
    result.map_err(|e| AnnotateError::PersistError(format!("Failed to encode image: {e}")))?;

    Ok(bytes)
}

/// The on-disk layout: a root directory with an uploads namespace and an
/// output store side by side, keyed by identical filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    uploads: Namespace,
    outputs: OutputStore,
}

impl Workspace {
    /// Create `uploads/` and `outputs/` under `root` if missing.
    ///
    /// Called once at process start.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if a directory cannot be created.
    pub fn bootstrap<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        let uploads = root.join(UPLOADS_DIR);
        let outputs = root.join(OUTPUTS_DIR);

        for dir in [&uploads, &outputs] {
            std::fs::create_dir_all(dir).map_err(|e| {
                AnnotateError::PersistError(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        tracing::debug!(root = %root.display(), "workspace ready");

        Ok(Self {
            root,
            uploads: Namespace::new(uploads),
            outputs: OutputStore::new(Namespace::new(outputs)),
        })
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Namespace of raw uploads.
    #[must_use]
    pub const fn uploads(&self) -> &Namespace {
        &self.uploads
    }

    /// Store of annotated artifacts.
    #[must_use]
    pub const fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    /// Keep the raw upload under its own filename.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilename` or `PersistError`.
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.uploads.write(filename, bytes)
    }
}
