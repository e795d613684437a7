// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The annotation pipeline: validate, detect, render, store.
//!
//! Stages run strictly forward on one request at a time. Finding no pose is
//! a normal outcome that stores the upload unchanged; every error is
//! terminal and leaves no artifact under the request's filename.

use std::path::{Path, PathBuf};

use crate::annotate::{RenderConfig, render};
use crate::detect::PoseDetector;
use crate::error::{AnnotateError, Result};
use crate::inference::InferenceConfig;
use crate::io::{AnnotatedImage, StoredArtifact, Workspace};
use crate::model::{OnnxPoseRuntime, PoseRuntime};
use crate::results::LandmarkSet;
use crate::validate::{ImageFormat, check_filename, validate};

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Client-supplied filename; also the artifact's name.
    pub filename: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    /// Create a request.
    pub fn new<S: Into<String>>(filename: S, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a local file, naming the request after its file name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilename` if the path has no UTF-8 file name and
    /// `Io` if it cannot be read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AnnotateError::InvalidFilename(format!("{} has no file name", path.display()))
            })?
            .to_string();
        let bytes = std::fs::read(path)?;
        Ok(Self { filename, bytes })
    }
}

/// Settings for building a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root holding `uploads/` and `outputs/`.
    pub root: PathBuf,
    /// Model settings.
    pub inference: InferenceConfig,
    /// Overlay style.
    pub render: RenderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            inference: InferenceConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Set the model settings.
    #[must_use]
    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    /// Set the overlay style.
    #[must_use]
    pub const fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Where the artifact was stored.
    pub artifact: StoredArtifact,
    /// The detected pose, or `None` when the image was stored unchanged.
    pub landmarks: Option<LandmarkSet>,
}

impl Annotation {
    /// Whether a pose was found and drawn.
    #[must_use]
    pub const fn pose_detected(&self) -> bool {
        self.landmarks.is_some()
    }
}

/// The four-stage annotation pipeline over a pose runtime.
#[derive(Debug)]
pub struct Pipeline<R> {
    detector: PoseDetector<R>,
    workspace: Workspace,
    render: RenderConfig,
}

impl Pipeline<OnnxPoseRuntime> {
    /// Load an ONNX model and bootstrap the workspace.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoadError`/`ConfigError` for the model and
    /// `PersistError` if the workspace cannot be created.
    pub fn open<P: AsRef<Path>>(model_path: P, config: PipelineConfig) -> Result<Self> {
        let runtime = OnnxPoseRuntime::load(model_path, config.inference)?;
        let workspace = Workspace::bootstrap(config.root)?;
        Ok(Self::new(PoseDetector::new(runtime), workspace, config.render))
    }
}

impl<R: PoseRuntime> Pipeline<R> {
    /// Assemble a pipeline from its parts.
    pub const fn new(detector: PoseDetector<R>, workspace: Workspace, render: RenderConfig) -> Self {
        Self {
            detector,
            workspace,
            render,
        }
    }

    /// Storage layout in use.
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Pose detector in use.
    pub const fn detector(&self) -> &PoseDetector<R> {
        &self.detector
    }

    /// Keep the raw upload, then annotate it.
    ///
    /// Names that could never be annotated are refused before anything is
    /// written. If the upload cannot be saved, an earlier artifact under the
    /// same name is discarded as in [`Pipeline::process`].
    ///
    /// # Errors
    ///
    /// See [`Pipeline::process`]; saving the upload may also fail with
    /// `PersistError`.
    pub fn submit(&self, request: &UploadRequest) -> Result<Annotation> {
        check_filename(&request.filename)?;
        ImageFormat::from_filename(&request.filename)?;
        if let Err(e) = self.workspace.save_upload(&request.filename, &request.bytes) {
            tracing::warn!(filename = %request.filename, error = %e, "upload not saved");
            self.discard_stale(&request.filename);
            return Err(e);
        }
        self.process(request)
    }

    /// Annotate one upload and store the result under its filename.
    ///
    /// On any error, an artifact previously stored under the same filename is
    /// discarded as well, so retrieval never returns a result that does not
    /// belong to the latest upload.
    ///
    /// # Errors
    ///
    /// * `InvalidFilename`, `UnsupportedFormat`, `DecodeError` - bad input.
    /// * `InferenceError` - the model failed.
    /// * `PersistError` - the artifact could not be written.
    #[tracing::instrument(skip_all, fields(filename = %request.filename, size = request.bytes.len()))]
    pub fn process(&self, request: &UploadRequest) -> Result<Annotation> {
        let result = self.run(request);

        if let Err(e) = &result {
            tracing::warn!(error = %e, "annotation failed");
            self.discard_stale(&request.filename);
        }
        result
    }

    fn discard_stale(&self, filename: &str) {
        if let Err(e) = self.workspace.outputs().discard(filename) {
            tracing::debug!(error = %e, "nothing discarded");
        }
    }

    fn run(&self, request: &UploadRequest) -> Result<Annotation> {
        let image = validate(&request.filename, &request.bytes)?;
        tracing::debug!(width = image.width(), height = image.height(), "upload decoded");

        let landmarks = self.detector.detect(&image)?;

        let annotated = match &landmarks {
            Some(set) => {
                tracing::debug!(landmarks = set.len(), topology = set.topology().name, "pose detected");
                AnnotatedImage::Rendered(render(image, Some(set), &self.render))
            }
            None => {
                tracing::warn!("no pose detected, storing upload unchanged");
                AnnotatedImage::Original(request.bytes.clone())
            }
        };

        let artifact = self.workspace.outputs().store(&request.filename, annotated)?;
        Ok(Annotation {
            artifact,
            landmarks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PoseContext;
    use crate::results::Landmark;
    use crate::visualizer::{COCO, Topology};
    use std::io::Cursor;

    #[derive(Clone, Copy)]
    enum Fake {
        Pose,
        NoPose,
        Broken,
    }

    impl PoseRuntime for Fake {
        type Context = Self;

        fn open(&self) -> Result<Self> {
            Ok(*self)
        }

        fn topology(&self) -> &'static Topology {
            &COCO
        }
    }

    impl PoseContext for Fake {
        fn infer(&mut self, _pixels: &[u8], _w: u32, _h: u32) -> Result<Option<Vec<Landmark>>> {
            match self {
                Self::Pose => Ok(Some(
                    (0..17)
                        .map(|i| Landmark::new(0.2 + 0.03 * i as f32, 0.1 + 0.05 * i as f32, 0.9))
                        .collect(),
                )),
                Self::NoPose => Ok(None),
                Self::Broken => Err(AnnotateError::InferenceError("model crashed".to_string())),
            }
        }
    }

    fn pipeline(fake: Fake) -> (tempfile::TempDir, Pipeline<Fake>) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::bootstrap(dir.path()).unwrap();
        let pipeline = Pipeline::new(PoseDetector::new(fake), workspace, RenderConfig::default());
        (dir, pipeline)
    }

    fn encoded(format: image::ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_fn(40, 30, |x, y| image::Rgb([x as u8 * 5, y as u8 * 7, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_pose_is_rendered_and_stored() {
        let (_dir, pipeline) = pipeline(Fake::Pose);
        let request = UploadRequest::new("person.png", encoded(image::ImageFormat::Png));
        let annotation = pipeline.process(&request).unwrap();

        assert!(annotation.pose_detected());
        assert_eq!(annotation.artifact.filename, "person.png");
        let stored = pipeline.workspace().outputs().retrieve("person.png").unwrap();
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
        assert_ne!(stored, request.bytes);
    }

    #[test]
    fn test_no_pose_stores_upload_verbatim() {
        let (_dir, pipeline) = pipeline(Fake::NoPose);
        let request = UploadRequest::new("blank.jpg", encoded(image::ImageFormat::Jpeg));
        let annotation = pipeline.process(&request).unwrap();

        assert!(!annotation.pose_detected());
        assert_eq!(pipeline.workspace().outputs().retrieve("blank.jpg").unwrap(), request.bytes);
    }

    #[test]
    fn test_process_is_deterministic() {
        let (_dir, pipeline) = pipeline(Fake::Pose);
        let request = UploadRequest::new("p.jpg", encoded(image::ImageFormat::Jpeg));
        pipeline.process(&request).unwrap();
        let first = pipeline.workspace().outputs().retrieve("p.jpg").unwrap();
        pipeline.process(&request).unwrap();
        let second = pipeline.workspace().outputs().retrieve("p.jpg").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inference_failure_stores_nothing() {
        let (_dir, pipeline) = pipeline(Fake::Broken);
        let request = UploadRequest::new("p.png", encoded(image::ImageFormat::Png));
        let err = pipeline.process(&request).unwrap_err();
        assert!(matches!(err, AnnotateError::InferenceError(_)));
        assert!(matches!(
            pipeline.workspace().outputs().retrieve("p.png").unwrap_err(),
            AnnotateError::NotFound(_)
        ));
    }

    #[test]
    fn test_failed_request_discards_stale_artifact() {
        let (_dir, pipeline) = pipeline(Fake::NoPose);
        pipeline
            .process(&UploadRequest::new("p.png", encoded(image::ImageFormat::Png)))
            .unwrap();

        let err = pipeline.process(&UploadRequest::new("p.png", Vec::new())).unwrap_err();
        assert!(matches!(err, AnnotateError::DecodeError(_)));
        assert!(matches!(
            pipeline.workspace().outputs().retrieve("p.png").unwrap_err(),
            AnnotateError::NotFound(_)
        ));
    }

    #[test]
    fn test_unsaved_upload_discards_stale_artifact() {
        let (dir, pipeline) = pipeline(Fake::NoPose);
        let request = UploadRequest::new("p.png", encoded(image::ImageFormat::Png));
        pipeline.submit(&request).unwrap();
        std::fs::remove_dir_all(dir.path().join("uploads")).unwrap();

        let err = pipeline.submit(&request).unwrap_err();
        assert!(matches!(err, AnnotateError::PersistError(_)));
        assert!(matches!(
            pipeline.workspace().outputs().retrieve("p.png").unwrap_err(),
            AnnotateError::NotFound(_)
        ));
    }

    #[test]
    fn test_submit_keeps_upload() {
        let (_dir, pipeline) = pipeline(Fake::NoPose);
        let request = UploadRequest::new("keep.png", encoded(image::ImageFormat::Png));
        pipeline.submit(&request).unwrap();
        assert_eq!(pipeline.workspace().uploads().read("keep.png").unwrap(), request.bytes);
    }

    #[test]
    fn test_unsupported_extension_rejected_before_storage() {
        let (_dir, pipeline) = pipeline(Fake::Pose);
        let err = pipeline
            .submit(&UploadRequest::new("notes.txt", encoded(image::ImageFormat::Png)))
            .unwrap_err();
        assert!(matches!(err, AnnotateError::UnsupportedFormat(_)));
        assert!(matches!(
            pipeline.workspace().uploads().read("notes.txt").unwrap_err(),
            AnnotateError::NotFound(_)
        ));
    }

    #[test]
    fn test_request_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.png");
        std::fs::write(&path, b"abc").unwrap();
        let request = UploadRequest::from_path(&path).unwrap();
        assert_eq!(request.filename, "local.png");
        assert_eq!(request.bytes, b"abc");
    }
}
