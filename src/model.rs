// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose model runtimes.
//!
//! A [`PoseRuntime`] is the long-lived, shareable handle on a model; it hands
//! out one [`PoseContext`] per request. Contexts own whatever per-inference
//! state the backend needs and release it when dropped, so a request that
//! fails half-way still gives its context back.
//!
//! [`OnnxPoseRuntime`] is the shipped backend: it keeps the ONNX file's bytes
//! in memory and builds a fresh ONNX Runtime session for every context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::error::{AnnotateError, Result};
use crate::inference::InferenceConfig;
use crate::postprocessing::{RawOutput, postprocess};
use crate::preprocessing::{TensorLayout, preprocess_image};
use crate::raster::{ChannelOrder, ImageBuffer};
use crate::results::Landmark;
use crate::visualizer::Topology;

/// A pose-landmark model that can be opened once per request.
pub trait PoseRuntime: Send + Sync {
    /// Per-request model state, released on drop.
    type Context: PoseContext;

    /// Acquire a fresh model context.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` if the backend cannot create a context.
    fn open(&self) -> Result<Self::Context>;

    /// Landmark layout the model produces.
    fn topology(&self) -> &'static Topology;

    /// Channel order the model expects its pixels in.
    fn input_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }
}

/// One acquired model context.
pub trait PoseContext {
    /// Run the model once on interleaved 3-channel pixels.
    ///
    /// Returns normalized landmarks for the single most prominent pose, or
    /// `None` when no pose is found.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` if the model rejects the input or fails.
    fn infer(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Option<Vec<Landmark>>>;
}

/// ONNX Runtime backed pose model.
///
/// # Example
///
/// ```no_run
/// use pose_annotate::{InferenceConfig, OnnxPoseRuntime, PoseDetector};
///
/// let runtime = OnnxPoseRuntime::load("pose_landmark_full.onnx", InferenceConfig::default())?;
/// let detector = PoseDetector::new(runtime);
/// # Ok::<(), pose_annotate::AnnotateError>(())
/// ```
#[derive(Clone)]
pub struct OnnxPoseRuntime {
    model_bytes: Arc<[u8]>,
    model_path: PathBuf,
    config: InferenceConfig,
}

impl OnnxPoseRuntime {
    /// Load an ONNX pose model from disk.
    ///
    /// A session is built once here so that a broken model fails at startup
    /// rather than on the first request.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid configuration and
    /// `ModelLoadError` if the file is missing or not a loadable model.
    pub fn load<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();

        if !path.exists() {
            return Err(AnnotateError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let model_bytes: Arc<[u8]> = std::fs::read(path)
            .map_err(|e| {
                AnnotateError::ModelLoadError(format!("Failed to read {}: {e}", path.display()))
            })?
            .into();

        let probe = build_session(&model_bytes, &config)
            .map_err(|e| AnnotateError::ModelLoadError(e.to_string()))?;
        tracing::info!(
            model = %path.display(),
            kind = %config.model_kind,
            inputs = probe.inputs.len(),
            outputs = probe.outputs.len(),
            "pose model loaded"
        );

        Ok(Self {
            model_bytes,
            model_path: path.to_path_buf(),
            config,
        })
    }

    /// Path the model was loaded from.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Inference configuration in use.
    #[must_use]
    pub const fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

impl std::fmt::Debug for OnnxPoseRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPoseRuntime")
            .field("model_path", &self.model_path)
            .field("model_kind", &self.config.model_kind)
            .field("imgsz", &self.config.input_size())
            .finish_non_exhaustive()
    }
}

fn build_session(model_bytes: &[u8], config: &InferenceConfig) -> Result<Session> {
    Session::builder()
        .map_err(|e| AnnotateError::InferenceError(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| AnnotateError::InferenceError(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(config.num_threads)
        .map_err(|e| AnnotateError::InferenceError(format!("Failed to set intra-thread count: {e}")))?
        .commit_from_memory(model_bytes)
        .map_err(|e| AnnotateError::InferenceError(format!("Failed to create session: {e}")))
}

impl PoseRuntime for OnnxPoseRuntime {
    type Context = OnnxPoseContext;

    fn open(&self) -> Result<Self::Context> {
        let session = build_session(&self.model_bytes, &self.config)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| AnnotateError::InferenceError("Model has no inputs".to_string()))?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        tracing::debug!(%input_name, outputs = output_names.len(), "model context opened");

        Ok(OnnxPoseContext {
            session,
            input_name,
            output_names,
            config: self.config.clone(),
        })
    }

    fn topology(&self) -> &'static Topology {
        self.config.model_kind.topology()
    }
}

/// A per-request ONNX Runtime session.
pub struct OnnxPoseContext {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
    config: InferenceConfig,
}

impl OnnxPoseContext {
    /// Run the session and copy every output out as an f32 tensor.
    fn run_inference(&mut self, input: &ndarray::Array4<f32>) -> Result<Vec<RawOutput>> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous)
            .map_err(|e| AnnotateError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| AnnotateError::InferenceError(format!("Inference failed: {e}")))?;

        let mut raw = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let output = outputs
                .get(name.as_str())
                .ok_or_else(|| AnnotateError::InferenceError(format!("Output '{name}' not found")))?;
            let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
                AnnotateError::InferenceError(format!("Failed to extract output '{name}': {e}"))
            })?;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let shape_vec: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            raw.push((data.to_vec(), shape_vec));
        }
        Ok(raw)
    }
}

impl PoseContext for OnnxPoseContext {
    fn infer(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Option<Vec<Landmark>>> {
        let image = ImageBuffer::from_raw(width, height, ChannelOrder::Rgb, pixels.to_vec())
            .map_err(|e| AnnotateError::InferenceError(e.to_string()))?;

        let layout = if self.config.model_kind.channels_last() {
            TensorLayout::Nhwc
        } else {
            TensorLayout::Nchw
        };

        let start = Instant::now();
        let preprocess = preprocess_image(&image, self.config.input_size(), layout)?;
        let outputs = self.run_inference(&preprocess.tensor)?;
        let landmarks = postprocess(&outputs, &preprocess, &self.config)?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            found = landmarks.is_some(),
            "inference finished"
        );
        Ok(landmarks)
    }
}

impl Drop for OnnxPoseContext {
    fn drop(&mut self) {
        tracing::debug!("model context released");
    }
}
