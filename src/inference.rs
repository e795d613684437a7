// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration.
//!
//! This module defines the [`InferenceConfig`] struct, which controls how the
//! ONNX pose runtime interprets its model: which output layout to decode, the
//! detection threshold, the input size and the ONNX Runtime thread count.

use std::fmt;
use std::str::FromStr;

use crate::error::AnnotateError;
use crate::visualizer::{BLAZEPOSE, COCO, Topology};

/// Output layout of a pose ONNX model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelKind {
    /// BlazePose landmark model: NHWC input, a `(1, 195)` landmark tensor
    /// (39 points x 5 values) and a `(1, 1)` pose-presence score.
    #[default]
    BlazePose,
    /// YOLO pose model: NCHW input, a `(1, 56, anchors)` tensor with box,
    /// person score and 17 keypoints per anchor.
    YoloPose,
}

impl ModelKind {
    /// Returns the string representation used on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BlazePose => "blazepose",
            Self::YoloPose => "yolo-pose",
        }
    }

    /// Landmark layout produced by this model family.
    #[must_use]
    pub const fn topology(&self) -> &'static Topology {
        match self {
            Self::BlazePose => &BLAZEPOSE,
            Self::YoloPose => &COCO,
        }
    }

    /// Default square input size as `(height, width)`.
    #[must_use]
    pub const fn default_imgsz(&self) -> (usize, usize) {
        match self {
            Self::BlazePose => (256, 256),
            Self::YoloPose => (640, 640),
        }
    }

    /// Whether the model takes channels-last (NHWC) input.
    #[must_use]
    pub const fn channels_last(&self) -> bool {
        matches!(self, Self::BlazePose)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "blazepose" | "mediapipe" => Ok(Self::BlazePose),
            "yolo-pose" | "yolo" | "pose" => Ok(Self::YoloPose),
            _ => Err(AnnotateError::ConfigError(format!(
                "unknown model kind '{s}' (expected 'blazepose' or 'yolo-pose')"
            ))),
        }
    }
}

/// Configuration for pose inference.
///
/// # Example
///
/// ```rust
/// use pose_annotate::{InferenceConfig, ModelKind};
///
/// let config = InferenceConfig::new()
///     .with_model_kind(ModelKind::YoloPose)
///     .with_min_detection_confidence(0.4)
///     .with_imgsz(640, 640);
/// ```
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Output layout to decode.
    pub model_kind: ModelKind,
    /// Minimum pose score (0.0 to 1.0) for a detection to be reported.
    /// Below it the image is treated as containing no pose.
    pub min_detection_confidence: f32,
    /// Explicit input image size (height, width).
    /// If `None`, the model kind's default is used.
    pub imgsz: Option<(usize, usize)>,
    /// Number of intra-op threads for ONNX Runtime.
    /// Setting this to `0` allows ONNX Runtime to choose the optimal number.
    pub num_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::default(),
            min_detection_confidence: 0.5,
            imgsz: None,
            num_threads: 0,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model output layout.
    #[must_use]
    pub const fn with_model_kind(mut self, kind: ModelKind) -> Self {
        self.model_kind = kind;
        self
    }

    /// Set the minimum detection confidence.
    #[must_use]
    pub const fn with_min_detection_confidence(mut self, threshold: f32) -> Self {
        self.min_detection_confidence = threshold;
        self
    }

    /// Set the input image size.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of threads for inference.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Effective input size as `(height, width)`.
    #[must_use]
    pub fn input_size(&self) -> (usize, usize) {
        self.imgsz.unwrap_or_else(|| self.model_kind.default_imgsz())
    }

    /// Check the configuration for values the runtime cannot use.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a threshold outside [0, 1] or a zero input
    /// dimension.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(AnnotateError::ConfigError(format!(
                "min_detection_confidence must be within [0, 1], got {}",
                self.min_detection_confidence
            )));
        }
        let (h, w) = self.input_size();
        if h == 0 || w == 0 {
            return Err(AnnotateError::ConfigError(format!(
                "input size must be non-zero, got {h}x{w}"
            )));
        }
        Ok(())
    }
}
