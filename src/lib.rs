// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Pose Annotation
//!
//! Single-image human pose annotation. An uploaded PNG or JPEG is validated
//! and decoded, a pose-landmark model runs over it, and the detected joints
//! and bones are drawn onto the original pixels. The result is stored under
//! the upload's own filename for later retrieval.
//!
//! ## Pipeline
//!
//! 1. **Validate** - [`validate()`] checks the filename and extension and
//!    decodes the bytes into an [`ImageBuffer`].
//! 2. **Detect** - [`PoseDetector`] converts the image to the model's channel
//!    order and runs one [`PoseRuntime`] context, returning a [`LandmarkSet`]
//!    or `None`.
//! 3. **Render** - [`render()`] draws red bones, then green joints. Without a
//!    pose the image passes through unchanged.
//! 4. **Store** - [`OutputStore`] encodes by extension and writes atomically
//!    under `outputs/`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pose_annotate::{Pipeline, PipelineConfig, UploadRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::open("pose_landmark_full.onnx", PipelineConfig::new("data"))?;
//!
//! let request = UploadRequest::from_path("person.jpg")?;
//! let annotation = pipeline.submit(&request)?;
//!
//! println!(
//!     "{} -> {} (pose: {})",
//!     request.filename,
//!     annotation.artifact.path.display(),
//!     annotation.pose_detected()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Command Line
//!
//! ```bash
//! # Annotate a single image into ./data/outputs
//! pose-annotate annotate --model pose_landmark_full.onnx --source person.jpg --data-dir data
//!
//! # Serve the upload form on port 5000
//! pose-annotate serve --model pose_landmark_full.onnx
//! ```
//!
//! ## Models
//!
//! | Kind | Landmarks | Input |
//! |------|-----------|-------|
//! | `blazepose` | 33, MediaPipe body topology | 256x256 NHWC |
//! | `yolo-pose` | 17, COCO topology | 640x640 NCHW |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `server` | HTTP upload form and artifact server (default) |
//! | `visualize` | Result window for `annotate --show` |

// Modules
pub mod annotate;
pub mod cli;
pub mod detect;
pub mod error;
pub mod inference;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod raster;
pub mod results;
#[cfg(feature = "server")]
pub mod server;
pub mod validate;
pub mod visualizer;

// Re-export main types for convenience
pub use annotate::{DrawingSpec, RenderConfig, render};
pub use detect::PoseDetector;
pub use error::{AnnotateError, Result};
pub use inference::{InferenceConfig, ModelKind};
pub use io::{AnnotatedImage, Namespace, OutputStore, StoredArtifact, Workspace};
pub use model::{OnnxPoseRuntime, PoseContext, PoseRuntime};
pub use pipeline::{Annotation, Pipeline, PipelineConfig, UploadRequest};
pub use raster::{ChannelOrder, ImageBuffer};
pub use results::{Landmark, LandmarkSet};
pub use validate::{ImageFormat, allowed_file, validate};
pub use visualizer::{BLAZEPOSE, COCO, Color, Topology};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pose-annotate");
    }
}
