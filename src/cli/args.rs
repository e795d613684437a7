// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::annotate::RenderConfig;
use crate::error::Result;
use crate::inference::{InferenceConfig, ModelKind};
use crate::pipeline::PipelineConfig;

/// Default model file looked up in the working directory.
pub const DEFAULT_MODEL: &str = "pose_landmark_full.onnx";

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    pose-annotate annotate --model pose_landmark_full.onnx --source person.jpg
    pose-annotate annotate -m yolo11n-pose.onnx --model-kind yolo-pose -s person.png --show
    pose-annotate serve --model pose_landmark_full.onnx --port 5000
    MODEL_PATH=pose.onnx DATA_DIR=/srv/poses pose-annotate serve"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate a single local image
    Annotate(AnnotateArgs),
    /// Serve the upload form and annotated artifacts over HTTP
    Serve(ServeArgs),
}

/// Model selection shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Path to ONNX pose model file
    #[arg(short, long, env = "MODEL_PATH", default_value = DEFAULT_MODEL)]
    pub model: PathBuf,

    /// Output layout of the model (blazepose or yolo-pose)
    #[arg(long, env = "MODEL_KIND", default_value = "blazepose")]
    pub model_kind: ModelKind,

    /// Minimum pose score for a detection
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// Inference image size (square)
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// ONNX Runtime intra-op threads (0 = automatic)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

impl ModelArgs {
    /// Build and validate the inference configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for out-of-range values.
    pub fn inference_config(&self) -> Result<InferenceConfig> {
        let mut config = InferenceConfig::new()
            .with_model_kind(self.model_kind)
            .with_min_detection_confidence(self.conf)
            .with_threads(self.threads);
        if let Some(sz) = self.imgsz {
            config = config.with_imgsz(sz, sz);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Storage and overlay options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Directory holding uploads/ and outputs/
    #[arg(long, env = "DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Skip landmarks below this visibility (draws everything if unset)
    #[arg(long)]
    pub min_visibility: Option<f32>,
}

impl OutputArgs {
    /// Overlay style for these options.
    #[must_use]
    pub fn render_config(&self) -> RenderConfig {
        let config = RenderConfig::new();
        match self.min_visibility {
            Some(threshold) => config.with_visibility_threshold(threshold),
            None => config,
        }
    }
}

/// Build the pipeline configuration from model and output options.
///
/// # Errors
///
/// Returns `ConfigError` for out-of-range values.
pub fn pipeline_config(model: &ModelArgs, output: &OutputArgs) -> Result<PipelineConfig> {
    Ok(PipelineConfig::new(&output.data_dir)
        .with_inference(model.inference_config()?)
        .with_render(output.render_config()))
}

/// Arguments for the annotate command.
#[derive(Args, Debug)]
pub struct AnnotateArgs {
    #[command(flatten)]
    /// Model selection.
    pub model: ModelArgs,

    #[command(flatten)]
    /// Storage and overlay options.
    pub output: OutputArgs,

    /// Image file to annotate (png, jpg, jpeg)
    #[arg(short, long)]
    pub source: PathBuf,

    /// Display the result in a window
    #[arg(long, default_value_t = false)]
    pub show: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    /// Model selection.
    pub model: ModelArgs,

    #[command(flatten)]
    /// Storage and overlay options.
    pub output: OutputArgs,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,
}
