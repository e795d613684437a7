// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Annotate one image through the library API.
//!
//! ```bash
//! cargo run --example annotate_image -- pose_landmark_full.onnx person.jpg
//! ```

use pose_annotate::{
    ModelKind, OnnxPoseRuntime, Pipeline, PipelineConfig, PoseDetector, RenderConfig, Result,
    UploadRequest, Workspace,
};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let model = args.next().unwrap_or_else(|| "pose_landmark_full.onnx".to_string());
    let image = args.next().unwrap_or_else(|| "person.jpg".to_string());

    // YOLO pose exports are recognised by name; everything else is BlazePose.
    let kind = if model.contains("yolo") {
        ModelKind::YoloPose
    } else {
        ModelKind::BlazePose
    };
    let config = PipelineConfig::new("runs/annotate");
    let runtime = OnnxPoseRuntime::load(&model, config.inference.clone().with_model_kind(kind))?;

    // Draw only confident joints.
    let render = RenderConfig::default().with_visibility_threshold(0.5);
    let pipeline = Pipeline::new(
        PoseDetector::new(runtime),
        Workspace::bootstrap(&config.root)?,
        render,
    );

    let request = UploadRequest::from_path(&image)?;
    let annotation = pipeline.submit(&request)?;

    match &annotation.landmarks {
        Some(set) => {
            for (i, lm) in set.iter().enumerate() {
                println!("{i:>2}: x={:.3} y={:.3} visibility={:.2}", lm.x, lm.y, lm.visibility);
            }
        }
        None => println!("No pose found; stored the original image"),
    }
    println!("Saved {}", annotation.artifact.path.display());
    Ok(())
}
