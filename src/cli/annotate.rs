// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::time::Instant;

use crate::cli::args::{AnnotateArgs, pipeline_config};
use crate::error::Result;
use crate::pipeline::{Pipeline, UploadRequest};
use crate::{VERSION, section, success, verbose, warn};

/// Annotate one local image into the data directory.
///
/// # Errors
///
/// Returns the first pipeline error; nothing is stored in that case.
pub fn run_annotate(args: &AnnotateArgs) -> Result<()> {
    crate::cli::logging::set_verbose(args.verbose);
    let config = pipeline_config(&args.model, &args.output)?;

    section!("pose-annotate {VERSION}");
    verbose!(
        "Model: {} ({})",
        args.model.model.display(),
        config.inference.model_kind
    );

    let pipeline = Pipeline::open(&args.model.model, config)?;
    let request = UploadRequest::from_path(&args.source)?;

    let start = Instant::now();
    let annotation = pipeline.submit(&request)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match &annotation.landmarks {
        Some(set) => verbose!(
            "{}: {} landmarks ({}), {elapsed_ms:.1}ms",
            request.filename,
            set.len(),
            set.topology().name
        ),
        None => {
            warn!("No pose detected in {}, stored unchanged", request.filename);
        }
    }
    success!(
        "Saved {} ({} bytes)",
        annotation.artifact.path.display(),
        annotation.artifact.size
    );

    if args.show {
        show(&annotation)?;
    }
    Ok(())
}

#[cfg(feature = "visualize")]
fn show(annotation: &crate::pipeline::Annotation) -> Result<()> {
    use crate::error::AnnotateError;
    use crate::raster::ImageBuffer;
    use crate::visualizer::Viewer;

    let bytes = std::fs::read(&annotation.artifact.path)?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| AnnotateError::VisualizerError(format!("Failed to reload result: {e}")))?;
    let image = ImageBuffer::from_dynamic(&decoded)?;

    let mut viewer = Viewer::new(
        &annotation.artifact.filename,
        image.width() as usize,
        image.height() as usize,
    )?;
    viewer.show(&image)
}

#[cfg(not(feature = "visualize"))]
#[allow(clippy::unnecessary_wraps)]
fn show(_annotation: &crate::pipeline::Annotation) -> Result<()> {
    warn!("--show requires the 'visualize' feature; rebuild with --features visualize");
    Ok(())
}
