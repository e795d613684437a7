// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::cli::args::{ServeArgs, pipeline_config};
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::server::{AppState, serve};
use crate::{VERSION, section, verbose};

/// Load the model, bootstrap the data directory and serve until Ctrl-C.
///
/// # Errors
///
/// Returns model, workspace or bind errors; request errors are answered
/// over HTTP and never end the server.
pub fn run_serve(args: &ServeArgs) -> Result<()> {
    let config = pipeline_config(&args.model, &args.output)?;

    section!("pose-annotate {VERSION} server");
    verbose!(
        "Model: {} ({}), data: {}",
        args.model.model.display(),
        config.inference.model_kind,
        config.root.display()
    );

    let pipeline = Pipeline::open(&args.model.model, config)?;
    let addr = format!("{}:{}", args.host, args.port);
    verbose!("Listening on http://{addr} (Swagger UI at /swagger-ui/)");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(&addr, AppState::new(pipeline)))
}
