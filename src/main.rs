// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process::ExitCode;

use clap::Parser;

use pose_annotate::cli::annotate::run_annotate;
use pose_annotate::cli::args::{Cli, Commands};
use pose_annotate::cli::logging::init_tracing;
use pose_annotate::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Annotate(args) => {
            init_tracing("warn");
            run_annotate(args)
        }
        Commands::Serve(args) => {
            init_tracing("info");
            serve(args)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "server")]
fn serve(args: &pose_annotate::cli::args::ServeArgs) -> pose_annotate::Result<()> {
    pose_annotate::cli::serve::run_serve(args)
}

#[cfg(not(feature = "server"))]
fn serve(_args: &pose_annotate::cli::args::ServeArgs) -> pose_annotate::Result<()> {
    Err(pose_annotate::AnnotateError::ConfigError(
        "this build has no HTTP server; rebuild with --features server".to_string(),
    ))
}
