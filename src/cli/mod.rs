// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface: argument parsing, console output and the
//! `annotate` and `serve` commands.

// Modules
/// CLI arguments.
pub mod args;

/// Console output macros and tracing setup.
pub mod logging;

/// The `annotate` command.
pub mod annotate;

/// The `serve` command.
#[cfg(feature = "server")]
pub mod serve;
