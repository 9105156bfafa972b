//! kvtrace CLI library: argument parsing, config loading, logging setup and
//! command execution for the `kvtrace` binary.

pub mod app;
pub mod args;
pub mod config;
pub mod error;
pub mod logging;

pub use app::{open_store, App};
pub use args::{Cli, Command};
pub use error::CliError;
