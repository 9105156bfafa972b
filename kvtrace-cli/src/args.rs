//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kvtrace_core::OperationId;

use crate::config::CONFIG_ENV_VAR;

/// Instrumented key-value cache with call replay and access counting.
#[derive(Debug, Parser)]
#[command(name = "kvtrace", version, about)]
pub struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Store 'foo', 'bar' and 42 and replay Cache.store
    Demo {
        /// Flush the store first
        #[arg(long)]
        fresh: bool,
    },
    /// Print the recorded calls of an operation
    Replay {
        /// Operation id, e.g. Cache.store
        #[arg(value_parser = parse_operation_id)]
        operation: OperationId,
    },
    /// Fetch a page and count the access
    Fetch { url: String },
    /// Delete every key in the store
    Flush,
}

fn parse_operation_id(raw: &str) -> Result<OperationId, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("operation id must not be empty".to_string());
    }
    Ok(OperationId::new(raw))
}
