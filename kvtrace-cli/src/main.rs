//! kvtrace entry point.

use clap::Parser;
use kvtrace_cli::app::App;
use kvtrace_cli::args::Cli;
use kvtrace_cli::config;
use kvtrace_cli::error::CliError;
use kvtrace_cli::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let config = config::load(cli.config)?;
    init_logging(&config.logging)?;

    let app = App::new(config)?;
    app.run(cli.command, &mut std::io::stdout(), &mut std::io::stderr())
        .await
}
