mod app;
mod catalog;
mod cli;
mod config;
mod db;
mod http;
mod paths;
mod player;

use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(&cli)?;
    app::run(cli)
}

/// The watch view owns the terminal, so it logs nothing unless `--log-file`
/// or `RUST_LOG` says otherwise. Other commands keep warnings on stderr.
fn init_logging(cli: &cli::Cli) -> Result<()> {
    let watching = matches!(cli.command, cli::Command::Watch { .. });
    let default_filter = if watching && cli.log_file.is_none() {
        "off"
    } else {
        "warn"
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if let Some(path) = &cli.log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
