pub mod cli;
pub mod error;
pub mod output;
pub mod scenario;

use std::process::ExitCode;

use clap::Parser;
use techstore_worker::WorkerConfig;

use crate::cli::{Cli, Command};
use crate::error::DemoError;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(report) => match output::emit(cli.output, &report) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                output::emit_error(cli.output, 2, &e.to_string());
                ExitCode::from(2)
            }
        },
        Err(e) => {
            output::emit_error(cli.output, e.code(), &e.to_string());
            e.exit_code()
        }
    }
}

async fn run(cli: &Cli) -> Result<serde_json::Value, DemoError> {
    let config = match &cli.config {
        Some(path) => WorkerConfig::load(path)?,
        None => WorkerConfig::default(),
    };
    log::info!("using {}", config.cache_version());

    let report = match &cli.command {
        Command::Config => serde_json::to_value(&config)?,
        Command::Session(args) => serde_json::to_value(scenario::run_session(config, args).await?)?,
        Command::Update(args) => serde_json::to_value(scenario::run_update(config, args).await?)?,
        Command::Push(args) => serde_json::to_value(scenario::run_push(config, args).await?)?,
    };
    Ok(report)
}
