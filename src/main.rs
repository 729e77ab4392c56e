//! brickval - toy appraisal CLI.
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use brickval::cli::{Cli, Commands, appraise};
use brickval::core::logging;
use brickval::render::render_error;
use brickval::storage::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(|| logging::parse_log_level_from_env().map(logging::LogLevel::from_tracing_level))
        .unwrap_or_default();
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    let no_color = cli.no_color;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{}", render_error(&e, no_color));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> brickval::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let format = cli.effective_format();

    match &cli.command {
        Commands::Appraise(args) => {
            appraise::run(args, &config, format, cli.pretty, cli.no_color).await
        }
    }
}
