//! Binary entry point for the cardinality-estimation benchmark.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use cetest::config::{default_config_path, ConfigError};
use cetest::logging::init_logging;
use cetest::run_with_config;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "cetest",
    version,
    about = "Measures how well a query optimizer estimates cardinalities"
)]
struct Cli {
    #[arg(
        long,
        short,
        env = "CETEST_CONFIG",
        value_name = "FILE",
        help = "Benchmark configuration (TOML)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        default_value = "info",
        value_name = "FILTER",
        help = "Log filter, overridden by RUST_LOG"
    )]
    log_level: String,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    let path = cli
        .config
        .or_else(default_config_path)
        .ok_or(ConfigError::NoConfigPath)?;
    let files = run_with_config(&path).await?;
    println!(
        "report written to {} and {}",
        files.json.display(),
        files.csv.display()
    );
    Ok(())
}
