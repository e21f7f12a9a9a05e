#![cfg(not(tarpaulin_include))]

use clap::Parser;
use recetario::{app, config::Config};

/// Main entry point for the recipe web application
///
/// Reads the configuration from flags and environment, sets up logging and
/// serves the API until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    env_logger::Builder::new()
        .parse_filters(&config.log_level)
        .parse_default_env()
        .init();

    app::run(config).await
}
