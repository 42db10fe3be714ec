//! Network Health Logger - scheduler-facing binary
//!
//! One invocation measures once, records once, and exits; the exit code is
//! the interface the external scheduler observes.

use clap::Parser;
use network_health_logger::{
    app::App,
    cli::Cli,
    config::load_config,
    error::AppError,
    logging, PKG_NAME, VERSION,
};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    // Pick up a .env file before clap reads env-backed flags
    dotenv::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    if let Err(e) = run_application(cli).await {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;

    if cli.debug {
        tracing::info!(
            version = VERSION,
            pkg = PKG_NAME,
            data_dir = %config.data_dir.display(),
            measure_bin = %config.measure_bin,
            max_servers = config.max_servers,
            attempts_per_server = config.attempts_per_server,
            max_total_attempts = config.max_total_attempts,
            refresh_interval_minutes = config.refresh_interval_minutes,
            "configuration loaded"
        );
    }

    App::new(config).run().await.map(|_| ())
}
