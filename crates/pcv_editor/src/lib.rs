//! # PCV Editor - Headless Editor Session
//!
//! Opens one Playcore editor session for a `uid`, mirrors its VIP packages,
//! active grants and codes in memory, and logs every realtime transition
//! until it is told to stop.
//!
//! ## Quick Start
//!
//! ```bash
//! # Mirror a session with the default configuration
//! pcv-editor --uid 3f2a
//!
//! # Point at another backend and load codes right away
//! pcv-editor --uid 3f2a --api-url https://portal.example.com/api --load-codes
//!
//! # JSON logging for production
//! pcv-editor --uid 3f2a --json-logs
//! ```
//!
//! ## Configuration
//!
//! Settings are read from a TOML file (default: `pcv-editor.toml`). If the
//! file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The session is closed cleanly on SIGINT (Ctrl+C) and SIGTERM.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;

/// Entry point of the `pcv-editor` binary.
///
/// # Exit Codes
///
/// * **0**: Session closed after a shutdown signal
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration from {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };

    let log_level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let logging = config::LoggingSettings {
        level: log_level,
        ..config.logging.clone()
    };
    if let Err(e) = logging::setup_logging(&logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args, config) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{AppConfig, LoggingSettings, SessionSettings};
