//! Logging system setup and configuration.
//!
//! Installs the global tracing subscriber for the headless editor. The
//! `pcv_sync` engine logs every push, fetch generation and pending-operation
//! transition with structured fields (`uid`, `kind`, `generation`), so the
//! JSON output is meant to be queried, and the human-readable output is
//! meant for watching one session from a terminal.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Transport crates that are chatty at `debug` and below.
const QUIET_DEPENDENCIES: [&str; 5] = ["hyper", "hyper_util", "reqwest", "rustls", "tungstenite"];

/// Builds the default filter directives for `level`.
///
/// The editor's own crates follow `level`; the HTTP and WebSocket stacks are
/// capped at `info` so that `debug` shows sync traffic rather than frame
/// and handshake internals.
fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    if matches!(level, "trace" | "debug") {
        directives.extend(QUIET_DEPENDENCIES.iter().map(|dependency| format!("{dependency}=info")));
    }
    directives.join(",")
}

/// Initializes the logging system with the specified configuration.
///
/// # Arguments
///
/// * `config` - Logging configuration, with any `--log-level` override applied
/// * `json_format` - Whether to force JSON output format (CLI override)
///
/// # Returns
///
/// `Ok(())` if logging was set up successfully, or an error if a global
/// subscriber was already installed.
///
/// # Features
///
/// * **Environment variable support** - `RUST_LOG` replaces the configured
///   directives entirely when set
/// * **Flexible formatting** - Human-readable or JSON output
/// * **Thread information** - Socket and fetch tasks run on the tokio pool,
///   so thread ids tell concurrent completions apart
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let directives = default_directives(&config.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let registry = tracing_subscriber::registry().with(filter);
    let json = json_format || config.json_format;

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(true),
            )
            .try_init()?;
    }

    info!(level = %config.level, json, "🔧 Logging initialized");
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🎛️  PCV EDITOR  🎛️              ║");
    info!("║                 v{}                   ║", version);
    info!("║                                          ║");
    info!("║  Realtime VIP / grant / code mirror      ║");
    info!("╚══════════════════════════════════════════╝");
}
