//! Signal handling for closing the editor session.
//!
//! The headless editor holds one realtime socket and, at most, one mutation
//! awaiting its confirming push. A termination signal ends the select loop in
//! [`Application::run`](crate::app::Application::run), which then closes the
//! socket so the backend sees a clean disconnect instead of a dropped TCP
//! connection.

use std::fmt;
use tokio::signal;
use tracing::info;

/// Which signal asked the editor to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT, or Ctrl+C on Windows
    Interrupt,
    /// SIGTERM, e.g. from a process supervisor
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => f.write_str("interrupt"),
            ShutdownReason::Terminate => f.write_str("terminate"),
        }
    }
}

/// Waits until the editor is asked to stop.
///
/// # Platform Support
///
/// * **Unix platforms**: SIGINT and SIGTERM
/// * **Windows**: Ctrl+C only, always reported as [`ShutdownReason::Interrupt`]
///
/// # Returns
///
/// The signal that arrived, or an error if the handlers could not be
/// installed. Handlers are installed when the future is first polled.
///
/// # Example
///
/// ```text
/// let shutdown = shutdown_signal();
/// tokio::pin!(shutdown);
/// loop {
///     tokio::select! {
///         reason = &mut shutdown => { reason?; break; }
///         _ = editor.process_next() => {}
///     }
/// }
/// editor.close();
/// ```
pub async fn shutdown_signal() -> Result<ShutdownReason, Box<dyn std::error::Error>> {
    #[cfg(unix)]
    let reason = {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => ShutdownReason::Interrupt,
            _ = sigterm.recv() => ShutdownReason::Terminate,
        }
    };

    #[cfg(windows)]
    let reason = {
        signal::ctrl_c().await?;
        ShutdownReason::Interrupt
    };

    info!(%reason, "📡 Received shutdown signal - closing editor session");
    Ok(reason)
}
