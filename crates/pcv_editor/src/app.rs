//! Main application logic and lifecycle management.
//!
//! The `Application` opens one editor session, mirrors it until a
//! termination signal arrives, and logs every channel transition and
//! notification along the way.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals::shutdown_signal};
use pcv_sync::{
    ChannelStatus, CodesView, EditorController, EditorError, HttpApi, Indicator, Uid, ViewState,
};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior, Sleep};
use tracing::{error, info, warn};

const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// A configured editor session, ready to run.
pub struct Application {
    config: AppConfig,
    editor: EditorController<HttpApi>,
    load_codes: bool,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    /// * `config` - Configuration loaded from the file named in `args`
    ///
    /// # Process
    ///
    /// 1. Apply command-line argument overrides
    /// 2. Validate merged configuration
    /// 3. Resolve the session uid
    /// 4. Build the REST client and the editor controller
    pub fn new(args: CliArgs, mut config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(uid) = args.uid {
            config.session.uid = Some(uid);
        }
        if let Some(api_url) = args.api_url {
            config.editor.api_base_url = api_url;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        let Some(uid) = config.session.uid.clone() else {
            return Err("No session uid given; pass --uid or set session.uid".into());
        };

        display_banner();

        let api = Arc::new(HttpApi::new(&config.editor)?);
        let editor = EditorController::new(config.editor.clone(), Uid::new(uid), api)?;
        let load_codes = args.load_codes || config.session.load_codes_on_start;

        Ok(Self {
            config,
            editor,
            load_codes,
        })
    }

    /// Opens the session and mirrors it until shutdown.
    ///
    /// # Returns
    ///
    /// An error if the session does not exist or the signal handlers could
    /// not be installed. Transport and mutation failures are logged, never
    /// returned.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.log_configuration_summary();

        if let Err(e) = self.editor.load().await {
            if let EditorError::NoSession(uid) = &e {
                error!("❌ Session {} is not active; open the editor from a live session", uid);
            }
            return Err(e.into());
        }
        info!("✅ Editor session {} opened", self.editor.uid());

        if self.load_codes {
            if let Err(e) = self.editor.load_codes().await {
                warn!("⚠️ Could not request codes: {}", e);
            }
        }

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let mut summary = interval(SUMMARY_INTERVAL);
        summary.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reconnect_delay = Duration::from_secs(self.config.session.reconnect_delay_secs);
        let mut reconnect: Option<Pin<Box<Sleep>>> = None;
        let mut last_status = self.editor.status().clone();
        let mut last_indicator = self.editor.indicator().cloned();

        info!("🛑 Press Ctrl+C to close the session");

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    result?;
                    break;
                }
                _ = self.editor.process_next() => {}
                _ = summary.tick() => self.log_summary(),
                _ = wait_for(&mut reconnect) => {
                    reconnect = None;
                    self.editor.reconnect()?;
                }
            }

            let status = self.editor.status();
            if *status != last_status {
                log_status(status);
                if status.is_down() && !reconnect_delay.is_zero() {
                    info!("⏳ Reconnecting in {}s", reconnect_delay.as_secs());
                    reconnect = Some(Box::pin(sleep(reconnect_delay)));
                }
                last_status = status.clone();
            }

            let indicator = self.editor.indicator().cloned();
            if indicator != last_indicator {
                if let Some(indicator) = &indicator {
                    log_indicator(indicator);
                }
                last_indicator = indicator;
            }
        }

        self.editor.close();
        self.log_summary();
        info!("👋 Editor session closed");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 API: {}", self.config.editor.api_base_url);
        info!("  🔗 Channel: {}", self.config.editor.websocket_url);
        info!("  ⏱️ Request timeout: {}s", self.config.editor.request_timeout_secs);
        info!("  📄 Codes page size: {}", self.config.editor.codes_page_size);
    }

    fn log_summary(&self) {
        if let ViewState::NoSession { reason } = self.editor.view_state() {
            info!("📊 No session: {}", reason);
            return;
        }
        let store = self.editor.store();
        let codes = match self.editor.codes_view("") {
            CodesView::Loaded { matching, .. } => matching.to_string(),
            CodesView::Unloaded => "not loaded".to_string(),
            CodesView::Loading => "loading".to_string(),
            CodesView::Failed(reason) => format!("failed ({reason})"),
        };
        info!(
            "📊 Session {} | channel {} | {} packages ({}) | {} active grants | codes: {}",
            self.editor.uid(),
            self.editor.status(),
            store.packages.len(),
            store.packages.state(),
            self.editor.grants_view("").len(),
            codes
        );
    }
}

/// Resolves when the armed timer fires; never resolves when none is armed.
async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

fn log_status(status: &ChannelStatus) {
    match status {
        ChannelStatus::Open => info!("🔗 Realtime channel open"),
        ChannelStatus::Connecting => info!("🔄 Realtime channel connecting"),
        ChannelStatus::Closed => warn!("🔌 Realtime channel closed"),
        ChannelStatus::Error(reason) => error!("❌ Realtime channel error: {}", reason),
    }
}

fn log_indicator(indicator: &Indicator) {
    match indicator {
        Indicator::InProgress { kind } => info!("⏳ {} in progress", kind),
        Indicator::Succeeded { kind } => info!("✅ {} confirmed", kind),
        Indicator::Failed { kind, message } => warn!("❌ {} failed: {}", kind, message),
    }
}
