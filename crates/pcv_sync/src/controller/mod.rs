//! Editor Controller: one editor session for one `uid`.
//!
//! The controller owns every piece of shared mutable state of a session: the
//! [`SyncEngine`] (store, pending slot, channel status), the single
//! [`RealtimeChannel`], and the notice feed. Asynchronous completions
//! (socket events, re-fetch responses, the indicator dismiss timer) are
//! funneled into [`EditorController::process_next`], so they are applied one
//! at a time in arrival order.

pub mod view;

use crate::api::{PcvApi, ScrapeTarget};
use crate::channel::{ChannelEvent, ChannelStatus, RealtimeChannel};
use crate::config::SyncConfig;
use crate::engine::{Effect, Fetched, Notice, NoticeLevel, SyncEngine};
use crate::error::{EditorError, GatewayError};
use crate::gateway::{GrantAdjustment, MutationGateway};
use crate::pending::{Indicator, PendingHandle};
use crate::store::ResourceStore;
use crate::types::{ActiveGrant, Code, CodeType, GrantKey, ResourceKind, Uid, VipPackage};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

pub use view::{CodesView, GrantRow, ViewState};

const NOTICE_CAPACITY: usize = 64;

/// A re-fetch that finished, successfully or not.
#[derive(Debug)]
struct FetchCompletion {
    kind: ResourceKind,
    generation: u64,
    result: Result<Fetched, String>,
}

enum Input {
    Channel(ChannelEvent),
    Fetch(FetchCompletion),
    Dismiss,
}

/// One editor session.
pub struct EditorController<A: PcvApi> {
    config: SyncConfig,
    uid: Uid,
    socket_url: String,
    api: Arc<A>,
    gateway: MutationGateway<A>,
    engine: SyncEngine,
    view: ViewState,
    channel: Option<RealtimeChannel>,
    channel_generation: u64,
    channel_tx: mpsc::UnboundedSender<ChannelEvent>,
    channel_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    fetch_tx: mpsc::UnboundedSender<FetchCompletion>,
    fetch_rx: mpsc::UnboundedReceiver<FetchCompletion>,
    notices: broadcast::Sender<Notice>,
    codes_window: usize,
}

impl<A: PcvApi> EditorController<A> {
    /// Creates an editor for `uid`. Nothing is fetched until [`load`].
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoints and tuning; validated here
    /// * `uid` - The route-supplied session identifier
    /// * `api` - The REST collaborator
    ///
    /// [`load`]: EditorController::load
    pub fn new(config: SyncConfig, uid: Uid, api: Arc<A>) -> Result<Self, EditorError> {
        config.validate().map_err(EditorError::Config)?;
        if uid.as_str().trim().is_empty() {
            return Err(EditorError::Config("uid must not be empty".to_string()));
        }

        let socket_url = config.websocket_url_for(&uid).map_err(EditorError::Config)?;

        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Ok(Self {
            engine: SyncEngine::new(config.notice_dismiss()),
            gateway: MutationGateway::new(api.clone(), uid.clone()),
            codes_window: config.codes_page_size,
            config,
            uid,
            socket_url,
            api,
            view: ViewState::Loading,
            channel: None,
            channel_generation: 0,
            channel_tx,
            channel_rx,
            fetch_tx,
            fetch_rx,
            notices,
        })
    }

    /// Checks the session, installs the initial snapshot and opens the channel.
    ///
    /// # Returns
    ///
    /// [`EditorError::NoSession`] when the backend does not know the uid. That
    /// state is terminal for this editor. A failed snapshot is not fatal: both
    /// collections are marked failed and can be retried with [`refresh`].
    ///
    /// [`refresh`]: EditorController::refresh
    pub async fn load(&mut self) -> Result<(), EditorError> {
        info!(uid = %self.uid, "🔍 Checking editor session");
        if let Err(e) = self.api.session_status(&self.uid).await {
            error!(uid = %self.uid, "❌ No active session: {}", e);
            self.view = ViewState::NoSession { reason: e.to_string() };
            return Err(EditorError::NoSession(self.uid.to_string()));
        }

        match self.api.fetch_snapshot(&self.uid).await {
            Ok(snapshot) => self.engine.apply_snapshot(snapshot),
            Err(e) => {
                let message = e.to_string();
                let store = self.engine.store_mut();
                for kind in [ResourceKind::Packages, ResourceKind::Grants] {
                    let generation = store.generation(kind);
                    store.fail(kind, generation, &message);
                }
                self.publish(Notice::error(format!("Failed to load editor data: {message}")));
            }
        }

        self.view = ViewState::Ready;
        self.connect();
        Ok(())
    }

    /// Tears down the socket, if any, and connects again.
    ///
    /// Any pending operation is abandoned; the caller may retry it once the
    /// channel is open again.
    pub fn reconnect(&mut self) -> Result<(), EditorError> {
        self.ensure_session()?;
        info!(uid = %self.uid, "🔄 Reconnecting realtime channel");
        self.connect();
        Ok(())
    }

    fn connect(&mut self) {
        self.engine.on_connecting();
        match &mut self.channel {
            Some(channel) => self.channel_generation = channel.reconnect(),
            None => {
                self.channel_generation += 1;
                self.channel = Some(RealtimeChannel::connect(
                    self.socket_url.clone(),
                    self.channel_generation,
                    self.channel_tx.clone(),
                ));
            }
        }
        debug!(uid = %self.uid, generation = self.channel_generation, "channel connecting");
    }

    /// Closes the socket. In-flight fetches still land; nothing else arrives
    /// until [`reconnect`].
    ///
    /// [`reconnect`]: EditorController::reconnect
    pub fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
            // Anything still queued from the old socket is now stale.
            self.channel_generation = channel.generation() + 1;
            info!(uid = %self.uid, "🔌 Realtime channel closed by editor");
        }
        self.engine.on_disconnect();
    }

    /// Waits for the next asynchronous completion and applies it.
    pub async fn process_next(&mut self) {
        let deadline = self.engine.tracker().dismiss_deadline();
        let dismiss = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let input = tokio::select! {
            Some(event) = self.channel_rx.recv() => Input::Channel(event),
            Some(done) = self.fetch_rx.recv() => Input::Fetch(done),
            _ = dismiss => Input::Dismiss,
        };

        match input {
            Input::Channel(event) => self.handle_channel_event(event),
            Input::Fetch(done) => self.handle_fetch(done),
            Input::Dismiss => {
                if self.engine.expire_indicator(Instant::now()) {
                    debug!(uid = %self.uid, "indicator dismissed");
                }
            }
        }
    }

    /// Processes completions until `shutdown` resolves, then closes the socket.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.process_next() => {}
            }
        }
        self.close();
    }

    pub(crate) fn handle_channel_event(&mut self, event: ChannelEvent) {
        if event.generation != self.channel_generation {
            debug!(
                uid = %self.uid,
                generation = event.generation,
                current = self.channel_generation,
                "dropping event from a replaced socket"
            );
            return;
        }
        let effects = self.engine.on_channel_event(event.kind, Instant::now());
        self.apply_effects(effects);
    }

    fn handle_fetch(&mut self, done: FetchCompletion) {
        let effects = self.engine.apply_fetch(done.kind, done.generation, done.result);
        self.apply_effects(effects);
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch { kind, generation } => self.spawn_fetch(kind, generation),
                Effect::Notify(notice) => self.publish(notice),
            }
        }
    }

    fn spawn_fetch(&self, kind: ResourceKind, generation: u64) {
        let api = self.api.clone();
        let uid = self.uid.clone();
        let completions = self.fetch_tx.clone();
        debug!(uid = %uid, %kind, generation, "fetching collection");

        tokio::spawn(async move {
            let result = match kind {
                ResourceKind::Packages => api.fetch_packages(&uid).await.map(Fetched::Packages),
                ResourceKind::Grants => api.fetch_grants(&uid).await.map(Fetched::Grants),
                ResourceKind::Codes => api.fetch_codes(&uid).await.map(Fetched::Codes),
            };
            // The editor may be gone; the response is simply discarded then.
            let _ = completions.send(FetchCompletion {
                kind,
                generation,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }

    fn publish(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(uid = %self.uid, "📣 {}", notice.message),
            NoticeLevel::Warning => warn!(uid = %self.uid, "⚠️ {}", notice.message),
            NoticeLevel::Error => error!(uid = %self.uid, "❌ {}", notice.message),
        }
        let _ = self.notices.send(notice);
    }

    fn ensure_session(&self) -> Result<(), EditorError> {
        match &self.view {
            ViewState::NoSession { .. } => Err(EditorError::NoSession(self.uid.to_string())),
            _ => Ok(()),
        }
    }

    /// Runs a gateway result through the notice feed. Validation errors stay
    /// inline; everything else is also announced.
    fn report<T>(&self, result: Result<T, GatewayError>) -> Result<T, EditorError> {
        result.map_err(|e| {
            if !matches!(e, GatewayError::Validation(_)) {
                self.publish(Notice::error(e.to_string()));
            }
            EditorError::Gateway(e)
        })
    }

    // Mutations

    pub async fn create_package(&mut self, package: VipPackage) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.create_package(&mut self.engine, package).await;
        self.report(result)
    }

    pub async fn update_package(&mut self, package: VipPackage) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.update_package(&mut self.engine, package).await;
        self.report(result)
    }

    pub async fn delete_package(&mut self, name: &str) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.delete_package(&mut self.engine, name).await;
        self.report(result)
    }

    pub async fn create_grant(&mut self, grant: ActiveGrant) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.create_grant(&mut self.engine, grant).await;
        self.report(result)
    }

    pub async fn update_grant(
        &mut self,
        key: &GrantKey,
        adjustment: &GrantAdjustment,
    ) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.update_grant(&mut self.engine, key, adjustment).await;
        self.report(result)
    }

    pub async fn delete_grant(&mut self, key: &GrantKey) -> Result<(), EditorError> {
        self.ensure_session()?;
        let result = self.gateway.delete_grant(&mut self.engine, key).await;
        self.report(result)
    }

    pub async fn create_code(&mut self, code_type: CodeType, identifier: &str) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.create_code(&mut self.engine, code_type, identifier).await;
        self.report(result)
    }

    pub async fn update_code(&mut self, code: Code) -> Result<PendingHandle, EditorError> {
        self.ensure_session()?;
        let result = self.gateway.update_code(&mut self.engine, code).await;
        self.report(result)
    }

    pub async fn delete_code(&mut self, code: &str) -> Result<(), EditorError> {
        self.ensure_session()?;
        let result = self.gateway.delete_code(&mut self.engine, code).await;
        self.report(result)
    }

    // Loading

    /// Asks the server to load codes; they are fetched on `CODES_READY`.
    pub async fn load_codes(&mut self) -> Result<(), EditorError> {
        self.scrape(ScrapeTarget::Codes).await
    }

    pub async fn rescrape_packages(&mut self) -> Result<(), EditorError> {
        self.scrape(ScrapeTarget::Vips).await
    }

    pub async fn rescrape_grants(&mut self) -> Result<(), EditorError> {
        self.scrape(ScrapeTarget::ActiveVips).await
    }

    async fn scrape(&mut self, target: ScrapeTarget) -> Result<(), EditorError> {
        self.ensure_session()?;
        let result = self.gateway.request_scrape(&mut self.engine, target).await;
        self.report(result)
    }

    /// Clears and re-fetches one collection.
    pub fn refresh(&mut self, kind: ResourceKind) -> Result<(), EditorError> {
        self.ensure_session()?;
        let effect = self.engine.refetch(kind);
        self.apply_effects(vec![effect]);
        Ok(())
    }

    /// Reveals another page of codes.
    pub fn load_more_codes(&mut self) {
        self.codes_window = self.codes_window.saturating_add(self.config.codes_page_size);
    }

    // Views

    pub fn packages_view(&self, search: &str) -> Vec<&VipPackage> {
        view::packages(self.engine.store().packages.items(), search)
    }

    pub fn grants_view(&self, search: &str) -> Vec<GrantRow<'_>> {
        view::grants(self.engine.store(), search)
    }

    pub fn codes_view(&self, search: &str) -> CodesView<'_> {
        view::codes(self.engine.store(), search, self.codes_window)
    }

    // Accessors

    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn status(&self) -> &ChannelStatus {
        self.engine.status()
    }

    pub fn indicator(&self) -> Option<&Indicator> {
        self.engine.tracker().indicator()
    }

    pub fn is_busy(&self) -> bool {
        self.engine.tracker().is_busy()
    }

    pub fn store(&self) -> &ResourceStore {
        self.engine.store()
    }

    pub fn channel_generation(&self) -> u64 {
        self.channel_generation
    }

    /// Subscribes to transient notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
