//! Push dispatch and fetch bookkeeping.
//!
//! [`SyncEngine`] owns the resource store, the pending-operation tracker and
//! the channel status for one editor session. It never performs I/O: every
//! input returns a list of [`Effect`]s that the controller carries out.
//! Keeping the dispatch table synchronous makes the clear-then-fill ordering
//! hold by construction, because a collection is invalidated before the
//! fetch that refills it is even issued.

use crate::channel::{ChannelEventKind, ChannelStatus, PushEvent};
use crate::error::TrackerError;
use crate::pending::{Outcome, PendingHandle, PendingKind, PendingTracker, Resolution};
use crate::store::{FillOutcome, ResourceStore, Revert};
use crate::types::{ActiveGrant, Code, EditorSnapshot, ResourceKind, VipPackage};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Work requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Re-fetch one collection; the response must carry `generation`
    Fetch { kind: ResourceKind, generation: u64 },
    Notify(Notice),
}

/// Items returned by a single-collection fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Packages(Vec<VipPackage>),
    Grants(Vec<ActiveGrant>),
    Codes(Vec<Code>),
}

impl Fetched {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Fetched::Packages(_) => ResourceKind::Packages,
            Fetched::Grants(_) => ResourceKind::Grants,
            Fetched::Codes(_) => ResourceKind::Codes,
        }
    }
}

/// Item a save writes into the store ahead of the server's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEdit {
    Package(VipPackage),
    Grant(ActiveGrant),
    /// Only applied while codes are loaded
    Code(Code),
}

#[derive(Debug, Clone)]
enum Optimistic {
    Package(Revert<VipPackage>),
    Grant(Revert<ActiveGrant>),
    Code(Revert<Code>),
}

#[derive(Debug)]
pub struct SyncEngine {
    store: ResourceStore,
    tracker: PendingTracker,
    status: ChannelStatus,
    optimistic: Option<Optimistic>,
}

impl SyncEngine {
    pub fn new(indicator_dismiss: Duration) -> Self {
        Self {
            store: ResourceStore::new(),
            tracker: PendingTracker::new(indicator_dismiss),
            status: ChannelStatus::Closed,
            optimistic: None,
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ResourceStore {
        &mut self.store
    }

    pub fn tracker(&self) -> &PendingTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut PendingTracker {
        &mut self.tracker
    }

    pub fn status(&self) -> &ChannelStatus {
        &self.status
    }

    /// Occupies the pending slot for an accepted save and applies its local
    /// edit. An `ERROR` push for this operation takes the edit back.
    pub fn begin_save(
        &mut self,
        kind: PendingKind,
        edit: Option<LocalEdit>,
        now: Instant,
    ) -> Result<PendingHandle, TrackerError> {
        let handle = self.tracker.begin(kind, now)?;
        let optimistic = match edit {
            Some(edit) => self.apply_local_edit(edit),
            None => None,
        };
        self.optimistic = optimistic;
        Ok(handle)
    }

    fn apply_local_edit(&mut self, edit: LocalEdit) -> Option<Optimistic> {
        match edit {
            LocalEdit::Package(package) => Some(Optimistic::Package(self.store.packages.upsert_revertible(package))),
            LocalEdit::Grant(grant) => Some(Optimistic::Grant(self.store.grants.upsert_revertible(grant))),
            LocalEdit::Code(code) if self.store.codes.is_loaded() => {
                Some(Optimistic::Code(self.store.codes.upsert_revertible(code)))
            }
            LocalEdit::Code(_) => None,
        }
    }

    fn revert_local_edit(&mut self) {
        let Some(edit) = self.optimistic.take() else {
            return;
        };
        let reverted = match edit {
            Optimistic::Package(revert) => self.store.packages.revert(revert),
            Optimistic::Grant(revert) => self.store.grants.revert(revert),
            Optimistic::Code(revert) => self.store.codes.revert(revert),
        };
        if reverted {
            debug!("rejected edit reverted");
        } else {
            debug!("collection refreshed since the edit; nothing to revert");
        }
    }

    /// Installs the initial bulk payload.
    pub fn apply_snapshot(&mut self, snapshot: EditorSnapshot) {
        info!(
            packages = snapshot.vip_packages.len(),
            grants = snapshot.active_packages.len(),
            "📥 Initial snapshot loaded"
        );
        self.store.packages.replace_all(snapshot.vip_packages);
        self.store.grants.replace_all(snapshot.active_packages);
    }

    /// A new socket is being established; the old one, if any, is gone.
    pub fn on_connecting(&mut self) {
        self.abandon_pending("reconnecting");
        self.status = ChannelStatus::Connecting;
    }

    /// The editor closed the socket itself; nothing to report.
    pub fn on_disconnect(&mut self) {
        self.abandon_pending("editor closed");
        self.status = ChannelStatus::Closed;
    }

    /// Applies an event from the current socket generation.
    pub fn on_channel_event(&mut self, event: ChannelEventKind, now: Instant) -> Vec<Effect> {
        match event {
            ChannelEventKind::Opened => {
                self.status = ChannelStatus::Open;
                Vec::new()
            }
            ChannelEventKind::Push(push) => self.apply_push(push, now),
            ChannelEventKind::Closed { reason } => {
                self.abandon_pending("channel closed");
                self.status = ChannelStatus::Closed;
                let message = match reason {
                    Some(reason) => format!("Realtime connection closed: {reason}"),
                    None => "Realtime connection closed".to_string(),
                };
                vec![Effect::Notify(Notice::warning(message))]
            }
            ChannelEventKind::Failed { error } => {
                self.abandon_pending("channel error");
                self.status = ChannelStatus::Error(error.clone());
                vec![Effect::Notify(Notice::error(format!("Realtime connection error: {error}")))]
            }
        }
    }

    /// The push dispatch table.
    pub fn apply_push(&mut self, event: PushEvent, now: Instant) -> Vec<Effect> {
        debug!(?event, "push event");
        let mut effects = Vec::new();

        match &event {
            PushEvent::VipUpdate | PushEvent::ActiveUpdate | PushEvent::CodeUpdate => {
                if let Some(kind) = event.updated_kind() {
                    if let Some(effect) = self.invalidate_for_update(kind) {
                        effects.push(effect);
                    }
                }
                if let Resolution::Resolved { kind, elapsed, .. } =
                    self.tracker.resolve_current(Outcome::Success, now)
                {
                    self.optimistic = None;
                    info!(%kind, ?elapsed, "✅ Operation confirmed by {:?}", event);
                }
            }
            PushEvent::CodesReady | PushEvent::VipReady => {
                for &kind in event.ready_kinds() {
                    if self.store.finish_scrape(kind) {
                        effects.push(self.refetch(kind));
                    }
                }
            }
            PushEvent::Error { message } => {
                match self.tracker.resolve_current(Outcome::Failure(message.clone()), now) {
                    Resolution::Resolved { kind, .. } => {
                        warn!(%kind, "❌ Operation rejected: {}", message);
                        self.revert_local_edit();
                    }
                    _ => effects.push(Effect::Notify(Notice::error(message.clone()))),
                }
            }
            PushEvent::Unknown => {}
        }

        effects
    }

    /// Clears `kind` and requests a fresh copy.
    pub fn refetch(&mut self, kind: ResourceKind) -> Effect {
        let generation = self.store.invalidate(kind);
        debug!(%kind, generation, "collection invalidated");
        Effect::Fetch { kind, generation }
    }

    /// Codes that were never loaded stay unloaded; everything else is refetched.
    fn invalidate_for_update(&mut self, kind: ResourceKind) -> Option<Effect> {
        if kind == ResourceKind::Codes && self.store.codes.state() == &crate::store::LoadState::Unloaded {
            return None;
        }
        Some(self.refetch(kind))
    }

    /// Applies a fetch response for `generation`, dropping stale ones.
    pub fn apply_fetch(
        &mut self,
        kind: ResourceKind,
        generation: u64,
        result: Result<Fetched, String>,
    ) -> Vec<Effect> {
        let outcome = match result {
            Ok(Fetched::Packages(items)) if kind == ResourceKind::Packages => {
                self.store.packages.fill(generation, items)
            }
            Ok(Fetched::Grants(items)) if kind == ResourceKind::Grants => {
                self.store.grants.fill(generation, items)
            }
            Ok(Fetched::Codes(items)) if kind == ResourceKind::Codes => {
                self.store.codes.fill(generation, items)
            }
            Ok(other) => {
                warn!(%kind, got = %other.kind(), "fetch returned the wrong collection");
                return Vec::new();
            }
            Err(message) => {
                let outcome = self.store.fail(kind, generation, &message);
                if outcome == FillOutcome::Applied {
                    return vec![Effect::Notify(Notice::error(format!(
                        "Failed to load {kind}: {message}"
                    )))];
                }
                outcome
            }
        };

        if outcome == FillOutcome::Stale {
            debug!(%kind, generation, "dropping stale fetch response");
        }
        Vec::new()
    }

    /// Forwards to the tracker's auto-dismiss.
    pub fn expire_indicator(&mut self, now: Instant) -> bool {
        self.tracker.expire_indicator(now)
    }

    fn abandon_pending(&mut self, why: &str) {
        self.optimistic = None;
        if let Resolution::Abandoned { kind } = self.tracker.abandon_current() {
            info!(%kind, "⏹️ Pending operation abandoned: {}", why);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::{Indicator, PendingKind};
    use crate::store::LoadState;

    fn engine() -> SyncEngine {
        let mut engine = SyncEngine::new(Duration::from_secs(3));
        engine.apply_snapshot(EditorSnapshot {
            vip_packages: vec![VipPackage {
                name: "gold".into(),
                display_name: "&6Gold".into(),
                group: "vip".into(),
                priority: 5,
                duration: 0,
                created_at: 0,
            }],
            active_packages: vec![ActiveGrant {
                player_unique_id: "u1".into(),
                player_name: "Steve".into(),
                package_name: "gold".into(),
                duration: 600,
            }],
        });
        engine
    }

    #[test]
    fn active_update_clears_before_refetch_lands() {
        let mut engine = engine();
        let now = Instant::now();

        let effects = engine.apply_push(PushEvent::ActiveUpdate, now);
        let generation = match effects.as_slice() {
            [Effect::Fetch { kind: ResourceKind::Grants, generation }] => *generation,
            other => panic!("unexpected effects {other:?}"),
        };
        assert!(engine.store().grants.is_empty());
        assert_eq!(engine.store().grants.state(), &LoadState::Loading);

        let fresh = ActiveGrant {
            player_unique_id: "u2".into(),
            player_name: "Alex".into(),
            package_name: "gold".into(),
            duration: 60,
        };
        engine.apply_fetch(ResourceKind::Grants, generation, Ok(Fetched::Grants(vec![fresh.clone()])));
        assert_eq!(engine.store().grants.items(), &[fresh]);
    }

    #[test]
    fn update_push_resolves_pending_as_success() {
        let mut engine = engine();
        let now = Instant::now();
        engine.tracker_mut().begin(PendingKind::VipSave, now).unwrap();

        engine.apply_push(PushEvent::VipUpdate, now);
        assert!(!engine.tracker().is_busy());
        assert_eq!(
            engine.tracker().indicator(),
            Some(&Indicator::Succeeded { kind: PendingKind::VipSave })
        );
    }

    #[test]
    fn error_push_fails_pending_without_touching_collections() {
        let mut engine = engine();
        let now = Instant::now();
        engine.tracker_mut().begin(PendingKind::CodeSave, now).unwrap();

        let effects = engine.apply_push(PushEvent::Error { message: "duplicate".into() }, now);
        assert!(effects.is_empty());
        assert_eq!(
            engine.tracker().indicator(),
            Some(&Indicator::Failed { kind: PendingKind::CodeSave, message: "duplicate".into() })
        );
        assert_eq!(engine.store().packages.len(), 1);
        assert_eq!(engine.store().grants.len(), 1);
    }

    #[test]
    fn error_push_without_pending_becomes_notice() {
        let mut engine = engine();
        let effects = engine.apply_push(PushEvent::Error { message: "boom".into() }, Instant::now());
        assert_eq!(effects, vec![Effect::Notify(Notice::error("boom"))]);
    }

    #[test]
    fn code_update_leaves_unloaded_codes_alone() {
        let mut engine = engine();
        let now = Instant::now();
        engine.tracker_mut().begin(PendingKind::CodeSave, now).unwrap();

        let effects = engine.apply_push(PushEvent::CodeUpdate, now);
        assert!(effects.is_empty());
        assert_eq!(engine.store().codes.state(), &LoadState::Unloaded);
        assert!(!engine.tracker().is_busy());
    }

    #[test]
    fn ready_event_clears_scrape_flag_and_fetches() {
        let mut engine = engine();
        engine.store_mut().begin_scrape(ResourceKind::Codes);

        let effects = engine.apply_push(PushEvent::CodesReady, Instant::now());
        assert!(matches!(effects.as_slice(), [Effect::Fetch { kind: ResourceKind::Codes, .. }]));
        assert!(!engine.store().is_scraping(ResourceKind::Codes));

        let again = engine.apply_push(PushEvent::CodesReady, Instant::now());
        assert!(again.is_empty());
    }

    #[test]
    fn vip_ready_only_fetches_collections_being_scraped() {
        let mut engine = engine();
        engine.store_mut().begin_scrape(ResourceKind::Grants);
        let effects = engine.apply_push(PushEvent::VipReady, Instant::now());
        assert!(matches!(effects.as_slice(), [Effect::Fetch { kind: ResourceKind::Grants, .. }]));
        assert_eq!(engine.store().packages.len(), 1);
    }

    #[test]
    fn overlapping_refetches_keep_only_latest() {
        let mut engine = engine();
        let now = Instant::now();
        let first = engine.apply_push(PushEvent::VipUpdate, now);
        let second = engine.apply_push(PushEvent::VipUpdate, now);
        let (Effect::Fetch { generation: g1, .. }, Effect::Fetch { generation: g2, .. }) =
            (&first[0], &second[0])
        else {
            panic!("expected fetch effects");
        };

        let package = |priority| VipPackage {
            name: "gold".into(),
            display_name: String::new(),
            group: "vip".into(),
            priority,
            duration: 0,
            created_at: 0,
        };
        engine.apply_fetch(ResourceKind::Packages, *g2, Ok(Fetched::Packages(vec![package(10)])));
        engine.apply_fetch(ResourceKind::Packages, *g1, Ok(Fetched::Packages(vec![package(1)])));
        assert_eq!(engine.store().packages.items()[0].priority, 10);
    }

    #[test]
    fn failed_refetch_marks_collection_and_notifies() {
        let mut engine = engine();
        let Effect::Fetch { generation, .. } = engine.refetch(ResourceKind::Grants) else {
            panic!("expected fetch effect");
        };
        let effects = engine.apply_fetch(ResourceKind::Grants, generation, Err("503".into()));
        assert_eq!(engine.store().grants.state(), &LoadState::Failed("503".into()));
        assert!(matches!(effects.as_slice(), [Effect::Notify(Notice { level: NoticeLevel::Error, .. })]));
    }

    #[test]
    fn close_abandons_pending_silently() {
        let mut engine = engine();
        let now = Instant::now();
        engine.on_channel_event(ChannelEventKind::Opened, now);
        assert!(engine.status().is_open());
        engine.tracker_mut().begin(PendingKind::ActiveSave, now).unwrap();

        engine.on_channel_event(ChannelEventKind::Closed { reason: None }, now);
        assert_eq!(engine.status(), &ChannelStatus::Closed);
        assert!(!engine.tracker().is_busy());
        assert!(engine.tracker().indicator().is_none());
    }

    #[test]
    fn transport_error_sets_error_status() {
        let mut engine = engine();
        let now = Instant::now();
        engine.tracker_mut().begin(PendingKind::VipSave, now).unwrap();
        engine.on_channel_event(ChannelEventKind::Failed { error: "reset".into() }, now);
        assert_eq!(engine.status(), &ChannelStatus::Error("reset".into()));
        assert!(engine.tracker().indicator().is_none());

        engine.on_connecting();
        assert_eq!(engine.status(), &ChannelStatus::Connecting);
    }

    #[test]
    fn rejected_save_reverts_local_edit() {
        let mut engine = engine();
        let now = Instant::now();
        let mut grant = engine.store().grants.items()[0].clone();
        grant.duration = 7_200;
        let mut granted = grant.clone();
        granted.player_unique_id = "u2".into();

        engine.begin_save(PendingKind::ActiveSave, Some(LocalEdit::Grant(grant)), now).unwrap();
        assert_eq!(engine.store().grants.items()[0].duration, 7_200);

        engine.apply_push(PushEvent::Error { message: "rejected".into() }, now);
        assert_eq!(engine.store().grants.items()[0].duration, 600);

        engine.begin_save(PendingKind::ActiveSave, Some(LocalEdit::Grant(granted)), now).unwrap();
        assert_eq!(engine.store().grants.len(), 2);
        engine.apply_push(PushEvent::Error { message: "rejected".into() }, now);
        assert_eq!(engine.store().grants.len(), 1);
    }

    #[test]
    fn confirmed_or_abandoned_save_keeps_nothing_to_revert() {
        let mut engine = engine();
        let now = Instant::now();
        let mut gold = engine.store().packages.items()[0].clone();
        gold.priority = 10;

        engine.begin_save(PendingKind::VipSave, Some(LocalEdit::Package(gold.clone())), now).unwrap();
        engine.on_channel_event(ChannelEventKind::Closed { reason: None }, now);
        engine.apply_push(PushEvent::Error { message: "late".into() }, now);
        assert_eq!(engine.store().packages.items()[0].priority, 10);

        engine.begin_save(PendingKind::VipSave, None, now).unwrap();
        assert!(engine.tracker().is_busy());
        assert!(engine.begin_save(PendingKind::VipSave, Some(LocalEdit::Package(gold)), now).is_err());
    }

    #[test]
    fn code_edit_is_skipped_while_codes_are_unloaded() {
        let mut engine = engine();
        let now = Instant::now();
        let code = Code::draft(crate::types::CodeType::Kit, "starter");
        engine.begin_save(PendingKind::CodeSave, Some(LocalEdit::Code(code)), now).unwrap();
        assert!(engine.store().codes.is_empty());
        engine.apply_push(PushEvent::Error { message: "rejected".into() }, now);
        assert_eq!(engine.store().codes.state(), &LoadState::Unloaded);
    }
}
