//! Mutation Gateway: validated REST mutations correlated with the
//! pending-operation slot.
//!
//! Every call checks the slot first and refuses while an operation is
//! outstanding. Saves register a pending operation only after the server
//! accepted the request; a rejected request surfaces its error immediately
//! and leaves the slot idle. The saved item is shown locally until the
//! confirming push, and taken back if an `ERROR` push rejects it. Grant and code deletions are not correlated with
//! any push and never touch the slot.

use crate::api::{PcvApi, ScrapeTarget};
use crate::duration::{self, PERMANENT_LABEL, ZERO_SENTINEL};
use crate::engine::{LocalEdit, SyncEngine};
use crate::error::{ApiError, GatewayError, ValidationError};
use crate::pending::{PendingHandle, PendingKind};
use crate::types::{ActiveGrant, Code, CodeType, GrantKey, ResourceKind, Uid, VipPackage};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Change applied to an active grant's remaining duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantAdjustment {
    /// Relative change, e.g. `"1d"` or `"-2h"`; the result never drops below zero
    Add(String),
    /// Absolute remaining duration
    Set(String),
}

impl GrantAdjustment {
    /// Computes the new remaining duration from `current`.
    pub fn apply(&self, current: i64) -> Result<i64, ValidationError> {
        match self {
            GrantAdjustment::Add(expr) => {
                let delta = duration::parse(expr)?;
                Ok(current.saturating_add(delta).max(0))
            }
            GrantAdjustment::Set(expr) => {
                let seconds = duration::parse(expr)?;
                if seconds < 0 {
                    return Err(ValidationError::NegativeDuration);
                }
                Ok(seconds)
            }
        }
    }
}

/// Parses a package lifetime, where `permanent` (or `0s`) means zero.
pub fn parse_lifetime(expr: &str) -> Result<i64, ValidationError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ValidationError::MissingField { field: "duration" });
    }
    if expr.eq_ignore_ascii_case(PERMANENT_LABEL) || expr == ZERO_SENTINEL {
        return Ok(0);
    }
    let seconds = duration::parse(expr)?;
    if seconds < 0 {
        return Err(ValidationError::NegativeDuration);
    }
    Ok(seconds)
}

pub fn validate_package(package: &VipPackage) -> Result<(), ValidationError> {
    if package.name.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "name" });
    }
    if package.duration < 0 {
        return Err(ValidationError::NegativeDuration);
    }
    Ok(())
}

/// Checks required fields and, for VIP codes, that the package exists.
pub fn validate_code(code: &Code, packages: &[VipPackage]) -> Result<(), ValidationError> {
    if code.code.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "code" });
    }
    if code.identifier.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "identifier" });
    }
    if code.code_type == CodeType::Vip && !packages.iter().any(|p| p.name == code.identifier) {
        return Err(ValidationError::UnknownPackage(code.identifier.clone()));
    }
    Ok(())
}

/// Issues mutations for one session.
///
/// The gateway borrows the engine mutably for the whole call, so two
/// mutations of the same editor can never interleave.
#[derive(Debug)]
pub struct MutationGateway<A> {
    api: Arc<A>,
    uid: Uid,
}

impl<A: PcvApi> MutationGateway<A> {
    pub fn new(api: Arc<A>, uid: Uid) -> Self {
        Self { api, uid }
    }

    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Creates a package whose name is not yet taken.
    pub async fn create_package(
        &self,
        engine: &mut SyncEngine,
        package: VipPackage,
    ) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        validate_package(&package)?;
        if engine.store().packages.get(&package.name).is_some() {
            return Err(ValidationError::DuplicatePackage(package.name).into());
        }
        self.save_package(engine, package).await
    }

    /// Updates an existing package, matched by name.
    pub async fn update_package(
        &self,
        engine: &mut SyncEngine,
        package: VipPackage,
    ) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        validate_package(&package)?;
        if engine.store().packages.get(&package.name).is_none() {
            return Err(ValidationError::UnknownPackage(package.name).into());
        }
        self.save_package(engine, package).await
    }

    async fn save_package(
        &self,
        engine: &mut SyncEngine,
        package: VipPackage,
    ) -> Result<PendingHandle, GatewayError> {
        self.api
            .save_package(&self.uid, &package)
            .await
            .map_err(|e| self.rejected("save VIP package", e))?;

        info!(uid = %self.uid, package = %package.name, "📤 VIP package save accepted");
        Ok(engine.begin_save(PendingKind::VipSave, Some(LocalEdit::Package(package)), Instant::now())?)
    }

    /// Deletes a package. The local copy stays until the `VIP_UPDATE`
    /// re-fetch replaces the collection.
    pub async fn delete_package(
        &self,
        engine: &mut SyncEngine,
        name: &str,
    ) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" }.into());
        }
        self.api
            .delete(&self.uid, ResourceKind::Packages, name)
            .await
            .map_err(|e| self.rejected("delete VIP package", e))?;

        info!(uid = %self.uid, package = name, "🗑️ VIP package delete accepted");
        Ok(engine.begin_save(PendingKind::VipSave, None, Instant::now())?)
    }

    /// The backend has no endpoint for granting a package from the editor.
    pub async fn create_grant(
        &self,
        engine: &mut SyncEngine,
        _grant: ActiveGrant,
    ) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        Err(GatewayError::Unsupported("active grant creation"))
    }

    /// Changes the remaining duration of an existing grant.
    pub async fn update_grant(
        &self,
        engine: &mut SyncEngine,
        key: &GrantKey,
        adjustment: &GrantAdjustment,
    ) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        let Some(current) = engine.store().grants.get(key) else {
            return Err(ValidationError::UnknownGrant {
                player: key.player_unique_id.clone(),
                package: key.package_name.clone(),
            }
            .into());
        };
        let mut grant = current.clone();
        grant.duration = adjustment.apply(current.duration)?;

        self.api
            .save_grant(&self.uid, &grant)
            .await
            .map_err(|e| self.rejected("update active grant", e))?;

        info!(
            uid = %self.uid,
            player = %grant.player_unique_id,
            package = %grant.package_name,
            remaining = %duration::format(grant.duration),
            "📤 Active grant update accepted"
        );
        Ok(engine.begin_save(PendingKind::ActiveSave, Some(LocalEdit::Grant(grant)), Instant::now())?)
    }

    /// Revokes a grant. Not tracked; the local copy is removed on success.
    pub async fn delete_grant(&self, engine: &mut SyncEngine, key: &GrantKey) -> Result<(), GatewayError> {
        engine.tracker().ensure_idle()?;
        self.api
            .delete(&self.uid, ResourceKind::Grants, &key.to_path_key())
            .await
            .map_err(|e| self.rejected("delete active grant", e))?;

        info!(uid = %self.uid, player = %key.player_unique_id, package = %key.package_name, "🗑️ Active grant deleted");
        engine.store_mut().grants.remove(key);
        Ok(())
    }

    /// Asks the server to generate a new code of `code_type`.
    pub async fn create_code(
        &self,
        engine: &mut SyncEngine,
        code_type: CodeType,
        identifier: &str,
    ) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        let draft = Code::draft(code_type, identifier.trim());
        validate_code(&draft, engine.store().packages.items())?;
        self.save_code(engine, draft).await
    }

    pub async fn update_code(&self, engine: &mut SyncEngine, code: Code) -> Result<PendingHandle, GatewayError> {
        engine.tracker().ensure_idle()?;
        validate_code(&code, engine.store().packages.items())?;
        self.save_code(engine, code).await
    }

    async fn save_code(&self, engine: &mut SyncEngine, code: Code) -> Result<PendingHandle, GatewayError> {
        self.api
            .save_code(&self.uid, &code)
            .await
            .map_err(|e| self.rejected("save code", e))?;

        info!(uid = %self.uid, code = %code.code, kind = %code.code_type, "📤 Code save accepted");
        Ok(engine.begin_save(PendingKind::CodeSave, Some(LocalEdit::Code(code)), Instant::now())?)
    }

    /// Deletes a code. Not tracked; the local copy is removed on success.
    pub async fn delete_code(&self, engine: &mut SyncEngine, code: &str) -> Result<(), GatewayError> {
        engine.tracker().ensure_idle()?;
        if code.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "code" }.into());
        }
        self.api
            .delete(&self.uid, ResourceKind::Codes, code)
            .await
            .map_err(|e| self.rejected("delete code", e))?;

        info!(uid = %self.uid, code, "🗑️ Code deleted");
        engine.store_mut().codes.remove(&code.to_string());
        Ok(())
    }

    /// Starts a server-side reload; completion arrives as a `*_READY` push.
    pub async fn request_scrape(&self, engine: &mut SyncEngine, target: ScrapeTarget) -> Result<(), GatewayError> {
        self.api
            .request_scrape(&self.uid, target)
            .await
            .map_err(|e| self.rejected("request reload", e))?;

        info!(uid = %self.uid, target = target.path_segment(), "🔄 Server reload requested");
        engine.store_mut().begin_scrape(target.resource());
        Ok(())
    }

    fn rejected(&self, action: &str, error: ApiError) -> GatewayError {
        warn!(uid = %self.uid, "❌ Failed to {}: {}", action, error);
        GatewayError::Api(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DurationError, TrackerError};
    use crate::testing::{package, Call, MockApi};
    use crate::types::EditorSnapshot;
    use std::time::Duration;

    fn setup() -> (Arc<MockApi>, MutationGateway<MockApi>, SyncEngine) {
        let api = Arc::new(MockApi::new());
        let gateway = MutationGateway::new(api.clone(), Uid::new("u-1"));
        let mut engine = SyncEngine::new(Duration::from_secs(3));
        engine.apply_snapshot(EditorSnapshot {
            vip_packages: vec![package("gold", 5)],
            active_packages: vec![ActiveGrant {
                player_unique_id: "p1".into(),
                player_name: "Steve".into(),
                package_name: "gold".into(),
                duration: 3600,
            }],
        });
        (api, gateway, engine)
    }

    #[test]
    fn adjustments() {
        assert_eq!(GrantAdjustment::Add("1h".into()).apply(60), Ok(3660));
        assert_eq!(GrantAdjustment::Add("-1d".into()).apply(60), Ok(0));
        assert_eq!(GrantAdjustment::Set("2m".into()).apply(9999), Ok(120));
        assert_eq!(
            GrantAdjustment::Set("-2m".into()).apply(0),
            Err(ValidationError::NegativeDuration)
        );
        assert_eq!(
            GrantAdjustment::Add("5m3h".into()).apply(0),
            Err(ValidationError::Duration(DurationError::OutOfOrder { unit: 'h' }))
        );
    }

    #[test]
    fn lifetimes() {
        assert_eq!(parse_lifetime("Permanent"), Ok(0));
        assert_eq!(parse_lifetime("0s"), Ok(0));
        assert_eq!(parse_lifetime("30d"), Ok(30 * 86_400));
        assert_eq!(parse_lifetime(" "), Err(ValidationError::MissingField { field: "duration" }));
        assert_eq!(parse_lifetime("-1d"), Err(ValidationError::NegativeDuration));
    }

    #[tokio::test]
    async fn save_registers_pending_after_acceptance() {
        let (api, gateway, mut engine) = setup();
        let handle = gateway.update_package(&mut engine, package("gold", 10)).await.unwrap();

        assert_eq!(handle.kind(), PendingKind::VipSave);
        assert!(engine.tracker().is_busy());
        assert_eq!(engine.store().packages.get(&"gold".to_string()).unwrap().priority, 10);
        assert_eq!(api.calls(), vec![Call::SavePackage("gold".into())]);
    }

    #[tokio::test]
    async fn busy_slot_refuses_before_any_request() {
        let (api, gateway, mut engine) = setup();
        gateway.update_package(&mut engine, package("gold", 10)).await.unwrap();

        let err = gateway.create_code(&mut engine, CodeType::Kit, "starter").await.unwrap_err();
        assert!(matches!(err, GatewayError::Busy(TrackerError::Busy(PendingKind::VipSave))));
        let err = gateway
            .delete_grant(&mut engine, &GrantKey::new("p1", "gold"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Busy(_)));
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn rejected_request_leaves_slot_idle_and_store_untouched() {
        let (api, gateway, mut engine) = setup();
        api.fail_next(500, "database down");

        let err = gateway.update_package(&mut engine, package("gold", 99)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Api(ApiError::Status { status: 500, .. })));
        assert!(!engine.tracker().is_busy());
        assert!(engine.tracker().indicator().is_none());
        assert_eq!(engine.store().packages.items()[0].priority, 5);
    }

    #[tokio::test]
    async fn validation_never_reaches_the_network() {
        let (api, gateway, mut engine) = setup();
        let err = gateway.create_package(&mut engine, package("gold", 1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::DuplicatePackage(_))));

        let err = gateway.create_code(&mut engine, CodeType::Vip, "diamond").await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::UnknownPackage(_))));

        let err = gateway
            .update_grant(&mut engine, &GrantKey::new("p1", "gold"), &GrantAdjustment::Set("".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::Duration(DurationError::Empty))));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn grant_creation_is_unsupported() {
        let (api, gateway, mut engine) = setup();
        let grant = engine.store().grants.items()[0].clone();
        let err = gateway.create_grant(&mut engine, grant).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unsupported(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn deletes_of_grants_are_untracked() {
        let (api, gateway, mut engine) = setup();
        let key = GrantKey::new("p1", "gold");
        gateway.delete_grant(&mut engine, &key).await.unwrap();

        assert!(engine.store().grants.is_empty());
        assert!(!engine.tracker().is_busy());
        assert_eq!(api.calls(), vec![Call::Delete(ResourceKind::Grants, "p1:gold".into())]);
    }

    #[tokio::test]
    async fn package_delete_is_tracked_and_keeps_local_copy() {
        let (_api, gateway, mut engine) = setup();
        let handle = gateway.delete_package(&mut engine, "gold").await.unwrap();
        assert_eq!(handle.kind(), PendingKind::VipSave);
        assert_eq!(engine.store().packages.len(), 1);
    }

    #[tokio::test]
    async fn grant_update_sends_adjusted_duration() {
        let (api, gateway, mut engine) = setup();
        let key = GrantKey::new("p1", "gold");
        gateway
            .update_grant(&mut engine, &key, &GrantAdjustment::Add("1h".into()))
            .await
            .unwrap();
        assert_eq!(engine.store().grants.get(&key).unwrap().duration, 7200);
        assert_eq!(api.calls(), vec![Call::SaveGrant(key)]);
        assert_eq!(engine.tracker().current().map(|h| h.kind()), Some(PendingKind::ActiveSave));
    }

    #[tokio::test]
    async fn placeholder_code_only_lands_in_loaded_collection() {
        let (_api, gateway, mut engine) = setup();
        gateway.create_code(&mut engine, CodeType::Vip, "gold").await.unwrap();
        assert!(engine.store().codes.is_empty());
        engine.tracker_mut().abandon_current();

        engine.store_mut().codes.replace_all(Vec::new());
        gateway.create_code(&mut engine, CodeType::Kit, "starter").await.unwrap();
        assert!(engine.store().codes.items()[0].is_placeholder());
    }

    #[tokio::test]
    async fn scrape_sets_flag_without_touching_slot() {
        let (api, gateway, mut engine) = setup();
        gateway.request_scrape(&mut engine, ScrapeTarget::Codes).await.unwrap();
        assert!(engine.store().is_scraping(ResourceKind::Codes));
        assert!(!engine.tracker().is_busy());
        assert_eq!(api.calls(), vec![Call::Scrape(ScrapeTarget::Codes)]);
    }
}
