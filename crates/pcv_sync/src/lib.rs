//! # PCV Sync
//!
//! Real-time configuration synchronization engine behind the Playcore editor.
//!
//! An editor session mirrors three server-side collections (VIP packages,
//! active grants and redemption codes) for one session identifier. Reads come
//! from REST; changes are announced over a WebSocket as "collection changed"
//! pushes, which trigger a re-fetch of just that collection. Mutations go out
//! over REST and are confirmed by the next relevant push, so at most one
//! mutation is in flight per editor.
//!
//! ## Layout
//!
//! * [`duration`] - compact `3d2h15m` duration expressions
//! * [`types`] - wire data model
//! * [`store`] - in-memory collections with clear-then-fill invalidation
//! * [`pending`] - the single pending-operation slot
//! * [`channel`] - push decoding and the WebSocket task
//! * [`engine`] - push dispatch table tying store, slot and channel together
//! * [`api`] - the REST collaborator
//! * [`gateway`] - validated, single-flight mutations
//! * [`controller`] - the editor session and its derived views
//!
//! ## Example
//!
//! ```rust,no_run
//! use pcv_sync::{EditorController, HttpApi, SyncConfig, Uid};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let api = Arc::new(HttpApi::new(&config)?);
//! let mut editor = EditorController::new(config, Uid::new("3f2a"), api)?;
//! editor.load().await?;
//!
//! loop {
//!     editor.process_next().await;
//!     for package in editor.packages_view("gold") {
//!         println!("{} ({})", package.plain_display_name(), package.priority);
//!     }
//! }
//! # }
//! ```

pub mod api;
pub mod channel;
pub mod config;
pub mod controller;
pub mod duration;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod pending;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use api::{HttpApi, PcvApi, ScrapeTarget};
pub use channel::{ChannelStatus, PushEvent};
pub use config::SyncConfig;
pub use controller::{CodesView, EditorController, GrantRow, ViewState};
pub use engine::{Notice, NoticeLevel};
pub use error::{ApiError, EditorError, GatewayError, ValidationError};
pub use gateway::GrantAdjustment;
pub use pending::{Indicator, PendingKind};
pub use store::LoadState;
pub use types::{ActiveGrant, Code, CodeType, GrantKey, ResourceKind, Uid, VipPackage};
