//! Push events delivered over the editor's WebSocket.
//!
//! Every frame is a JSON envelope `{ "type": "...", ...payload }`. Payload
//! fields beyond `type` are optional and ignored by the engine: an update
//! push is a signal to re-fetch, not a delta.

use crate::error::ChannelError;
use crate::types::ResourceKind;
use serde::Deserialize;

/// A decoded push event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushEvent {
    /// The server finished loading codes after a scrape request
    CodesReady,
    /// The server finished loading VIP data after a scrape request
    VipReady,
    VipUpdate,
    ActiveUpdate,
    CodeUpdate,
    /// The server rejected the most recent operation
    #[serde(alias = "error")]
    Error {
        #[serde(default, alias = "error")]
        message: String,
    },
    /// Envelope with a `type` this client does not understand
    #[serde(other)]
    Unknown,
}

impl PushEvent {
    /// Decodes one text frame.
    pub fn decode(text: &str) -> Result<Self, ChannelError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Collection invalidated by an `*_UPDATE` event.
    pub fn updated_kind(&self) -> Option<ResourceKind> {
        match self {
            PushEvent::VipUpdate => Some(ResourceKind::Packages),
            PushEvent::ActiveUpdate => Some(ResourceKind::Grants),
            PushEvent::CodeUpdate => Some(ResourceKind::Codes),
            _ => None,
        }
    }

    /// Collections whose scrape is completed by a `*_READY` event.
    pub fn ready_kinds(&self) -> &'static [ResourceKind] {
        match self {
            PushEvent::CodesReady => &[ResourceKind::Codes],
            PushEvent::VipReady => &[ResourceKind::Packages, ResourceKind::Grants],
            _ => &[],
        }
    }
}
