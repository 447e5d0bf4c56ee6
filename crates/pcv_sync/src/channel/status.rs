//! Connection status of the realtime channel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `Closed → Connecting → Open → (Error | Closed)`; a manual reconnect moves
/// any state back to `Connecting`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Closed,
    Connecting,
    Open,
    Error(String),
}

impl ChannelStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelStatus::Open)
    }

    /// Whether the channel ended and needs an explicit reconnect.
    pub fn is_down(&self) -> bool {
        matches!(self, ChannelStatus::Closed | ChannelStatus::Error(_))
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Closed => f.write_str("closed"),
            ChannelStatus::Connecting => f.write_str("connecting"),
            ChannelStatus::Open => f.write_str("open"),
            ChannelStatus::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}
