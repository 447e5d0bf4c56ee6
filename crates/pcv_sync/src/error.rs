//! Error types for the synchronization engine.
//!
//! Errors are grouped by where they originate so callers can tell a
//! validation problem (never leaves the controller) from a transport or
//! mutation failure (surfaced as a notice).

use crate::pending::PendingKind;

/// Malformed duration expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// Nothing but whitespace or a bare sign
    #[error("duration expression is empty")]
    Empty,

    /// Every component was zero
    #[error("duration expression must not be zero")]
    Zero,

    /// A number without a trailing `d`, `h`, `m` or `s`
    #[error("duration component is missing its unit")]
    MissingUnit,

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    /// Units must appear in day, hour, minute, second order
    #[error("unit '{unit}' appears out of order")]
    OutOfOrder { unit: char },

    #[error("duration exceeds the supported range")]
    Overflow,
}

/// Illegal transitions of the pending-operation slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// Another mutation is still awaiting confirmation
    #[error("a {0} operation is already in progress")]
    Busy(PendingKind),
}

/// Failures talking to the REST collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request url: {0}")]
    Url(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Failures of the realtime channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A text frame that is not a valid push envelope
    #[error("malformed push event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid duration: {0}")]
    Duration(#[from] DurationError),

    #[error("duration must not be negative")]
    NegativeDuration,

    #[error("VIP package '{0}' already exists")]
    DuplicatePackage(String),

    /// VIP codes must reference a known package
    #[error("unknown VIP package '{0}'")]
    UnknownPackage(String),

    #[error("no active grant for player {player} on package {package}")]
    UnknownGrant { player: String, package: String },
}

/// Failures of a mutation issued through the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Single-flight policy: nothing may be issued while an operation is pending
    #[error(transparent)]
    Busy(#[from] TrackerError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request failed: {0}")]
    Api(#[from] ApiError),

    /// The backend exposes no endpoint for this operation
    #[error("{0} is not supported by the backend")]
    Unsupported(&'static str),
}

/// Errors surfaced by the editor controller.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The uid has no backend session; terminal for this editor
    #[error("no active session for uid {0}")]
    NoSession(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
