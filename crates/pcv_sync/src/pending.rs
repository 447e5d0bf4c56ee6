//! Single-slot correlation of mutations with their asynchronous confirmation.
//!
//! The backend acknowledges a mutation only indirectly, through a generic
//! "collection changed" push. There is no request id to correlate on, so at
//! most one mutation may be in flight: the next relevant push (or error)
//! resolves whatever occupies the slot.
//!
//! The slot is an explicit state machine ([`SlotState`]) advanced by the pure
//! [`SlotState::step`] function. [`PendingTracker`] wraps it together with the
//! user-facing [`Indicator`] and its auto-dismiss deadline.

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// The mutation awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingKind {
    VipSave,
    ActiveSave,
    CodeSave,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VipSave => "VIP_SAVE",
            Self::ActiveSave => "ACTIVE_SAVE",
            Self::CodeSave => "CODE_SAVE",
        })
    }
}

/// Proof that a particular operation was begun.
///
/// Handles are unique per tracker; resolving an old handle never touches a
/// newer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHandle {
    id: u64,
    kind: PendingKind,
}

impl PendingHandle {
    pub fn kind(&self) -> PendingKind {
        self.kind
    }
}

/// How a pending operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Pending {
        handle: PendingHandle,
        issued_at: Instant,
    },
}

/// Inputs to the slot state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    Begin { handle: PendingHandle, now: Instant },
    Resolve { handle: PendingHandle, outcome: Outcome, now: Instant },
    Abandon { handle: PendingHandle },
}

/// Observable effect of a slot transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Begun(PendingHandle),
    Resolved {
        kind: PendingKind,
        outcome: Outcome,
        elapsed: Duration,
    },
    Abandoned {
        kind: PendingKind,
    },
    /// The handle was already resolved, abandoned or superseded
    NoOp,
}

impl SlotState {
    /// Advances the slot. `Begin` on an occupied slot is the only illegal
    /// transition; resolving or abandoning a handle that does not occupy the
    /// slot is a no-op.
    pub fn step(self, event: SlotEvent) -> Result<(SlotState, Resolution), TrackerError> {
        match (self, event) {
            (SlotState::Idle, SlotEvent::Begin { handle, now }) => Ok((
                SlotState::Pending {
                    handle,
                    issued_at: now,
                },
                Resolution::Begun(handle),
            )),
            (SlotState::Pending { handle, .. }, SlotEvent::Begin { .. }) => {
                Err(TrackerError::Busy(handle.kind))
            }
            (
                SlotState::Pending { handle, issued_at },
                SlotEvent::Resolve {
                    handle: target,
                    outcome,
                    now,
                },
            ) if handle == target => Ok((
                SlotState::Idle,
                Resolution::Resolved {
                    kind: handle.kind,
                    outcome,
                    elapsed: now.saturating_duration_since(issued_at),
                },
            )),
            (SlotState::Pending { handle, .. }, SlotEvent::Abandon { handle: target })
                if handle == target =>
            {
                Ok((SlotState::Idle, Resolution::Abandoned { kind: handle.kind }))
            }
            (state, _) => Ok((state, Resolution::NoOp)),
        }
    }
}

/// What the UI shows for the current or most recent operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indicator {
    /// Persistent until the operation ends
    InProgress { kind: PendingKind },
    Succeeded { kind: PendingKind },
    Failed { kind: PendingKind, message: String },
}

impl Indicator {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Indicator::InProgress { .. })
    }
}

#[derive(Debug, Clone)]
struct ShownIndicator {
    indicator: Indicator,
    dismiss_at: Option<Instant>,
}

/// Owner of the single pending-operation slot and its indicator.
#[derive(Debug)]
pub struct PendingTracker {
    slot: SlotState,
    next_id: u64,
    shown: Option<ShownIndicator>,
    dismiss_after: Duration,
}

impl PendingTracker {
    /// `dismiss_after` is how long a terminal indicator stays visible.
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            slot: SlotState::Idle,
            next_id: 1,
            shown: None,
            dismiss_after,
        }
    }

    /// Occupies the slot. Fails with [`TrackerError::Busy`] while another
    /// operation is outstanding, whatever its kind.
    pub fn begin(&mut self, kind: PendingKind, now: Instant) -> Result<PendingHandle, TrackerError> {
        let handle = PendingHandle {
            id: self.next_id,
            kind,
        };
        let (slot, _) = self.slot.step(SlotEvent::Begin { handle, now })?;
        self.slot = slot;
        self.next_id += 1;
        self.shown = Some(ShownIndicator {
            indicator: Indicator::InProgress { kind },
            dismiss_at: None,
        });
        debug!(%kind, "pending operation begun");
        Ok(handle)
    }

    /// Ends `handle` with `outcome`. Idempotent.
    pub fn resolve(&mut self, handle: PendingHandle, outcome: Outcome, now: Instant) -> Resolution {
        let resolution = self.apply(SlotEvent::Resolve {
            handle,
            outcome,
            now,
        });
        if let Resolution::Resolved { kind, outcome, elapsed } = &resolution {
            let indicator = match outcome {
                Outcome::Success => Indicator::Succeeded { kind: *kind },
                Outcome::Failure(message) => Indicator::Failed {
                    kind: *kind,
                    message: message.clone(),
                },
            };
            self.shown = Some(ShownIndicator {
                indicator,
                dismiss_at: Some(now + self.dismiss_after),
            });
            debug!(%kind, ?elapsed, "pending operation resolved");
        }
        resolution
    }

    /// Ends `handle` without asserting success or failure; the indicator is
    /// removed silently.
    pub fn abandon(&mut self, handle: PendingHandle) -> Resolution {
        let resolution = self.apply(SlotEvent::Abandon { handle });
        if let Resolution::Abandoned { kind } = resolution {
            self.shown = None;
            debug!(%kind, "pending operation abandoned");
        }
        resolution
    }

    /// Resolves whatever occupies the slot.
    pub fn resolve_current(&mut self, outcome: Outcome, now: Instant) -> Resolution {
        match self.current() {
            Some(handle) => self.resolve(handle, outcome, now),
            None => Resolution::NoOp,
        }
    }

    /// Abandons whatever occupies the slot.
    pub fn abandon_current(&mut self) -> Resolution {
        match self.current() {
            Some(handle) => self.abandon(handle),
            None => Resolution::NoOp,
        }
    }

    fn apply(&mut self, event: SlotEvent) -> Resolution {
        match self.slot.step(event) {
            Ok((slot, resolution)) => {
                self.slot = slot;
                resolution
            }
            Err(_) => Resolution::NoOp,
        }
    }

    pub fn current(&self) -> Option<PendingHandle> {
        match self.slot {
            SlotState::Pending { handle, .. } => Some(handle),
            SlotState::Idle => None,
        }
    }

    pub fn issued_at(&self) -> Option<Instant> {
        match self.slot {
            SlotState::Pending { issued_at, .. } => Some(issued_at),
            SlotState::Idle => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.slot, SlotState::Pending { .. })
    }

    /// Fails with [`TrackerError::Busy`] while an operation is outstanding.
    pub fn ensure_idle(&self) -> Result<(), TrackerError> {
        match self.slot {
            SlotState::Pending { handle, .. } => Err(TrackerError::Busy(handle.kind)),
            SlotState::Idle => Ok(()),
        }
    }

    pub fn state(&self) -> SlotState {
        self.slot
    }

    pub fn indicator(&self) -> Option<&Indicator> {
        self.shown.as_ref().map(|shown| &shown.indicator)
    }

    /// When the current terminal indicator should disappear.
    pub fn dismiss_deadline(&self) -> Option<Instant> {
        self.shown.as_ref().and_then(|shown| shown.dismiss_at)
    }

    /// Drops a terminal indicator whose deadline has passed.
    pub fn expire_indicator(&mut self, now: Instant) -> bool {
        match self.dismiss_deadline() {
            Some(deadline) if deadline <= now => {
                self.shown = None;
                true
            }
            _ => false,
        }
    }
}
