/// Frontier item state definitions
///
/// This module defines the lifecycle a frontier item moves through while the
/// crawl runs.
use std::fmt;

/// Represents the current state of a frontier item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Item is queued and waiting to be claimed by a worker
    Pending,

    /// Item has been claimed and is being fetched
    InFlight,

    /// Item failed with a transient error and waits for a retry
    Failed,

    // ===== Terminal States =====
    /// Item was fetched and extracted successfully
    Done,

    /// Item exhausted its attempts or failed permanently
    DeadLettered,
}

impl ItemState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::DeadLettered)
    }

    /// Returns true if the item may be handed to a worker
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Checks whether moving from this state to `next` is allowed
    ///
    /// | From | Allowed targets |
    /// |------|-----------------|
    /// | Pending | InFlight |
    /// | InFlight | Done, Failed, DeadLettered |
    /// | Failed | InFlight, DeadLettered |
    /// | Done, DeadLettered | none |
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InFlight)
                | (Self::InFlight, Self::Done)
                | (Self::InFlight, Self::Failed)
                | (Self::InFlight, Self::DeadLettered)
                | (Self::Failed, Self::InFlight)
                | (Self::Failed, Self::DeadLettered)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Failed => "failed",
            Self::Done => "done",
            Self::DeadLettered => "dead_lettered",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
