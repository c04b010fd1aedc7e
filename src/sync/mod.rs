//! Mirroring the local cache to the remote authority.
//!
//! Every network operation returns a [`SyncOutcome`]: failures of any kind
//! (transport, status, decoding) are folded into `success = false` and a
//! human-readable message at this boundary and never propagate further.

pub mod client;
pub mod controller;
pub mod generation;
pub mod prober;
pub mod timers;

use serde::Serialize;

pub use client::SyncClient;
pub use controller::{ManualSync, SkipReason, SyncController, SyncStatus};
pub use generation::Generations;
pub use prober::ConnectivityProber;
pub use timers::{TimerGuard, TimerScope};

/// Result value of a sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome<T> {
    /// Whether the operation took effect.
    pub success: bool,
    /// Human-readable description for optional display.
    pub message: String,
    /// Payload of a successful operation.
    pub data: Option<T>,
    /// Request generation the outcome belongs to.
    pub generation: u64,
}

impl<T> SyncOutcome<T> {
    /// A successful outcome carrying `data`.
    #[must_use]
    pub fn succeeded(generation: u64, message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            generation,
        }
    }

    /// A failed outcome with no payload.
    #[must_use]
    pub fn failed(generation: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            generation,
        }
    }
}
