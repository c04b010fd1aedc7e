//! Wire payloads exchanged with the remote authority.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Discovery, Task};

/// Both collections, as pushed to `/api/sync` and returned in `parsed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Task collection, newest first.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Discovery collection, newest first.
    #[serde(default)]
    pub discoveries: Vec<Discovery>,
}

/// Record counts the server acknowledged for a push.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncedCounts {
    /// Tasks received.
    pub tasks: usize,
    /// Discoveries received.
    pub discoveries: usize,
}

/// Success body of `POST /api/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Outcome label.
    #[serde(default)]
    pub status: Option<String>,
    /// Human-readable server message.
    #[serde(default)]
    pub message: Option<String>,
    /// Acknowledged counts.
    pub synced: SyncedCounts,
}

/// Body of `GET /api/load`.
///
/// `data` maps each storage key to its raw JSON-encoded value, exactly as it
/// should be written into the local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    /// `"success"` or `"error"`.
    pub status: String,
    /// Failure explanation when `status` is not `"success"`.
    #[serde(default)]
    pub message: Option<String>,
    /// Raw values keyed by storage key.
    #[serde(default)]
    pub data: Option<HashMap<String, String>>,
    /// Decoded collections.
    #[serde(default)]
    pub parsed: Option<Snapshot>,
}

/// Body of `POST /api/backup`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupReceipt {
    /// Name of the backup file written on the server.
    pub filename: String,
}
