//! Per-sweep, per-device audit row (§3 Sync log).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one device's pull within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Success,
    Error,
}

/// One audit row, ring-buffered to the most recent 1,000 entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: u64,
    pub device_id: u64,
    /// Always "pull" in the core.
    pub log_type: String,
    pub count: u32,
    pub status: SyncLogStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to append one sync-log row; the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone)]
pub struct SyncLogDraft {
    pub device_id: u64,
    pub log_type: String,
    pub count: u32,
    pub status: SyncLogStatus,
    pub message: String,
}
