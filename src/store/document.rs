//! The on-disk shape of the store (§6 Persisted state layout): arrays of
//! devices, punches, and sync logs, plus three monotonic id counters.

use serde::{Deserialize, Serialize};

use crate::models::{Device, Punch, SyncLog};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub devices: Vec<Device>,
    pub punches: Vec<Punch>,
    pub sync_logs: Vec<SyncLog>,
    #[serde(default)]
    pub next_device_id: u64,
    #[serde(default)]
    pub next_punch_id: u64,
    #[serde(default)]
    pub next_sync_log_id: u64,
}

/// Aggregate counters returned by `Store::stats`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total_devices: u64,
    pub active_devices: u64,
    pub total_punches: u64,
    pub today_punches: u64,
    pub unsynced_count: u64,
}
