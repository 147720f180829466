//! Data models: devices, punches, and sync logs (§3).

pub mod device;
pub mod punch;
pub mod sync_log;

pub use device::{Device, DeviceUpdate, NewDevice};
pub use punch::{NaturalKey, Punch, PunchDraft, PunchFilter};
pub use sync_log::{SyncLog, SyncLogDraft, SyncLogStatus};
