//! Registered terminal model (§3 Device).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered biometric terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: u64,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub location: String,
    pub active: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// The `(ip, port)` pair that must be unique across all devices.
    pub fn endpoint_key(&self) -> (String, u16) {
        (self.ip.clone(), self.port)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Partial update applied by `update_device`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub location: Option<String>,
    pub active: Option<bool>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Fields required to register a new device; the store assigns `id` and
/// the created/updated timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_port() -> u16 {
    4370
}

fn default_active() -> bool {
    true
}
