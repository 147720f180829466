//! Punch (attendance record) model and its de-dup natural key (§3 Punch).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Event kind decoded from the record's `status` byte.
///
/// Unknown codes are preserved rather than rejected — the device vendor
/// reserves the right to add kinds the core doesn't interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchKind {
    CheckIn,
    CheckOut,
    BreakOut,
    BreakIn,
    OvertimeIn,
    OvertimeOut,
    Unknown(u8),
}

impl PunchKind {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::CheckIn,
            1 => Self::CheckOut,
            2 => Self::BreakOut,
            3 => Self::BreakIn,
            4 => Self::OvertimeIn,
            5 => Self::OvertimeOut,
            other => Self::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::CheckIn => 0,
            Self::CheckOut => 1,
            Self::BreakOut => 2,
            Self::BreakIn => 3,
            Self::OvertimeIn => 4,
            Self::OvertimeOut => 5,
            Self::Unknown(b) => b,
        }
    }
}

/// One biometric punch pulled from a device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Punch {
    pub id: u64,
    pub device_id: u64,
    pub oder_id: u16,
    pub oder_id2: u16,
    pub oder_id3: u16,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: u8,
    pub punch: u8,
    pub synced_to_cloud: bool,
    pub created_at: DateTime<Utc>,
}

impl Punch {
    pub fn kind(&self) -> PunchKind {
        PunchKind::from_byte(self.status)
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            device_id: self.device_id,
            oder_id: self.oder_id,
            oder_id2: self.oder_id2,
            oder_id3: self.oder_id3,
            user_id: self.user_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// The composite tuple that de-dups punches across redelivery from a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub device_id: u64,
    pub oder_id: u16,
    pub oder_id2: u16,
    pub oder_id3: u16,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Lower bound on a valid punch timestamp: 2000-01-01T00:00:00Z.
pub fn min_valid_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// Exclusive upper bound: 2000 years plus the span a 32-bit packed offset
/// can express under the device's 31-day month convention.
pub fn max_valid_timestamp() -> DateTime<Utc> {
    let span_years = (u32::MAX as i64) / (60 * 60 * 24 * 31 * 12);
    Utc.with_ymd_and_hms(2000 + span_years as i32, 1, 1, 0, 0, 0).unwrap()
}

/// `true` if `timestamp` falls in the valid punch range.
pub fn timestamp_in_range(timestamp: DateTime<Utc>) -> bool {
    timestamp >= min_valid_timestamp() && timestamp < max_valid_timestamp()
}

/// Fields needed to insert one punch; the store assigns `id`, `created_at`,
/// and the initial `synced_to_cloud = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct PunchDraft {
    pub device_id: u64,
    pub oder_id: u16,
    pub oder_id2: u16,
    pub oder_id3: u16,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: u8,
    pub punch: u8,
}

impl PunchDraft {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            device_id: self.device_id,
            oder_id: self.oder_id,
            oder_id2: self.oder_id2,
            oder_id3: self.oder_id3,
            user_id: self.user_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Filter accepted by `list_punches` / `count_punches` (§4.3).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PunchFilter {
    pub device_id: Option<u64>,
    pub user_id: Option<String>,
    /// Inclusive lower bound, compared as an ISO-8601 string.
    pub start_date: Option<String>,
    /// Inclusive upper bound, compared as an ISO-8601 string.
    pub end_date: Option<String>,
    pub synced_to_cloud: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punch_kind_round_trip() {
        for b in 0u8..=5 {
            assert_eq!(PunchKind::from_byte(b).to_byte(), b);
        }
        assert_eq!(PunchKind::from_byte(200), PunchKind::Unknown(200));
    }

    #[test]
    fn test_timestamp_range() {
        assert!(!timestamp_in_range(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap()));
        assert!(timestamp_in_range(min_valid_timestamp()));
        assert!(timestamp_in_range(Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap()));
    }
}
