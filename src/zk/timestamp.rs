//! Packed timestamp codec (§4.1).
//!
//! The wire format is a single `u32` counting seconds since year 2000 using
//! a fixed 31-day month and 12-month year — not a calendar date. Per the
//! spec's open question, the decoded wall-clock value is treated as UTC by
//! the store even though the device encodes local time; that mismatch is
//! preserved here rather than "fixed", since no evidence pins down devices'
//! actual timezone behavior.
//!
//! Decoding does not reconstruct a year/month/day/hour/minute/second tuple
//! through a real-calendar constructor: the device's fixed-31-day-month
//! calendar routinely names dates a real calendar has no slot for (Feb 31,
//! Apr 31, Feb 30, ...), and `Utc.with_ymd_and_hms` returns `None` for those,
//! which would silently collapse distinct wire values onto the same
//! fallback instant. Instead the packed value is treated directly as an
//! elapsed-second offset from the epoch, which is the only representation
//! under which `decode`/`encode` round-trip exactly for every `u32`.

use chrono::{DateTime, TimeZone, Utc};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// Decode a packed timestamp into a UTC instant.
pub fn decode_packed_timestamp(encoded: u32) -> DateTime<Utc> {
    epoch() + chrono::Duration::seconds(encoded as i64)
}

/// Encode a UTC instant as a packed timestamp.
///
/// This is the exact inverse of [`decode_packed_timestamp`] for every
/// instant it can produce.
pub fn encode_packed_timestamp(dt: DateTime<Utc>) -> u32 {
    (dt - epoch()).num_seconds().max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_decode_zero() {
        let dt = decode_packed_timestamp(0);
        assert_eq!(dt, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_decode_one_day() {
        let dt = decode_packed_timestamp(60 * 60 * 24);
        assert_eq!(dt, Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_round_trip_within_first_year() {
        // Spec's round-trip law: decode(encode(t)) == t for t in [0, 12*31*24*60*60).
        let span = 12u32 * 31 * 24 * 60 * 60;
        for t in [0u32, 1, 59, 60, 3599, 3600, 86399, 86400, span / 2, span - 1] {
            let dt = decode_packed_timestamp(t);
            assert_eq!(encode_packed_timestamp(dt), t, "round trip failed for t={t}");
        }
    }

    #[test]
    fn test_round_trip_full_u32_range_sample() {
        // Round trip must hold well past any plausible device lifetime too,
        // since the codec makes no range assumption beyond `u32` itself.
        for t in [u32::MAX, u32::MAX - 1, 1 << 31, (1u32 << 31) + 1] {
            let dt = decode_packed_timestamp(t);
            assert_eq!(encode_packed_timestamp(dt), t, "round trip failed for t={t}");
        }
    }

    #[test]
    fn test_month_is_zero_based_on_wire() {
        // Day 32 of encoded stream (t = 31 days) rolls into month index 1 (February slot).
        let dt = decode_packed_timestamp(60 * 60 * 24 * 31);
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 1);
    }

    #[test]
    fn test_impossible_wire_date_round_trips_and_stays_distinct() {
        // t = 5_270_400 names wire digits Feb/31/00:00:00, which has no
        // Gregorian equivalent. A real-calendar decoder collapses this (and
        // every other impossible wire date) onto a 2000-01-01 fallback,
        // silently merging distinct punches that hit the dedup natural key.
        let impossible = 5_270_400u32;
        let dt = decode_packed_timestamp(impossible);
        assert_eq!(encode_packed_timestamp(dt), impossible);

        // A neighboring value must decode to a distinct instant rather than
        // both collapsing onto the same fallback.
        let neighbor = impossible + 60 * 60 * 24;
        let dt_neighbor = decode_packed_timestamp(neighbor);
        assert_ne!(dt, dt_neighbor);
        assert_eq!(encode_packed_timestamp(dt_neighbor), neighbor);
    }
}
