//! Packed attendance record formats (§4.1): the 40-byte "new" layout and
//! the 16-byte "old" layout.

/// A single decoded attendance record, before it is stamped with a
/// device id and turned into a [`crate::models::Punch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub oder_id: u16,
    pub oder_id2: u16,
    pub oder_id3: u16,
    pub user_id: String,
    pub timestamp: u32,
    pub status: u8,
    pub punch: u8,
    pub uid: u16,
}

/// Strip trailing NULs and surrounding whitespace from a fixed-width ASCII
/// field.
fn clean_ascii(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

/// Split a raw attendance buffer into fixed-size records and decode each
/// one, dropping malformed records silently (§4.1, §7 RecordDecodeError).
///
/// Picks the 40-byte "new" format if the buffer is at least 40 bytes long,
/// otherwise the 16-byte "old" format.
pub fn decode_records(buffer: &[u8]) -> Vec<RawRecord> {
    if buffer.len() >= 40 {
        buffer.chunks_exact(40).filter_map(decode_record_40).collect()
    } else {
        buffer.chunks_exact(16).filter_map(decode_record_16).collect()
    }
}

fn decode_record_40(chunk: &[u8]) -> Option<RawRecord> {
    if chunk.len() != 40 {
        return None;
    }

    let oder_id = u16::from_le_bytes([chunk[0], chunk[1]]);
    let oder_id2 = u16::from_le_bytes([chunk[2], chunk[3]]);
    let oder_id3 = u16::from_le_bytes([chunk[4], chunk[5]]);
    let user_id = clean_ascii(&chunk[6..15]);
    let timestamp = u32::from_le_bytes([chunk[24], chunk[25], chunk[26], chunk[27]]);
    let status = chunk[28];
    let punch = chunk[29];
    let uid = u16::from_le_bytes([chunk[32], chunk[33]]);

    if user_id.is_empty() {
        return None;
    }

    Some(RawRecord {
        oder_id,
        oder_id2,
        oder_id3,
        user_id,
        timestamp,
        status,
        punch,
        uid,
    })
}

fn decode_record_16(chunk: &[u8]) -> Option<RawRecord> {
    if chunk.len() != 16 {
        return None;
    }

    let uid = u16::from_le_bytes([chunk[0], chunk[1]]);
    let mut user_id = clean_ascii(&chunk[2..6]);
    if user_id.is_empty() {
        user_id = uid.to_string();
    }
    let timestamp = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
    let status = chunk[8];
    let punch = chunk[9];

    if user_id.is_empty() {
        return None;
    }

    Some(RawRecord {
        oder_id: 0,
        oder_id2: 0,
        oder_id3: 0,
        user_id,
        timestamp,
        status,
        punch,
        uid,
    })
}

/// Encode a record in the 40-byte "new" layout. Used by tests to exercise
/// the round-trip law and by device-simulating test harnesses.
#[cfg(test)]
pub fn encode_record_40(r: &RawRecord) -> [u8; 40] {
    let mut buf = [0u8; 40];
    buf[0..2].copy_from_slice(&r.oder_id.to_le_bytes());
    buf[2..4].copy_from_slice(&r.oder_id2.to_le_bytes());
    buf[4..6].copy_from_slice(&r.oder_id3.to_le_bytes());
    let user_bytes = r.user_id.as_bytes();
    let n = user_bytes.len().min(9);
    buf[6..6 + n].copy_from_slice(&user_bytes[..n]);
    buf[24..28].copy_from_slice(&r.timestamp.to_le_bytes());
    buf[28] = r.status;
    buf[29] = r.punch;
    buf[32..34].copy_from_slice(&r.uid.to_le_bytes());
    buf
}

/// Encode a record in the 16-byte "old" layout.
#[cfg(test)]
pub fn encode_record_16(r: &RawRecord) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[0..2].copy_from_slice(&r.uid.to_le_bytes());
    let user_bytes = r.user_id.as_bytes();
    let n = user_bytes.len().min(4);
    buf[2..2 + n].copy_from_slice(&user_bytes[..n]);
    buf[4..8].copy_from_slice(&r.timestamp.to_le_bytes());
    buf[8] = r.status;
    buf[9] = r.punch;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawRecord {
        RawRecord {
            oder_id: 1,
            oder_id2: 2,
            oder_id3: 3,
            user_id: "1329".to_string(),
            timestamp: 0x2AF4B1E0,
            status: 1,
            punch: 0,
            uid: 42,
        }
    }

    #[test]
    fn test_round_trip_40_byte_format() {
        let record = sample();
        let encoded = encode_record_40(&record);
        let decoded = decode_record_40(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_round_trip_16_byte_format() {
        let record = RawRecord {
            oder_id: 0,
            oder_id2: 0,
            oder_id3: 0,
            user_id: "65".to_string(),
            timestamp: 172800,
            status: 2,
            punch: 1,
            uid: 65,
        };
        let encoded = encode_record_16(&record);
        let decoded = decode_record_16(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_old_format_falls_back_to_uid_when_user_id_blank() {
        let mut buf = [0u8; 16];
        buf[0..2].copy_from_slice(&77u16.to_le_bytes());
        let decoded = decode_record_16(&buf).unwrap();
        assert_eq!(decoded.user_id, "77");
    }

    #[test]
    fn test_blank_user_id_rejected_in_new_format() {
        let buf = [0u8; 40];
        assert!(decode_record_40(&buf).is_none());
    }

    #[test]
    fn test_decode_records_picks_format_by_length() {
        let r40 = sample();
        let buf40 = encode_record_40(&r40);
        let mut double = Vec::new();
        double.extend_from_slice(&buf40);
        double.extend_from_slice(&buf40);
        let decoded = decode_records(&double);
        assert_eq!(decoded.len(), 2);

        let r16 = RawRecord {
            oder_id: 0,
            oder_id2: 0,
            oder_id3: 0,
            user_id: "9".to_string(),
            timestamp: 60,
            status: 0,
            punch: 0,
            uid: 9,
        };
        let buf16 = encode_record_16(&r16);
        let decoded16 = decode_records(&buf16);
        assert_eq!(decoded16.len(), 1);
        assert_eq!(decoded16[0].user_id, "9");
    }
}
