//! ZK wire framing: the two-layer envelope, checksum, and command constants.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! TCP layer (8 bytes):   magic1=0x5050 | magic2=0x8282 | body_len (u32)
//! Command layer (8+N):   command (u16) | checksum (u16) | session_id (u16) | reply_id (u16) | payload[N]
//! ```

use crate::error::ProtocolError;

pub const MAGIC1: u16 = 0x5050;
pub const MAGIC2: u16 = 0x8282;
pub const TCP_HEADER_SIZE: usize = 8;
pub const COMMAND_HEADER_SIZE: usize = 8;

/// Refuse to allocate a receive buffer larger than this for one frame.
pub const MAX_SAFE_PAYLOAD: usize = 16 * 1024 * 1024;

/// Command codes the core requires (§4.1).
pub mod cmd {
    pub const CONNECT: u16 = 1000;
    pub const EXIT: u16 = 1001;
    pub const ENABLE_DEVICE: u16 = 1002;
    pub const DISABLE_DEVICE: u16 = 1003;
    pub const GET_DEVICE_INFO: u16 = 11;
    pub const GET_ATTENDANCE: u16 = 13;
    pub const CLEAR_ATTENDANCE: u16 = 15;
    pub const PREPARE_DATA: u16 = 1500;
    pub const DATA: u16 = 1501;
    pub const FREE_DATA: u16 = 1502;
    pub const ACK_OK: u16 = 2000;
    pub const ACK_ERROR: u16 = 2001;
    pub const ACK_DATA: u16 = 2002;
}

/// A decoded command-layer frame (the bytes after the 8-byte TCP header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u16,
    pub session_id: u16,
    pub reply_id: u16,
    pub payload: Vec<u8>,
}

/// Compute the ZK 16-bit checksum over a command-layer buffer whose
/// checksum field (bytes 2..4) has already been zeroed.
///
/// Sums 16-bit little-endian words with 16-bit wraparound, folds in a
/// trailing odd byte as its low byte, then negates (two's complement).
pub fn checksum(command_layer: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    let mut chunks = command_layer.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_le_bytes([word[0], word[1]]));
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        sum = sum.wrapping_add(remainder[0] as u16);
    }
    (!sum).wrapping_add(1)
}

/// Build the full wire bytes (TCP layer + command layer) for one outbound
/// frame, computing and inserting the checksum.
pub fn build_frame(command: u16, session_id: u16, reply_id: u16, payload: &[u8]) -> Vec<u8> {
    let command_layer_len = COMMAND_HEADER_SIZE + payload.len();
    let mut packet = Vec::with_capacity(TCP_HEADER_SIZE + command_layer_len);

    packet.extend_from_slice(&MAGIC1.to_le_bytes());
    packet.extend_from_slice(&MAGIC2.to_le_bytes());
    packet.extend_from_slice(&(command_layer_len as u32).to_le_bytes());

    packet.extend_from_slice(&command.to_le_bytes());
    packet.extend_from_slice(&[0, 0]); // checksum placeholder
    packet.extend_from_slice(&session_id.to_le_bytes());
    packet.extend_from_slice(&reply_id.to_le_bytes());
    packet.extend_from_slice(payload);

    let chk = checksum(&packet[TCP_HEADER_SIZE..]);
    packet[TCP_HEADER_SIZE + 2..TCP_HEADER_SIZE + 4].copy_from_slice(&chk.to_le_bytes());

    packet
}

/// Parse and checksum-verify a command-layer buffer (everything after the
/// 8-byte TCP header).
pub fn parse_command_layer(buf: &[u8]) -> Result<Frame, ProtocolError> {
    if buf.len() < COMMAND_HEADER_SIZE {
        return Err(ProtocolError::Truncated(format!(
            "command layer too short: {} bytes",
            buf.len()
        )));
    }

    let command = u16::from_le_bytes([buf[0], buf[1]]);
    let received_checksum = u16::from_le_bytes([buf[2], buf[3]]);
    let session_id = u16::from_le_bytes([buf[4], buf[5]]);
    let reply_id = u16::from_le_bytes([buf[6], buf[7]]);

    let mut zeroed = buf.to_vec();
    zeroed[2] = 0;
    zeroed[3] = 0;
    let expected = checksum(&zeroed);
    if expected != received_checksum {
        return Err(ProtocolError::BadChecksum);
    }

    Ok(Frame {
        command,
        session_id,
        reply_id,
        payload: buf[COMMAND_HEADER_SIZE..].to_vec(),
    })
}

/// Parse the 8-byte TCP layer header, returning `(body_len)` after
/// validating the magic bytes.
pub fn parse_tcp_header(header: &[u8; TCP_HEADER_SIZE]) -> Result<usize, ProtocolError> {
    let magic1 = u16::from_le_bytes([header[0], header[1]]);
    let magic2 = u16::from_le_bytes([header[2], header[3]]);
    if magic1 != MAGIC1 || magic2 != MAGIC2 {
        return Err(ProtocolError::UnexpectedCommand(format!(
            "bad magic: {magic1:#06x} {magic2:#06x}"
        )));
    }
    let body_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    Ok(body_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty_command_layer() {
        // cmd=0, checksum=0, session=0, reply=0 -> all-zero 8 bytes
        let data = [0u8; 8];
        assert_eq!(checksum(&data), 0);
    }

    #[test]
    fn test_build_frame_structure() {
        let packet = build_frame(cmd::CONNECT, 0, 0, &[]);
        assert_eq!(&packet[0..2], &MAGIC1.to_le_bytes());
        assert_eq!(&packet[2..4], &MAGIC2.to_le_bytes());
        let body_len = u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]);
        assert_eq!(body_len as usize, COMMAND_HEADER_SIZE);
        assert_eq!(packet.len(), TCP_HEADER_SIZE + COMMAND_HEADER_SIZE);
    }

    #[test]
    fn test_frame_round_trip() {
        let payload = b"~SerialNumber\0".to_vec();
        let packet = build_frame(cmd::GET_DEVICE_INFO, 0x1234, 7, &payload);

        let body_len = parse_tcp_header(&packet[0..8].try_into().unwrap()).unwrap();
        assert_eq!(body_len, COMMAND_HEADER_SIZE + payload.len());

        let frame = parse_command_layer(&packet[8..]).unwrap();
        assert_eq!(frame.command, cmd::GET_DEVICE_INFO);
        assert_eq!(frame.session_id, 0x1234);
        assert_eq!(frame.reply_id, 7);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn test_bad_checksum_detected() {
        let mut packet = build_frame(cmd::CONNECT, 0, 0, &[]);
        // Flip a payload-adjacent bit to corrupt the checksum coverage.
        let last = packet.len() - 1;
        packet[last] ^= 0xFF;
        let err = parse_command_layer(&packet[8..]).unwrap_err();
        assert_eq!(err, ProtocolError::BadChecksum);
    }

    #[test]
    fn test_odd_length_payload_checksum() {
        let packet = build_frame(cmd::CONNECT, 1, 1, &[0xAB]);
        let frame = parse_command_layer(&packet[8..]).unwrap();
        assert_eq!(frame.payload, vec![0xAB]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let header = [0u8; 8];
        assert!(parse_tcp_header(&header).is_err());
    }
}
