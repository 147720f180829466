//! ZKTeco/ESSL "ZK" binary protocol client (C1 wire codec + C2 device session).
//!
//! Implements the two-layer TCP framing, session/reply handshake, chunked
//! `PREPARE_DATA`/`DATA`/`FREE_DATA` transfer, and packed attendance record
//! decoding used by ZKTeco/ESSL terminals on port 4370.

mod codec;
mod record;
mod session;
mod timestamp;
mod transfer;


pub use codec::{cmd, Frame, MAX_SAFE_PAYLOAD};
pub use record::decode_records;
pub use session::{DeviceInfo, DeviceSession, SessionState};
pub use timestamp::{decode_packed_timestamp, encode_packed_timestamp};
