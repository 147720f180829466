//! Chunked-data retrieval (§4.2): the `PREPARE_DATA`/`DATA`/`FREE_DATA`
//! flow used by `get_attendance`, plus the small-payload `ACK_OK` shortcut.

use crate::error::{AppError, ProtocolError, Result};

use super::codec::{cmd, MAX_SAFE_PAYLOAD};
use super::session::DeviceSession;

/// Issue `command` and collect its response payload, following the
/// large-payload chunked path when the device replies `PREPARE_DATA`.
pub(super) async fn fetch_chunked(session: &mut DeviceSession, command: u16) -> Result<Vec<u8>> {
    let frame = session.send_command(command, &[]).await?;

    match frame.command {
        cmd::PREPARE_DATA => receive_chunks(session, &frame.payload).await,
        cmd::ACK_OK => Ok(frame.payload),
        other => Err(AppError::Protocol(ProtocolError::UnexpectedCommand(format!(
            "reply to command {command}: {other}"
        )))),
    }
}

async fn receive_chunks(session: &mut DeviceSession, prepare_payload: &[u8]) -> Result<Vec<u8>> {
    if prepare_payload.len() < 4 {
        return Err(AppError::Protocol(ProtocolError::Truncated(
            "PREPARE_DATA payload too short".to_string(),
        )));
    }
    let total_size = u32::from_le_bytes(prepare_payload[0..4].try_into().unwrap()) as usize;
    if total_size > MAX_SAFE_PAYLOAD {
        return Err(AppError::Protocol(ProtocolError::Truncated(format!(
            "PREPARE_DATA total_size {total_size} exceeds safety limit"
        ))));
    }

    let mut buffer = Vec::with_capacity(total_size);
    while buffer.len() < total_size {
        let frame = session.send_command(cmd::DATA, &[]).await?;
        match frame.command {
            cmd::DATA => buffer.extend_from_slice(&frame.payload),
            cmd::ACK_OK => break,
            other => {
                return Err(AppError::Protocol(ProtocolError::UnexpectedCommand(format!(
                    "unexpected reply during chunked transfer: {other}"
                ))))
            }
        }
    }

    // Exactly one FREE_DATA after the loop, never on the small-payload path.
    session.send_command(cmd::FREE_DATA, &[]).await?;
    Ok(buffer)
}
