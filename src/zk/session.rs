//! Device session (C2): owns one TCP connection to one terminal for its
//! whole lifetime and drives the command/reply handshake.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{AppError, ProtocolError, Result};

use super::codec::{
    build_frame, cmd, parse_command_layer, parse_tcp_header, Frame, COMMAND_HEADER_SIZE,
    MAX_SAFE_PAYLOAD, TCP_HEADER_SIZE,
};
use super::record::{decode_records, RawRecord};
use super::transfer::fetch_chunked;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection lifecycle (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Closed,
}

/// Best-effort `key=value` fields parsed from a `GET_DEVICE_INFO` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub fields: BTreeMap<String, String>,
}

/// One TCP connection to one ZK terminal.
pub struct DeviceSession {
    addr: String,
    stream: Option<TcpStream>,
    state: SessionState,
    session_id: u16,
    reply_id: u16,
}

impl DeviceSession {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            state: SessionState::Idle,
            session_id: 0,
            reply_id: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open the TCP connection and perform the `CONNECT` handshake,
    /// recording the session id the device assigns.
    pub async fn connect(&mut self) -> Result<()> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| AppError::ConnectTimeout(self.addr.clone()))?
            .map_err(|e| AppError::ConnectionFailed(format!("{}: {e}", self.addr)))?;

        self.stream = Some(stream);
        self.state = SessionState::Idle;
        self.session_id = 0;
        self.reply_id = 0;

        let frame = self.send_command(cmd::CONNECT, &[]).await?;
        if frame.command != cmd::ACK_OK {
            self.state = SessionState::Closed;
            return Err(AppError::Protocol(ProtocolError::UnexpectedCommand(format!(
                "connect reply {}",
                frame.command
            ))));
        }

        self.session_id = frame.session_id;
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Best-effort device identification. Individual fields that can't be
    /// parsed are left out rather than failing the whole call.
    pub async fn get_device_info(&mut self) -> Result<DeviceInfo> {
        let frame = self.send_command(cmd::GET_DEVICE_INFO, b"~SerialNumber\0").await?;
        let text = clean_reply(&frame.payload);

        let mut fields = BTreeMap::new();
        for part in text.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        let serial_number = fields.get("~SerialNumber").cloned().unwrap_or_default();
        Ok(DeviceInfo { serial_number, fields })
    }

    /// Pull every attendance record currently buffered on the device.
    pub async fn get_attendance(&mut self) -> Result<Vec<RawRecord>> {
        let buffer = fetch_chunked(self, cmd::GET_ATTENDANCE).await?;
        Ok(decode_records(&buffer))
    }

    pub async fn clear_attendance(&mut self) -> Result<()> {
        self.expect_ack(cmd::CLEAR_ATTENDANCE, &[]).await
    }

    pub async fn enable(&mut self) -> Result<()> {
        self.expect_ack(cmd::ENABLE_DEVICE, &[]).await
    }

    pub async fn disable(&mut self) -> Result<()> {
        self.expect_ack(cmd::DISABLE_DEVICE, &[]).await
    }

    /// Best-effort `EXIT`, then close the socket. Safe to call more than
    /// once or from any state.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Connected {
            let _ = self.send_command(cmd::EXIT, &[]).await;
        }
        self.stream = None;
        self.state = SessionState::Closed;
    }

    async fn expect_ack(&mut self, command: u16, payload: &[u8]) -> Result<()> {
        let frame = self.send_command(command, payload).await?;
        match frame.command {
            cmd::ACK_OK => Ok(()),
            cmd::ACK_ERROR => Err(AppError::Protocol(ProtocolError::UnexpectedCommand(
                "device returned ACK_ERROR".to_string(),
            ))),
            other => Err(AppError::Protocol(ProtocolError::UnexpectedCommand(format!(
                "unexpected reply {other}"
            )))),
        }
    }

    /// Send one command and wait for the matching reply, discarding frames
    /// whose `reply_id` doesn't match. Bounded by the per-command deadline;
    /// any I/O failure or timeout closes the connection.
    pub(super) async fn send_command(&mut self, command: u16, payload: &[u8]) -> Result<Frame> {
        if self.state != SessionState::Connected && command != cmd::CONNECT {
            return Err(AppError::NotConnected);
        }

        self.reply_id = self.reply_id.wrapping_add(1);
        let reply_id = self.reply_id;
        let frame_bytes = build_frame(command, self.session_id, reply_id, payload);
        let deadline = if command == cmd::CONNECT { CONNECT_TIMEOUT } else { COMMAND_TIMEOUT };

        let outcome = timeout(deadline, async {
            self.write_raw(&frame_bytes).await?;
            loop {
                let frame = self.read_frame_raw().await?;
                if frame.reply_id == reply_id {
                    break Ok(frame);
                }
                // Stale reply to a previous command; keep waiting.
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.state = SessionState::Closed;
                self.stream = None;
                Err(AppError::CommandTimeout(format!("command {command}")))
            }
        }
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(AppError::NotConnected)?;
        if let Err(e) = stream.write_all(bytes).await {
            self.state = SessionState::Closed;
            self.stream = None;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    async fn read_frame_raw(&mut self) -> Result<Frame> {
        let stream = self.stream.as_mut().ok_or(AppError::NotConnected)?;
        let mut header = [0u8; TCP_HEADER_SIZE];
        if let Err(e) = stream.read_exact(&mut header).await {
            self.state = SessionState::Closed;
            self.stream = None;
            return Err(AppError::Io(e));
        }

        let body_len = parse_tcp_header(&header)?;
        if !(COMMAND_HEADER_SIZE..=MAX_SAFE_PAYLOAD).contains(&body_len) {
            self.state = SessionState::Closed;
            self.stream = None;
            return Err(AppError::Protocol(ProtocolError::Truncated(format!(
                "body_len {body_len}"
            ))));
        }

        let mut body = vec![0u8; body_len];
        let stream = self.stream.as_mut().ok_or(AppError::NotConnected)?;
        if let Err(e) = stream.read_exact(&mut body).await {
            self.state = SessionState::Closed;
            self.stream = None;
            return Err(AppError::Io(e));
        }

        Ok(parse_command_layer(&body)?)
    }
}

fn clean_reply(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
