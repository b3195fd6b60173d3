//! Framed request/reply transport, ported from `task-ble.c`'s state machine.
//!
//! Inbound writes carry a command byte (`QUERY`/`RESET`/`START`/`CONTINUE`)
//! and accumulate a payload whose first 32 bytes are a SHA-256 digest of the
//! remainder. Once the digest checks out, the remainder is decoded as a
//! structured message and handed off for panel-side handling; replies are
//! built back into a scratch buffer and chunked out in the reverse
//! direction.

mod error;

pub use error::{TransportError, TransportResult};

use sha2::{Digest, Sha256};
use signer_codec::Cursor;
use tracing::{debug, warn};

pub const CMD_RESET: u8 = 0x02;
pub const CMD_QUERY: u8 = 0x03;
pub const CMD_START: u8 = 0x06;
pub const CMD_CONTINUE: u8 = 0x07;

pub const STATUS_OK: u8 = 0x00;
pub const STATUS_SUPPRESS: u8 = 0x7f;
pub const STATUS_UNKNOWN: u8 = 0x8f;

const DIGEST_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Ready,
    Receiving,
    Received,
    Processing,
    Sending,
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub protocol_version: u8,
    pub model_number: u32,
    pub serial_number: u32,
}

#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub id: u64,
    pub method: String,
    pub params: Cursor,
}

/// Result of feeding one inbound frame to a [`Connection`].
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// No payload to act on yet (RESET or a partial START/CONTINUE).
    None,
    /// A QUERY command; the caller replies with this device info directly,
    /// independent of the START/CONTINUE/RESET receive state machine.
    Query(DeviceInfo),
    /// A complete, digest-verified payload decoded into a message.
    Message(DecodedMessage),
    /// A complete payload that failed digest verification or decoding; the
    /// connection silently drops it and stays in `Ready`.
    Dropped,
}

struct InFlight {
    expected_offset: usize,
    total_length: usize,
    buffer: Vec<u8>,
}

struct OutboundReply {
    buffer: Vec<u8>,
    offset: usize,
}

pub struct Connection {
    state: ConnectionState,
    chunk_size: usize,
    info: DeviceInfo,
    in_flight: Option<InFlight>,
    accepted: Option<DecodedMessage>,
    outbound: Option<OutboundReply>,
}

impl Connection {
    pub fn new(chunk_size: usize, info: DeviceInfo) -> Self {
        Connection {
            state: ConnectionState::Ready,
            chunk_size,
            info,
            in_flight: None,
            accepted: None,
            outbound: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Ready;
        self.in_flight = None;
        self.accepted = None;
        self.outbound = None;
    }

    /// Feeds one inbound command frame, returning the status byte to send
    /// back immediately and, if a message became available, the decoded
    /// event.
    pub fn receive(&mut self, frame: &[u8]) -> (u8, InboundEvent) {
        let Some((&cmd, payload)) = frame.split_first() else {
            return (TransportError::BadCommand.status_byte(), InboundEvent::None);
        };

        let result = match cmd {
            CMD_QUERY => {
                return (STATUS_OK, InboundEvent::Query(self.info));
            }
            CMD_RESET => {
                self.reset();
                return (STATUS_OK, InboundEvent::None);
            }
            CMD_START => self.handle_start(payload),
            CMD_CONTINUE => self.handle_continue(payload),
            _ => Err(TransportError::BadCommand),
        };

        match result {
            Ok(None) => (STATUS_OK, InboundEvent::None),
            Ok(Some(buffer)) => {
                self.state = ConnectionState::Received;
                match verify_and_decode(&buffer) {
                    Some(message) => {
                        self.accepted = Some(message.clone());
                        (STATUS_OK, InboundEvent::Message(message))
                    }
                    None => {
                        warn!("dropping payload that failed integrity or decode checks");
                        self.reset();
                        (STATUS_OK, InboundEvent::Dropped)
                    }
                }
            }
            Err(e) => (e.status_byte(), InboundEvent::None),
        }
    }

    fn handle_start(&mut self, payload: &[u8]) -> TransportResult<Option<Vec<u8>>> {
        if self.state != ConnectionState::Ready {
            return Err(TransportError::Busy);
        }
        if payload.len() < 2 {
            return Err(TransportError::BufferOverrun);
        }
        let total_length = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        let chunk = &payload[2..];
        if chunk.len() > self.chunk_size || chunk.len() > total_length {
            return Err(TransportError::BufferOverrun);
        }

        let mut buffer = vec![0u8; total_length];
        buffer[..chunk.len()].copy_from_slice(chunk);

        if chunk.len() == total_length {
            return Ok(Some(buffer));
        }

        self.state = ConnectionState::Receiving;
        self.in_flight = Some(InFlight {
            expected_offset: chunk.len(),
            total_length,
            buffer,
        });
        Ok(None)
    }

    fn handle_continue(&mut self, payload: &[u8]) -> TransportResult<Option<Vec<u8>>> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Err(TransportError::MissingMessage);
        };
        if self.state != ConnectionState::Receiving {
            return Err(TransportError::MissingMessage);
        }
        if payload.len() < 2 {
            return Err(TransportError::BufferOverrun);
        }
        let offset = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        if offset != in_flight.expected_offset {
            return Err(TransportError::MissingMessage);
        }
        let chunk = &payload[2..];
        let end = offset + chunk.len();
        if chunk.len() > self.chunk_size || end > in_flight.total_length {
            return Err(TransportError::BufferOverrun);
        }

        in_flight.buffer[offset..end].copy_from_slice(chunk);
        in_flight.expected_offset = end;

        if end == in_flight.total_length {
            let in_flight = self.in_flight.take().unwrap();
            return Ok(Some(in_flight.buffer));
        }
        Ok(None)
    }

    /// Accepts the currently-received message by id, transitioning to
    /// `Processing` and returning its params cursor.
    pub fn accept(&mut self, id: u64) -> Option<DecodedMessage> {
        if self.state != ConnectionState::Received {
            return None;
        }
        let message = self.accepted.take()?;
        if message.id != id {
            self.accepted = Some(message);
            return None;
        }
        self.state = ConnectionState::Processing;
        Some(message)
    }

    /// Stages a built reply body, computing its digest into bytes `[0..32]`
    /// and transitioning to `Sending`.
    pub fn send_reply(&mut self, body: &[u8]) {
        let mut buffer = vec![0u8; DIGEST_LEN + body.len()];
        buffer[DIGEST_LEN..].copy_from_slice(body);
        let digest = Sha256::digest(&buffer[DIGEST_LEN..]);
        buffer[..DIGEST_LEN].copy_from_slice(&digest);

        self.outbound = Some(OutboundReply { buffer, offset: 0 });
        self.state = ConnectionState::Sending;
        debug!(len = body.len(), "staged reply for outbound chunking");
    }

    /// Emits the next outbound frame (`START` at offset 0, `CONTINUE`
    /// thereafter), or `None` once fully sent and the connection has
    /// returned to `Ready`.
    pub fn pump_outbound(&mut self) -> Option<Vec<u8>> {
        let reply = self.outbound.as_mut()?;
        let remaining = reply.buffer.len() - reply.offset;
        let chunk_len = remaining.min(self.chunk_size);
        let chunk = &reply.buffer[reply.offset..reply.offset + chunk_len];

        let mut frame = Vec::with_capacity(3 + chunk_len);
        if reply.offset == 0 {
            frame.push(CMD_START);
            frame.extend_from_slice(&(reply.buffer.len() as u16).to_be_bytes());
        } else {
            frame.push(CMD_CONTINUE);
            frame.extend_from_slice(&(reply.offset as u16).to_be_bytes());
        }
        frame.extend_from_slice(chunk);

        reply.offset += chunk_len;
        if reply.offset == reply.buffer.len() {
            self.reset();
        }
        Some(frame)
    }

    pub fn info(&self) -> DeviceInfo {
        self.info
    }
}

fn verify_and_decode(payload: &[u8]) -> Option<DecodedMessage> {
    if payload.len() < DIGEST_LEN {
        return None;
    }
    let expected = Sha256::digest(&payload[DIGEST_LEN..]);
    if expected.as_slice() != &payload[..DIGEST_LEN] {
        return None;
    }

    let cursor = Cursor::new(payload[DIGEST_LEN..].to_vec());
    let id = cursor.follow_key("id").ok()?.value().ok()?;
    if id > i32::MAX as u64 {
        return None;
    }
    let method_cursor = cursor.follow_key("method").ok()?;
    let method = method_cursor.as_str().ok()?;
    if method.len() > 31 {
        return None;
    }
    let params = cursor.follow_key("params").ok()?;

    Some(DecodedMessage {
        id,
        method: method.to_string(),
        params,
    })
}
