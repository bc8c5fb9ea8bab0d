//! Wire framing: opcodes, the registration frame, per-session request/response
//! frames, and notification text records.
//!
//! Kept free of I/O — callers read raw bytes off a pipe and hand them here,
//! or take formatted bytes from here and write them to a pipe. This mirrors
//! how the reference codec modules stay disk/transport-agnostic.

use anyhow::{bail, Result};

use crate::consts::{
    CONNECT_FRAME_LEN, KEYED_FRAME_LEN, MAX_KEY_SIZE, MAX_PIPE_PATH_LENGTH, MAX_STRING_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
}

impl OpCode {
    pub const CONNECT: u8 = 1;
    pub const DISCONNECT: u8 = 2;
    pub const SUBSCRIBE: u8 = 3;
    pub const UNSUBSCRIBE: u8 = 4;

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            Self::CONNECT => Some(OpCode::Connect),
            Self::DISCONNECT => Some(OpCode::Disconnect),
            Self::SUBSCRIBE => Some(OpCode::Subscribe),
            Self::UNSUBSCRIBE => Some(OpCode::Unsubscribe),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            OpCode::Connect => Self::CONNECT,
            OpCode::Disconnect => Self::DISCONNECT,
            OpCode::Subscribe => Self::SUBSCRIBE,
            OpCode::Unsubscribe => Self::UNSUBSCRIBE,
        }
    }
}

/// Parsed CONNECT frame: the three pipe paths a new client advertises.
#[derive(Debug, Clone)]
pub struct ConnectFrame {
    pub req_path: String,
    pub resp_path: String,
    pub notif_path: String,
}

fn encode_path_field(path: &str) -> Result<[u8; MAX_PIPE_PATH_LENGTH]> {
    if path.len() > MAX_PIPE_PATH_LENGTH {
        bail!("path {path:?} exceeds {MAX_PIPE_PATH_LENGTH} bytes");
    }
    let mut field = [0u8; MAX_PIPE_PATH_LENGTH];
    field[..path.len()].copy_from_slice(path.as_bytes());
    Ok(field)
}

fn decode_path_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl ConnectFrame {
    pub fn encode(&self) -> Result<[u8; CONNECT_FRAME_LEN]> {
        let mut buf = [0u8; CONNECT_FRAME_LEN];
        buf[0] = OpCode::CONNECT;
        buf[1..1 + MAX_PIPE_PATH_LENGTH].copy_from_slice(&encode_path_field(&self.req_path)?);
        buf[1 + MAX_PIPE_PATH_LENGTH..1 + 2 * MAX_PIPE_PATH_LENGTH]
            .copy_from_slice(&encode_path_field(&self.resp_path)?);
        buf[1 + 2 * MAX_PIPE_PATH_LENGTH..1 + 3 * MAX_PIPE_PATH_LENGTH]
            .copy_from_slice(&encode_path_field(&self.notif_path)?);
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != CONNECT_FRAME_LEN {
            bail!(
                "connect frame: expected {CONNECT_FRAME_LEN} bytes, got {}",
                buf.len()
            );
        }
        if buf[0] != OpCode::CONNECT {
            bail!("connect frame: bad opcode {}", buf[0]);
        }
        let req_path = decode_path_field(&buf[1..1 + MAX_PIPE_PATH_LENGTH]);
        let resp_path =
            decode_path_field(&buf[1 + MAX_PIPE_PATH_LENGTH..1 + 2 * MAX_PIPE_PATH_LENGTH]);
        let notif_path =
            decode_path_field(&buf[1 + 2 * MAX_PIPE_PATH_LENGTH..1 + 3 * MAX_PIPE_PATH_LENGTH]);
        Ok(Self {
            req_path,
            resp_path,
            notif_path,
        })
    }
}

/// A request read from a session's request pipe, already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Disconnect,
    Subscribe(String),
    Unsubscribe(String),
}

fn encode_keyed_frame(opcode: u8, key: &str) -> Result<[u8; KEYED_FRAME_LEN]> {
    if key.len() > MAX_KEY_SIZE {
        bail!("key {key:?} exceeds {MAX_KEY_SIZE} bytes");
    }
    let mut buf = [b' '; KEYED_FRAME_LEN];
    buf[0] = opcode;
    buf[1..1 + key.len()].copy_from_slice(key.as_bytes());
    Ok(buf)
}

impl Request {
    /// Decode a request frame. `buf` must be exactly as long as the frame
    /// implied by its opcode (1 byte for DISCONNECT, `KEYED_FRAME_LEN` for
    /// SUBSCRIBE/UNSUBSCRIBE). Returns `Ok(None)` for an unrecognized opcode
    /// (logged and ignored by the caller, per spec).
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.is_empty() {
            bail!("empty request frame");
        }
        match OpCode::from_byte(buf[0]) {
            Some(OpCode::Disconnect) => Ok(Some(Request::Disconnect)),
            Some(OpCode::Subscribe) | Some(OpCode::Unsubscribe) => {
                if buf.len() < KEYED_FRAME_LEN {
                    bail!(
                        "keyed request frame: expected {KEYED_FRAME_LEN} bytes, got {}",
                        buf.len()
                    );
                }
                let raw = &buf[1..KEYED_FRAME_LEN];
                let key = String::from_utf8_lossy(raw).trim_end_matches(' ').to_string();
                if buf[0] == OpCode::SUBSCRIBE {
                    Ok(Some(Request::Subscribe(key)))
                } else {
                    Ok(Some(Request::Unsubscribe(key)))
                }
            }
            Some(OpCode::Connect) | None => Ok(None),
        }
    }

    pub fn encode_subscribe(key: &str) -> Result<[u8; KEYED_FRAME_LEN]> {
        encode_keyed_frame(OpCode::SUBSCRIBE, key)
    }

    pub fn encode_unsubscribe(key: &str) -> Result<[u8; KEYED_FRAME_LEN]> {
        encode_keyed_frame(OpCode::UNSUBSCRIBE, key)
    }

    pub fn encode_disconnect() -> [u8; 1] {
        [OpCode::DISCONNECT]
    }
}

/// A 2-byte response frame: echoed opcode + result byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub opcode: u8,
    pub result: u8,
}

impl Response {
    pub fn encode(self) -> [u8; 2] {
        [self.opcode, self.result]
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != 2 {
            bail!("response frame: expected 2 bytes, got {}", buf.len());
        }
        Ok(Self {
            opcode: buf[0],
            result: buf[1],
        })
    }
}

/// Format a notification record: `(KEY,VALUE)\n`, with `VALUE` being the
/// literal tombstone for deletes.
pub fn format_notification(key: &str, value: &str) -> String {
    debug_assert!(key.len() <= MAX_STRING_SIZE);
    debug_assert!(value.len() <= MAX_STRING_SIZE.max(crate::consts::TOMBSTONE.len()));
    format!("({key},{value})\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_frame_roundtrip() {
        let f = ConnectFrame {
            req_path: "/tmp/req1".to_string(),
            resp_path: "/tmp/resp1".to_string(),
            notif_path: "/tmp/notif1".to_string(),
        };
        let encoded = f.encode().unwrap();
        let decoded = ConnectFrame::decode(&encoded).unwrap();
        assert_eq!(decoded.req_path, f.req_path);
        assert_eq!(decoded.resp_path, f.resp_path);
        assert_eq!(decoded.notif_path, f.notif_path);
    }

    #[test]
    fn subscribe_frame_strips_padding() {
        let encoded = Request::encode_subscribe("a").unwrap();
        let req = Request::decode(&encoded).unwrap().unwrap();
        assert_eq!(req, Request::Subscribe("a".to_string()));
    }

    #[test]
    fn unknown_opcode_decodes_to_none() {
        let buf = [9u8; KEYED_FRAME_LEN];
        assert!(Request::decode(&buf).unwrap().is_none());
    }

    #[test]
    fn notification_format_matches_wire() {
        assert_eq!(format_notification("a", "1"), "(a,1)\n");
        assert_eq!(format_notification("a", "DELETED"), "(a,DELETED)\n");
    }
}
