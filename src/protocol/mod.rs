//! Command/response protocol between the front end and the capture worker
//!
//! Every message is a fixed 8-byte header followed by its payload.
//!
//! # Header
//! Network Byte Order (Big Endian):
//! - Version (u8): 1 byte
//! - Kind (u8): 1 byte
//! - Reserved (u16): 2 bytes
//! - Payload Length (u32): 4 bytes
//!
//! # Payloads
//! - `Command`: JSON-encoded [`WorkerCommand`]
//! - `Response`: metadata length (u32), JSON metadata (frame size, capture
//!   error, codes), then the raw RGBA pixels of the frame

pub mod error;

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::domain::{CodeGeometry, SymbologySet};
pub use error::{ProtocolError, Result};

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Largest payload accepted from the peer
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    // Front end -> Worker
    Command = 1,

    // Worker -> Front end
    Response = 2,
}

impl MessageKind {
    /// Convert u8 to MessageKind
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MessageKind::Command),
            2 => Ok(MessageKind::Response),
            _ => Err(ProtocolError::InvalidKind(value)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub kind: MessageKind,
    pub reserved: u16,
    pub payload_len: u32,
}

impl Header {
    pub fn new(kind: MessageKind, payload_len: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            reserved: 0,
            payload_len,
        }
    }

    pub fn pack(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        let mut cursor = Cursor::new(&mut buf[..]);

        cursor.write_u8(self.version)?;
        cursor.write_u8(self.kind.as_u8())?;
        cursor.write_u16::<BigEndian>(self.reserved)?;
        cursor.write_u32::<BigEndian>(self.payload_len)?;

        Ok(buf)
    }

    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::HeaderTooShort {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut cursor = Cursor::new(&data[..HEADER_SIZE]);

        let version = cursor.read_u8()?;
        let kind_raw = cursor.read_u8()?;
        let reserved = cursor.read_u16::<BigEndian>()?;
        let payload_len = cursor.read_u32::<BigEndian>()?;

        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }
        if payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len as usize,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Self {
            version,
            kind: MessageKind::from_u8(kind_raw)?,
            reserved,
            payload_len,
        })
    }
}

/// Protocol message (header + payload)
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let header = Header::new(kind, payload.len() as u32);
        Ok(Self { header, payload })
    }

    pub fn kind(&self) -> MessageKind {
        self.header.kind
    }

    /// Header and payload as one contiguous buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.header.pack()?);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    fn ensure_kind(&self, expected: MessageKind) -> Result<()> {
        if self.kind() != expected {
            return Err(ProtocolError::UnexpectedMessage {
                expected,
                got: self.kind(),
            });
        }
        Ok(())
    }

    pub fn into_command(self) -> Result<WorkerCommand> {
        self.ensure_kind(MessageKind::Command)?;
        WorkerCommand::decode(&self.payload)
    }

    pub fn into_response(self) -> Result<WorkerResponse> {
        self.ensure_kind(MessageKind::Response)?;
        WorkerResponse::decode(&self.payload)
    }
}

/// Front end -> worker, one per cycle even when nothing changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub terminate: bool,
    pub source_selector: String,
    pub enabled: SymbologySet,
}

impl WorkerCommand {
    pub fn scan(source_selector: impl Into<String>, enabled: SymbologySet) -> Self {
        Self {
            terminate: false,
            source_selector: source_selector.into(),
            enabled,
        }
    }

    pub fn terminate() -> Self {
        Self {
            terminate: true,
            source_selector: String::new(),
            enabled: SymbologySet::NONE,
        }
    }

    pub fn encode(&self) -> Result<Message> {
        Message::new(MessageKind::Command, serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Worker -> front end, exactly one per command
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResponse {
    pub frame: Frame,
    pub codes: Vec<CodeGeometry>,
}

#[derive(Serialize, Deserialize)]
struct ResponseMeta {
    width: u32,
    height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    codes: Vec<CodeGeometry>,
}

impl WorkerResponse {
    pub fn encode(&self) -> Result<Message> {
        let meta = serde_json::to_vec(&ResponseMeta {
            width: self.frame.width(),
            height: self.frame.height(),
            error: self.frame.error.clone(),
            codes: self.codes.clone(),
        })?;
        let pixels = self.frame.rgba.as_raw();

        let mut payload = Vec::with_capacity(4 + meta.len() + pixels.len());
        payload.write_u32::<BigEndian>(meta.len() as u32)?;
        payload.extend_from_slice(&meta);
        payload.extend_from_slice(pixels);
        Message::new(MessageKind::Response, payload)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(payload);
        let meta_len = cursor.read_u32::<BigEndian>()? as usize;
        let rest = &payload[4..];
        if rest.len() < meta_len {
            return Err(ProtocolError::PayloadLengthMismatch {
                expected: meta_len,
                got: rest.len(),
            });
        }
        let (meta, pixels) = rest.split_at(meta_len);
        let meta: ResponseMeta = serde_json::from_slice(meta)?;

        let expected = meta.width as usize * meta.height as usize * 4;
        if pixels.len() != expected {
            return Err(ProtocolError::PayloadLengthMismatch {
                expected,
                got: pixels.len(),
            });
        }
        let rgba = RgbaImage::from_raw(meta.width, meta.height, pixels.to_vec()).ok_or(
            ProtocolError::PayloadLengthMismatch {
                expected,
                got: pixels.len(),
            },
        )?;

        Ok(Self {
            frame: Frame {
                rgba,
                error: meta.error,
            },
            codes: meta.codes,
        })
    }
}

/// Blocking read of one message; `Ok(None)` when the peer closed cleanly
/// between messages.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Option<Message>> {
    let mut header_buf = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        match reader.read(&mut header_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ProtocolError::ChannelClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let header = Header::unpack(&header_buf)?;
    let mut payload = vec![0u8; header.payload_len as usize];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::ChannelClosed,
        _ => e.into(),
    })?;
    Ok(Some(Message { header, payload }))
}

/// Blocking write of one message, flushed
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    writer.write_all(&message.header.pack()?)?;
    writer.write_all(&message.payload)?;
    writer.flush()?;
    Ok(())
}
