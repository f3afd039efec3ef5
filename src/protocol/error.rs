//! Worker channel error types

use std::io;
use std::time::Duration;

use thiserror::Error;

use super::MessageKind;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message kind: {0}")]
    InvalidKind(u8),

    #[error("Unexpected message: expected {expected:?}, got {got:?}")]
    UnexpectedMessage {
        expected: MessageKind,
        got: MessageKind,
    },

    #[error("Header too short: expected {expected} bytes, got {got}")]
    HeaderTooShort { expected: usize, got: usize },

    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("Payload length mismatch: expected {expected} bytes, got {got}")]
    PayloadLengthMismatch { expected: usize, got: usize },

    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Channel closed by peer")]
    ChannelClosed,

    #[error("No response from worker within {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}
