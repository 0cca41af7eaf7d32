use std::io;

use uuid::Uuid;

use crate::address::DeviceAddress;
use crate::message::MessageKind;

/// All error types that can occur when interacting with LIFX devices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A received buffer was too short to contain a frame header.
    #[error("frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    /// The kind code embedded in a frame matched no known message kind.
    #[error("unknown message kind: {code}")]
    UnknownKind { code: u16 },

    /// A frame was shorter than the total size its kind declares.
    #[error("incomplete {kind:?} frame: {len} of {expected} bytes")]
    IncompleteFrame {
        kind: MessageKind,
        len: usize,
        expected: usize,
    },

    /// A frame was built with the wrong payload length for its kind.
    #[error("bad {kind:?} payload: {len} bytes, expected {expected}")]
    PayloadLength {
        kind: MessageKind,
        len: usize,
        expected: usize,
    },

    /// A payload field read would run past the end of the buffer.
    #[error("payload read out of bounds: {width} bytes at offset {offset} in {len}-byte payload")]
    PayloadOutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: io::Error },

    /// The specified device is not in the registry.
    #[error("device {0} is not registered")]
    DeviceNotFound(DeviceAddress),

    /// The specified group does not exist.
    #[error("group not found {0}")]
    GroupNotFound(Uuid),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Whether this error describes a frame that failed to decode.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            Error::FrameTooShort { .. }
                | Error::UnknownKind { .. }
                | Error::IncompleteFrame { .. }
                | Error::PayloadOutOfBounds { .. }
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
