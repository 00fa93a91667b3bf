use std::fmt;
use std::io;
use thiserror::Error;

use crate::producer::NativeWindowApi;

/// Status code carried by a successful reply.
pub const STATUS_OK: i32 = 0;

/// Failure of the channel between producer and compositor.
///
/// Never travels on the wire: it is what the caller sees when no reply (or
/// no well-formed reply) arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("I/O error on transport ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },
    #[error("Transport endpoint is gone")]
    Disconnected,
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Interface token mismatch: expected {expected:?}, got {actual:?}")]
    InterfaceMismatch { expected: String, actual: String },
    #[error("Unknown transaction code {0}")]
    UnknownTransaction(u32),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => TransportError::Disconnected,
            kind => TransportError::Io {
                kind,
                message: err.to_string(),
            },
        }
    }
}

/// Errors of the producer contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProducerError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("Slot index {0} is out of range")]
    BadIndex(i32),
    #[error("Slot {0} is not dequeued")]
    NotDequeued(i32),
    #[error("No free buffer slot available")]
    NoFreeSlot,
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("A producer is already connected with api {0}")]
    AlreadyConnected(NativeWindowApi),
    #[error("Api {0} is not the connected api")]
    InvalidApi(NativeWindowApi),
    #[error("Unknown query code {0}")]
    UnknownQuery(i32),
    #[error("Bad value: {0}")]
    BadValue(String),
    #[error("Buffer queue is abandoned or not initialized")]
    NoInit,
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),
}

/// Wire rendition of an error: `{status, detail, message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTail {
    pub status: i32,
    pub detail: i32,
    pub message: String,
}

impl StatusTail {
    pub fn ok() -> Self {
        StatusTail {
            status: STATUS_OK,
            detail: 0,
            message: String::new(),
        }
    }
}

impl fmt::Display for StatusTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {} (detail {}): {}", self.status, self.detail, self.message)
    }
}

impl ProducerError {
    pub const BAD_INDEX: i32 = -1001;
    pub const NOT_DEQUEUED: i32 = -1002;
    pub const NO_FREE_SLOT: i32 = -1003;
    pub const INVALID_OPERATION: i32 = -1004;
    pub const ALREADY_CONNECTED: i32 = -1005;
    pub const INVALID_API: i32 = -1006;
    pub const UNKNOWN_QUERY: i32 = -1007;
    pub const BAD_VALUE: i32 = -1008;
    pub const NO_INIT: i32 = -1009;
    pub const ALLOCATION_FAILED: i32 = -1010;
    /// A producer behind the stub could not be reached.
    pub const TRANSPORT_FAILED: i32 = -1011;

    /// Encodes the error for a reply.
    ///
    /// A stub fronting a remote producer reports a transport failure with
    /// its own status, which the caller decodes as
    /// `Transport(TransportError::Disconnected)`.
    pub fn to_status(&self) -> StatusTail {
        let (status, detail) = match self {
            ProducerError::Transport(_) => (Self::TRANSPORT_FAILED, 0),
            ProducerError::BadIndex(slot) => (Self::BAD_INDEX, *slot),
            ProducerError::NotDequeued(slot) => (Self::NOT_DEQUEUED, *slot),
            ProducerError::NoFreeSlot => (Self::NO_FREE_SLOT, 0),
            ProducerError::InvalidOperation(_) => (Self::INVALID_OPERATION, 0),
            ProducerError::AlreadyConnected(api) => (Self::ALREADY_CONNECTED, api.as_raw()),
            ProducerError::InvalidApi(api) => (Self::INVALID_API, api.as_raw()),
            ProducerError::UnknownQuery(what) => (Self::UNKNOWN_QUERY, *what),
            ProducerError::BadValue(_) => (Self::BAD_VALUE, 0),
            ProducerError::NoInit => (Self::NO_INIT, 0),
            ProducerError::AllocationFailed(_) => (Self::ALLOCATION_FAILED, 0),
        };
        let message = match self {
            ProducerError::InvalidOperation(m)
            | ProducerError::BadValue(m)
            | ProducerError::AllocationFailed(m) => m.clone(),
            ProducerError::Transport(err) => err.to_string(),
            _ => String::new(),
        };
        StatusTail { status, detail, message }
    }

    /// Decodes a reply status tail. `Ok(())` for [`STATUS_OK`].
    pub fn from_status(tail: StatusTail) -> Result<(), ProducerError> {
        let StatusTail { status, detail, message } = tail;
        let err = match status {
            STATUS_OK => return Ok(()),
            Self::BAD_INDEX => ProducerError::BadIndex(detail),
            Self::NOT_DEQUEUED => ProducerError::NotDequeued(detail),
            Self::NO_FREE_SLOT => ProducerError::NoFreeSlot,
            Self::INVALID_OPERATION => ProducerError::InvalidOperation(message),
            Self::ALREADY_CONNECTED => ProducerError::AlreadyConnected(api_from_detail(detail)?),
            Self::INVALID_API => ProducerError::InvalidApi(api_from_detail(detail)?),
            Self::UNKNOWN_QUERY => ProducerError::UnknownQuery(detail),
            Self::BAD_VALUE => ProducerError::BadValue(message),
            Self::NO_INIT => ProducerError::NoInit,
            Self::ALLOCATION_FAILED => ProducerError::AllocationFailed(message),
            Self::TRANSPORT_FAILED => ProducerError::Transport(TransportError::Disconnected),
            other => {
                return Err(TransportError::Malformed(format!("unknown status code {} in reply", other)).into());
            }
        };
        Err(err)
    }
}

fn api_from_detail(detail: i32) -> Result<NativeWindowApi, ProducerError> {
    NativeWindowApi::try_from(detail)
        .map_err(|_| TransportError::Malformed(format!("status detail {} is not an api", detail)).into())
}
