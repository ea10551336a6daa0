//! Structured errors shared by every remote operation.
//!
//! Each error carries an [`ErrorKind`] that callers can match on, plus the raw protocol status
//! when the failure originated on the remote side.
//!
//! # Logging Convention
//! The Display implementation shows the full error chain, so any format specifier works:
//! ```ignore
//! tracing::error!("operation failed: {}", &error);
//! tracing::error!("operation failed: {:#}", &error);
//! ```

/// Broad classification of a failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    /// Session/connection failure, fatal to the whole command
    Transport,
    /// Target path does not exist
    NotFound,
    /// Directory read reported an error; usually means the target is a file
    ReadError,
    /// Access denied
    Permission,
    /// Local filesystem open/read/write failure
    LocalIo,
    /// A read or write failed after the transfer had started
    PartialTransfer,
    /// Filesystem object of a type we don't handle (device nodes, fifos...)
    Unsupported,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport error",
            ErrorKind::NotFound => "not found",
            ErrorKind::ReadError => "read error",
            ErrorKind::Permission => "permission denied",
            ErrorKind::LocalIo => "local I/O error",
            ErrorKind::PartialTransfer => "partial transfer",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Other => "error",
        };
        write!(f, "{name}")
    }
}

/// Status codes returned by the file-access service.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[repr(u32)]
pub enum AfcStatus {
    Success = 0,
    UnknownError = 1,
    OpHeaderInvalid = 2,
    NoResources = 3,
    ReadError = 4,
    WriteError = 5,
    UnknownPacketType = 6,
    InvalidArg = 7,
    ObjectNotFound = 8,
    ObjectIsDir = 9,
    PermDenied = 10,
    ServiceNotConnected = 11,
    OpTimeout = 12,
    TooMuchData = 13,
    EndOfData = 14,
    OpNotSupported = 15,
    ObjectExists = 16,
    ObjectBusy = 17,
    NoSpaceLeft = 18,
    OpWouldBlock = 19,
    IoError = 20,
    OpInterrupted = 21,
    OpInProgress = 22,
    InternalError = 23,
    MuxError = 30,
    NoMem = 31,
    NotEnoughData = 32,
    DirNotEmpty = 33,
}

impl AfcStatus {
    #[cfg(test)]
    fn from_code(code: u32) -> Option<Self> {
        let status = match code {
            0 => AfcStatus::Success,
            1 => AfcStatus::UnknownError,
            2 => AfcStatus::OpHeaderInvalid,
            3 => AfcStatus::NoResources,
            4 => AfcStatus::ReadError,
            5 => AfcStatus::WriteError,
            6 => AfcStatus::UnknownPacketType,
            7 => AfcStatus::InvalidArg,
            8 => AfcStatus::ObjectNotFound,
            9 => AfcStatus::ObjectIsDir,
            10 => AfcStatus::PermDenied,
            11 => AfcStatus::ServiceNotConnected,
            12 => AfcStatus::OpTimeout,
            13 => AfcStatus::TooMuchData,
            14 => AfcStatus::EndOfData,
            15 => AfcStatus::OpNotSupported,
            16 => AfcStatus::ObjectExists,
            17 => AfcStatus::ObjectBusy,
            18 => AfcStatus::NoSpaceLeft,
            19 => AfcStatus::OpWouldBlock,
            20 => AfcStatus::IoError,
            21 => AfcStatus::OpInterrupted,
            22 => AfcStatus::OpInProgress,
            23 => AfcStatus::InternalError,
            30 => AfcStatus::MuxError,
            31 => AfcStatus::NoMem,
            32 => AfcStatus::NotEnoughData,
            33 => AfcStatus::DirNotEmpty,
            _ => return None,
        };
        Some(status)
    }

    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AfcStatus::Success => "SUCCESS",
            AfcStatus::UnknownError => "UNKNOWN_ERROR",
            AfcStatus::OpHeaderInvalid => "OP_HEADER_INVALID",
            AfcStatus::NoResources => "NO_RESOURCES",
            AfcStatus::ReadError => "READ_ERROR",
            AfcStatus::WriteError => "WRITE_ERROR",
            AfcStatus::UnknownPacketType => "UNKNOWN_PACKET_TYPE",
            AfcStatus::InvalidArg => "INVALID_ARG",
            AfcStatus::ObjectNotFound => "OBJECT_NOT_FOUND",
            AfcStatus::ObjectIsDir => "OBJECT_IS_DIR",
            AfcStatus::PermDenied => "PERM_DENIED",
            AfcStatus::ServiceNotConnected => "SERVICE_NOT_CONNECTED",
            AfcStatus::OpTimeout => "OP_TIMEOUT",
            AfcStatus::TooMuchData => "TOO_MUCH_DATA",
            AfcStatus::EndOfData => "END_OF_DATA",
            AfcStatus::OpNotSupported => "OP_NOT_SUPPORTED",
            AfcStatus::ObjectExists => "OBJECT_EXISTS",
            AfcStatus::ObjectBusy => "OBJECT_BUSY",
            AfcStatus::NoSpaceLeft => "NO_SPACE_LEFT",
            AfcStatus::OpWouldBlock => "OP_WOULD_BLOCK",
            AfcStatus::IoError => "IO_ERROR",
            AfcStatus::OpInterrupted => "OP_INTERRUPTED",
            AfcStatus::OpInProgress => "OP_IN_PROGRESS",
            AfcStatus::InternalError => "INTERNAL_ERROR",
            AfcStatus::MuxError => "MUX_ERROR",
            AfcStatus::NoMem => "NO_MEM",
            AfcStatus::NotEnoughData => "NOT_ENOUGH_DATA",
            AfcStatus::DirNotEmpty => "DIR_NOT_EMPTY",
        }
    }

    /// Classify a protocol status for callers that only care about the failure class.
    #[must_use]
    pub fn kind(self) -> ErrorKind {
        match self {
            AfcStatus::ReadError => ErrorKind::ReadError,
            AfcStatus::ObjectNotFound => ErrorKind::NotFound,
            AfcStatus::PermDenied => ErrorKind::Permission,
            AfcStatus::ServiceNotConnected | AfcStatus::MuxError | AfcStatus::OpTimeout => {
                ErrorKind::Transport
            }
            _ => ErrorKind::Other,
        }
    }
}

impl std::fmt::Display for AfcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    pub kind: ErrorKind,
    pub code: Option<AfcStatus>,
    #[source]
    pub source: anyhow::Error,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, source: anyhow::Error) -> Self {
        Error {
            kind,
            code: None,
            source,
        }
    }

    /// Error reported by the remote service for `path`.
    #[must_use]
    pub fn remote(status: AfcStatus, operation: &str, path: &str) -> Self {
        Error {
            kind: status.kind(),
            code: Some(status),
            source: anyhow::anyhow!("{operation} {path:?} failed: {status}"),
        }
    }

    /// Local filesystem failure; the I/O error is kept as the root cause.
    #[must_use]
    pub fn local(error: std::io::Error, context: String) -> Self {
        Error {
            kind: ErrorKind::LocalIo,
            code: None,
            source: anyhow::Error::new(error).context(context),
        }
    }

    /// Add a layer of context while keeping the kind and protocol status.
    #[must_use]
    pub fn context<C>(self, context: C) -> Self
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        Error {
            kind: self.kind,
            code: self.code,
            source: self.source.context(context),
        }
    }

    #[must_use]
    pub fn with_kind(self, kind: ErrorKind) -> Self {
        Error { kind, ..self }
    }
}
