use std::fmt;
use crate::index::generation::Generation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    NotFound,
    InvalidArgument,
    InvalidState,
    /// Commit header could not be classified into a known generation
    UnrecognizedFormat,
    /// Structural invariant violated while decoding index files
    CorruptIndex,
    /// Deletion refused because the file is held open elsewhere
    FileInUse,
    /// A reference count was decremented below zero
    ReferenceCountUnderflow,
    LockObtainFailed,
    Aborted,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    /// CorruptIndex error that names the file and byte offset it came from
    pub fn corrupt(file: &str, offset: u64, msg: impl fmt::Display) -> Self {
        Error {
            kind: ErrorKind::CorruptIndex,
            context: format!("{} (resource={}, offset={})", msg, file, offset),
        }
    }

    pub fn unrecognized(msg: impl Into<String>) -> Self {
        Error { kind: ErrorKind::UnrecognizedFormat, context: msg.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error { kind: ErrorKind::InvalidArgument, context: msg.into() }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error { kind: ErrorKind::InvalidState, context: msg.into() }
    }

    pub fn is_corruption(&self) -> bool {
        self.kind == ErrorKind::CorruptIndex
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Io,
        };
        Error {
            kind,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidArgument,
            context: format!("config: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of an upgrade run, tagged with the generation the directory was
/// in when the failure happened (None when detection itself failed).
#[derive(Debug)]
pub struct UpgradeError {
    pub generation: Option<Generation>,
    pub error: Error,
}

impl UpgradeError {
    pub fn new(generation: Option<Generation>, error: Error) -> Self {
        UpgradeError { generation, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }
}

impl fmt::Display for UpgradeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.generation {
            Some(generation) => write!(f, "upgrade failed at {}: {}", generation, self.error),
            None => write!(f, "upgrade failed: {}", self.error),
        }
    }
}

impl std::error::Error for UpgradeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
