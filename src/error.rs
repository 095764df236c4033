//! Unified error type.

use std::collections::TryReserveError;
use std::fmt;

/// The category of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    OutOfMemory,
    NullArgument,
    InvalidArgument,
    BufferTooSmall,
    ParseFailed,
    NotFound,
    Io,
    ValidationFailed,
}

impl ErrorKind {
    /// Human-readable description, stable across versions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutOfMemory      => "Memory allocation failed",
            Self::NullArgument     => "Null pointer",
            Self::InvalidArgument  => "Invalid argument",
            Self::BufferTooSmall   => "Buffer too small",
            Self::ParseFailed      => "Parse failed",
            Self::NotFound         => "Not found",
            Self::Io               => "I/O error",
            Self::ValidationFailed => "Validation failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error type returned by sprig's fallible operations.
///
/// Application-level failures (a missing field, an unknown route) are
/// expressed as [`ApiResponse`](crate::ApiResponse) values, not as `Error`s.
/// This type surfaces infrastructure failures: allocation, bad arguments at
/// startup, binding a port, reading a body.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source(
        kind: ErrorKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self { kind, source: Some(source.into()) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.kind, source),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::ParseFailed, e)
    }
}

impl From<TryReserveError> for Error {
    fn from(e: TryReserveError) -> Self {
        Self::with_source(ErrorKind::OutOfMemory, e)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn kind_strings() {
        assert_eq!(ErrorKind::OutOfMemory.as_str(), "Memory allocation failed");
        assert_eq!(ErrorKind::NullArgument.as_str(), "Null pointer");
        assert_eq!(ErrorKind::InvalidArgument.as_str(), "Invalid argument");
        assert_eq!(ErrorKind::BufferTooSmall.as_str(), "Buffer too small");
        assert_eq!(ErrorKind::ParseFailed.as_str(), "Parse failed");
        assert_eq!(ErrorKind::NotFound.as_str(), "Not found");
        assert_eq!(ErrorKind::Io.as_str(), "I/O error");
        assert_eq!(ErrorKind::ValidationFailed.as_str(), "Validation failed");
    }

    #[test]
    fn bare_kind_has_no_source() {
        let err = Error::from(ErrorKind::NotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found");
        assert!(err.source().is_none());
    }

    #[test]
    fn json_errors_map_to_parse_failed() {
        let json_err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = Error::from(json_err);
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert!(err.to_string().starts_with("Parse failed: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_errors_map_to_io() {
        let err = Error::from(std::io::Error::other("boom"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "I/O error: boom");
    }
}
