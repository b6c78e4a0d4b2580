use std::fmt;
use std::io;
use thiserror::Error;

/// Category of a stream failure.
///
/// Sinks map `io::Error` kinds onto these; layers above keep the kind of the
/// innermost failure and only extend the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Malformed input or a violated caller-visible precondition.
    InvalidArgument,
    /// An internal precondition did not hold; programmer error.
    FailedPrecondition,
    /// Corrupted data: checksum mismatch, unparsable record.
    DataLoss,
    /// A hard limit was hit: position cap, position overflow.
    ResourceExhausted,
    /// The operation is not supported by this writer.
    Unimplemented,
    NotFound,
    PermissionDenied,
    /// I/O failure with no usable error code.
    Unknown,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusKind::InvalidArgument => "invalid argument",
            StatusKind::FailedPrecondition => "failed precondition",
            StatusKind::DataLoss => "data loss",
            StatusKind::ResourceExhausted => "resource exhausted",
            StatusKind::Unimplemented => "unimplemented",
            StatusKind::NotFound => "not found",
            StatusKind::PermissionDenied => "permission denied",
            StatusKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A latched stream failure: a kind plus a human-readable message.
///
/// Outer layers annotate by prefixing context ("writing out.bin: ...") while
/// preserving the inner kind, so a composed stack produces a single coherent
/// message chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Status {
    kind: StatusKind,
    message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusKind::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusKind::FailedPrecondition, message)
    }

    pub fn data_loss(message: impl Into<String>) -> Self {
        Self::new(StatusKind::DataLoss, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusKind::ResourceExhausted, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Unimplemented, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Unknown, message)
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix `context` onto the message, keeping the kind.
    pub fn annotate(self, context: impl AsRef<str>) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", context.as_ref(), self.message),
        }
    }
}

impl From<io::Error> for Status {
    fn from(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::NotFound => StatusKind::NotFound,
            io::ErrorKind::PermissionDenied => StatusKind::PermissionDenied,
            io::ErrorKind::InvalidInput => StatusKind::InvalidArgument,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => StatusKind::DataLoss,
            _ => StatusKind::Unknown,
        };
        Self::new(kind, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_preserves_kind() {
        let status = Status::resource_exhausted("Position limit exceeded")
            .annotate("writing out.bin");
        assert_eq!(status.kind(), StatusKind::ResourceExhausted);
        assert_eq!(status.message(), "writing out.bin: Position limit exceeded");
    }

    #[test]
    fn io_error_mapping() {
        let status: Status = io::Error::new(io::ErrorKind::NotFound, "no such file").into();
        assert_eq!(status.kind(), StatusKind::NotFound);
        let status: Status = io::Error::new(io::ErrorKind::InvalidData, "bad bytes").into();
        assert_eq!(status.kind(), StatusKind::DataLoss);
    }
}
