//! Error types for MXF reading and writing.

use crate::ul::Key;
use mxfkit_timecode::TimecodeIndexError;
use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Result type for MXF operations
pub type Result<T> = std::result::Result<T, MxfError>;

/// Errors that can occur during MXF operations.
///
/// A lookup that simply finds nothing (a timecode search, an optional
/// item) is not an error; those return `Option`.
#[derive(Error, Debug)]
pub enum MxfError {
    /// BER length is indefinite, wider than 8 bytes or does not fit the
    /// reserved field width.
    #[error("Malformed BER length: {message}")]
    MalformedLength { message: String },

    /// A key other than the expected one was found.
    #[error("Key mismatch: expected {expected}, found {found}")]
    KeyMismatch { expected: Key, found: Key },

    /// Input ended before a complete value was read.
    #[error("Truncated data: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },

    /// Invalid partition pack or partition chain.
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// Item value does not decode as its declared type.
    #[error("Invalid item {item}: {message}")]
    InvalidItem { item: Key, message: String },

    /// Local tag without a primer pack entry.
    #[error("Unknown local tag 0x{tag:04x}")]
    UnknownTag { tag: u16 },

    /// Reference to an instance UID that no set in the header metadata has.
    #[error("Dangling reference to {uuid}")]
    DanglingReference { uuid: Uuid },

    /// Required item absent from a set.
    #[error("Missing item {item} in {set}")]
    MissingItem { set: Key, item: Key },

    /// Required set absent from the header metadata.
    #[error("Missing set: {0}")]
    MissingSet(String),

    /// Write would pass the declared essence element length.
    #[error(
        "Essence element overflow: {attempted} more bytes after {written} of {declared} declared"
    )]
    EssenceOverflow {
        declared: u64,
        written: u64,
        attempted: u64,
    },

    /// Essence element finalized before its declared length was written.
    #[error("Short write: wrote {written} of {declared} declared bytes")]
    ShortWrite { declared: u64, written: u64 },

    /// Frame position outside the indexed essence.
    #[error("Position {position} out of range (frames available: {available})")]
    PositionOutOfRange { position: i64, available: i64 },

    /// Operation not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Read past the last frame.
    #[error("End of essence")]
    EndOfEssence,

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Timecode index errors.
    #[error("Timecode index error: {0}")]
    Timecode(#[from] TimecodeIndexError),

    /// Unsupported feature or file layout.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl MxfError {
    /// Create a malformed length error.
    pub fn malformed_length(message: impl Into<String>) -> Self {
        Self::MalformedLength {
            message: message.into(),
        }
    }

    /// Create an invalid partition error.
    pub fn invalid_partition(message: impl Into<String>) -> Self {
        Self::InvalidPartition(message.into())
    }

    /// Create an invalid item error.
    pub fn invalid_item(item: Key, message: impl Into<String>) -> Self {
        Self::InvalidItem {
            item,
            message: message.into(),
        }
    }

    /// Create a missing set error.
    pub fn missing_set(name: impl Into<String>) -> Self {
        Self::MissingSet(name.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// True for errors caused by the input bytes rather than by the caller.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedLength { .. }
                | Self::KeyMismatch { .. }
                | Self::Truncated { .. }
                | Self::InvalidPartition(_)
                | Self::InvalidItem { .. }
                | Self::UnknownTag { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ul::labels;

    #[test]
    fn test_error_display() {
        let err = MxfError::UnknownTag { tag: 0x8001 };
        assert_eq!(err.to_string(), "Unknown local tag 0x8001");

        let err = MxfError::Truncated {
            needed: 100,
            available: 50,
        };
        assert!(err.to_string().contains("100"));

        let err = MxfError::KeyMismatch {
            expected: labels::PRIMER_PACK,
            found: labels::FILL_ITEM,
        };
        assert!(err.to_string().contains("06.0e.2b.34"));
    }

    #[test]
    fn test_timecode_error_conversion() {
        let err: MxfError = TimecodeIndexError::NoConvergence { iterations: 3 }.into();
        assert!(matches!(err, MxfError::Timecode(_)));
        assert!(!err.is_malformed_input());
    }

    #[test]
    fn test_malformed_input_classification() {
        assert!(MxfError::malformed_length("9 bytes").is_malformed_input());
        assert!(MxfError::invalid_partition("offsets").is_malformed_input());
        assert!(!MxfError::EndOfEssence.is_malformed_input());
        assert!(!MxfError::missing_set("Preface").is_malformed_input());
    }
}
