//! Error types for archive timecodes and the timecode index.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for timecode index operations.
pub type Result<T> = std::result::Result<T, TimecodeIndexError>;

/// Errors that can occur while building or searching a timecode index.
///
/// A search that simply finds nothing is not an error; searches return
/// `Option` for that.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimecodeIndexError {
    /// Page capacity must be at least one run.
    #[error("Invalid page capacity: {capacity}")]
    InvalidPageCapacity {
        /// The rejected capacity.
        capacity: usize,
    },

    /// Frames per second used for position conversion must be non-zero.
    #[error("Invalid frames per second for indexing: {fps}")]
    InvalidFrameRate {
        /// The rejected frame rate.
        fps: u32,
    },

    /// Invalid timecode component value.
    #[error("Invalid timecode component: {component} = {value} (max {max})")]
    InvalidComponent {
        /// Name of the invalid component (hour, min, sec, frame).
        component: String,
        /// The value that was provided.
        value: u32,
        /// The maximum allowed value for this component.
        max: u32,
    },

    /// Packed SMPTE 12M timecode could not be decoded.
    #[error("Invalid SMPTE 12M timecode: {message}")]
    InvalidPacked {
        /// Description of the decoding error.
        message: String,
    },

    /// The dual timecode search hit its iteration cap without the VITC and
    /// LTC searchers meeting at a common position.
    #[error("Dual timecode search did not converge after {iterations} iterations")]
    NoConvergence {
        /// Number of iterations performed.
        iterations: usize,
    },
}

impl TimecodeIndexError {
    /// Create an invalid component error.
    pub fn invalid_component(component: impl Into<String>, value: u32, max: u32) -> Self {
        Self::InvalidComponent {
            component: component.into(),
            value,
            max,
        }
    }

    /// Create an invalid packed timecode error.
    pub fn invalid_packed(message: impl Into<String>) -> Self {
        Self::InvalidPacked {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimecodeIndexError::invalid_component("min", 61, 59);
        assert_eq!(err.to_string(), "Invalid timecode component: min = 61 (max 59)");

        let err = TimecodeIndexError::NoConvergence { iterations: 16 };
        assert_eq!(
            err.to_string(),
            "Dual timecode search did not converge after 16 iterations"
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = TimecodeIndexError::InvalidPageCapacity { capacity: 0 };
        let json = serde_json::to_string(&err).unwrap();
        let decoded: TimecodeIndexError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, decoded);
    }
}
