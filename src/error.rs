//! Error types and handling for ashmem region operations

use crate::protection::Protection;

/// Result type alias for ashmem operations
pub type Result<T> = std::result::Result<T, AshmemError>;

/// Error types for the shared memory region handle
#[derive(Debug, thiserror::Error)]
pub enum AshmemError {
    /// Region creation failed (invalid size or platform call failure)
    #[error("Creation failed: {message}")]
    Creation { message: String },

    /// Mapping the region into user space failed; prior state is preserved
    #[error("Mapping failed: {message}")]
    Mapping { message: String },

    /// Read/write attempted while the region is not mapped
    #[error("Region is not mapped")]
    NotMapped,

    /// Operation attempted on a closed handle
    #[error("Region is closed")]
    Closed,

    /// Requested access exceeds the active protection of the mapping
    #[error("Protection violation: requested {requested}, active {active}")]
    ProtectionViolation {
        requested: Protection,
        active: Protection,
    },

    /// Offset/length exceed the region bounds or overflow the bound check
    #[error("Out of bounds: offset {offset} + len {len} exceeds region size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },

    /// I/O related errors (file operations, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AshmemError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a creation error
    pub fn creation(message: impl Into<String>) -> Self {
        Self::Creation {
            message: message.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Create a protection violation error
    pub fn protection_violation(requested: Protection, active: Protection) -> Self {
        Self::ProtectionViolation { requested, active }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(offset: usize, len: usize, size: usize) -> Self {
        Self::OutOfBounds { offset, len, size }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AshmemError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
