//! Error types for inversion.
//!
//! Configuration and allocation errors abort the call. Per-voxel numerical
//! failures never surface here; they are counted in the
//! [`InversionReport`](crate::InversionReport).

use fieldinv_core::CoreError;
use thiserror::Error;

/// Main error type for inversion.
#[derive(Error, Debug)]
pub enum InversionError {
    /// Error raised by the core data model (geometry, shapes, tensors).
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The input and output transformations cannot be paired.
    #[error("Unsupported transformation: {0}")]
    UnsupportedTransformation(String),

    /// The output transformation is not allocated to a valid shape.
    #[error("Output not allocated: {0}")]
    OutputNotAllocated(String),

    /// A working buffer could not be allocated.
    #[error("Allocation failure: {0}")]
    Allocation(String),
}

/// Result type for inversion.
pub type Result<T> = std::result::Result<T, InversionError>;

impl InversionError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an unsupported transformation error.
    pub fn unsupported_transformation(msg: impl Into<String>) -> Self {
        Self::UnsupportedTransformation(msg.into())
    }

    /// Create an output allocation error.
    pub fn output_not_allocated(msg: impl Into<String>) -> Self {
        Self::OutputNotAllocated(msg.into())
    }

    /// Create a buffer allocation error.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }
}
