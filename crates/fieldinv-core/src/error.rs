//! Error types for the core data model.

use thiserror::Error;

/// Errors raised while building or converting images and transformations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A geometry class was required but is unknown.
    #[error("Unknown geometry: {0}")]
    UnknownGeometry(String),

    /// A matrix that must be inverted is singular.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Two grids or buffers disagree in shape.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A grid has an empty axis or an invalid layout.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Only 2D and 3D data are supported.
    #[error("Unsupported dimension: {0}D")]
    UnsupportedDimension(usize),

    /// Transformation units do not agree.
    #[error("Unit mismatch: {0}")]
    UnitMismatch(String),

    /// Tensor data could not be read back to the host.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// A worker pool could not be created.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an unknown geometry error.
    pub fn unknown_geometry(msg: impl Into<String>) -> Self {
        Self::UnknownGeometry(msg.into())
    }

    /// Create a singular matrix error.
    pub fn singular_matrix(msg: impl Into<String>) -> Self {
        Self::SingularMatrix(msg.into())
    }

    /// Create an invalid grid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Create a unit mismatch error.
    pub fn unit_mismatch(msg: impl Into<String>) -> Self {
        Self::UnitMismatch(msg.into())
    }

    /// Create a shape mismatch error from two grid sizes.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
