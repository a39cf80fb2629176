//! Interpolation types and operations.
//!
//! Interpolators resolve a continuous voxel coordinate into a [`Stencil`] of
//! weighted buffer offsets, which can then be applied to any number of host
//! buffers sharing the same grid.

pub mod linear;
pub mod trait_;

pub use linear::LinearInterpolator;
pub use trait_::{Interpolator, Stencil};
