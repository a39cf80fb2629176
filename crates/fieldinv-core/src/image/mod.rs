//! Image types and operations.
//!
//! This module provides the Image struct, the explicit grid index types used
//! to flatten and unflatten voxel positions, and voxel/real geometry.

pub mod geometry;
pub mod grid;
pub mod image;

pub use geometry::{Geometry, GeometryClass};
pub use grid::{Grid, GridIndex};
pub use image::Image;
