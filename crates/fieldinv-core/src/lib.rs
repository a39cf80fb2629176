//! Core data model for displacement-field inversion.
//!
//! Images with voxel/real geometry, grids with explicit index types,
//! separable filters, linear interpolation, linear and dense transformations,
//! unit conversion and the chunk scheduler used by the parallel passes.

pub mod chunk;
pub mod error;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod spatial;
pub mod transform;

pub use chunk::{Chunk, ChunkScheduler};
pub use error::{CoreError, Result};
pub use image::{Geometry, GeometryClass, Grid, GridIndex, Image};
pub use spatial::{Direction, Point, Spacing, Vector};
pub use transform::{DisplacementField, LinearKind, LinearTransform, Transform, Transformation, Unit};
