//! Inversion of linear transformations and dense displacement fields.
//!
//! Linear transformations are inverted in closed form. A displacement field
//! `T` is inverted by a damped Newton iteration per voxel of the inverse grid,
//! solving `I(x) + T(x + I(x)) = 0` with the local inverse Jacobians of `T`.
//! Both per-voxel passes run as chunked fork-join passes on rayon.
//!
//! ```no_run
//! use burn_ndarray::NdArray;
//! use fieldinv_core::{DisplacementField, Geometry, Transformation, Unit};
//! use fieldinv_inversion::{invert, InversionConfig};
//!
//! type Backend = NdArray<f32>;
//!
//! # fn main() -> fieldinv_inversion::Result<()> {
//! let device = Default::default();
//! let forward = DisplacementField::<Backend, 3>::zeros([32, 32, 16], Geometry::identity(), Unit::Voxel, &device)?;
//! let mut inverse: Transformation<Backend, 3> =
//!     DisplacementField::zeros([32, 32, 16], Geometry::identity(), Unit::Voxel, &device)?.into();
//!
//! let report = invert(&forward.into(), &mut inverse, &InversionConfig::default())?;
//! assert_eq!(report.divergence_count, 0);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod initializer;
pub mod inversion;
pub mod jacobian;
pub mod mapping;
pub mod newton;

pub use config::{Initialization, InversionConfig};
pub use diagnostics::{ErrorMask, InversionReport};
pub use error::{InversionError, Result};
pub use inversion::{invert, invert_vector_field};
