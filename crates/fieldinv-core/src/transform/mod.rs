//! Transform types and operations.
//!
//! Linear transformations are 4×4 homogeneous matrices with a closed-form
//! inverse; dense transformations are displacement fields with one scalar
//! image per axis. Both carry a [`Unit`] tag.

pub mod displacement_field;
pub mod linear;
pub mod trait_;
pub mod transformation;
pub mod units;

pub use displacement_field::{DisplacementField, HostField};
pub use linear::{LinearKind, LinearTransform};
pub use trait_::Transform;
pub use transformation::{Transformation, Unit};
