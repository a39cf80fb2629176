//! Image filters.
//!
//! Separable per-axis smoothing and first-derivative filtering, used for
//! Jacobian estimation and for smoothing splatted fields.

pub mod separable;

pub use separable::{FilterOp, SeparableFilter};
