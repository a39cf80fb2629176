//! Coordinate bookkeeping between the forward and inverse grids.
//!
//! In VOXEL units both fields are indexed in a shared voxel frame, so a voxel
//! `x` displaced by `v` simply lands on `x + v`. In REAL units displacements
//! are physical and each grid has its own voxel→real matrix; the positions
//! below are then evaluated with the geometry-class fast paths.

use fieldinv_core::image::geometry::apply_linear;
use fieldinv_core::transform::units::FrameMap;
use fieldinv_core::{CoreError, Geometry, Unit};

use crate::error::Result;

/// Maps positions between the forward grid and the inverse grid.
#[derive(Debug, Clone, Copy)]
pub enum GridMapping<const D: usize> {
    Voxel,
    Real {
        forward: Geometry<D>,
        inverse: Geometry<D>,
        /// Inverse-grid voxels to forward-grid voxels.
        inverse_to_forward: FrameMap<D>,
    },
}

impl<const D: usize> GridMapping<D> {
    /// Both geometries must be classified in REAL units.
    pub fn new(unit: Unit, forward: &Geometry<D>, inverse: &Geometry<D>) -> Result<Self> {
        match unit {
            Unit::Voxel => Ok(GridMapping::Voxel),
            Unit::Real => {
                if !forward.class().is_known() || !inverse.class().is_known() {
                    return Err(CoreError::unknown_geometry(
                        "real-unit inversion needs classified forward and inverse geometries",
                    )
                    .into());
                }
                Ok(GridMapping::Real {
                    forward: *forward,
                    inverse: *inverse,
                    inverse_to_forward: FrameMap::between(inverse, forward)?,
                })
            }
        }
    }

    /// Forward-grid voxel coordinate of inverse voxel `x` displaced by
    /// `estimate`, i.e. where `T` must be sampled.
    pub fn inverse_to_forward(&self, x: &[f64; D], estimate: &[f64; D]) -> [f64; D] {
        match self {
            GridMapping::Voxel => {
                let mut p = *x;
                for a in 0..D {
                    p[a] += estimate[a];
                }
                p
            }
            GridMapping::Real {
                forward,
                inverse_to_forward,
                ..
            } => {
                let base = inverse_to_forward.apply(x);
                let offset = apply_linear(forward.to_voxel(), forward.class(), estimate);
                let mut p = base;
                for a in 0..D {
                    p[a] += offset[a];
                }
                p
            }
        }
    }

    /// Inverse-grid voxel coordinate of forward voxel `p` displaced by
    /// `displacement`, i.e. where `−T(p)` is splatted.
    pub fn forward_to_inverse(&self, p: &[f64; D], displacement: &[f64; D]) -> [f64; D] {
        match self {
            GridMapping::Voxel => {
                let mut q = *p;
                for a in 0..D {
                    q[a] += displacement[a];
                }
                q
            }
            GridMapping::Real { forward, inverse, .. } => {
                let mut u = forward.voxel_to_real_point(p);
                for a in 0..D {
                    u[a] += displacement[a];
                }
                inverse.real_to_voxel_point(&u)
            }
        }
    }
}
