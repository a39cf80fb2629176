//! Voxel ↔ real unit conversion.
//!
//! A displacement field lives on a *reference* grid (its own geometry) and
//! points into a *floating* grid. With `H` the voxel→real matrices:
//!
//! ```text
//! V_vox(M)  = (H_flo⁻¹·H_ref − Id)·M + lin(H_flo⁻¹)·V_real(M)
//! V_real(M) = (H_flo − H_ref)·M     + lin(H_flo)·V_vox(M)
//! ```
//!
//! For linear transformations the same change of frame gives
//! `A_real = H_flo·A_vox·H_ref⁻¹` and `A_vox = H_flo⁻¹·A_real·H_ref`. The
//! change of frame can add scaling or shear, so the kind of the result is
//! read back from its linear part.

use burn::tensor::backend::Backend;

use super::displacement_field::{DisplacementField, HostField};
use super::linear::{LinearKind, LinearTransform};
use super::transformation::Unit;
use crate::error::{CoreError, Result};
use crate::image::geometry::{apply_linear, apply_point, GeometryClass};
use crate::image::Geometry;
use crate::spatial::{linear_part, Homogeneous};

/// Voxel-to-voxel change of frame `H_to⁻¹·H_from`, with the class of the
/// product for fast-path evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMap<const D: usize> {
    matrix: Homogeneous,
    class: GeometryClass,
}

impl<const D: usize> FrameMap<D> {
    /// Map voxel coordinates of `from` to voxel coordinates of `to`.
    pub fn between(from: &Geometry<D>, to: &Geometry<D>) -> Result<Self> {
        require_known(from, "source grid")?;
        require_known(to, "target grid")?;
        Ok(Self {
            matrix: to.to_voxel() * from.to_real(),
            class: from.class().combine(to.class()),
        })
    }

    pub fn matrix(&self) -> &Homogeneous {
        &self.matrix
    }

    pub fn class(&self) -> GeometryClass {
        self.class
    }

    pub fn apply(&self, p: &[f64; D]) -> [f64; D] {
        apply_point(&self.matrix, self.class, p)
    }
}

fn require_known<const D: usize>(geometry: &Geometry<D>, role: &str) -> Result<()> {
    if geometry.class().is_known() {
        Ok(())
    } else {
        Err(CoreError::unknown_geometry(format!("{} has no geometry class", role)))
    }
}

/// Express a REAL-unit field in voxel units of the reference and floating
/// grids.
pub fn field_to_voxel_unit<B: Backend, const D: usize>(
    field: &DisplacementField<B, D>,
    floating: &Geometry<D>,
) -> Result<DisplacementField<B, D>> {
    if field.unit() != Unit::Real {
        return Err(CoreError::unit_mismatch("field is already in voxel units"));
    }
    let reference = *field.geometry();
    let frame = FrameMap::between(&reference, floating)?;
    let mut host = field.to_host()?;

    convert_host(&mut host, |m, v| {
        let moved = frame.apply(m);
        let scaled = apply_linear(floating.to_voxel(), floating.class(), v);
        let mut out = [0.0; D];
        for a in 0..D {
            out[a] = moved[a] - m[a] + scaled[a];
        }
        out
    });

    DisplacementField::from_host(&host, reference, Unit::Voxel, &field.device())
}

/// Express a VOXEL-unit field in physical units.
pub fn field_to_real_unit<B: Backend, const D: usize>(
    field: &DisplacementField<B, D>,
    floating: &Geometry<D>,
) -> Result<DisplacementField<B, D>> {
    if field.unit() != Unit::Voxel {
        return Err(CoreError::unit_mismatch("field is already in real units"));
    }
    let reference = *field.geometry();
    require_known(&reference, "reference grid")?;
    require_known(floating, "floating grid")?;
    let mut host = field.to_host()?;

    convert_host(&mut host, |m, v| {
        let on_floating = floating.voxel_to_real_point(m);
        let on_reference = reference.voxel_to_real_point(m);
        let scaled = apply_linear(floating.to_real(), floating.class(), v);
        let mut out = [0.0; D];
        for a in 0..D {
            out[a] = on_floating[a] - on_reference[a] + scaled[a];
        }
        out
    });

    DisplacementField::from_host(&host, reference, Unit::Real, &field.device())
}

fn convert_host<const D: usize, F>(host: &mut HostField<D>, f: F)
where
    F: Fn(&[f64; D], &[f64; D]) -> [f64; D],
{
    let grid = *host.grid();
    for (offset, index) in grid.indices(0, grid.len() - 1).enumerate() {
        let v = host.vector(offset);
        let converted = f(&index.to_coords(), &v);
        let values = host.values_mut();
        for a in 0..D {
            values[offset * D + a] = converted[a] as f32;
        }
    }
}

/// `H_flo · A · H_ref⁻¹`
pub fn linear_to_real_unit<const D: usize>(
    transform: &LinearTransform<D>,
    reference: &Geometry<D>,
    floating: &Geometry<D>,
) -> Result<LinearTransform<D>> {
    if transform.unit() != Unit::Voxel {
        return Err(CoreError::unit_mismatch("transformation is already in real units"));
    }
    let matrix = floating.to_real() * transform.matrix() * reference.to_voxel();
    Ok(LinearTransform::new(LinearKind::classify::<D>(&linear_part(&matrix)), matrix, Unit::Real))
}

/// `H_flo⁻¹ · A · H_ref`
pub fn linear_to_voxel_unit<const D: usize>(
    transform: &LinearTransform<D>,
    reference: &Geometry<D>,
    floating: &Geometry<D>,
) -> Result<LinearTransform<D>> {
    if transform.unit() != Unit::Real {
        return Err(CoreError::unit_mismatch("transformation is already in voxel units"));
    }
    let matrix = floating.to_voxel() * transform.matrix() * reference.to_real();
    Ok(LinearTransform::new(LinearKind::classify::<D>(&linear_part(&matrix)), matrix, Unit::Voxel))
}
