//! Local Jacobian assembly and closed-form inversion.
//!
//! [`DerivativeFieldSet`] holds `∂T_c/∂x_a` for every voxel of the forward
//! grid, interleaved `D×D` per voxel (row `c`, column `a`). Consuming it with
//! [`DerivativeFieldSet::into_local_inverses`] yields a [`LocalInverseField`]
//! that takes over the same storage and holds `(I + J)⁻¹` instead.
//!
//! Derivatives are taken along the forward grid's voxel axes. For REAL-unit
//! fields they are brought to physical derivatives by post-multiplying with
//! the forward geometry's real→voxel linear part, so that
//! `M = I + J·lin(H⁻¹)`.
//!
//! A matrix whose determinant is not finite or below
//! [`SINGULAR_DETERMINANT`] in magnitude is stored as zero and flagged;
//! sampling a flagged cell with non-zero weight reports `None`.

use burn::tensor::backend::Backend;
use fieldinv_core::chunk::split_chunks_mut;
use fieldinv_core::filter::SeparableFilter;
use fieldinv_core::image::geometry::GeometryClass;
use fieldinv_core::interpolation::Stencil;
use fieldinv_core::{ChunkScheduler, CoreError, DisplacementField, Geometry, Grid, Unit};

use crate::buffer::try_filled;
use crate::error::Result;

/// Determinant magnitude under which a local matrix counts as singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-6;

/// Linear factor applied to the raw voxel-grid Jacobian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianFrame<const D: usize> {
    scale: Option<[[f64; D]; D]>,
}

impl<const D: usize> JacobianFrame<D> {
    /// Derivatives are used as they are.
    pub fn voxel() -> Self {
        Self { scale: None }
    }

    /// Post-multiply with the real→voxel linear part of `geometry`, diagonal
    /// unless the geometry is a qform.
    pub fn real(geometry: &Geometry<D>) -> Result<Self> {
        let class = geometry.class();
        if !class.is_known() {
            return Err(CoreError::unknown_geometry("forward field geometry is not classified").into());
        }
        let to_voxel = geometry.to_voxel();
        let mut scale = [[0.0; D]; D];
        for (r, row) in scale.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                if r == c || class == GeometryClass::Qform {
                    *v = to_voxel[(r, c)];
                }
            }
        }
        Ok(Self { scale: Some(scale) })
    }

    pub fn for_unit(unit: Unit, geometry: &Geometry<D>) -> Result<Self> {
        match unit {
            Unit::Voxel => Ok(Self::voxel()),
            Unit::Real => Self::real(geometry),
        }
    }

    /// `I + J·S` from a row-major Jacobian.
    fn assemble(&self, jacobian: &[f32]) -> [[f64; D]; D] {
        let mut m = [[0.0; D]; D];
        for r in 0..D {
            for c in 0..D {
                m[r][c] = match &self.scale {
                    None => jacobian[r * D + c] as f64,
                    Some(s) => (0..D).map(|k| jacobian[r * D + k] as f64 * s[k][c]).sum(),
                };
            }
            m[r][r] += 1.0;
        }
        m
    }
}

/// Spatial derivatives of every component of a displacement field.
#[derive(Debug, Clone)]
pub struct DerivativeFieldSet<const D: usize> {
    grid: Grid<D>,
    /// `D×D` values per voxel: entry `c * D + a` is `∂T_c/∂x_a`.
    values: Vec<f32>,
}

impl<const D: usize> DerivativeFieldSet<D> {
    pub fn new(grid: Grid<D>, values: Vec<f32>) -> Result<Self> {
        if values.len() != grid.len() * D * D {
            return Err(CoreError::shape_mismatch(&[grid.len() * D * D], &[values.len()]).into());
        }
        Ok(Self { grid, values })
    }

    /// Differentiate each component along each axis with a Gaussian of
    /// `sigma` voxels.
    pub fn compute<B: Backend>(field: &DisplacementField<B, D>, sigma: f64) -> Result<Self> {
        let grid = field.grid()?;
        let mut values = try_filled(grid.len() * D * D, 0.0f32, "derivative fields")?;
        let filter = SeparableFilter::<B>::new();

        for (c, component) in field.components().iter().enumerate() {
            for a in 0..D {
                let derivative = filter.derivative(component, a, sigma).to_vec()?;
                for (k, v) in derivative.into_iter().enumerate() {
                    values[k * D * D + c * D + a] = v;
                }
            }
        }
        Self::new(grid, values)
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    /// `∂T_c/∂x_a` at a flattened offset.
    pub fn value(&self, offset: usize, c: usize, a: usize) -> f32 {
        self.values[offset * D * D + c * D + a]
    }

    /// Replace every Jacobian by `(I + J·S)⁻¹`, chunk by chunk.
    pub fn into_local_inverses(self, frame: &JacobianFrame<D>, scheduler: &ChunkScheduler) -> Result<LocalInverseField<D>> {
        let Self { grid, mut values } = self;
        let mut singular = try_filled(grid.len(), false, "singular flags")?;

        let chunks = scheduler.build(grid.len());
        let value_slices = split_chunks_mut(&mut values, &chunks, D * D);
        let flag_slices = split_chunks_mut(&mut singular, &chunks, 1);
        let work: Vec<_> = value_slices.into_iter().zip(flag_slices).collect();

        let counts = scheduler.dispatch(work, |(cells, flags)| {
            let mut count = 0usize;
            for (cell, flag) in cells.chunks_exact_mut(D * D).zip(flags.iter_mut()) {
                let m = frame.assemble(cell);
                match invert_local(&m) {
                    Some(inv) => {
                        for r in 0..D {
                            for c in 0..D {
                                cell[r * D + c] = inv[r][c] as f32;
                            }
                        }
                    }
                    None => {
                        cell.iter_mut().for_each(|v| *v = 0.0);
                        *flag = true;
                        count += 1;
                    }
                }
            }
            count
        })?;

        Ok(LocalInverseField {
            grid,
            values,
            singular,
            singular_count: counts.into_iter().sum(),
        })
    }
}

/// `(I + J)⁻¹` on every voxel of the forward grid.
#[derive(Debug, Clone)]
pub struct LocalInverseField<const D: usize> {
    grid: Grid<D>,
    values: Vec<f32>,
    singular: Vec<bool>,
    singular_count: usize,
}

impl<const D: usize> LocalInverseField<D> {
    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn singular_count(&self) -> usize {
        self.singular_count
    }

    pub fn is_singular(&self, offset: usize) -> bool {
        self.singular[offset]
    }

    /// Matrix stored at a flattened offset.
    pub fn matrix(&self, offset: usize) -> [[f64; D]; D] {
        let mut m = [[0.0; D]; D];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.values[offset * D * D + r * D + c] as f64;
            }
        }
        m
    }

    /// Interpolated matrix, or `None` when a contributing cell is singular.
    pub fn sample(&self, stencil: &Stencil) -> Option<[[f64; D]; D]> {
        if self.singular_count > 0 && stencil.contributing().any(|o| self.singular[o]) {
            return None;
        }
        let mut m = [[0.0; D]; D];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = stencil.apply_strided(&self.values, D * D, r * D + c);
            }
        }
        Some(m)
    }
}

fn is_regular(det: f64) -> bool {
    det.is_finite() && det.abs() >= SINGULAR_DETERMINANT
}

/// Row-major 2×2 inverse by the adjugate formula.
pub fn invert_2x2(m: &[f64; 4]) -> Option<[f64; 4]> {
    let [a, b, c, d] = *m;
    let det = a * d - b * c;
    if !is_regular(det) {
        return None;
    }
    Some([d / det, -b / det, -c / det, a / det])
}

/// Row-major 3×3 inverse by the adjugate formula.
pub fn invert_3x3(m: &[f64; 9]) -> Option<[f64; 9]> {
    let [a, b, c, d, e, f, g, h, i] = *m;
    let co_a = e * i - f * h;
    let co_b = f * g - d * i;
    let co_c = d * h - e * g;
    let det = a * co_a + b * co_b + c * co_c;
    if !is_regular(det) {
        return None;
    }
    Some([
        co_a / det,
        (c * h - b * i) / det,
        (b * f - c * e) / det,
        co_b / det,
        (a * i - c * g) / det,
        (c * d - a * f) / det,
        co_c / det,
        (b * g - a * h) / det,
        (a * e - b * d) / det,
    ])
}

/// Closed-form inverse of a 2×2 or 3×3 matrix.
pub fn invert_local<const D: usize>(m: &[[f64; D]; D]) -> Option<[[f64; D]; D]> {
    if !(2..=3).contains(&D) {
        return None;
    }
    let mut flat = [0.0; 9];
    for r in 0..D {
        for c in 0..D {
            flat[r * D + c] = m[r][c];
        }
    }
    let inv = match D {
        2 => {
            let mut small = [0.0; 4];
            small.copy_from_slice(&flat[..4]);
            let inv2 = invert_2x2(&small)?;
            flat[..4].copy_from_slice(&inv2);
            flat
        }
        3 => invert_3x3(&flat)?,
        _ => return None,
    };
    let mut out = [[0.0; D]; D];
    for r in 0..D {
        for c in 0..D {
            out[r][c] = inv[r * D + c];
        }
    }
    Some(out)
}
