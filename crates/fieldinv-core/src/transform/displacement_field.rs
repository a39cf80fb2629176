//! Displacement field transform implementation.
//!
//! A dense displacement field stores one scalar image per spatial axis. All
//! components share the same grid and geometry. For heavy per-voxel work the
//! field is read back into a [`HostField`], an interleaved host buffer with
//! `D` values per voxel.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::{map_points, Transform};
use super::transformation::Unit;
use crate::error::{CoreError, Result};
use crate::image::grid::check_dimension;
use crate::image::{Geometry, Grid, Image};
use crate::interpolation::{Interpolator, LinearInterpolator, Stencil};

/// Dense displacement field.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality (2 or 3)
#[derive(Debug, Clone)]
pub struct DisplacementField<B: Backend, const D: usize> {
    /// One scalar image per axis, x first.
    components: Vec<Image<B, D>>,
    unit: Unit,
}

impl<B: Backend, const D: usize> DisplacementField<B, D> {
    /// Create a field from `D` congruent component images.
    pub fn new(components: Vec<Image<B, D>>, unit: Unit) -> Result<Self> {
        check_dimension::<D>()?;
        if components.len() != D {
            return Err(CoreError::shape_mismatch(&[D], &[components.len()]));
        }
        let size = components[0].size();
        for component in components.iter().skip(1) {
            if component.size() != size {
                return Err(CoreError::shape_mismatch(&size, &component.size()));
            }
        }
        Ok(Self { components, unit })
    }

    /// Zero field on a grid of the given size (x first).
    pub fn zeros(size: [usize; D], geometry: Geometry<D>, unit: Unit, device: &B::Device) -> Result<Self> {
        let components = (0..D)
            .map(|_| Image::zeros(size, geometry, device))
            .collect::<Result<Vec<_>>>()?;
        Self::new(components, unit)
    }

    /// Upload an interleaved host buffer.
    pub fn from_host(host: &HostField<D>, geometry: Geometry<D>, unit: Unit, device: &B::Device) -> Result<Self> {
        let size = host.grid().size();
        let components = host
            .to_components()
            .into_iter()
            .map(|values| Image::from_vec(values, size, geometry, device))
            .collect::<Result<Vec<_>>>()?;
        Self::new(components, unit)
    }

    pub fn components(&self) -> &[Image<B, D>] {
        &self.components
    }

    pub fn component(&self, axis: usize) -> &Image<B, D> {
        &self.components[axis]
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Geometry shared by the components.
    pub fn geometry(&self) -> &Geometry<D> {
        self.components[0].geometry()
    }

    /// Grid size, x first.
    pub fn size(&self) -> [usize; D] {
        self.components[0].size()
    }

    pub fn grid(&self) -> Result<Grid<D>> {
        self.components[0].grid()
    }

    pub fn device(&self) -> B::Device {
        self.components[0].device()
    }

    /// Read the field back into an interleaved host buffer.
    pub fn to_host(&self) -> Result<HostField<D>> {
        let grid = self.grid()?;
        let components = self
            .components
            .iter()
            .map(|c| c.to_vec())
            .collect::<Result<Vec<_>>>()?;
        HostField::from_components(grid, &components)
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for DisplacementField<B, D> {
    /// `p ↦ p + T(p)`, with `T` sampled by linear interpolation.
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let host = self.to_host()?;
        let geometry = *self.geometry();
        let unit = self.unit;
        let interpolator = LinearInterpolator::new();

        map_points(points, |p| {
            let index = match unit {
                Unit::Voxel => *p,
                Unit::Real => geometry.real_to_voxel_point(p),
            };
            let displacement = host.sample(&interpolator.stencil(host.grid(), &index));
            let mut out = *p;
            for a in 0..D {
                out[a] += displacement[a];
            }
            out
        })
    }
}

/// Interleaved host copy of a displacement field.
#[derive(Debug, Clone, PartialEq)]
pub struct HostField<const D: usize> {
    grid: Grid<D>,
    /// `D` values per voxel, voxels x fastest.
    values: Vec<f32>,
}

impl<const D: usize> HostField<D> {
    pub fn new(grid: Grid<D>, values: Vec<f32>) -> Result<Self> {
        if values.len() != grid.len() * D {
            return Err(CoreError::shape_mismatch(&[grid.len() * D], &[values.len()]));
        }
        Ok(Self { grid, values })
    }

    pub fn zeros(grid: Grid<D>) -> Self {
        Self {
            grid,
            values: vec![0.0; grid.len() * D],
        }
    }

    /// Interleave one buffer per axis.
    pub fn from_components(grid: Grid<D>, components: &[Vec<f32>]) -> Result<Self> {
        if components.len() != D {
            return Err(CoreError::shape_mismatch(&[D], &[components.len()]));
        }
        for component in components {
            if component.len() != grid.len() {
                return Err(CoreError::shape_mismatch(&[grid.len()], &[component.len()]));
            }
        }
        let mut values = Vec::with_capacity(grid.len() * D);
        for k in 0..grid.len() {
            values.extend(components.iter().map(|c| c[k]));
        }
        Ok(Self { grid, values })
    }

    /// De-interleave into one buffer per axis.
    pub fn to_components(&self) -> Vec<Vec<f32>> {
        (0..D)
            .map(|a| self.values.iter().skip(a).step_by(D).copied().collect())
            .collect()
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Displacement stored at a flattened offset.
    pub fn vector(&self, offset: usize) -> [f64; D] {
        let mut v = [0.0; D];
        for a in 0..D {
            v[a] = self.values[offset * D + a] as f64;
        }
        v
    }

    /// Displacement interpolated with a resolved stencil.
    pub fn sample(&self, stencil: &Stencil) -> [f64; D] {
        let mut v = [0.0; D];
        for a in 0..D {
            v[a] = stencil.apply_strided(&self.values, D, a);
        }
        v
    }
}
