//! Per-voxel failure accounting.

use std::iter::Sum;
use std::ops::Add;

use burn::tensor::backend::Backend;
use fieldinv_core::{CoreError, Geometry, Grid, GridIndex, Image};

use crate::error::Result;

/// Mask value of a voxel that diverged or did not converge.
pub const MASK_FLAGGED: u8 = 255;

/// Counters of one chunk of the Newton pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkDiagnostics {
    pub divergence: usize,
    pub nonconvergence: usize,
    /// Residual evaluations performed.
    pub evaluations: usize,
}

impl Add for ChunkDiagnostics {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            divergence: self.divergence + other.divergence,
            nonconvergence: self.nonconvergence + other.nonconvergence,
            evaluations: self.evaluations + other.evaluations,
        }
    }
}

impl Sum for ChunkDiagnostics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Per-voxel flags on the inverse grid: [`MASK_FLAGGED`] where the Newton
/// iteration failed, zero elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMask<const D: usize> {
    grid: Grid<D>,
    values: Vec<u8>,
}

impl<const D: usize> ErrorMask<D> {
    /// Wrap one flag per voxel of `grid`.
    pub fn new(grid: Grid<D>, values: Vec<u8>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(CoreError::shape_mismatch(&[grid.len()], &[values.len()]).into());
        }
        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> &Grid<D> {
        &self.grid
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn is_flagged(&self, index: &GridIndex<D>) -> bool {
        self.values[self.grid.flatten(index)] == MASK_FLAGGED
    }

    pub fn flagged_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == MASK_FLAGGED).count()
    }

    /// Indices of the flagged voxels in flattened order.
    pub fn flagged(&self) -> Vec<GridIndex<D>> {
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == MASK_FLAGGED)
            .map(|(k, _)| self.grid.unflatten(k))
            .collect()
    }

    /// Upload the mask as an image with values 0 or 255.
    pub fn to_image<B: Backend>(&self, geometry: Geometry<D>, device: &B::Device) -> Result<Image<B, D>> {
        let values = self.values.iter().map(|&v| v as f32).collect();
        Ok(Image::from_vec(values, self.grid.size(), geometry, device)?)
    }
}

/// Outcome of one inversion call.
#[derive(Debug, Clone, PartialEq)]
pub struct InversionReport<const D: usize> {
    /// Voxels whose residual grew, or whose local Jacobian was singular.
    pub divergence_count: usize,
    /// Voxels still above the threshold after the iteration cap.
    pub nonconvergence_count: usize,
    /// Voxels of the inverse grid.
    pub voxel_count: usize,
    /// Residual evaluations over all voxels.
    pub evaluation_count: usize,
    /// Local Jacobians of the forward field that could not be inverted.
    pub singular_count: usize,
    pub error_mask: Option<ErrorMask<D>>,
}

impl<const D: usize> InversionReport<D> {
    /// Report of a closed-form inversion.
    pub fn exact() -> Self {
        Self {
            divergence_count: 0,
            nonconvergence_count: 0,
            voxel_count: 0,
            evaluation_count: 0,
            singular_count: 0,
            error_mask: None,
        }
    }

    pub(crate) fn from_diagnostics(
        diagnostics: ChunkDiagnostics,
        voxel_count: usize,
        singular_count: usize,
        error_mask: Option<ErrorMask<D>>,
    ) -> Self {
        Self {
            divergence_count: diagnostics.divergence,
            nonconvergence_count: diagnostics.nonconvergence,
            voxel_count,
            evaluation_count: diagnostics.evaluations,
            singular_count,
            error_mask,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.divergence_count + self.nonconvergence_count
    }

    pub fn divergence_fraction(&self) -> f64 {
        fraction(self.divergence_count, self.voxel_count)
    }

    pub fn nonconvergence_fraction(&self) -> f64 {
        fraction(self.nonconvergence_count, self.voxel_count)
    }

    /// Mean number of residual evaluations per voxel.
    pub fn mean_evaluations(&self) -> f64 {
        fraction(self.evaluation_count, self.voxel_count)
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
