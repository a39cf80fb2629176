//! Damped Newton iteration per voxel of the inverse grid.
//!
//! For an inverse voxel `x` with estimate `I`, the residual of the fixed
//! point condition `I(x) + T(x + I(x)) = 0` is `r = I + T(x + I)` and the
//! update is `I ← I − α·(I + J)⁻¹(x + I)·r`.

use fieldinv_core::chunk::split_chunks_mut;
use fieldinv_core::interpolation::{Interpolator, LinearInterpolator};
use fieldinv_core::transform::HostField;
use fieldinv_core::{ChunkScheduler, GridIndex};

use crate::diagnostics::{ChunkDiagnostics, MASK_FLAGGED};
use crate::jacobian::LocalInverseField;
use crate::mapping::GridMapping;
use crate::error::Result;

/// Terminal state of one voxel, with the residual evaluations it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonOutcome {
    Converged { evaluations: usize },
    /// The residual grew, was not finite, or the local Jacobian was
    /// singular. The estimate of the last accepted step is kept.
    Diverged { evaluations: usize },
    /// Iteration cap reached above the threshold.
    Exhausted { evaluations: usize },
}

impl NewtonOutcome {
    pub fn evaluations(&self) -> usize {
        match *self {
            NewtonOutcome::Converged { evaluations }
            | NewtonOutcome::Diverged { evaluations }
            | NewtonOutcome::Exhausted { evaluations } => evaluations,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, NewtonOutcome::Converged { .. })
    }
}

/// Read-only parameters shared by every chunk of the Newton pass.
#[derive(Debug, Clone, Copy)]
pub struct NewtonSolver<'a, const D: usize> {
    forward: &'a HostField<D>,
    matrices: &'a LocalInverseField<D>,
    mapping: &'a GridMapping<D>,
    max_iterations: usize,
    error_max: f64,
    damping: f64,
    interpolator: LinearInterpolator,
}

impl<'a, const D: usize> NewtonSolver<'a, D> {
    pub fn new(
        forward: &'a HostField<D>,
        matrices: &'a LocalInverseField<D>,
        mapping: &'a GridMapping<D>,
        max_iterations: usize,
        error_max: f64,
        damping: f64,
    ) -> Self {
        Self {
            forward,
            matrices,
            mapping,
            max_iterations,
            error_max,
            damping,
            interpolator: LinearInterpolator::new(),
        }
    }

    /// Refine `estimate` at inverse voxel `index` in place.
    pub fn solve(&self, index: &GridIndex<D>, estimate: &mut [f64; D]) -> NewtonOutcome {
        let x = index.to_coords();
        let grid = self.forward.grid();
        let mut previous = *estimate;
        let mut previous_error = f64::INFINITY;

        for iteration in 0..self.max_iterations {
            let evaluations = iteration + 1;
            let p = self.mapping.inverse_to_forward(&x, estimate);
            let stencil = self.interpolator.stencil(grid, &p);
            let t = self.forward.sample(&stencil);

            let mut residual = [0.0; D];
            for a in 0..D {
                residual[a] = estimate[a] + t[a];
            }
            let error: f64 = residual.iter().map(|r| r.abs()).sum();

            if !error.is_finite() {
                *estimate = previous;
                return NewtonOutcome::Diverged { evaluations };
            }
            if error <= self.error_max {
                return NewtonOutcome::Converged { evaluations };
            }
            if iteration > 0 && error > previous_error {
                *estimate = previous;
                return NewtonOutcome::Diverged { evaluations };
            }
            let Some(m) = self.matrices.sample(&stencil) else {
                return NewtonOutcome::Diverged { evaluations };
            };

            previous = *estimate;
            previous_error = error;
            for r in 0..D {
                let step: f64 = (0..D).map(|c| m[r][c] * residual[c]).sum();
                estimate[r] -= self.damping * step;
            }
        }
        NewtonOutcome::Exhausted {
            evaluations: self.max_iterations,
        }
    }
}

/// Run the solver on every voxel of `estimate`, chunk by chunk.
///
/// Estimates are refined in place; when `mask` is given it receives
/// [`MASK_FLAGGED`] for failed voxels and zero elsewhere.
pub fn newton_pass<const D: usize>(
    solver: &NewtonSolver<'_, D>,
    estimate: &mut HostField<D>,
    mask: Option<&mut [u8]>,
    scheduler: &ChunkScheduler,
) -> Result<ChunkDiagnostics> {
    let grid = *estimate.grid();
    let chunks = scheduler.build(grid.len());

    let estimate_slices = split_chunks_mut(estimate.values_mut(), &chunks, D);
    let mask_slices: Vec<Option<&mut [u8]>> = match mask {
        Some(mask) => split_chunks_mut(mask, &chunks, 1).into_iter().map(Some).collect(),
        None => chunks.iter().map(|_| None).collect(),
    };
    let work: Vec<_> = chunks.iter().copied().zip(estimate_slices).zip(mask_slices).collect();

    let per_chunk = scheduler.dispatch(work, |((chunk, values), mut flags)| {
        let mut diagnostics = ChunkDiagnostics::default();
        for (local, index) in grid.indices(chunk.first, chunk.last).enumerate() {
            let cell = &mut values[local * D..(local + 1) * D];
            let mut current = [0.0; D];
            for a in 0..D {
                current[a] = cell[a] as f64;
            }

            let outcome = solver.solve(&index, &mut current);
            diagnostics.evaluations += outcome.evaluations();
            match outcome {
                NewtonOutcome::Converged { .. } => {}
                NewtonOutcome::Diverged { .. } => diagnostics.divergence += 1,
                NewtonOutcome::Exhausted { .. } => diagnostics.nonconvergence += 1,
            }
            for a in 0..D {
                cell[a] = current[a] as f32;
            }
            if let Some(flags) = flags.as_deref_mut() {
                flags[local] = if outcome.is_failure() { MASK_FLAGGED } else { 0 };
            }
        }
        diagnostics
    })?;

    Ok(per_chunk.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::{DerivativeFieldSet, JacobianFrame};
    use fieldinv_core::Grid;

    fn identity_inverses(grid: Grid<2>) -> LocalInverseField<2> {
        DerivativeFieldSet::new(grid, vec![0.0; grid.len() * 4])
            .unwrap()
            .into_local_inverses(&JacobianFrame::voxel(), &ChunkScheduler::with_workers(1))
            .unwrap()
    }

    fn constant_field(grid: Grid<2>, v: [f32; 2]) -> HostField<2> {
        let values = (0..grid.len()).flat_map(|_| v).collect();
        HostField::new(grid, values).unwrap()
    }

    #[test]
    fn test_zero_field_converges_at_first_evaluation() {
        let grid = Grid::new([6, 5]).unwrap();
        let forward = HostField::zeros(grid);
        let matrices = identity_inverses(grid);
        let mapping = GridMapping::Voxel;
        let solver = NewtonSolver::new(&forward, &matrices, &mapping, 10, 0.05, 0.5);

        let mut estimate = [0.0; 2];
        let outcome = solver.solve(&GridIndex([2, 3]), &mut estimate);
        assert_eq!(outcome, NewtonOutcome::Converged { evaluations: 1 });
        assert_eq!(estimate, [0.0, 0.0]);
    }

    #[test]
    fn test_constant_translation_converges() {
        let grid = Grid::new([8, 8]).unwrap();
        let forward = constant_field(grid, [1.5, -0.5]);
        let matrices = identity_inverses(grid);
        let mapping = GridMapping::Voxel;
        let solver = NewtonSolver::new(&forward, &matrices, &mapping, 20, 1e-3, 0.5);

        let mut estimate = [0.0; 2];
        let outcome = solver.solve(&GridIndex([3, 3]), &mut estimate);
        assert!(matches!(outcome, NewtonOutcome::Converged { .. }), "got {:?}", outcome);
        assert!((estimate[0] + 1.5).abs() < 1e-3, "got {}", estimate[0]);
        assert!((estimate[1] - 0.5).abs() < 1e-3, "got {}", estimate[1]);
    }

    #[test]
    fn test_iteration_cap_is_exhausted() {
        let grid = Grid::new([8, 8]).unwrap();
        let forward = constant_field(grid, [4.0, 0.0]);
        let matrices = identity_inverses(grid);
        let mapping = GridMapping::Voxel;
        let solver = NewtonSolver::new(&forward, &matrices, &mapping, 2, 0.05, 0.5);

        let mut estimate = [0.0; 2];
        let outcome = solver.solve(&GridIndex([4, 4]), &mut estimate);
        assert_eq!(outcome, NewtonOutcome::Exhausted { evaluations: 2 });
        // Two half steps: 0 → −2 → −3.
        assert!((estimate[0] + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_stencil_diverges_without_update() {
        let grid = Grid::new([3, 3]).unwrap();
        let mut derivatives = vec![0.0; grid.len() * 4];
        derivatives[4 * 4] = -1.0;
        let matrices = DerivativeFieldSet::new(grid, derivatives)
            .unwrap()
            .into_local_inverses(&JacobianFrame::voxel(), &ChunkScheduler::with_workers(1))
            .unwrap();
        let forward = constant_field(grid, [0.5, 0.0]);
        let mapping = GridMapping::Voxel;
        let solver = NewtonSolver::new(&forward, &matrices, &mapping, 10, 0.05, 0.5);

        let mut estimate = [0.0; 2];
        let outcome = solver.solve(&GridIndex([1, 1]), &mut estimate);
        assert_eq!(outcome, NewtonOutcome::Diverged { evaluations: 1 });
        assert_eq!(estimate, [0.0, 0.0]);
    }

    #[test]
    fn test_pass_fills_mask_and_counts() {
        let grid = Grid::new([5, 4]).unwrap();
        let forward = constant_field(grid, [4.0, 0.0]);
        let matrices = identity_inverses(grid);
        let mapping = GridMapping::Voxel;
        let solver = NewtonSolver::new(&forward, &matrices, &mapping, 2, 0.05, 0.5);

        let mut estimate = HostField::zeros(grid);
        let mut mask = vec![0u8; grid.len()];
        let diagnostics =
            newton_pass(&solver, &mut estimate, Some(&mut mask), &ChunkScheduler::with_workers(3)).unwrap();
        assert_eq!(diagnostics.nonconvergence, grid.len());
        assert_eq!(diagnostics.divergence, 0);
        assert_eq!(diagnostics.evaluations, 2 * grid.len());
        assert!(mask.iter().all(|&v| v == MASK_FLAGGED));
        assert!(estimate.values().chunks(2).all(|v| (v[0] + 3.0).abs() < 1e-6 && v[1] == 0.0));
    }
}
