//! Entry points of the inversion engine.

use burn::tensor::backend::Backend;
use fieldinv_core::transform::units::{field_to_real_unit, field_to_voxel_unit};
use fieldinv_core::{ChunkScheduler, CoreError, DisplacementField, Geometry, Grid, Transformation, Unit};

use crate::buffer::try_filled;
use crate::config::{Initialization, InversionConfig};
use crate::diagnostics::{ErrorMask, InversionReport};
use crate::error::{InversionError, Result};
use crate::initializer::{forward_splatting, zero_estimate};
use crate::jacobian::{DerivativeFieldSet, JacobianFrame};
use crate::mapping::GridMapping;
use crate::newton::{newton_pass, NewtonSolver};

/// Invert `input` into the pre-allocated `output`.
///
/// A linear input needs a linear output of the same unit and is inverted in
/// closed form. A vector-field input needs a vector-field output whose grid
/// and geometry define where the inverse is sampled; it is replaced by the
/// computed inverse.
pub fn invert<B: Backend, const D: usize>(
    input: &Transformation<B, D>,
    output: &mut Transformation<B, D>,
    config: &InversionConfig,
) -> Result<InversionReport<D>> {
    config.validate()?;
    if input.unit() != output.unit() {
        return Err(CoreError::unit_mismatch(format!(
            "input is in {:?} units but output is in {:?} units",
            input.unit(),
            output.unit()
        ))
        .into());
    }

    let (inverse, report) = match (input, &*output) {
        (Transformation::Linear(forward), Transformation::Linear(_)) => {
            let inverse = forward.inverse()?;
            tracing::info!("Inverted {} in closed form", input.type_name());
            (Transformation::Linear(inverse), InversionReport::exact())
        }
        (Transformation::VectorField(forward), Transformation::VectorField(template)) => {
            let (inverse, report) = invert_vector_field(forward, template, config)?;
            (Transformation::VectorField(inverse), report)
        }
        (Transformation::Linear(_), Transformation::VectorField(_)) => {
            return Err(InversionError::unsupported_transformation(format!(
                "cannot invert {} into a dense field",
                input.type_name()
            )))
        }
        (Transformation::VectorField(_), Transformation::Linear(_)) => {
            return Err(InversionError::output_not_allocated(format!(
                "{} needs a vector field output, got {}",
                input.type_name(),
                output.type_name()
            )))
        }
    };
    *output = inverse;
    Ok(report)
}

/// Invert a displacement field onto the grid and geometry of `template`.
///
/// The result carries the unit of `forward`.
pub fn invert_vector_field<B: Backend, const D: usize>(
    forward: &DisplacementField<B, D>,
    template: &DisplacementField<B, D>,
    config: &InversionConfig,
) -> Result<(DisplacementField<B, D>, InversionReport<D>)> {
    config.validate()?;
    if forward.unit() != template.unit() {
        return Err(CoreError::unit_mismatch("inverse template unit differs from the forward field").into());
    }
    let scheduler = config.scheduler();
    let inverse_grid = template.grid()?;
    let inverse_geometry = *template.geometry();

    tracing::info!(
        "Inverting {}D field: forward {:?}, inverse {:?}, {:?} units, {} workers",
        D,
        forward.size(),
        inverse_grid.size(),
        forward.unit(),
        scheduler.workers()
    );

    if forward.unit() == Unit::Real && config.convert_real_to_voxel {
        tracing::debug!("Converting real-unit field to voxel units before inversion");
        let forward_voxel = field_to_voxel_unit(forward, &inverse_geometry)?;
        let (inverse_voxel, report) = run_engine(&forward_voxel, inverse_grid, inverse_geometry, config, &scheduler)?;
        let inverse = field_to_real_unit(&inverse_voxel, forward.geometry())?;
        return Ok((inverse, report));
    }

    run_engine(forward, inverse_grid, inverse_geometry, config, &scheduler)
}

fn run_engine<B: Backend, const D: usize>(
    forward: &DisplacementField<B, D>,
    inverse_grid: Grid<D>,
    inverse_geometry: Geometry<D>,
    config: &InversionConfig,
    scheduler: &ChunkScheduler,
) -> Result<(DisplacementField<B, D>, InversionReport<D>)> {
    let unit = forward.unit();
    let device = forward.device();
    let mapping = GridMapping::new(unit, forward.geometry(), &inverse_geometry)?;
    let frame = JacobianFrame::for_unit(unit, forward.geometry())?;

    let derivatives = DerivativeFieldSet::compute(forward, config.derivation_sigma)?;
    let matrices = derivatives.into_local_inverses(&frame, scheduler)?;
    tracing::debug!(
        "Local inverse Jacobians ready: {} singular of {}",
        matrices.singular_count(),
        matrices.grid().len()
    );

    let forward_host = forward.to_host()?;
    let mut estimate = match config.initialization {
        Initialization::Zero => zero_estimate(inverse_grid)?,
        Initialization::ForwardSplatting { sigma } => {
            forward_splatting::<B, D>(&forward_host, &mapping, inverse_grid, inverse_geometry, sigma, &device)?
        }
    };

    let mut mask = if config.error_mask {
        Some(try_filled(inverse_grid.len(), 0u8, "error mask")?)
    } else {
        None
    };

    let solver = NewtonSolver::new(
        &forward_host,
        &matrices,
        &mapping,
        config.max_iterations,
        config.error_max,
        config.damping,
    );
    let diagnostics = newton_pass(&solver, &mut estimate, mask.as_deref_mut(), scheduler)?;

    let mask = mask.map(|values| ErrorMask::new(inverse_grid, values)).transpose()?;
    let report = InversionReport::from_diagnostics(diagnostics, inverse_grid.len(), matrices.singular_count(), mask);
    if report.failure_count() > 0 {
        tracing::warn!(
            "divergence: {}/{}, non-convergence: {}/{}",
            report.divergence_count,
            report.voxel_count,
            report.nonconvergence_count,
            report.voxel_count
        );
    } else {
        tracing::info!("All {} voxels converged", report.voxel_count);
    }

    let inverse = DisplacementField::from_host(&estimate, inverse_geometry, unit, &device)?;
    Ok((inverse, report))
}
