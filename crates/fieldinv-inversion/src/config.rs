//! Inversion configuration.
//!
//! Every tunable of the engine is carried by an explicit [`InversionConfig`]
//! value passed into each call, so concurrent inversions with different
//! settings never interfere.

use fieldinv_core::ChunkScheduler;
use serde::{Deserialize, Serialize};

use crate::error::{InversionError, Result};

/// Starting estimate of the inverse field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Initialization {
    /// All-zero field.
    Zero,
    /// Splat `−T(p)` around `p + T(p)`, then smooth with `sigma` voxels.
    ForwardSplatting { sigma: f64 },
}

impl Default for Initialization {
    fn default() -> Self {
        Initialization::ForwardSplatting { sigma: 2.0 }
    }
}

/// Inversion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionConfig {
    /// Gaussian sigma (voxels) of the derivative filter.
    pub derivation_sigma: f64,
    /// Newton iteration cap per voxel.
    pub max_iterations: usize,
    /// Convergence threshold on the L1 norm of the residual.
    pub error_max: f64,
    /// Damping factor applied to each Newton step.
    pub damping: f64,
    /// Starting estimate.
    pub initialization: Initialization,
    /// Produce a per-voxel error mask.
    pub error_mask: bool,
    /// Invert REAL-unit fields by converting to voxel units, inverting, and
    /// converting back, instead of iterating in real units directly.
    pub convert_real_to_voxel: bool,
    /// Worker count; `None` uses the global rayon pool.
    pub workers: Option<usize>,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            derivation_sigma: 2.0,
            max_iterations: 10,
            error_max: 0.05,
            damping: 0.5,
            initialization: Initialization::default(),
            error_mask: false,
            convert_real_to_voxel: false,
            workers: None,
        }
    }
}

impl InversionConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_derivation_sigma(mut self, sigma: f64) -> Self {
        self.derivation_sigma = sigma;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_error_max(mut self, error_max: f64) -> Self {
        self.error_max = error_max;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    /// Start from the zero field.
    pub fn with_zero_initialization(self) -> Self {
        self.with_initialization(Initialization::Zero)
    }

    /// Start from forward splatting smoothed with `sigma` voxels.
    pub fn with_forward_splatting(self, sigma: f64) -> Self {
        self.with_initialization(Initialization::ForwardSplatting { sigma })
    }

    /// Return a per-voxel error mask in the report.
    pub fn with_error_mask(mut self) -> Self {
        self.error_mask = true;
        self
    }

    pub fn with_real_to_voxel_conversion(mut self, enabled: bool) -> Self {
        self.convert_real_to_voxel = enabled;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Check ranges before any buffer is allocated.
    pub fn validate(&self) -> Result<()> {
        if !(self.derivation_sigma >= 0.0) || !self.derivation_sigma.is_finite() {
            return Err(InversionError::invalid_configuration(format!(
                "derivation sigma must be finite and non-negative, got {}",
                self.derivation_sigma
            )));
        }
        if self.max_iterations == 0 {
            return Err(InversionError::invalid_configuration("max iterations must be at least 1"));
        }
        if !(self.error_max > 0.0) || !self.error_max.is_finite() {
            return Err(InversionError::invalid_configuration(format!(
                "error threshold must be finite and positive, got {}",
                self.error_max
            )));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(InversionError::invalid_configuration(format!(
                "damping must lie in (0, 1], got {}",
                self.damping
            )));
        }
        if let Initialization::ForwardSplatting { sigma } = self.initialization {
            if !(sigma >= 0.0) || !sigma.is_finite() {
                return Err(InversionError::invalid_configuration(format!(
                    "splatting sigma must be finite and non-negative, got {}",
                    sigma
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(InversionError::invalid_configuration("worker count must be at least 1"));
        }
        Ok(())
    }

    /// Scheduler for the parallel passes.
    pub fn scheduler(&self) -> ChunkScheduler {
        match self.workers {
            Some(workers) => ChunkScheduler::with_workers(workers),
            None => ChunkScheduler::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InversionConfig::default();
        assert_eq!(config.derivation_sigma, 2.0);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.error_max, 0.05);
        assert_eq!(config.damping, 0.5);
        assert_eq!(config.initialization, Initialization::ForwardSplatting { sigma: 2.0 });
        assert!(!config.error_mask);
        assert!(!config.convert_real_to_voxel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = InversionConfig::new()
            .with_max_iterations(25)
            .with_zero_initialization()
            .with_error_mask()
            .with_workers(3);
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.initialization, Initialization::Zero);
        assert!(config.error_mask);
        assert_eq!(config.scheduler().workers(), 3);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(InversionConfig::new().with_damping(0.0).validate().is_err());
        assert!(InversionConfig::new().with_damping(1.5).validate().is_err());
        assert!(InversionConfig::new().with_max_iterations(0).validate().is_err());
        assert!(InversionConfig::new().with_error_max(f64::NAN).validate().is_err());
        assert!(InversionConfig::new().with_derivation_sigma(-1.0).validate().is_err());
        assert!(InversionConfig::new().with_forward_splatting(-0.5).validate().is_err());
        assert!(InversionConfig::new().with_workers(0).validate().is_err());
    }
}
