//! End-to-end reflectivity calculation for a layer stack.
//!
//! [`ReflectivityCalculator`] chains the pipeline stages:
//!
//! 1. validate the channel (lengths, Q ordering, σ),
//! 2. discretise the stack into sublayers,
//! 3. sweep the spin-resolved amplitudes over Q on the compute backend,
//! 4. project onto the channel's polariser and analyser,
//! 5. convolve with the resolution.
//!
//! Steps 1 and 2 fail the whole call; step 3 may fail per point, and such
//! points are carried through as invalid.

use num_complex::Complex64;
use pnr_compute::{ComputeBackend, ComputeError, CpuBackend};
use pnr_profile::{generate_sublayers, LayerStack, ProfileError, SublayerProfile};
use pnr_resolution::{convolve_masked, validate_grid, ResolutionError};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::polarization::combine_sweep;
use crate::solver::{MatrixRecursion, ReflectionSweep, ReflectivitySolver};
use crate::types::{Channel, ReflectivityCurve};

/// Errors that abort a whole calculation.
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Computes reflectivity curves on a compute backend.
pub struct ReflectivityCalculator<B: ComputeBackend = CpuBackend> {
    backend: B,
    solver: MatrixRecursion,
    config: EngineConfig,
}

impl Default for ReflectivityCalculator<CpuBackend> {
    fn default() -> Self {
        Self::new(CpuBackend::new(), EngineConfig::default())
    }
}

impl<B: ComputeBackend> ReflectivityCalculator<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            backend,
            solver: MatrixRecursion::new(config.in_plane_magnetization),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Sublayer discretisation of `stack`.
    pub fn profile(&self, stack: &LayerStack) -> Result<SublayerProfile, CalculationError> {
        Ok(generate_sublayers(stack)?)
    }

    /// Spin-resolved amplitudes of `stack` at every `q`.
    ///
    /// The layer-normal wavevector is Q/2. The substrate enters the recursion
    /// through its nuclear SLD; its last (semi-infinite) sublayer is not part
    /// of the profile passed to the solver.
    pub fn amplitudes(&self, stack: &LayerStack, q: &[f64]) -> Result<ReflectionSweep, CalculationError> {
        let profile = self.profile(stack)?;
        let (re, im) = stack.substrate_sld();
        if stack.substrate().msld.rho != 0.0 {
            log::debug!("substrate magnetisation is not used by the recursion");
        }
        let sublayers = match profile.sublayers.split_last() {
            Some((_, above)) => above,
            None => &[],
        };
        let inc_moment: Vec<f64> = q.iter().map(|q| q / 2.0).collect();
        log::trace!(
            "sweeping {} points over {} sublayers on {}",
            q.len(),
            sublayers.len(),
            self.backend.device_info().name
        );
        Ok(self
            .solver
            .amplitudes(&self.backend, &inc_moment, sublayers, Complex64::new(re, im))?)
    }

    /// Reflectivity of `stack` as seen in `channel`.
    pub fn calculate(&self, stack: &LayerStack, channel: &Channel) -> Result<ReflectivityCurve, CalculationError> {
        if let Some(problem) = channel.length_problem() {
            return Err(CalculationError::InvalidInput(problem));
        }
        let zeros;
        let sigma = match &channel.sigma {
            Some(sigma) => sigma.as_slice(),
            None => {
                zeros = vec![0.0; channel.len()];
                zeros.as_slice()
            }
        };
        validate_grid(&channel.q, sigma)?;

        let sweep = self.amplitudes(stack, &channel.q)?;
        let (values, valid) = combine_sweep(
            &sweep,
            channel.polarizer,
            channel.analyzer,
            channel.pol_efficiency.as_deref(),
            channel.ana_efficiency.as_deref(),
        );
        let values = values.to_vec();
        let (smeared, valid) = convolve_masked(
            &values,
            &valid,
            &channel.q,
            sigma,
            self.config.resolution_mode,
        )?;

        let curve = ReflectivityCurve {
            q: channel.q.iter().copied().collect(),
            values: smeared.into(),
            valid,
        };
        if curve.n_invalid() > 0 {
            log::warn!(
                "channel '{}': {} of {} points invalid",
                channel.name,
                curve.n_invalid(),
                curve.len()
            );
        }
        Ok(curve)
    }
}
