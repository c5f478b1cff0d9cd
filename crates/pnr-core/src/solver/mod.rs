//! Specular reflectivity solvers.
//!
//! The [`ReflectivitySolver`] trait defines how a sublayer profile is turned
//! into spin-resolved reflection amplitudes. Solvers split the work into a
//! Q-independent preparation step and a per-point evaluation, so that the
//! per-point part can be scheduled on any
//! [`ComputeBackend`](pnr_compute::ComputeBackend).

pub mod recursion;

pub use recursion::{reflection, MatrixRecursion, PreparedProfile};

use num_complex::Complex64;
use pnr_compute::{ComputeBackend, ComputeError};
use pnr_profile::Sublayer;
use thiserror::Error;

use crate::spin::SpinMatrix;

/// Per-point failures of a solver.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReflectionError {
    /// A 2×2 inversion was singular or the amplitude left the finite range.
    /// `q` is the momentum value the point was evaluated at.
    #[error("Singular transfer matrix at point {index} (q = {q})")]
    SingularMatrix { index: usize, q: f64 },
}

/// Spin-resolved amplitudes at one Q.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinAmplitude {
    /// Reflection matrix at the incident interface.
    pub reflection: SpinMatrix,
    /// Transmission matrix into the substrate.
    pub transmission: SpinMatrix,
}

/// One result per requested Q, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionSweep {
    pub points: Vec<Result<SpinAmplitude, ReflectionError>>,
}

impl ReflectionSweep {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn valid_mask(&self) -> Vec<bool> {
        self.points.iter().map(Result::is_ok).collect()
    }

    pub fn n_invalid(&self) -> usize {
        self.points.iter().filter(|p| p.is_err()).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ReflectionError> {
        self.points.iter().filter_map(|p| p.as_ref().err())
    }
}

/// Interface that every reflectivity method implements.
pub trait ReflectivitySolver: Send + Sync {
    /// Q-independent state derived from a sublayer profile.
    type Prepared: Send + Sync;

    /// Human-readable name of the method.
    fn method_name(&self) -> &str;

    /// Precompute everything that does not depend on Q.
    ///
    /// # Arguments
    /// * `sublayers` - Profile from the incident medium (first entry) down
    ///   to the last slab above the substrate.
    /// * `substrate_sld` - Complex nuclear SLD of the substrate (Å⁻²).
    fn prepare(&self, sublayers: &[Sublayer], substrate_sld: Complex64) -> Self::Prepared;

    /// Amplitudes at a single point; `index` is only used for error reports.
    fn amplitude(
        &self,
        prepared: &Self::Prepared,
        index: usize,
        inc_moment: f64,
    ) -> Result<SpinAmplitude, ReflectionError>;

    /// Evaluate every `inc_moment` (the layer-normal wavevector, Q/2) on
    /// `backend`. A failing point does not stop the sweep.
    fn amplitudes<B: ComputeBackend>(
        &self,
        backend: &B,
        inc_moment: &[f64],
        sublayers: &[Sublayer],
        substrate_sld: Complex64,
    ) -> Result<ReflectionSweep, ComputeError> {
        let prepared = self.prepare(sublayers, substrate_sld);
        let points = backend.map_indexed(inc_moment.len(), |i| {
            self.amplitude(&prepared, i, inc_moment[i])
        })?;
        let sweep = ReflectionSweep { points };
        if let Some(first) = sweep.errors().next() {
            log::warn!("{} of {} points failed, first: {first}", sweep.n_invalid(), sweep.len());
        }
        Ok(sweep)
    }
}
