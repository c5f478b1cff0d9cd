//! Projection of spin-resolved amplitudes onto an instrument configuration.
//!
//! The incident beam is described by the density matrix
//! $\rho = \frac{1}{2}(I + \eta_p\,\mathbf{P}\cdot\boldsymbol{\sigma})$ and the
//! analyser by $A = \frac{1}{2}(I + \eta_a\,\mathbf{A}\cdot\boldsymbol{\sigma})$,
//! or $A = I$ when no analyser is fitted. The measured intensity is
//!
//! $$R = \operatorname{Re}\operatorname{Tr}\left[A\,\mathcal{R}\,\rho\,\mathcal{R}^\dagger\right]$$
//!
//! A zero polariser vector gives the unpolarised average over spin channels.

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::solver::{ReflectionSweep, SpinAmplitude};
use crate::spin::{self, SpinMatrix};

/// One of the four spin channels relative to a quantisation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpinChannel {
    #[serde(rename = "++")]
    UpUp,
    #[serde(rename = "+-")]
    UpDown,
    #[serde(rename = "-+")]
    DownUp,
    #[serde(rename = "--")]
    DownDown,
}

impl SpinChannel {
    pub const ALL: [SpinChannel; 4] = [Self::UpUp, Self::UpDown, Self::DownUp, Self::DownDown];

    /// `(polarizer, analyzer)` vectors for this channel along `axis`.
    pub fn vectors(self, axis: [f64; 3]) -> ([f64; 3], [f64; 3]) {
        let neg = axis.map(|c| -c);
        match self {
            Self::UpUp => (axis, axis),
            Self::UpDown => (axis, neg),
            Self::DownUp => (neg, axis),
            Self::DownDown => (neg, neg),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UpUp => "++",
            Self::UpDown => "+-",
            Self::DownUp => "-+",
            Self::DownDown => "--",
        }
    }
}

fn analyzer_operator(analyzer: [f64; 3], efficiency: Complex64) -> SpinMatrix {
    if analyzer == [0.0; 3] {
        spin::identity()
    } else {
        spin::half_projector(analyzer, efficiency)
    }
}

/// Measured reflectivity of one amplitude for the given polariser and
/// analyser vectors and (possibly complex) efficiencies.
pub fn combine(
    amplitude: &SpinAmplitude,
    polarizer: [f64; 3],
    analyzer: [f64; 3],
    pol_efficiency: Complex64,
    ana_efficiency: Complex64,
) -> f64 {
    let rho = spin::half_projector(polarizer, pol_efficiency);
    let a = analyzer_operator(analyzer, ana_efficiency);
    let r = amplitude.reflection;
    spin::trace(&(a * r * rho * r.adjoint())).re
}

/// [`combine`] over a whole sweep.
///
/// Efficiencies default to one when `None`; otherwise they must hold one
/// entry per point. Failed or non-finite points come back invalid with a
/// value of zero.
pub fn combine_sweep(
    sweep: &ReflectionSweep,
    polarizer: [f64; 3],
    analyzer: [f64; 3],
    pol_efficiency: Option<&[Complex64]>,
    ana_efficiency: Option<&[Complex64]>,
) -> (Array1<f64>, Vec<bool>) {
    let one = Complex64::new(1.0, 0.0);
    let eff = |e: Option<&[Complex64]>, i: usize| e.and_then(|e| e.get(i).copied()).unwrap_or(one);

    let mut valid = Vec::with_capacity(sweep.len());
    let values = sweep
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let value = point
                .as_ref()
                .ok()
                .map(|amp| combine(amp, polarizer, analyzer, eff(pol_efficiency, i), eff(ana_efficiency, i)))
                .filter(|v| v.is_finite());
            valid.push(value.is_some());
            value.unwrap_or(0.0)
        })
        .collect();
    (values, valid)
}
