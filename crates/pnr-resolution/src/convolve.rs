//! Gaussian resolution smearing of reflectivity curves.
//!
//! The measured reflectivity is the calculated one averaged over a Gaussian
//! of width σ(Q):
//!
//! $$R_{\text{meas}}(Q) = \int R(Q')\,\frac{e^{-(Q'-Q)^2/2\sigma^2}}{\sqrt{2\pi}\sigma}\,dQ'$$
//!
//! Five strategies are available, numbered as in the fitting front ends
//! that select them with an integer code. All of them leave points with
//! σ = 0 untouched.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::interp::MaskedLinear;
use crate::model::{validate_sigma, ResolutionError};

/// Gaussian truncation of the grid strategies, in units of σ.
const GRID_CUTOFF: f64 = 3.0;

/// Number of samples and half-width (in σ) of the stencil strategy.
const STENCIL_POINTS: usize = 21;
const STENCIL_HALF_WIDTH: f64 = 4.0;

/// Five-point Gauss–Hermite rule for weight e^{-x²}.
const HERMITE_NODES: [f64; 5] = [
    -2.020_182_870_456_085_6,
    -0.958_572_464_613_818_5,
    0.0,
    0.958_572_464_613_818_5,
    2.020_182_870_456_085_6,
];
const HERMITE_WEIGHTS: [f64; 5] = [
    0.019_953_242_059_045_9,
    0.393_619_323_152_241_2,
    0.945_308_720_482_941_9,
    0.393_619_323_152_241_2,
    0.019_953_242_059_045_9,
];

/// Convolution strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ResolutionMode {
    /// No smearing.
    None = 0,
    /// Gaussian weights on the measured grid within ±3σ, normalised.
    Grid = 1,
    /// As [`Grid`](Self::Grid), with each weight scaled by the local grid
    /// spacing (trapezoid rule on non-uniform grids).
    GridTrapezoid = 2,
    /// 21 equally spaced samples over ±4σ, interpolated from the grid.
    Stencil = 3,
    /// Five-node Gauss–Hermite quadrature, interpolated from the grid.
    #[default]
    GaussHermite = 4,
}

impl TryFrom<u8> for ResolutionMode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Grid),
            2 => Ok(Self::GridTrapezoid),
            3 => Ok(Self::Stencil),
            4 => Ok(Self::GaussHermite),
            other => Err(other),
        }
    }
}

impl From<ResolutionMode> for u8 {
    fn from(mode: ResolutionMode) -> Self {
        mode as u8
    }
}

/// Smear `r` measured at `q` with widths `sigma`.
///
/// Fails before any work if the lengths differ, `q` is not finite and
/// non-decreasing, or any σ is negative or non-finite.
pub fn convolve(
    r: &[f64],
    q: &[f64],
    sigma: &[f64],
    mode: ResolutionMode,
) -> Result<Vec<f64>, ResolutionError> {
    let valid = vec![true; r.len()];
    let (values, _) = convolve_masked(r, &valid, q, sigma, mode)?;
    Ok(values)
}

/// Validity-aware variant of [`convolve`].
///
/// Invalid points never contribute to a neighbour. The weights of the
/// remaining samples are renormalised; a point left with no valid sample is
/// returned invalid (its value is then unspecified).
pub fn convolve_masked(
    r: &[f64],
    valid: &[bool],
    q: &[f64],
    sigma: &[f64],
    mode: ResolutionMode,
) -> Result<(Vec<f64>, Vec<bool>), ResolutionError> {
    validate_inputs(r, valid, q, sigma)?;

    if mode == ResolutionMode::None {
        return Ok((r.to_vec(), valid.to_vec()));
    }

    let curve = MaskedLinear::new(q, r, valid);
    let spacing = (mode == ResolutionMode::GridTrapezoid).then(|| grid_spacing(q));

    let mut values = Vec::with_capacity(r.len());
    let mut mask = Vec::with_capacity(r.len());
    for (i, (&q_i, &s)) in q.iter().zip(sigma).enumerate() {
        if s == 0.0 {
            values.push(r[i]);
            mask.push(valid[i]);
            continue;
        }
        let smeared = match mode {
            ResolutionMode::None => valid[i].then_some(r[i]),
            ResolutionMode::Grid | ResolutionMode::GridTrapezoid => {
                on_grid(r, valid, q, q_i, s, spacing.as_deref())
            }
            ResolutionMode::Stencil => stencil(&curve, q_i, s),
            ResolutionMode::GaussHermite => gauss_hermite(&curve, q_i, s),
        };
        match smeared {
            Some(v) => {
                values.push(v);
                mask.push(true);
            }
            None => {
                values.push(r[i]);
                mask.push(false);
            }
        }
    }

    let lost = mask.iter().zip(valid).filter(|(m, v)| **v && !**m).count();
    if lost > 0 {
        log::warn!("{lost} point(s) had no valid neighbour inside the resolution window");
    }
    Ok((values, mask))
}

fn validate_inputs(r: &[f64], valid: &[bool], q: &[f64], sigma: &[f64]) -> Result<(), ResolutionError> {
    let n = r.len();
    for (what, len) in [("q", q.len()), ("valid", valid.len())] {
        if len != n {
            return Err(ResolutionError::LengthMismatch {
                what,
                expected: n,
                actual: len,
            });
        }
    }
    validate_grid(q, sigma)
}

/// Check that `q` is finite and non-decreasing and that `sigma` holds one
/// finite, non-negative width per Q.
pub fn validate_grid(q: &[f64], sigma: &[f64]) -> Result<(), ResolutionError> {
    validate_sigma(sigma, q.len())?;
    if let Some(index) = q.iter().position(|x| !x.is_finite()) {
        return Err(ResolutionError::UnsortedQ { index });
    }
    if let Some(index) = q.windows(2).position(|w| w[1] < w[0]) {
        return Err(ResolutionError::UnsortedQ { index: index + 1 });
    }
    Ok(())
}

/// Trapezoid weights of a non-decreasing grid.
fn grid_spacing(q: &[f64]) -> Vec<f64> {
    let n = q.len();
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|j| (q[(j + 1).min(n - 1)] - q[j.saturating_sub(1)]) / 2.0)
        .collect()
}

fn on_grid(
    r: &[f64],
    valid: &[bool],
    q: &[f64],
    centre: f64,
    sigma: f64,
    spacing: Option<&[f64]>,
) -> Option<f64> {
    let lo = q.partition_point(|&x| x < centre - GRID_CUTOFF * sigma);
    let hi = q.partition_point(|&x| x <= centre + GRID_CUTOFF * sigma);
    let samples = (lo..hi).filter(|&j| valid[j]).map(|j| {
        let d = (q[j] - centre) / sigma;
        let w = (-0.5 * d * d).exp() * spacing.map_or(1.0, |s| s[j]);
        (w, r[j])
    });
    weighted_mean(samples)
}

fn stencil(curve: &MaskedLinear<'_>, centre: f64, sigma: f64) -> Option<f64> {
    let step = 2.0 * STENCIL_HALF_WIDTH / (STENCIL_POINTS - 1) as f64;
    let samples = (0..STENCIL_POINTS).filter_map(|k| {
        let x = -STENCIL_HALF_WIDTH + k as f64 * step;
        let v = curve.evaluate(centre + x * sigma)?;
        Some(((-0.5 * x * x).exp(), v))
    });
    weighted_mean(samples)
}

fn gauss_hermite(curve: &MaskedLinear<'_>, centre: f64, sigma: f64) -> Option<f64> {
    let norm = PI.sqrt();
    let samples = HERMITE_NODES.iter().zip(HERMITE_WEIGHTS).filter_map(|(&x, w)| {
        let v = curve.evaluate(centre + std::f64::consts::SQRT_2 * sigma * x)?;
        Some((w / norm, v))
    });
    weighted_mean(samples)
}

fn weighted_mean(samples: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (total, weight) = samples.fold((0.0, 0.0), |(t, w), (wi, vi)| (t + wi * vi, w + wi));
    (weight > 0.0).then(|| total / weight)
}
