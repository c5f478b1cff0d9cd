//! Monochromatic (angle-scanning) reflectometer.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::model::{gaussian_width, validate_sigma, ResolutionError, ResolutionModel};

/// Fixed-wavelength resolution; the angle follows from
/// $\theta = \arcsin(Q\lambda / 4\pi)$.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monochromatic {
    /// Wavelength (Å).
    pub lambda: f64,
    /// Wavelength spread (Å).
    pub d_lambda: f64,
    /// Angular divergence (rad).
    pub d_theta: f64,
}

impl Default for Monochromatic {
    fn default() -> Self {
        Self {
            lambda: 5.0,
            d_lambda: 0.01,
            d_theta: 0.0007,
        }
    }
}

impl Monochromatic {
    pub fn new(lambda: f64, d_lambda: f64, d_theta: f64) -> Self {
        Self {
            lambda,
            d_lambda,
            d_theta,
        }
    }
}

impl ResolutionModel for Monochromatic {
    fn name(&self) -> &str {
        "monochromatic"
    }

    /// Q ≤ 0 has zero width. Q beyond the instrument's reach (Qλ/4π > 1)
    /// yields `InvalidResolution`.
    fn sigma(&self, q: &[f64]) -> Result<Vec<f64>, ResolutionError> {
        let d_lambda_rel = self.d_lambda / self.lambda;
        let sigma: Vec<f64> = q
            .iter()
            .map(|&q| {
                if q > 0.0 {
                    let theta = (q * self.lambda / (4.0 * PI)).asin();
                    gaussian_width(q, theta, self.d_theta, d_lambda_rel)
                } else {
                    0.0
                }
            })
            .collect();
        validate_sigma(&sigma, q.len())?;
        Ok(sigma)
    }
}
