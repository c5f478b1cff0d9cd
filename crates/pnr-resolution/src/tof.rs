//! Time-of-flight reflectometer at a single incidence angle.
//!
//! The wavelength seen at each Q follows from $\lambda = 4\pi\sin\theta / Q$.
//! The width combines the angular divergence with the wavelength band:
//!
//! $$\sigma(Q) = Q\sqrt{(\Delta\theta/\theta)^2 + (\Delta\lambda/\lambda)^2}$$

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::model::{gaussian_width, validate_sigma, ResolutionError, ResolutionModel};

/// Fixed-angle time-of-flight resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOfFlight {
    /// Incidence angle (rad).
    pub theta: f64,
    /// Angular divergence (rad).
    pub d_theta: f64,
    /// Wavelength spread (Å).
    pub d_lambda: f64,
}

impl Default for TimeOfFlight {
    fn default() -> Self {
        Self {
            theta: 0.01,
            d_theta: 0.0003,
            d_lambda: 0.01,
        }
    }
}

impl TimeOfFlight {
    pub fn new(theta: f64, d_theta: f64, d_lambda: f64) -> Self {
        Self {
            theta,
            d_theta,
            d_lambda,
        }
    }

    pub(crate) fn sigma_at(q: f64, theta: f64, d_theta: f64, d_lambda: f64) -> f64 {
        let lambda = 4.0 * PI * theta.sin() / q;
        gaussian_width(q, theta, d_theta, d_lambda / lambda)
    }
}

impl ResolutionModel for TimeOfFlight {
    fn name(&self) -> &str {
        "time-of-flight"
    }

    fn sigma(&self, q: &[f64]) -> Result<Vec<f64>, ResolutionError> {
        let sigma: Vec<f64> = q
            .iter()
            .map(|&q| Self::sigma_at(q, self.theta, self.d_theta, self.d_lambda))
            .collect();
        validate_sigma(&sigma, q.len())?;
        Ok(sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_width() {
        let model = TimeOfFlight::default();
        let q = 0.05;
        let lambda = 4.0 * PI * 0.01_f64.sin() / q;
        let expected = q * ((0.0003_f64 / 0.01).powi(2) + (0.01 / lambda).powi(2)).sqrt();
        let sigma = model.sigma(&[q]).unwrap();
        assert_relative_eq!(sigma[0], expected, max_relative = 1e-14);
    }

    #[test]
    fn test_width_grows_with_q() {
        let sigma = TimeOfFlight::default().sigma(&[0.01, 0.05, 0.1]).unwrap();
        assert!(sigma[0] < sigma[1] && sigma[1] < sigma[2]);
    }

    #[test]
    fn test_zero_q_has_zero_width() {
        let sigma = TimeOfFlight::default().sigma(&[0.0]).unwrap();
        assert_eq!(sigma[0], 0.0);
    }

    #[test]
    fn test_negative_q_is_rejected() {
        assert!(matches!(
            TimeOfFlight::default().sigma(&[0.01, -0.01]),
            Err(ResolutionError::InvalidResolution { index: 1, .. })
        ));
    }
}
