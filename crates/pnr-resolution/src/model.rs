//! Resolution model trait.
//!
//! Every resolution source implements [`ResolutionModel`], which returns the
//! standard deviation σ(Q) of the Gaussian instrument response at each Q.

use thiserror::Error;

/// Errors from resolution models and the convolver.
#[derive(Debug, Error, PartialEq)]
pub enum ResolutionError {
    #[error("Invalid resolution at index {index}: sigma = {sigma}")]
    InvalidResolution { index: usize, sigma: f64 },

    #[error("Length mismatch: {what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Q grid is not finite and non-decreasing at index {index}")]
    UnsortedQ { index: usize },
}

/// Maps a Q grid to the Gaussian resolution width σ(Q).
///
/// Implementations must return one finite, non-negative σ per Q value.
pub trait ResolutionModel: Send + Sync {
    /// Human-readable name of this model.
    fn name(&self) -> &str;

    /// σ(Q) in Å⁻¹ for every entry of `q`.
    fn sigma(&self, q: &[f64]) -> Result<Vec<f64>, ResolutionError>;
}

/// Check a σ vector produced for a grid of `expected` points.
pub fn validate_sigma(sigma: &[f64], expected: usize) -> Result<(), ResolutionError> {
    if sigma.len() != expected {
        return Err(ResolutionError::LengthMismatch {
            what: "sigma",
            expected,
            actual: sigma.len(),
        });
    }
    match sigma.iter().position(|s| !(s.is_finite() && *s >= 0.0)) {
        Some(index) => Err(ResolutionError::InvalidResolution {
            index,
            sigma: sigma[index],
        }),
        None => Ok(()),
    }
}

/// σ for an instrument with angular spread `d_theta` at `theta` and relative
/// wavelength spread `d_lambda / lambda`.
pub(crate) fn gaussian_width(q: f64, theta: f64, d_theta: f64, d_lambda_rel: f64) -> f64 {
    q * ((d_theta / theta).powi(2) + d_lambda_rel.powi(2)).sqrt()
}
