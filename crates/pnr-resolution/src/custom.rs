//! Resolution supplied as a closure.

use std::fmt;

use crate::model::{validate_sigma, ResolutionError, ResolutionModel};

type SigmaFn = dyn Fn(&[f64]) -> Vec<f64> + Send + Sync;

/// A resolution function injected by the caller.
///
/// The output is validated like every built-in model: one finite,
/// non-negative σ per Q.
pub struct CustomResolution {
    name: String,
    function: Box<SigmaFn>,
}

impl CustomResolution {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Box::new(function),
        }
    }

    /// Constant relative resolution σ = `fraction`·Q.
    pub fn relative(fraction: f64) -> Self {
        Self::new(format!("dQ/Q = {fraction}"), move |q| {
            q.iter().map(|q| fraction * q.abs()).collect()
        })
    }
}

impl fmt::Debug for CustomResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomResolution").field("name", &self.name).finish()
    }
}

impl ResolutionModel for CustomResolution {
    fn name(&self) -> &str {
        &self.name
    }

    fn sigma(&self, q: &[f64]) -> Result<Vec<f64>, ResolutionError> {
        let sigma = (self.function)(q);
        validate_sigma(&sigma, q.len())?;
        Ok(sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_custom_function_is_called() {
        let model = CustomResolution::relative(0.02);
        let sigma = model.sigma(&[0.1, 0.2]).unwrap();
        assert_relative_eq!(sigma[0], 0.002, max_relative = 1e-12);
        assert_relative_eq!(sigma[1], 0.004, max_relative = 1e-12);
        assert_eq!(model.name(), "dQ/Q = 0.02");
    }

    #[test]
    fn test_custom_output_is_validated() {
        let short = CustomResolution::new("short", |_| vec![0.0]);
        assert!(matches!(
            short.sigma(&[0.1, 0.2]),
            Err(ResolutionError::LengthMismatch { .. })
        ));
        let negative = CustomResolution::new("negative", |q| q.iter().map(|q| -q).collect());
        assert!(negative.sigma(&[0.1]).is_err());
    }
}
