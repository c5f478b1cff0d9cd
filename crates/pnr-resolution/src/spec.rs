//! Configuration-level selection of a built-in resolution model.

use serde::{Deserialize, Serialize};

use crate::model::{validate_sigma, ResolutionError, ResolutionModel};
use crate::mono::Monochromatic;
use crate::piecewise::PiecewiseTimeOfFlight;
use crate::tof::TimeOfFlight;

/// A built-in resolution model as written in a job file.
///
/// ```toml
/// [resolution]
/// kind = "time_of_flight"
/// theta = 0.01
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionSpec {
    /// Perfect resolution, σ ≡ 0.
    #[default]
    None,
    TimeOfFlight(TimeOfFlight),
    Monochromatic(Monochromatic),
    Piecewise(PiecewiseTimeOfFlight),
    /// Constant relative width σ = `fraction`·|Q|.
    Relative { fraction: f64 },
}

impl ResolutionSpec {
    /// Every built-in model with its default parameters.
    pub fn builtins() -> Vec<ResolutionSpec> {
        vec![
            ResolutionSpec::None,
            ResolutionSpec::TimeOfFlight(TimeOfFlight::default()),
            ResolutionSpec::Monochromatic(Monochromatic::default()),
            ResolutionSpec::Piecewise(PiecewiseTimeOfFlight::default()),
            ResolutionSpec::Relative { fraction: 0.02 },
        ]
    }
}

impl ResolutionModel for ResolutionSpec {
    fn name(&self) -> &str {
        match self {
            Self::None => "none",
            Self::TimeOfFlight(m) => m.name(),
            Self::Monochromatic(m) => m.name(),
            Self::Piecewise(m) => m.name(),
            Self::Relative { .. } => "relative",
        }
    }

    fn sigma(&self, q: &[f64]) -> Result<Vec<f64>, ResolutionError> {
        match self {
            Self::None => Ok(vec![0.0; q.len()]),
            Self::TimeOfFlight(m) => m.sigma(q),
            Self::Monochromatic(m) => m.sigma(q),
            Self::Piecewise(m) => m.sigma(q),
            Self::Relative { fraction } => {
                let sigma: Vec<f64> = q.iter().map(|q| fraction * q.abs()).collect();
                validate_sigma(&sigma, q.len())?;
                Ok(sigma)
            }
        }
    }
}
