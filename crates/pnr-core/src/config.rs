//! Engine configuration.

use pnr_resolution::ResolutionMode;
use serde::{Deserialize, Serialize};

/// Settings shared by every calculation of a [`ReflectivityCalculator`](crate::ReflectivityCalculator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Drop the film-normal magnetisation component before the recursion.
    #[serde(default)]
    pub in_plane_magnetization: bool,
    /// Residual assigned to points whose amplitude could not be computed,
    /// in units of the error bar.
    #[serde(default = "default_invalid_penalty")]
    pub invalid_penalty: f64,
    /// Strategy used to smear the calculated curve.
    #[serde(default)]
    pub resolution_mode: ResolutionMode,
}

fn default_invalid_penalty() -> f64 {
    1.0e4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            in_plane_magnetization: false,
            invalid_penalty: default_invalid_penalty(),
            resolution_mode: ResolutionMode::default(),
        }
    }
}
