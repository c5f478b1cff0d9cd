//! Data shared between the calculator, the residual, and front ends.

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::polarization::SpinChannel;

/// What to compute: a Q grid, its resolution, and the instrument's spin
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub name: String,
    /// Momentum transfer Q (Å⁻¹), non-decreasing.
    pub q: Vec<f64>,
    /// Gaussian resolution σ(Q) (Å⁻¹). `None` means perfect resolution.
    #[serde(default)]
    pub sigma: Option<Vec<f64>>,
    /// Polariser direction; zero for an unpolarised beam.
    #[serde(default)]
    pub polarizer: [f64; 3],
    /// Analyser direction; zero when no analyser is fitted.
    #[serde(default)]
    pub analyzer: [f64; 3],
    /// Per-Q polariser efficiency, one when absent.
    #[serde(default)]
    pub pol_efficiency: Option<Vec<Complex64>>,
    /// Per-Q analyser efficiency, one when absent.
    #[serde(default)]
    pub ana_efficiency: Option<Vec<Complex64>>,
}

impl Channel {
    /// Unpolarised beam, no analyser, perfect resolution.
    pub fn unpolarized(q: Vec<f64>) -> Self {
        Self {
            name: "unpolarized".to_string(),
            q,
            sigma: None,
            polarizer: [0.0; 3],
            analyzer: [0.0; 3],
            pol_efficiency: None,
            ana_efficiency: None,
        }
    }

    /// A full-polarisation-analysis channel with quantisation `axis`.
    pub fn spin(q: Vec<f64>, channel: SpinChannel, axis: [f64; 3]) -> Self {
        let (polarizer, analyzer) = channel.vectors(axis);
        Self {
            name: channel.label().to_string(),
            polarizer,
            analyzer,
            ..Self::unpolarized(q)
        }
    }

    pub fn with_sigma(mut self, sigma: Vec<f64>) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn with_efficiencies(mut self, polarizer: Vec<Complex64>, analyzer: Vec<Complex64>) -> Self {
        self.pol_efficiency = Some(polarizer);
        self.ana_efficiency = Some(analyzer);
        self
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Describe the first per-Q array whose length differs from `q`.
    pub(crate) fn length_problem(&self) -> Option<String> {
        let n = self.q.len();
        let lengths = [
            ("sigma", self.sigma.as_ref().map(Vec::len)),
            ("pol_efficiency", self.pol_efficiency.as_ref().map(Vec::len)),
            ("ana_efficiency", self.ana_efficiency.as_ref().map(Vec::len)),
        ];
        lengths.into_iter().find_map(|(what, len)| match len {
            Some(len) if len != n => Some(format!("{what} has {len} entries for {n} Q values")),
            _ => None,
        })
    }
}

/// A measured curve: the channel it was recorded in plus R and its error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub channel: Channel,
    /// Measured reflectivity.
    pub r: Vec<f64>,
    /// One-sigma error of `r`; must be positive.
    pub e: Vec<f64>,
}

impl Measurement {
    pub fn new(channel: Channel, r: Vec<f64>, e: Vec<f64>) -> Self {
        Self { channel, r, e }
    }

    /// Describe the first inconsistency of this measurement, if any.
    pub(crate) fn problem(&self) -> Option<String> {
        let n = self.channel.len();
        if self.r.len() != n || self.e.len() != n {
            return Some(format!(
                "'{}' has {} Q, {} R, and {} E values",
                self.channel.name,
                n,
                self.r.len(),
                self.e.len()
            ));
        }
        if let Some(i) = self.e.iter().position(|e| !(e.is_finite() && *e > 0.0)) {
            return Some(format!("'{}' has error bar {} at index {i}", self.channel.name, self.e[i]));
        }
        if let Some(i) = self.r.iter().position(|r| !r.is_finite()) {
            return Some(format!("'{}' has non-finite R at index {i}", self.channel.name));
        }
        self.channel.length_problem()
    }
}

/// A calculated reflectivity curve with per-point validity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectivityCurve {
    pub q: Array1<f64>,
    pub values: Array1<f64>,
    /// `false` where the amplitude could not be computed; the value there is
    /// not meaningful.
    pub valid: Vec<bool>,
}

impl ReflectivityCurve {
    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn n_invalid(&self) -> usize {
        self.valid.iter().filter(|v| !**v).count()
    }

    /// `(q, R)` pairs of the valid points.
    pub fn valid_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.q
            .iter()
            .zip(self.values.iter())
            .zip(&self.valid)
            .filter(|(_, ok)| **ok)
            .map(|((q, r), _)| (*q, *r))
    }
}
