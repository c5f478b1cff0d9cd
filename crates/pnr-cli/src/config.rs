//! TOML configuration deserialisation for reflectivity jobs.
//!
//! ```toml
//! [[layer]]
//! name = "air"
//! thickness = inf
//! nsld_real = 0.0
//!
//! [[layer]]
//! name = "Fe"
//! thickness = 200.0
//! nsld_real = 8.0e-6
//! msld = { rho = 5.0e-6, theta = 90.0, phi = 0.0 }
//! roughness = 5.0
//! roughness_model = "ERFC"
//! sublayers = 10
//!
//! [[layer]]
//! name = "Si"
//! thickness = inf
//! nsld_real = 2.07e-6
//!
//! [q]
//! range = [0.005, 0.15]
//! points = 300
//!
//! [resolution]
//! kind = "time_of_flight"
//!
//! [[channel]]
//! spin = "++"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use num_complex::Complex64;
use pnr_core::{Channel, EngineConfig, SpinChannel};
use pnr_profile::LayerStack;
use pnr_resolution::ResolutionSpec;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    /// Layers from the incoming medium down to the substrate.
    #[serde(rename = "layer")]
    pub stack: LayerStack,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub q: QGrid,
    #[serde(default)]
    pub resolution: ResolutionSpec,
    #[serde(rename = "channel", default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
    /// Measured curves to compare against.
    #[serde(default)]
    pub data: Vec<DataConfig>,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Q grid: either an evenly spaced range or an explicit list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QGrid {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

impl Default for QGrid {
    fn default() -> Self {
        QGrid::Range {
            range: [0.002, 0.17],
            points: 150,
        }
    }
}

impl QGrid {
    pub fn values(&self) -> Vec<f64> {
        match self {
            QGrid::Range { range, points } => {
                let [start, end] = *range;
                let step = (end - start) / points.saturating_sub(1).max(1) as f64;
                (0..*points).map(|i| start + step * i as f64).collect()
            }
            QGrid::List { values } => values.clone(),
        }
    }
}

/// One instrument configuration to compute.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    /// Label in reports; defaults to the spin label or "unpolarized".
    #[serde(default)]
    pub name: Option<String>,
    /// Spin channel; omitted for an unpolarised beam.
    #[serde(default)]
    pub spin: Option<SpinChannel>,
    /// Quantisation axis of the polariser and analyser.
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
    /// Drop the analyser and measure only the incident polarisation.
    #[serde(default)]
    pub no_analyzer: bool,
    #[serde(default)]
    pub pol_efficiency: Option<f64>,
    #[serde(default)]
    pub ana_efficiency: Option<f64>,
}

fn default_axis() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

fn default_channels() -> Vec<ChannelConfig> {
    SpinChannel::ALL
        .iter()
        .map(|&spin| ChannelConfig {
            spin: Some(spin),
            axis: default_axis(),
            ..ChannelConfig::default()
        })
        .collect()
}

impl ChannelConfig {
    pub fn label(&self) -> String {
        match (&self.name, self.spin) {
            (Some(name), _) => name.clone(),
            (None, Some(spin)) => spin.label().to_string(),
            (None, None) => "unpolarized".to_string(),
        }
    }

    /// A [`Channel`] on the grid `q` without resolution.
    pub fn build(&self, q: Vec<f64>) -> Channel {
        let n = q.len();
        let mut channel = match self.spin {
            Some(spin) => Channel::spin(q, spin, self.axis),
            None => Channel::unpolarized(q),
        };
        if self.no_analyzer {
            channel.analyzer = [0.0; 3];
        }
        channel.name = self.label();
        if self.pol_efficiency.is_some() || self.ana_efficiency.is_some() {
            let fill = |eta: Option<f64>| vec![Complex64::new(eta.unwrap_or(1.0), 0.0); n];
            channel = channel.with_efficiencies(fill(self.pol_efficiency), fill(self.ana_efficiency));
        }
        channel
    }
}

/// A measured curve read from a whitespace- or comma-separated file with
/// columns `Q R E [σQ]`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub file: PathBuf,
    #[serde(flatten)]
    pub channel: ChannelConfig,
}

/// Compute backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ComputeConfig {
    /// "cpu" (default) or "serial".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Size of a dedicated CPU pool; the global Rayon pool when omitted.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            threads: None,
        }
    }
}

fn default_backend() -> String {
    "cpu".into()
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save curves as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_csv: bool,
    /// Whether to also save curves as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Whether to write the sublayer profile alongside the curves.
    #[serde(default)]
    pub save_profile: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_csv: true,
            save_json: false,
            save_profile: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}

fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<JobConfig> {
    let job: JobConfig = toml::from_str(content)?;
    if job.q.values().is_empty() {
        anyhow::bail!("the Q grid is empty");
    }
    Ok(job)
}
