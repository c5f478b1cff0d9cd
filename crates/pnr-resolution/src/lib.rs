//! # PNR Resolution
//!
//! Instrument resolution for the PNR framework. All resolution functions
//! implement the [`ResolutionModel`](model::ResolutionModel) trait, which
//! maps a Q grid to the Gaussian width σ(Q) of the instrument response.
//!
//! ## Available models
//!
//! | Instrument | Module | Parameters |
//! |------------|--------|------------|
//! | Time of flight, fixed angle | [`tof`] | θ, Δθ, Δλ/λ |
//! | Time of flight, several angles | [`piecewise`] | θᵢ, Δθᵢ per Q range |
//! | Monochromatic | [`mono`] | λ, Δλ, Δθ |
//! | User supplied | [`custom`] | any `Fn(&[f64]) -> Vec<f64>` |
//!
//! [`ResolutionSpec`](spec::ResolutionSpec) selects a built-in model from
//! configuration files.
//!
//! ## Convolution
//!
//! [`convolve`](convolve::convolve) smears a reflectivity curve with the
//! Gaussian resolution using one of the [`ResolutionMode`] strategies.
//! Sampled strategies read the curve between grid points through
//! [`interp`].

pub mod convolve;
pub mod custom;
pub mod interp;
pub mod model;
pub mod mono;
pub mod piecewise;
pub mod spec;
pub mod tof;

pub use convolve::{convolve, convolve_masked, validate_grid, ResolutionMode};
pub use custom::CustomResolution;
pub use model::{ResolutionError, ResolutionModel};
pub use mono::Monochromatic;
pub use piecewise::{AngleSegment, PiecewiseTimeOfFlight};
pub use spec::ResolutionSpec;
pub use tof::TimeOfFlight;
