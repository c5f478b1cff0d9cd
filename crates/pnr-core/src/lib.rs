//! # PNR Core
//!
//! The numerical backbone of the PNR framework. This crate computes the
//! specular reflectivity of a magnetic multilayer for polarised neutrons.
//!
//! ## Architecture
//!
//! Solvers implement the [`solver::ReflectivitySolver`] trait, which turns a
//! sublayer profile into 2×2 spin-space reflection and transmission
//! amplitudes at each wavevector. The implementation shipped here is a
//! bottom-up matrix recursion ([`solver::MatrixRecursion`]) with Nevot–Croce
//! damping at each interface.
//!
//! [`ReflectivityCalculator`] chains discretisation, the amplitude sweep,
//! polarisation analysis, and resolution smearing. [`ModelResidual`] wraps
//! it as a function of a flat parameter vector for least-squares fitting.
//!
//! ## Modules
//!
//! - [`spin`] — 2×2 spin-space matrix helpers.
//! - [`solver`] — Amplitude solver trait and the matrix recursion.
//! - [`polarization`] — Spin channels and polariser/analyser projection.
//! - [`types`] — Channels, measurements, and calculated curves.
//! - [`config`] — Engine settings.
//! - [`calculator`] — End-to-end reflectivity for a layer stack.
//! - [`residual`] — Weighted residuals for fitting.

pub mod calculator;
pub mod config;
pub mod polarization;
pub mod residual;
pub mod solver;
pub mod spin;
pub mod types;

pub use calculator::{CalculationError, ReflectivityCalculator};
pub use config::EngineConfig;
pub use polarization::SpinChannel;
pub use residual::{ModelResidual, Residual};
pub use solver::{ReflectionError, ReflectionSweep, ReflectivitySolver, SpinAmplitude};
pub use types::{Channel, Measurement, ReflectivityCurve};
