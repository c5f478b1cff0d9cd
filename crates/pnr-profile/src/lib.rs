//! # PNR Profile
//!
//! Sample description for the PNR framework. This crate provides:
//!
//! - **Layers and stacks** ([`layer`]) — Homogeneous layers with nuclear and
//!   magnetic scattering-length densities, bounded by two semi-infinite media.
//! - **Discretisation** ([`sublayers`]) — Converts rough interfaces into thin
//!   homogeneous slabs that follow an `erf` or `tanh` profile.
//! - **Fit parameters** ([`parameters`]) — Typed `(layer, field)` identifiers
//!   and a flat-vector adapter for external optimisers.

pub mod layer;
pub mod parameters;
pub mod sublayers;

pub use layer::{Layer, LayerStack, MagneticSld, RoughnessModel};
pub use parameters::{FitParameter, LayerField, ParameterId, ParameterSet};
pub use sublayers::{generate_sublayers, rough_sublayer, Sublayer, SublayerProfile};

use thiserror::Error;

/// Errors raised while building or discretising a sample.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Invalid layer stack: {0}")]
    InvalidStack(String),

    #[error("Degenerate interface between layers {upper} and {lower}: {message}")]
    Geometry {
        upper: usize,
        lower: usize,
        message: String,
    },

    #[error("Invalid parameter {id}: {message}")]
    InvalidParameter { id: String, message: String },
}
