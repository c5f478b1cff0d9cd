//! Layers and layer stacks.
//!
//! A [`LayerStack`] is an ordered list of layers from the incoming medium
//! (top, semi-infinite) down to the substrate (bottom, semi-infinite). Each
//! layer carries a complex nuclear SLD, a magnetic SLD vector in spherical
//! coordinates, and the roughness of the interface *above* it.

use serde::{Deserialize, Serialize};

use crate::ProfileError;

/// Shape of the scattering-length-density profile across a rough interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoughnessModel {
    /// Sharp interface, roughness is ignored.
    #[default]
    None,
    /// Error-function profile (Gaussian height distribution).
    Erfc,
    /// Hyperbolic-tangent profile.
    Tanh,
}

/// Magnetic scattering-length density vector.
///
/// Angles are stored in degrees: `theta` is the polar angle from the film
/// normal (z) and `phi` the azimuth in the film plane, measured from x.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MagneticSld {
    /// Magnitude (Å⁻²).
    #[serde(default)]
    pub rho: f64,
    /// Polar angle (degrees).
    #[serde(default)]
    pub theta: f64,
    /// Azimuthal angle (degrees).
    #[serde(default)]
    pub phi: f64,
}

impl MagneticSld {
    pub fn new(rho: f64, theta: f64, phi: f64) -> Self {
        Self { rho, theta, phi }
    }

    /// Magnetisation lying in the film plane at azimuth `phi` (degrees).
    pub fn in_plane(rho: f64, phi: f64) -> Self {
        Self { rho, theta: 90.0, phi }
    }

    /// Cartesian components `(x, y, z)` in Å⁻².
    pub fn cartesian(&self) -> [f64; 3] {
        let theta = self.theta.to_radians();
        let phi = self.phi.to_radians();
        [
            self.rho * theta.sin() * phi.cos(),
            self.rho * theta.sin() * phi.sin(),
            self.rho * theta.cos(),
        ]
    }

    fn is_finite(&self) -> bool {
        self.rho.is_finite() && self.theta.is_finite() && self.phi.is_finite()
    }
}

/// A homogeneous layer of the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Display name, used in reports.
    #[serde(default)]
    pub name: String,
    /// Thickness (Å). Infinite for the incoming medium and the substrate.
    pub thickness: f64,
    /// Real part of the nuclear SLD (Å⁻²).
    pub nsld_real: f64,
    /// Imaginary part of the nuclear SLD (Å⁻²). Absorption is negative.
    #[serde(default)]
    pub nsld_imag: f64,
    /// Magnetic SLD vector.
    #[serde(default)]
    pub msld: MagneticSld,
    /// RMS roughness of the interface above this layer (Å).
    #[serde(default)]
    pub roughness: f64,
    /// Profile shape used when discretising the interface above this layer.
    #[serde(default)]
    pub roughness_model: RoughnessModel,
    /// Number of slabs used to discretise the interface above this layer.
    #[serde(default)]
    pub sublayers: usize,
}

impl Layer {
    /// A finite, non-magnetic, sharp layer.
    pub fn new(thickness: f64, nsld_real: f64, nsld_imag: f64) -> Self {
        Self {
            name: String::new(),
            thickness,
            nsld_real,
            nsld_imag,
            msld: MagneticSld::default(),
            roughness: 0.0,
            roughness_model: RoughnessModel::None,
            sublayers: 0,
        }
    }

    /// A semi-infinite medium (incoming medium or substrate).
    pub fn semi_infinite(nsld_real: f64, nsld_imag: f64) -> Self {
        Self::new(f64::INFINITY, nsld_real, nsld_imag)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_magnetization(mut self, msld: MagneticSld) -> Self {
        self.msld = msld;
        self
    }

    /// Set the roughness of the interface above this layer.
    pub fn with_roughness(mut self, roughness: f64, model: RoughnessModel, sublayers: usize) -> Self {
        self.roughness = roughness;
        self.roughness_model = model;
        self.sublayers = sublayers;
        self
    }

    pub fn is_semi_infinite(&self) -> bool {
        self.thickness == f64::INFINITY
    }
}

/// An ordered stack `[incoming, films..., substrate]`.
///
/// Construction validates that exactly the first and last layers are
/// semi-infinite and that all other quantities are finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new(layers: Vec<Layer>) -> Result<Self, ProfileError> {
        if layers.len() < 2 {
            return Err(ProfileError::InvalidStack(format!(
                "a stack needs an incoming medium and a substrate, got {} layer(s)",
                layers.len()
            )));
        }
        let last = layers.len() - 1;
        for (i, layer) in layers.iter().enumerate() {
            let label = layer_label(layer, i);
            let boundary = i == 0 || i == last;
            if boundary && !layer.is_semi_infinite() {
                return Err(ProfileError::InvalidStack(format!(
                    "{label} bounds the stack and must have infinite thickness"
                )));
            }
            if !boundary && !(layer.thickness.is_finite() && layer.thickness >= 0.0) {
                return Err(ProfileError::InvalidStack(format!(
                    "{label} has invalid thickness {}",
                    layer.thickness
                )));
            }
            if !(layer.nsld_real.is_finite() && layer.nsld_imag.is_finite() && layer.msld.is_finite()) {
                return Err(ProfileError::InvalidStack(format!(
                    "{label} has a non-finite scattering-length density"
                )));
            }
            if !(layer.roughness.is_finite() && layer.roughness >= 0.0) {
                return Err(ProfileError::InvalidStack(format!(
                    "{label} has invalid roughness {}",
                    layer.roughness
                )));
            }
        }
        Ok(Self { layers })
    }

    /// Assemble a stack from its incoming medium, films, and substrate.
    pub fn from_parts(incoming: Layer, films: Vec<Layer>, substrate: Layer) -> Result<Self, ProfileError> {
        let mut layers = Vec::with_capacity(films.len() + 2);
        layers.push(incoming);
        layers.extend(films);
        layers.push(substrate);
        Self::new(layers)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn incoming(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn films(&self) -> &[Layer] {
        &self.layers[1..self.layers.len() - 1]
    }

    pub fn substrate(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Complex nuclear SLD of the substrate as `(re, im)`.
    pub fn substrate_sld(&self) -> (f64, f64) {
        let s = self.substrate();
        (s.nsld_real, s.nsld_imag)
    }

    /// Total thickness of the finite films (Å).
    pub fn film_thickness(&self) -> f64 {
        self.films().iter().map(|l| l.thickness).sum()
    }

    pub(crate) fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }
}

impl TryFrom<Vec<Layer>> for LayerStack {
    type Error = ProfileError;

    fn try_from(layers: Vec<Layer>) -> Result<Self, Self::Error> {
        Self::new(layers)
    }
}

impl From<LayerStack> for Vec<Layer> {
    fn from(stack: LayerStack) -> Self {
        stack.layers
    }
}

pub(crate) fn layer_label(layer: &Layer, index: usize) -> String {
    if layer.name.is_empty() {
        format!("layer {index}")
    } else {
        format!("layer {index} ('{}')", layer.name)
    }
}
