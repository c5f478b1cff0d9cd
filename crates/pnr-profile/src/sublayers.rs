//! Discretisation of rough interfaces into homogeneous sublayers.
//!
//! Every pair of adjacent layers is split at its shared interface. When the
//! lower layer declares an `ERFC` or `TANH` roughness model with at least two
//! sublayers, the region within $\pm\gamma$ of the interface is replaced by
//! $N$ slabs whose SLD follows the smooth profile
//!
//! $$\rho(z) = \rho_{\text{up}} + (\rho_{\text{down}} - \rho_{\text{up}})\,\frac{f(s z) + 1}{2}$$
//!
//! with $f = \operatorname{erf}$ or $\tanh$ and $s$ chosen so that the
//! profile width matches the (Nevot–Croce scaled) roughness. The half-width
//! $\gamma$ is where the profile reaches 97% of its asymptote.
//!
//! The unaffected parts of both layers are kept as "bound" sublayers, so the
//! thickness of each interface pair is always $t_{\text{up}}/2 + t_{\text{down}}/2$.

use serde::Serialize;
use statrs::function::erf::{erf, erf_inv};

use crate::layer::{layer_label, Layer, LayerStack, MagneticSld, RoughnessModel};
use crate::ProfileError;

/// Scaling between the RMS roughness and the Nevot–Croce profile width.
pub const NEVOT_CROCE_FACTOR: f64 = 1.3;

/// Fraction of the asymptotic SLD step reached at the edge of the smeared region.
const PROFILE_EXTENT: f64 = 0.97;

/// A thin homogeneous slab produced by discretisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sublayer {
    /// Thickness (Å). Infinite for the two boundary media.
    pub thickness: f64,
    /// Real part of the nuclear SLD (Å⁻²).
    pub nsld_real: f64,
    /// Imaginary part of the nuclear SLD (Å⁻²).
    pub nsld_imag: f64,
    /// Magnetic SLD; angles are inherited from the parent layer.
    pub msld: MagneticSld,
    /// Roughness of the interface above this slab (Å). Always zero when
    /// produced by [`generate_sublayers`].
    pub roughness: f64,
}

impl Sublayer {
    pub fn new(thickness: f64, nsld_real: f64, nsld_imag: f64, msld: MagneticSld) -> Self {
        Self {
            thickness,
            nsld_real,
            nsld_imag,
            msld,
            roughness: 0.0,
        }
    }

    /// Attach an explicit interface roughness (Debye–Waller term in the solver).
    pub fn with_roughness(mut self, roughness: f64) -> Self {
        self.roughness = roughness;
        self
    }

    /// A homogeneous copy of `layer` with the given thickness.
    fn bulk(layer: &Layer, thickness: f64) -> Self {
        Self::new(thickness, layer.nsld_real, layer.nsld_imag, layer.msld)
    }

    fn is_well_formed(&self) -> bool {
        !self.thickness.is_nan()
            && self.thickness >= 0.0
            && self.nsld_real.is_finite()
            && self.nsld_imag.is_finite()
            && self.msld.rho.is_finite()
    }
}

/// The discretised sample: sublayers from the incoming medium to the
/// substrate, with the index of the stack layer each one came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SublayerProfile {
    pub sublayers: Vec<Sublayer>,
    pub parents: Vec<usize>,
}

impl SublayerProfile {
    pub fn len(&self) -> usize {
        self.sublayers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sublayers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sublayer, usize)> {
        self.sublayers.iter().zip(self.parents.iter().copied())
    }

    /// Depth of the top of every sublayer, with z = 0 at the top of the first
    /// film. The incoming medium starts at `-inf`.
    pub fn depths(&self) -> Vec<f64> {
        let mut depths = Vec::with_capacity(self.sublayers.len());
        let first_film = self.parents.iter().position(|&p| p > 0).unwrap_or(self.parents.len());
        let mut z = -self.sublayers[..first_film]
            .iter()
            .skip(1)
            .map(|s| s.thickness)
            .sum::<f64>();
        for (i, s) in self.sublayers.iter().enumerate() {
            if i == 0 {
                depths.push(f64::NEG_INFINITY);
                continue;
            }
            depths.push(z);
            z += s.thickness;
        }
        depths
    }
}

/// Analytic profile shapes used for rough interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterfaceShape {
    Erf,
    Tanh,
}

impl InterfaceShape {
    fn from_model(model: RoughnessModel) -> Option<Self> {
        match model {
            RoughnessModel::Erfc => Some(Self::Erf),
            RoughnessModel::Tanh => Some(Self::Tanh),
            RoughnessModel::None => None,
        }
    }

    /// Width constant relating the profile scale to the roughness.
    fn alpha(self) -> f64 {
        match self {
            Self::Erf => 2.0 * erf_inv(0.5),
            Self::Tanh => 2.0 * 0.5_f64.atanh(),
        }
    }

    /// Reduced coordinate at which the profile reaches [`PROFILE_EXTENT`].
    fn delta(self) -> f64 {
        match self {
            Self::Erf => erf_inv(PROFILE_EXTENT),
            Self::Tanh => PROFILE_EXTENT.atanh(),
        }
    }

    fn eval(self, x: f64) -> f64 {
        match self {
            Self::Erf => erf(x),
            Self::Tanh => x.tanh(),
        }
    }

    /// Antiderivative of `eval` in the reduced coordinate.
    fn primitive(self, y: f64) -> f64 {
        match self {
            Self::Erf => y * erf(y) + (-y * y).exp() / std::f64::consts::PI.sqrt(),
            // ln cosh(y), written to stay finite for large |y|
            Self::Tanh => {
                let a = y.abs();
                a + (-2.0 * a).exp().ln_1p() - std::f64::consts::LN_2
            }
        }
    }

    /// $\int_{x_0}^{x_1} f(s x)\,dx$.
    fn integral(self, x0: f64, x1: f64, scale: f64) -> f64 {
        (self.primitive(scale * x1) - self.primitive(scale * x0)) / scale
    }
}

/// Discretise the interface between `layer_up` and `layer_down`.
///
/// Both layers contribute half of their thickness. Returns the sublayers in
/// depth order and, for each, `0` if it belongs to `layer_up` or `1` if it
/// belongs to `layer_down`.
pub fn rough_sublayer(layer_up: &Layer, layer_down: &Layer) -> (Vec<Sublayer>, Vec<usize>) {
    let sigma = layer_down.roughness * NEVOT_CROCE_FACTOR;
    let n = layer_down.sublayers;
    let shape = match InterfaceShape::from_model(layer_down.roughness_model) {
        Some(shape) if n >= 2 && sigma != 0.0 => shape,
        _ => {
            return (
                vec![
                    Sublayer::bulk(layer_up, layer_up.thickness * 0.5),
                    Sublayer::bulk(layer_down, layer_down.thickness * 0.5),
                ],
                vec![0, 1],
            );
        }
    };

    let scale = shape.alpha() / sigma;
    let gamma = shape.delta() / scale;

    // Only the nuclear SLD and the magnetic magnitude are smeared.
    let mut values_up = [layer_up.nsld_real, layer_up.nsld_imag, layer_up.msld.rho];
    let mut values_down = [layer_down.nsld_real, layer_down.nsld_imag, layer_down.msld.rho];

    let thickness_up = layer_up.thickness;
    let thickness_down = layer_down.thickness;
    let mut l_up = gamma;
    let mut l_down = gamma;

    let up_bound = if gamma < thickness_up / 2.0 {
        Some(thickness_up / 2.0 - l_up)
    } else {
        l_up = thickness_up / 2.0;
        None
    };
    let down_bound = if gamma < thickness_down / 2.0 {
        Some(thickness_down / 2.0 - l_down)
    } else {
        l_down = thickness_down / 2.0;
        None
    };

    // A truncated side never reaches its bulk value; rescale the far-side
    // terminal value so the integrated SLD of the thin layer is preserved.
    if thickness_up < thickness_down && gamma > thickness_up / 2.0 {
        let denom = l_down + l_up - shape.integral(-l_up, l_down, scale);
        for (up, down) in values_up.iter_mut().zip(values_down.iter()) {
            *up = down - (down - *up) * thickness_up / denom;
        }
    }
    if thickness_up > thickness_down && gamma > thickness_down / 2.0 {
        let denom = l_down + l_up + shape.integral(-l_up, l_down, scale);
        for (down, up) in values_down.iter_mut().zip(values_up.iter()) {
            *down = up + (*down - up) * thickness_down / denom;
        }
    }

    let sublayer_thickness = (l_up + l_down) / n as f64;
    let centers = linspace(
        -l_up + sublayer_thickness / 2.0,
        l_down - sublayer_thickness / 2.0,
        n,
    );

    let mut sublayers = Vec::with_capacity(n + 2);
    let mut parents = Vec::with_capacity(n + 2);

    if let Some(bound) = up_bound {
        sublayers.push(Sublayer::bulk(layer_up, bound));
        parents.push(0);
    }
    for &c in &centers {
        let weight = shape.eval(scale * c) + 1.0;
        let value = |i: usize| (values_down[i] - values_up[i]) * weight / 2.0 + values_up[i];
        let parent = if c < 0.0 { layer_up } else { layer_down };
        sublayers.push(Sublayer::new(
            sublayer_thickness,
            value(0),
            value(1),
            MagneticSld::new(value(2), parent.msld.theta, parent.msld.phi),
        ));
        parents.push(usize::from(c >= 0.0));
    }
    if let Some(bound) = down_bound {
        sublayers.push(Sublayer::bulk(layer_down, bound));
        parents.push(1);
    }

    (sublayers, parents)
}

/// Discretise every interface of `stack`.
///
/// The returned parents index into `stack.layers()`. Fails with
/// [`ProfileError::Geometry`] if any produced slab is non-finite or has a
/// negative thickness, which happens when the roughness cannot be
/// accommodated by the adjacent layers.
pub fn generate_sublayers(stack: &LayerStack) -> Result<SublayerProfile, ProfileError> {
    let layers = stack.layers();
    let mut sublayers = Vec::new();
    let mut parents = Vec::new();

    for i in 0..layers.len() - 1 {
        let (slabs, membership) = rough_sublayer(&layers[i], &layers[i + 1]);
        if let Some(bad) = slabs.iter().position(|s| !s.is_well_formed()) {
            return Err(ProfileError::Geometry {
                upper: i,
                lower: i + 1,
                message: format!(
                    "sublayer {bad} is degenerate (thickness {}, nsld {} + {}i) between {} and {}",
                    slabs[bad].thickness,
                    slabs[bad].nsld_real,
                    slabs[bad].nsld_imag,
                    layer_label(&layers[i], i),
                    layer_label(&layers[i + 1], i + 1),
                ),
            });
        }
        sublayers.extend(slabs);
        parents.extend(membership.into_iter().map(|j| j + i));
    }

    log::debug!(
        "discretised {} layers into {} sublayers",
        layers.len(),
        sublayers.len()
    );
    Ok(SublayerProfile { sublayers, parents })
}

/// `n` evenly spaced points from `start` to `stop`, both inclusive.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut points: Vec<f64> = (0..n).map(|i| i as f64 * step + start).collect();
            points[n - 1] = stop;
            points
        }
    }
}
