//! Typed addressing of layer quantities for fitting.
//!
//! A [`ParameterId`] names one scalar of one layer. It is validated against
//! the stack when it is created, so later reads and writes cannot fail on
//! the address itself. [`ParameterSet`] maps a subset of those scalars onto
//! the flat `&[f64]` vector an external optimiser works with.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::layer::{Layer, LayerStack};
use crate::ProfileError;

/// A scalar field of a [`Layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerField {
    Thickness,
    NsldReal,
    NsldImag,
    MsldRho,
    MsldTheta,
    MsldPhi,
    Roughness,
}

impl LayerField {
    pub const ALL: [LayerField; 7] = [
        LayerField::Thickness,
        LayerField::NsldReal,
        LayerField::NsldImag,
        LayerField::MsldRho,
        LayerField::MsldTheta,
        LayerField::MsldPhi,
        LayerField::Roughness,
    ];

    fn get(self, layer: &Layer) -> f64 {
        match self {
            Self::Thickness => layer.thickness,
            Self::NsldReal => layer.nsld_real,
            Self::NsldImag => layer.nsld_imag,
            Self::MsldRho => layer.msld.rho,
            Self::MsldTheta => layer.msld.theta,
            Self::MsldPhi => layer.msld.phi,
            Self::Roughness => layer.roughness,
        }
    }

    fn slot(self, layer: &mut Layer) -> &mut f64 {
        match self {
            Self::Thickness => &mut layer.thickness,
            Self::NsldReal => &mut layer.nsld_real,
            Self::NsldImag => &mut layer.nsld_imag,
            Self::MsldRho => &mut layer.msld.rho,
            Self::MsldTheta => &mut layer.msld.theta,
            Self::MsldPhi => &mut layer.msld.phi,
            Self::Roughness => &mut layer.roughness,
        }
    }

    /// Whether a written value must be non-negative.
    fn non_negative(self) -> bool {
        matches!(self, Self::Thickness | Self::Roughness)
    }
}

impl fmt::Display for LayerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Thickness => "thickness",
            Self::NsldReal => "nsld_real",
            Self::NsldImag => "nsld_imag",
            Self::MsldRho => "msld_rho",
            Self::MsldTheta => "msld_theta",
            Self::MsldPhi => "msld_phi",
            Self::Roughness => "roughness",
        };
        f.write_str(name)
    }
}

/// Address of one scalar in a [`LayerStack`].
///
/// Deserialised ids pass the stack-independent checks of [`ParameterId::new`];
/// the layer range is checked again against the stack on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawParameterId")]
pub struct ParameterId {
    layer: usize,
    field: LayerField,
}

#[derive(Deserialize)]
struct RawParameterId {
    layer: usize,
    field: LayerField,
}

impl TryFrom<RawParameterId> for ParameterId {
    type Error = ProfileError;

    fn try_from(raw: RawParameterId) -> Result<Self, Self::Error> {
        let id = Self {
            layer: raw.layer,
            field: raw.field,
        };
        id.validate(None)?;
        Ok(id)
    }
}

impl ParameterId {
    /// Validate `(layer, field)` against `stack`.
    ///
    /// Rejects out-of-range layers, the thickness of the two semi-infinite
    /// media, and the roughness of the incoming medium (it has no interface
    /// above it).
    pub fn new(stack: &LayerStack, layer: usize, field: LayerField) -> Result<Self, ProfileError> {
        let id = Self { layer, field };
        id.check(stack)?;
        Ok(id)
    }

    /// Whether this id addresses a variable scalar of `stack`.
    pub fn check(&self, stack: &LayerStack) -> Result<(), ProfileError> {
        self.validate(Some(stack.len()))
    }

    /// `n_layers` is unknown while deserialising.
    fn validate(&self, n_layers: Option<usize>) -> Result<(), ProfileError> {
        let last = n_layers.map(|n| n.saturating_sub(1));
        let reason = if last.is_some_and(|last| self.layer > last) {
            Some(format!(
                "layer index out of range (stack has {} layers)",
                n_layers.unwrap_or_default()
            ))
        } else if self.field == LayerField::Thickness && (self.layer == 0 || Some(self.layer) == last) {
            Some("semi-infinite media have no variable thickness".to_string())
        } else if self.field == LayerField::Roughness && self.layer == 0 {
            Some("the incoming medium has no interface above it".to_string())
        } else {
            None
        };
        match reason {
            Some(message) => Err(ProfileError::InvalidParameter {
                id: self.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn field(&self) -> LayerField {
        self.field
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer[{}].{}", self.layer, self.field)
    }
}

impl LayerStack {
    /// Read the scalar addressed by `id`.
    pub fn value(&self, id: ParameterId) -> Result<f64, ProfileError> {
        id.check(self)?;
        self.layers()
            .get(id.layer)
            .map(|layer| id.field.get(layer))
            .ok_or_else(|| out_of_range(id))
    }

    /// Write the scalar addressed by `id`.
    pub fn set_value(&mut self, id: ParameterId, value: f64) -> Result<(), ProfileError> {
        id.check(self)?;
        if !value.is_finite() || (id.field.non_negative() && value < 0.0) {
            return Err(ProfileError::InvalidParameter {
                id: id.to_string(),
                message: format!("value {value} is not allowed"),
            });
        }
        let layer = self.layer_mut(id.layer).ok_or_else(|| out_of_range(id))?;
        *id.field.slot(layer) = value;
        Ok(())
    }
}

fn out_of_range(id: ParameterId) -> ProfileError {
    ProfileError::InvalidParameter {
        id: id.to_string(),
        message: "layer index out of range".to_string(),
    }
}

/// One fit parameter with its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    pub id: ParameterId,
    pub value: f64,
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default)]
    pub vary: bool,
}

fn default_min() -> f64 {
    f64::NEG_INFINITY
}

fn default_max() -> f64 {
    f64::INFINITY
}

impl FitParameter {
    /// A fixed parameter initialised from the stack.
    pub fn fixed(stack: &LayerStack, id: ParameterId) -> Result<Self, ProfileError> {
        Ok(Self {
            id,
            value: stack.value(id)?,
            min: default_min(),
            max: default_max(),
            vary: false,
        })
    }

    /// Let the optimiser vary this parameter within `[min, max]`.
    pub fn varying(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self.vary = true;
        self
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Ordered collection of fit parameters for one stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    parameters: Vec<FitParameter>,
}

impl ParameterSet {
    /// Every meaningful field of every layer, all fixed at the stack's values.
    pub fn from_stack(stack: &LayerStack) -> Self {
        let parameters = (0..stack.len())
            .flat_map(|layer| LayerField::ALL.iter().map(move |&field| (layer, field)))
            .filter_map(|(layer, field)| ParameterId::new(stack, layer, field).ok())
            .filter_map(|id| FitParameter::fixed(stack, id).ok())
            .collect();
        Self { parameters }
    }

    pub fn parameters(&self) -> &[FitParameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get_mut(&mut self, id: ParameterId) -> Option<&mut FitParameter> {
        self.parameters.iter_mut().find(|p| p.id == id)
    }

    /// Mark `id` as varying within `[min, max]`.
    pub fn vary(&mut self, id: ParameterId, min: f64, max: f64) -> Result<(), ProfileError> {
        let param = self.get_mut(id).ok_or_else(|| ProfileError::InvalidParameter {
            id: id.to_string(),
            message: "not part of this parameter set".to_string(),
        })?;
        if !(min <= param.value && param.value <= max) {
            return Err(ProfileError::InvalidParameter {
                id: id.to_string(),
                message: format!("current value {} lies outside [{min}, {max}]", param.value),
            });
        }
        param.min = min;
        param.max = max;
        param.vary = true;
        Ok(())
    }

    /// Whether every parameter addresses a variable scalar of `stack`.
    pub fn check(&self, stack: &LayerStack) -> Result<(), ProfileError> {
        self.parameters.iter().try_for_each(|p| p.id.check(stack))
    }

    pub fn varying(&self) -> impl Iterator<Item = &FitParameter> {
        self.parameters.iter().filter(|p| p.vary)
    }

    pub fn n_varying(&self) -> usize {
        self.varying().count()
    }

    /// Current values of the varying parameters, in set order.
    pub fn varying_values(&self) -> Vec<f64> {
        self.varying().map(|p| p.value).collect()
    }

    /// `(min, max)` of the varying parameters, in set order.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.varying().map(|p| (p.min, p.max)).collect()
    }

    /// Write every parameter into `stack`, taking the varying ones from
    /// `values`. The stack is left untouched on error.
    pub fn apply(&self, stack: &mut LayerStack, values: &[f64]) -> Result<(), ProfileError> {
        let n = self.n_varying();
        if values.len() != n {
            return Err(ProfileError::InvalidParameter {
                id: "<vector>".to_string(),
                message: format!("expected {n} values, got {}", values.len()),
            });
        }

        self.check(stack)?;
        let mut updated = stack.clone();
        let mut values = values.iter();
        for param in &self.parameters {
            let value = if param.vary {
                // length checked above
                let &v = values.next().unwrap_or(&param.value);
                if !param.contains(v) {
                    return Err(ProfileError::InvalidParameter {
                        id: param.id.to_string(),
                        message: format!("value {v} outside [{}, {}]", param.min, param.max),
                    });
                }
                v
            } else {
                param.value
            };
            updated.set_value(param.id, value)?;
        }
        *stack = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MagneticSld;

    fn stack() -> LayerStack {
        LayerStack::new(vec![
            Layer::semi_infinite(0.0, 0.0),
            Layer::new(100.0, 4.0e-6, -1.0e-8).with_magnetization(MagneticSld::in_plane(1.0e-6, 0.0)),
            Layer::semi_infinite(2.07e-6, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_parameter_id_validation() {
        let s = stack();
        assert!(ParameterId::new(&s, 1, LayerField::Thickness).is_ok());
        assert!(ParameterId::new(&s, 2, LayerField::Roughness).is_ok());
        assert!(ParameterId::new(&s, 0, LayerField::Thickness).is_err());
        assert!(ParameterId::new(&s, 2, LayerField::Thickness).is_err());
        assert!(ParameterId::new(&s, 0, LayerField::Roughness).is_err());
        let err = ParameterId::new(&s, 5, LayerField::NsldReal).unwrap_err();
        assert!(err.to_string().contains("layer[5].nsld_real"));
    }

    #[test]
    fn test_from_stack_skips_meaningless_fields() {
        let set = ParameterSet::from_stack(&stack());
        // incoming: 5 fields, film: 7, substrate: 6
        assert_eq!(set.len(), 18);
        assert_eq!(set.n_varying(), 0);
    }

    #[test]
    fn test_apply_writes_varying_values() {
        let mut s = stack();
        let mut set = ParameterSet::from_stack(&s);
        let thickness = ParameterId::new(&s, 1, LayerField::Thickness).unwrap();
        let rho = ParameterId::new(&s, 1, LayerField::MsldRho).unwrap();
        set.vary(thickness, 50.0, 150.0).unwrap();
        set.vary(rho, 0.0, 3.0e-6).unwrap();
        assert_eq!(set.varying_values(), vec![100.0, 1.0e-6]);

        set.apply(&mut s, &[120.0, 2.0e-6]).unwrap();
        assert_eq!(s.value(thickness).unwrap(), 120.0);
        assert_eq!(s.layers()[1].msld.rho, 2.0e-6);
        assert_eq!(s.layers()[1].nsld_real, 4.0e-6);
    }

    #[test]
    fn test_apply_rejects_bad_vectors() {
        let mut s = stack();
        let mut set = ParameterSet::from_stack(&s);
        let thickness = ParameterId::new(&s, 1, LayerField::Thickness).unwrap();
        set.vary(thickness, 50.0, 150.0).unwrap();

        assert!(set.apply(&mut s, &[]).is_err());
        assert!(set.apply(&mut s, &[200.0]).is_err());
        assert_eq!(s.value(thickness).unwrap(), 100.0);
    }

    #[test]
    fn test_vary_requires_value_within_bounds() {
        let s = stack();
        let mut set = ParameterSet::from_stack(&s);
        let thickness = ParameterId::new(&s, 1, LayerField::Thickness).unwrap();
        assert!(set.vary(thickness, 150.0, 200.0).is_err());
    }

    #[test]
    fn test_set_value_rejects_negative_thickness() {
        let mut s = stack();
        let thickness = ParameterId::new(&s, 1, LayerField::Thickness).unwrap();
        assert!(s.set_value(thickness, -1.0).is_err());
        assert!(s.set_value(thickness, f64::NAN).is_err());
    }

    #[test]
    fn test_deserialised_id_rejects_bounding_media() {
        let bad: Result<ParameterId, _> = serde_json::from_str(r#"{"layer":0,"field":"thickness"}"#);
        assert!(bad.is_err());
        let bad: Result<ParameterId, _> = serde_json::from_str(r#"{"layer":0,"field":"roughness"}"#);
        assert!(bad.is_err());

        let id: ParameterId = serde_json::from_str(r#"{"layer":1,"field":"msld_rho"}"#).unwrap();
        assert_eq!(id, ParameterId::new(&stack(), 1, LayerField::MsldRho).unwrap());
    }

    #[test]
    fn test_deserialised_id_is_checked_against_stack() {
        // substrate thickness is only detectable once the stack is known
        let id: ParameterId = serde_json::from_str(r#"{"layer":2,"field":"thickness"}"#).unwrap();
        let mut s = stack();
        assert!(id.check(&s).is_err());
        assert!(s.set_value(id, 50.0).is_err());
        assert!(s.layers()[2].thickness.is_infinite());

        let far: ParameterId = serde_json::from_str(r#"{"layer":7,"field":"nsld_real"}"#).unwrap();
        assert!(s.value(far).is_err());
        assert!(s.set_value(far, 1.0e-6).is_err());
    }

    #[test]
    fn test_set_from_larger_stack_is_rejected() {
        let mut four = stack();
        let mut layers: Vec<Layer> = four.clone().into();
        layers.insert(1, Layer::new(30.0, 1.0e-6, 0.0));
        four = LayerStack::new(layers).unwrap();
        let set = ParameterSet::from_stack(&four);

        let mut three = stack();
        assert!(set.check(&three).is_err());
        assert!(matches!(
            set.apply(&mut three, &[]),
            Err(ProfileError::InvalidParameter { .. })
        ));
        assert_eq!(three, stack());
    }
}
