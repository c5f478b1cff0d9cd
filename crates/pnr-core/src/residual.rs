//! Weighted residuals for external least-squares optimisers.
//!
//! For every measured point
//!
//! $$\chi_i = \frac{(R_{\text{calc}}\,f_{\text{theory}} + b)/f_{\text{exp}} - R_i}{E_i}$$
//!
//! Points whose calculated value is invalid or non-finite receive a fixed
//! penalty instead, so an optimiser never sees NaN.

use ndarray::{concatenate, Array1, ArrayView1, Axis};
use pnr_compute::ComputeBackend;
use pnr_profile::{LayerStack, ParameterSet};
use pnr_resolution::ResolutionModel;
use serde::{Deserialize, Serialize};

use crate::calculator::{CalculationError, ReflectivityCalculator};
use crate::config::EngineConfig;
use crate::types::{Measurement, ReflectivityCurve};

/// Scale factors applied between the calculated and measured curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residual {
    #[serde(default = "unity")]
    pub theory_factor: f64,
    #[serde(default = "unity")]
    pub experiment_factor: f64,
    #[serde(default)]
    pub background: f64,
    #[serde(default = "default_penalty")]
    pub invalid_penalty: f64,
}

fn unity() -> f64 {
    1.0
}

fn default_penalty() -> f64 {
    EngineConfig::default().invalid_penalty
}

impl Default for Residual {
    fn default() -> Self {
        Self {
            theory_factor: 1.0,
            experiment_factor: 1.0,
            background: 0.0,
            invalid_penalty: default_penalty(),
        }
    }
}

impl Residual {
    /// Unit factors, no background, and the penalty from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            invalid_penalty: config.invalid_penalty,
            ..Self::default()
        }
    }

    /// Calculated curve as it would be measured.
    pub fn scaled(&self, calculated: f64) -> f64 {
        (calculated * self.theory_factor + self.background) / self.experiment_factor
    }

    /// Residual vector of `curve` against `measurement`.
    pub fn evaluate(&self, curve: &ReflectivityCurve, measurement: &Measurement) -> Result<Array1<f64>, CalculationError> {
        if let Some(problem) = measurement.problem() {
            return Err(CalculationError::InvalidInput(problem));
        }
        if curve.len() != measurement.r.len() {
            return Err(CalculationError::InvalidInput(format!(
                "curve has {} points, measurement '{}' has {}",
                curve.len(),
                measurement.channel.name,
                measurement.r.len()
            )));
        }
        let chi = curve
            .values
            .iter()
            .zip(&curve.valid)
            .zip(measurement.r.iter().zip(&measurement.e))
            .map(|((&calc, &ok), (&r, &e))| {
                let chi = (self.scaled(calc) - r) / e;
                if ok && chi.is_finite() {
                    chi
                } else {
                    self.invalid_penalty
                }
            })
            .collect();
        Ok(chi)
    }
}

/// Binds a stack, its fit parameters, and measurements into a function of
/// the optimiser's parameter vector.
pub struct ModelResidual<B: ComputeBackend> {
    calculator: ReflectivityCalculator<B>,
    stack: LayerStack,
    parameters: ParameterSet,
    measurements: Vec<Measurement>,
    residual: Residual,
}

impl<B: ComputeBackend> ModelResidual<B> {
    /// # Arguments
    /// * `calculator` - Engine used for every evaluation.
    /// * `stack` - Starting model; fixed parameters are taken from here.
    /// * `parameters` - Which fields vary and their bounds; every id must
    ///   address `stack`.
    /// * `measurements` - Data sets; their Q grids must be non-decreasing.
    /// * `resolution` - Fills σ(Q) for measurements that carry none.
    pub fn new(
        calculator: ReflectivityCalculator<B>,
        stack: LayerStack,
        parameters: ParameterSet,
        mut measurements: Vec<Measurement>,
        resolution: &dyn ResolutionModel,
    ) -> Result<Self, CalculationError> {
        parameters.check(&stack)?;
        for m in &mut measurements {
            if let Some(problem) = m.problem() {
                return Err(CalculationError::InvalidInput(problem));
            }
            if m.channel.sigma.is_none() {
                m.channel.sigma = Some(resolution.sigma(&m.channel.q)?);
                log::debug!("'{}': resolution from {}", m.channel.name, resolution.name());
            }
        }
        let residual = Residual::from_config(calculator.config());
        Ok(Self {
            calculator,
            stack,
            parameters,
            measurements,
            residual,
        })
    }

    pub fn with_residual(mut self, residual: Residual) -> Self {
        self.residual = residual;
        self
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Total number of residual entries.
    pub fn len(&self) -> usize {
        self.measurements.iter().map(|m| m.r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The model with `values` written into the varying parameters.
    pub fn stack_for(&self, values: &[f64]) -> Result<LayerStack, CalculationError> {
        let mut stack = self.stack.clone();
        self.parameters.apply(&mut stack, values)?;
        Ok(stack)
    }

    /// Calculated curves for `values`, one per measurement.
    pub fn curves(&self, values: &[f64]) -> Result<Vec<ReflectivityCurve>, CalculationError> {
        let stack = self.stack_for(values)?;
        self.measurements
            .iter()
            .map(|m| self.calculator.calculate(&stack, &m.channel))
            .collect()
    }

    /// Concatenated residuals of all measurements.
    pub fn evaluate(&self, values: &[f64]) -> Result<Array1<f64>, CalculationError> {
        let curves = self.curves(values)?;
        let parts = curves
            .iter()
            .zip(&self.measurements)
            .map(|(curve, m)| self.residual.evaluate(curve, m))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() {
            return Ok(Array1::zeros(0));
        }
        let views: Vec<ArrayView1<f64>> = parts.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| CalculationError::InvalidInput(e.to_string()))
    }

    /// Mean squared residual, the figure of merit reported during fits.
    pub fn chi_squared(&self, values: &[f64]) -> Result<f64, CalculationError> {
        let chi = self.evaluate(values)?;
        Ok(chi.mapv(|c| c * c).mean().unwrap_or(0.0))
    }

    /// Evaluate several candidate vectors concurrently on the backend.
    pub fn evaluate_many(&self, candidates: &[Vec<f64>]) -> Result<Vec<Result<Array1<f64>, CalculationError>>, CalculationError> {
        Ok(self
            .calculator
            .backend()
            .map_indexed(candidates.len(), |i| self.evaluate(&candidates[i]))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pnr_compute::SerialBackend;
    use pnr_profile::{Layer, LayerField, MagneticSld, ParameterId};
    use pnr_resolution::CustomResolution;

    use crate::polarization::SpinChannel;
    use crate::types::Channel;

    fn stack(thickness: f64) -> LayerStack {
        LayerStack::new(vec![
            Layer::semi_infinite(0.0, 0.0),
            Layer::new(thickness, 5.0e-6, 0.0).with_magnetization(MagneticSld::in_plane(1.0e-6, 0.0)),
            Layer::semi_infinite(2.07e-6, 0.0),
        ])
        .unwrap()
    }

    fn q_grid() -> Vec<f64> {
        (1..=40).map(|i| 0.004 * i as f64).collect()
    }

    fn synthetic(calc: &ReflectivityCalculator<SerialBackend>, truth: &LayerStack) -> Vec<Measurement> {
        [SpinChannel::UpUp, SpinChannel::DownDown]
            .iter()
            .map(|&c| {
                let channel = Channel::spin(q_grid(), c, [1.0, 0.0, 0.0]).with_sigma(vec![0.0; 40]);
                let curve = calc.calculate(truth, &channel).unwrap();
                let e = curve.values.iter().map(|r| 0.05 * r).collect();
                Measurement::new(channel, curve.values.to_vec(), e)
            })
            .collect()
    }

    fn model(start: f64) -> ModelResidual<SerialBackend> {
        let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
        let data = synthetic(&calc, &stack(200.0));
        let start = stack(start);
        let mut params = ParameterSet::from_stack(&start);
        let id = ParameterId::new(&start, 1, LayerField::Thickness).unwrap();
        params.vary(id, 100.0, 300.0).unwrap();
        let exact = CustomResolution::relative(0.0);
        ModelResidual::new(calc, start, params, data, &exact).unwrap()
    }

    #[test]
    fn test_residual_vanishes_at_truth() {
        let model = model(180.0);
        assert_eq!(model.len(), 80);
        let chi = model.evaluate(&[200.0]).unwrap();
        assert_eq!(chi.len(), 80);
        for c in chi.iter() {
            assert_abs_diff_eq!(*c, 0.0, epsilon = 1e-8);
        }
        assert!(model.chi_squared(&[180.0]).unwrap() > 1.0);
    }

    #[test]
    fn test_evaluate_many_matches_evaluate() {
        let model = model(180.0);
        let candidates = vec![vec![150.0], vec![200.0], vec![250.0]];
        let batch = model.evaluate_many(&candidates).unwrap();
        for (candidate, result) in candidates.iter().zip(batch) {
            assert_eq!(result.unwrap(), model.evaluate(candidate).unwrap());
        }
    }

    #[test]
    fn test_out_of_bounds_vector_is_rejected() {
        let model = model(180.0);
        assert!(matches!(model.evaluate(&[400.0]), Err(CalculationError::Profile(_))));
        assert!(matches!(model.evaluate(&[]), Err(CalculationError::Profile(_))));
    }

    #[test]
    fn test_invalid_points_get_penalty() {
        let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
        let mut layers: Vec<Layer> = stack(200.0).into();
        layers.insert(1, Layer::new(30.0, 0.0, 0.0));
        let gapped = LayerStack::new(layers).unwrap();
        // Q = 0 with vacuum on both sides of the top interface
        let channel = Channel::unpolarized(vec![0.0, 0.02]);
        let curve = calc.calculate(&gapped, &channel).unwrap();
        assert_eq!(curve.valid, vec![false, true]);

        let measurement = Measurement::new(channel, vec![1.0, curve.values[1]], vec![0.1, 0.1]);
        let chi = Residual::default().evaluate(&curve, &measurement).unwrap();
        assert_eq!(chi[0], 1.0e4);
        assert_abs_diff_eq!(chi[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_factors_and_background() {
        let residual = Residual {
            theory_factor: 2.0,
            experiment_factor: 4.0,
            background: 1.0e-6,
            ..Residual::default()
        };
        assert_abs_diff_eq!(residual.scaled(0.5), (1.0 + 1.0e-6) / 4.0, epsilon = 1e-15);
    }

    #[test]
    fn test_missing_sigma_is_filled_from_model() {
        let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
        let s = stack(200.0);
        let data = vec![Measurement::new(
            Channel::unpolarized(vec![0.01, 0.02]),
            vec![0.9, 0.01],
            vec![0.1, 0.001],
        )];
        let model = ModelResidual::new(calc, s.clone(), ParameterSet::from_stack(&s), data, &CustomResolution::relative(0.05))
            .unwrap();
        let sigma = model.measurements()[0].channel.sigma.clone().unwrap();
        assert_abs_diff_eq!(sigma[1], 0.001, epsilon = 1e-15);
    }

    #[test]
    fn test_parameters_must_match_stack() {
        let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
        let mut layers: Vec<Layer> = stack(200.0).into();
        layers.insert(1, Layer::new(30.0, 1.0e-6, 0.0));
        let four = LayerStack::new(layers).unwrap();
        let data = synthetic(&calc, &stack(200.0));
        let result = ModelResidual::new(
            calc,
            stack(200.0),
            ParameterSet::from_stack(&four),
            data,
            &CustomResolution::relative(0.0),
        );
        assert!(matches!(result, Err(CalculationError::Profile(_))));
    }
}
