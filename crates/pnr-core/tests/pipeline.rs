//! Integration test: stack → sublayers → amplitudes → channels → smearing →
//! residuals, on both compute backends.

use approx::assert_abs_diff_eq;
use pnr_compute::{CpuBackend, SerialBackend};
use pnr_core::{
    CalculationError, Channel, EngineConfig, Measurement, ModelResidual, ReflectivityCalculator, SpinChannel,
};
use pnr_profile::{Layer, LayerField, LayerStack, MagneticSld, ParameterId, ParameterSet, RoughnessModel};
use pnr_resolution::{ResolutionError, ResolutionMode, ResolutionModel, TimeOfFlight};

fn multilayer() -> LayerStack {
    LayerStack::new(vec![
        Layer::semi_infinite(0.0, 0.0),
        Layer::new(60.0, 3.5e-6, -2.0e-9)
            .with_magnetization(MagneticSld::in_plane(0.8e-6, 15.0))
            .with_roughness(3.0, RoughnessModel::Erfc, 8),
        Layer::new(180.0, 6.2e-6, 0.0)
            .with_magnetization(MagneticSld::new(1.4e-6, 70.0, 100.0))
            .with_roughness(5.0, RoughnessModel::Tanh, 10),
        Layer::semi_infinite(2.07e-6, 0.0).with_roughness(4.0, RoughnessModel::Erfc, 6),
    ])
    .unwrap()
}

fn q_grid() -> Vec<f64> {
    (0..150).map(|i| 0.003 + 0.001 * i as f64).collect()
}

#[test]
fn test_backends_agree() {
    let stack = multilayer();
    let sigma = TimeOfFlight::default().sigma(&q_grid()).unwrap();
    let serial = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
    let parallel = ReflectivityCalculator::new(CpuBackend::with_threads(3).unwrap(), EngineConfig::default());
    for spin in SpinChannel::ALL {
        let channel = Channel::spin(q_grid(), spin, [1.0, 0.0, 0.0]).with_sigma(sigma.clone());
        let a = serial.calculate(&stack, &channel).unwrap();
        let b = parallel.calculate(&stack, &channel).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_resolution_smooths_fringes() {
    let stack = multilayer();
    let q = q_grid();
    let sigma: Vec<f64> = q.iter().map(|q| 0.05 * q).collect();
    let calc = ReflectivityCalculator::default();
    let sharp = calc.calculate(&stack, &Channel::unpolarized(q.clone())).unwrap();
    let smeared = calc
        .calculate(&stack, &Channel::unpolarized(q.clone()).with_sigma(sigma))
        .unwrap();
    assert_eq!(smeared.n_invalid(), 0);

    // total variation of log R drops once fringes are averaged
    let variation = |values: &[f64]| -> f64 { values.windows(2).map(|w| (w[1].ln() - w[0].ln()).abs()).sum() };
    let high_q = 60..150;
    let v_sharp = variation(&sharp.values.to_vec()[high_q.clone()]);
    let v_smeared = variation(&smeared.values.to_vec()[high_q]);
    assert!(v_smeared < v_sharp, "{v_smeared} >= {v_sharp}");
}

#[test]
fn test_resolution_modes_agree_on_smooth_curve() {
    let stack = multilayer();
    let q = q_grid();
    let sigma: Vec<f64> = q.iter().map(|q| 0.01 * q).collect();
    let reference = ReflectivityCalculator::new(SerialBackend, EngineConfig::default())
        .calculate(&stack, &Channel::unpolarized(q.clone()).with_sigma(sigma.clone()))
        .unwrap();
    for mode in [ResolutionMode::Grid, ResolutionMode::Stencil] {
        let config = EngineConfig {
            resolution_mode: mode,
            ..EngineConfig::default()
        };
        let curve = ReflectivityCalculator::new(SerialBackend, config)
            .calculate(&stack, &Channel::unpolarized(q.clone()).with_sigma(sigma.clone()))
            .unwrap();
        for (a, b) in curve.values.iter().zip(reference.values.iter()).skip(20) {
            assert!((a / b - 1.0).abs() < 0.1, "{mode:?}: {a} vs {b}");
        }
    }
}

#[test]
fn test_bad_sigma_fails_eagerly() {
    let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
    let mut sigma = vec![1e-4; 150];
    sigma[42] = f64::NAN;
    let channel = Channel::unpolarized(q_grid()).with_sigma(sigma);
    match calc.calculate(&multilayer(), &channel) {
        Err(CalculationError::Resolution(ResolutionError::InvalidResolution { index, .. })) => assert_eq!(index, 42),
        other => panic!("expected invalid resolution, got {other:?}"),
    }
}

#[test]
fn test_unsorted_q_is_rejected() {
    let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
    let channel = Channel::unpolarized(vec![0.01, 0.03, 0.02]);
    assert!(matches!(
        calc.calculate(&multilayer(), &channel),
        Err(CalculationError::Resolution(ResolutionError::UnsortedQ { .. }))
    ));
}

#[test]
fn test_singular_point_is_penalised_not_fatal() {
    // at Q = 0 both sides of the air/gap interface have zero wavevector
    let stack = LayerStack::new(vec![
        Layer::semi_infinite(0.0, 0.0),
        Layer::new(30.0, 0.0, 0.0).named("gap"),
        Layer::new(100.0, 4.0e-6, 0.0).with_magnetization(MagneticSld::in_plane(1.0e-6, 0.0)),
        Layer::semi_infinite(2.07e-6, 0.0),
    ])
    .unwrap();
    let calc = ReflectivityCalculator::new(SerialBackend, EngineConfig::default());
    let channel = Channel::unpolarized(vec![0.0, 0.01, 0.02]).with_sigma(vec![0.0; 3]);
    let curve = calc.calculate(&stack, &channel).unwrap();
    assert_eq!(curve.valid, vec![false, true, true]);
    assert_eq!(curve.valid_points().count(), 2);

    let data = vec![Measurement::new(
        channel,
        vec![1.0, curve.values[1], curve.values[2]],
        vec![0.1, 0.01, 0.001],
    )];
    let params = ParameterSet::from_stack(&stack);
    let model = ModelResidual::new(calc, stack, params, data, &TimeOfFlight::default()).unwrap();
    let chi = model.evaluate(&[]).unwrap();
    assert_eq!(chi[0], EngineConfig::default().invalid_penalty);
    assert_abs_diff_eq!(chi[1], 0.0, epsilon = 1e-12);
}

#[test]
fn test_parallel_candidate_evaluation() {
    let truth = multilayer();
    let calc = ReflectivityCalculator::new(CpuBackend::with_threads(2).unwrap(), EngineConfig::default());
    let sigma = TimeOfFlight::default().sigma(&q_grid()).unwrap();
    let data: Vec<Measurement> = [SpinChannel::UpUp, SpinChannel::DownDown]
        .iter()
        .map(|&spin| {
            let channel = Channel::spin(q_grid(), spin, [1.0, 0.0, 0.0]).with_sigma(sigma.clone());
            let curve = calc.calculate(&truth, &channel).unwrap();
            let e = curve.values.iter().map(|r| 0.1 * r).collect();
            Measurement::new(channel, curve.values.to_vec(), e)
        })
        .collect();

    let mut params = ParameterSet::from_stack(&truth);
    params
        .vary(ParameterId::new(&truth, 2, LayerField::Thickness).unwrap(), 150.0, 210.0)
        .unwrap();
    params
        .vary(ParameterId::new(&truth, 2, LayerField::MsldRho).unwrap(), 0.0, 3.0e-6)
        .unwrap();
    assert_eq!(params.varying_values(), vec![180.0, 1.4e-6]);

    let model = ModelResidual::new(calc, truth, params, data, &TimeOfFlight::default()).unwrap();
    let candidates = vec![vec![170.0, 1.4e-6], vec![180.0, 1.4e-6], vec![180.0, 1.0e-6]];
    let chi2: Vec<f64> = model
        .evaluate_many(&candidates)
        .unwrap()
        .into_iter()
        .map(|chi| {
            let chi = chi.unwrap();
            chi.iter().map(|c| c * c).sum::<f64>() / chi.len() as f64
        })
        .collect();
    assert!(chi2[1] < 1e-16);
    assert!(chi2[0] > 1e-2);
    assert!(chi2[2] > 1e-2);
    assert_abs_diff_eq!(chi2[0], model.chi_squared(&candidates[0]).unwrap(), epsilon = 1e-12);
}
