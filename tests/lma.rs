use flatprop::config::TrainingConfig;
use flatprop::data::BasicTrainingSet;
use flatprop::feedforward::{Activation, Layer, Net, SizeMismatch};
use flatprop::train::{ConfigError, LevenbergMarquardt, Train, TrainError};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Samples of `z = 0.5x - 1.5y + 0.25` on a grid.
fn plane() -> BasicTrainingSet {
    let mut samples = Vec::new();
    for i in 0..6 {
        for j in 0..6 {
            let (x, y) = (i as f64 / 5.0, j as f64 / 5.0 - 0.5);
            samples.push((vec![x, y], vec![0.5 * x - 1.5 * y + 0.25]));
        }
    }
    BasicTrainingSet::from_pairs(samples, 2, 1).unwrap()
}

#[test]
fn sse_never_increases_on_a_quadratic_bowl() {
    init_logger();
    for start in [[10.0, -10.0, 3.0], [0.0, 0.0, 0.0], [-1e3, 2e2, 5e2]] {
        let net = Net::new(
            &[Layer::input(2), Layer::new(1, Activation::Linear, true)],
            Some(Box::new(start)),
        )
        .unwrap();
        let mut lma = LevenbergMarquardt::new(net, plane(), &TrainingConfig::default()).unwrap();

        let mut last = f64::INFINITY;
        for _ in 0..10 {
            lma.iteration().unwrap();
            let sse = lma.sum_squared_errors();
            assert!(sse <= last + 1e-12, "{} after {}", sse, last);
            last = sse;
        }
        assert!(last < 1e-12, "final sse {}", last);

        let weights = lma.teardown().to_array();
        assert!((weights[0] - 0.5).abs() < 1e-6);
        assert!((weights[1] + 1.5).abs() < 1e-6);
        assert!((weights[2] - 0.25).abs() < 1e-6);
    }
}

#[test]
fn fits_a_curve_with_hidden_layer() {
    init_logger();
    let samples = (0..30)
        .map(|i| {
            let x = i as f64 / 15.0 - 1.0;
            (vec![x], vec![x * x])
        })
        .collect();
    let set = BasicTrainingSet::from_pairs(samples, 1, 1).unwrap();
    let net = Net::with_seed(
        &[
            Layer::input(1),
            Layer::new(4, Activation::Tanh, true),
            Layer::new(1, Activation::Linear, true),
        ],
        3,
    )
    .unwrap();

    let mut lma = LevenbergMarquardt::new(net, set, &TrainingConfig::default()).unwrap();
    lma.iteration().unwrap();
    let first = lma.error();
    lma.train_until(1e-4, 200).unwrap();
    assert!(lma.error() < first);
}

#[test]
fn two_outputs_are_refused_before_training() {
    init_logger();
    let net = Net::new(
        &[Layer::input(2), Layer::new(2, Activation::Sigmoid, true)],
        None,
    )
    .unwrap();
    let set = BasicTrainingSet::new(2, 2, vec![0.0, 1.0], vec![1.0, 0.0]).unwrap();

    let err = LevenbergMarquardt::new(net, set, &TrainingConfig::default()).err();
    assert_eq!(
        err,
        Some(TrainError::Config(ConfigError::OutputCount(SizeMismatch {
            expected: 1,
            got: 2
        })))
    );
}
