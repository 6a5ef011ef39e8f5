use flatprop::config::{ErrorMode, TrainingConfig};
use flatprop::data::{BasicTrainingSet, SequentialTrainingSet};
use flatprop::feedforward::{Activation, Layer, Net};
use flatprop::train::{ConfigError, MultiPropagation, ResilientPropagation, Train, TrainError};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn layers() -> Vec<Layer> {
    vec![
        Layer::input(3),
        Layer::new(5, Activation::Tanh, true),
        Layer::new(3, Activation::Sigmoid, false),
        Layer::new(2, Activation::Linear, true),
    ]
}

fn pairs(len: usize) -> Vec<(Vec<f64>, Vec<f64>)> {
    (0..len)
        .map(|i| {
            let t = i as f64 / len as f64;
            let input = vec![t, (7.0 * t).sin(), (3.0 * t).cos()];
            let ideal = vec![t * t, 1.0 - t];
            (input, ideal)
        })
        .collect()
}

fn samples(len: usize) -> BasicTrainingSet {
    BasicTrainingSet::from_pairs(pairs(len), 3, 2).unwrap()
}

#[test]
fn small_sets_fall_back_to_single_thread() {
    init_logger();
    let mut config = TrainingConfig::default();
    config.multi.threads = 8;

    let net = Net::with_seed(&layers(), 1).unwrap();
    let mut multi = MultiPropagation::new(net.clone(), samples(50), &config).unwrap();
    let mut single = ResilientPropagation::new(net, samples(50), &config).unwrap();
    assert!(multi.is_fallback());
    assert_eq!(multi.thread_count(), 1);

    for _ in 0..3 {
        multi.iteration().unwrap();
        single.iteration().unwrap();
    }
    assert!(multi.gradient_map().is_none());
    assert_eq!(multi.error(), single.error());
    assert_eq!(multi.net().weights(), single.net().weights());
}

#[test]
fn merged_gradients_equal_single_threaded_ones() {
    init_logger();
    let mut config = TrainingConfig::default();
    config.multi.threads = 2;
    config.multi.min_per_thread = 1000;

    let net = Net::with_seed(&layers(), 2).unwrap();
    let mut multi = MultiPropagation::new(net.clone(), samples(2500), &config).unwrap();
    let mut single = ResilientPropagation::new(net, samples(2500), &config).unwrap();
    assert!(!multi.is_fallback());
    assert_eq!(multi.partitions(), [0..1250, 1250..2500]);

    for _ in 0..3 {
        multi.iteration().unwrap();
        single.iteration().unwrap();

        for (m, s) in multi.gradients().iter().zip(single.gradients().iter()) {
            assert!(
                (m - s).abs() <= 1e-9 * s.abs().max(1.0),
                "merged {} vs single {}",
                m,
                s
            );
        }
    }
    assert!(multi.error().is_finite() && multi.error() > 0.0);
}

#[test]
fn error_is_the_mean_of_partition_errors() {
    init_logger();
    for mode in [ErrorMode::Mse, ErrorMode::Rms] {
        let mut config = TrainingConfig::default();
        config.error_mode = mode;
        config.multi.threads = 2;
        config.multi.min_per_thread = 1000;

        let net = Net::with_seed(&layers(), 6).unwrap();
        let mut multi = MultiPropagation::new(net.clone(), samples(2500), &config).unwrap();
        assert_eq!(multi.partitions(), [0..1250, 1250..2500]);

        let mut all = pairs(2500);
        let second = all.split_off(1250);
        let halves = [all, second].map(|half| {
            let set = BasicTrainingSet::from_pairs(half, 3, 2).unwrap();
            let mut trainer = ResilientPropagation::new(net.clone(), set, &config).unwrap();
            trainer.iteration().unwrap();
            trainer.error()
        });

        multi.iteration().unwrap();
        let mean = (halves[0] + halves[1]) / 2.0;
        assert!(
            (multi.error() - mean).abs() < 1e-12,
            "{:?}: {} vs mean {}",
            mode,
            multi.error(),
            mean
        );
    }
}

#[test]
fn training_reduces_error() {
    init_logger();
    let mut config = TrainingConfig::default();
    config.multi.threads = 4;
    config.multi.min_per_thread = 100;

    let net = Net::with_seed(&layers(), 3).unwrap();
    let mut multi = MultiPropagation::new(net, samples(800), &config).unwrap();
    assert_eq!(multi.thread_count(), 4);

    multi.iteration().unwrap();
    let first = multi.error();
    for _ in 0..100 {
        multi.iteration().unwrap();
    }
    assert!(multi.error() < first);
}

#[test]
fn sequential_sets_are_refused() {
    init_logger();
    let net = Net::with_seed(&layers(), 4).unwrap();
    let result = MultiPropagation::new(
        net,
        SequentialTrainingSet(samples(10)),
        &TrainingConfig::default(),
    );
    assert!(matches!(
        result,
        Err(TrainError::Config(ConfigError::NotIndexable))
    ));
}

#[test]
fn master_state_moves_to_a_single_threaded_trainer() {
    init_logger();
    let mut config = TrainingConfig::default();
    config.multi.threads = 2;
    config.multi.min_per_thread = 100;

    let net = Net::with_seed(&layers(), 5).unwrap();
    let mut multi = MultiPropagation::new(net, samples(400), &config).unwrap();
    for _ in 0..5 {
        multi.iteration().unwrap();
    }

    let state = multi.pause().unwrap();
    let net = multi.teardown();
    let mut single = ResilientPropagation::new(net, samples(400), &config).unwrap();
    single.resume(state.clone()).unwrap();
    assert_eq!(single.pause().unwrap(), state);
}
