use flatprop::config::{RpropParams, TrainingConfig};
use flatprop::data::BasicTrainingSet;
use flatprop::feedforward::{Activation, Layer, Net};
use flatprop::train::{ResilientPropagation, Rprop, Train, TrainingContinuation, UpdateRule};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn step_sizes_stay_in_bounds() {
    init_logger();
    let mut config = TrainingConfig::default();
    config.rprop = RpropParams {
        initial_update: 0.05,
        max_step: 0.2,
        delta_min: 1e-3,
    };

    let samples = (0..40)
        .map(|i| {
            let x = i as f64 / 20.0 - 1.0;
            (vec![x], vec![(2.0 * x).sin()])
        })
        .collect();
    let set = BasicTrainingSet::from_pairs(samples, 1, 1).unwrap();
    let net = Net::with_seed(
        &[
            Layer::input(1),
            Layer::new(6, Activation::Tanh, true),
            Layer::new(1, Activation::Linear, true),
        ],
        8,
    )
    .unwrap();

    let mut trainer = ResilientPropagation::new(net, set, &config).unwrap();
    for _ in 0..300 {
        trainer.iteration().unwrap();
        assert!(trainer
            .rule()
            .update_values()
            .iter()
            .all(|v| (1e-3..=0.2).contains(v)));
    }
}

#[test]
fn alternating_gradient_never_grows_step_and_skips_flipped_moves() {
    let params = RpropParams {
        initial_update: 0.1,
        max_step: 50.0,
        delta_min: 0.01,
    };
    let mut rule = Rprop::new(params, 1e-17, 1);
    let mut weights = [0.0];

    rule.update(&[1.0], &mut weights);
    let mut step = rule.update_values()[0];

    for epoch in 1..20 {
        let gradient = if epoch % 2 == 0 { 1.0 } else { -1.0 };
        let before = weights[0];
        let flipped = rule.last_gradients()[0] * gradient < 0.0;
        rule.update(&[gradient], &mut weights);

        let now = rule.update_values()[0];
        if flipped {
            assert_eq!(weights[0], before);
            assert_eq!(now, (step * 0.5).max(params.delta_min));
        } else {
            assert_eq!(now, step);
        }
        assert!(now <= step);
        step = now;
    }
    assert_eq!(step, params.delta_min);
}

#[test]
fn continuation_survives_json() {
    let mut rule = Rprop::new(RpropParams::default(), 1e-17, 3);
    let mut weights = [0.0; 3];
    rule.update(&[1.0, -2.0, 0.0], &mut weights);
    rule.update(&[1.0, 2.0, 3.0], &mut weights);

    let json = serde_json::to_string(&rule.pause()).unwrap();
    let state: TrainingContinuation = serde_json::from_str(&json).unwrap();

    let mut restored = Rprop::new(RpropParams::default(), 1e-17, 3);
    restored.resume(state).unwrap();
    assert_eq!(restored.update_values(), rule.update_values());
    assert_eq!(restored.last_gradients(), rule.last_gradients());
}
