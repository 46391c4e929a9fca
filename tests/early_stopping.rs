use backprop_nn::math::seeded_rng;
use backprop_nn::network::WeightsSnapshot;
use backprop_nn::train::{EarlyStopping, EarlyStoppingDecision};
use backprop_nn::{
    ActivationFunction, Dense, LossType, Matrix, Model, Sgd, TrainConfig, TrainHooks, TrainingState,
};

fn small_model() -> Model {
    let mut model = Model::with_seed(2, LossType::Square, 21);
    model
        .add_layer(Dense::new(3, Some(ActivationFunction::Sigmoid)))
        .unwrap()
        .add_layer(Dense::new(1, None))
        .unwrap();
    model
}

#[test]
fn scripted_validation_losses_restore_epoch_two() {
    let mut model = small_model();
    let x = Matrix::rand_with(6, 2, &mut seeded_rng(1));
    let y = Matrix::ones(6, 1);
    let optimizer = Sgd::new(0.5);

    let mut early: EarlyStopping<WeightsSnapshot> = EarlyStopping::new(2, 0.0);
    let mut epoch_two = None;
    let mut stopped_at = None;

    for (epoch, val_loss) in [1.0, 0.9, 0.95, 0.97, 0.99].into_iter().enumerate() {
        let trace = model.compute_layers(&x, &y).unwrap();
        model.backward(&trace, &optimizer, 0.0).unwrap();
        if epoch + 1 == 2 {
            epoch_two = Some(model.weights_snapshot());
        }

        if early.observe(val_loss, || model.weights_snapshot()) == EarlyStoppingDecision::Stop {
            stopped_at = Some(epoch + 1);
            model.restore_weights(early.take_best_snapshot().unwrap()).unwrap();
            break;
        }
    }

    assert_eq!(stopped_at, Some(4));
    assert_eq!(early.best_epoch(), Some(2));
    assert_eq!(early.best_loss(), 0.9);
    assert_eq!(Some(model.weights_snapshot()), epoch_two);
}

/// Fits y = x while validating against y = −x, so every epoch's validation
/// loss is worse than the one before.
#[test]
fn train_restores_best_weights_when_validation_degrades() {
    let xs = [-1.0, -0.5, 0.5, 1.0];
    let x = Matrix::column_from(&xs);
    let y = x.clone();
    let vy = Matrix::column_from(&xs.map(|v: f64| -v));

    let build = || {
        let mut model = Model::with_seed(1, LossType::Square, 5);
        let mut dense = Dense::new(1, None);
        dense.set_weights(Matrix::zeros(2, 1)).unwrap();
        model.add_layer(dense).unwrap();
        model
    };
    let config = TrainConfig {
        learning_rate: 0.1,
        batch_size: 4,
        max_epochs: 50,
        early_stopping_patience: 2,
        ..TrainConfig::default()
    };

    let mut model = build();
    let report = model
        .train(&x, &y, Some((&x, &vy)), &config, TrainHooks::default())
        .unwrap();

    assert_eq!(report.outcome, TrainingState::EarlyStopped { epoch: 3, best_epoch: Some(1) });
    assert_eq!(report.epochs_run, 3);
    let losses: Vec<f64> = report.history.iter().filter_map(|s| s.validation_loss).collect();
    assert!(losses.windows(2).all(|w| w[1] > w[0]), "{losses:?}");
    assert_eq!(report.best_validation_loss, Some(losses[0]));

    let mut one_epoch = build();
    one_epoch
        .fit(&x, &y, &TrainConfig { max_epochs: 1, ..config.clone() })
        .unwrap();
    assert_eq!(model.weights_snapshot(), one_epoch.weights_snapshot());
}

#[test]
fn zero_patience_never_stops() {
    let x = Matrix::rand_with(8, 2, &mut seeded_rng(3));
    let y = Matrix::zeros(8, 1);
    let vy = Matrix::filled(8, 1, 100.0);
    let mut model = small_model();
    let config = TrainConfig { batch_size: 4, max_epochs: 6, ..TrainConfig::default() };

    let report = model
        .train(&x, &y, Some((&x, &vy)), &config, TrainHooks::default())
        .unwrap();
    assert_eq!(report.outcome, TrainingState::MaxEpochsReached);
    assert_eq!(report.epochs_run, 6);
    assert!(report.history.iter().all(|s| s.validation_loss.is_some()));
}
