use backprop_nn::train::{History, Metric};
use backprop_nn::{ActivationFunction, Dense, LossType, Matrix, Model, TrainConfig};

fn main() -> backprop_nn::Result<()> {
    env_logger::init();

    let mut model = Model::with_seed(2, LossType::Square, 7);
    model
        .add_layer(Dense::new(4, Some(ActivationFunction::Tanh)))?
        .add_layer(Dense::new(1, Some(ActivationFunction::Sigmoid)))?;

    let inputs = Matrix::from_rows(vec![
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
        vec![0.0, 0.0],
    ])?;
    let expected_outputs = Matrix::column_from(&[1.0, 0.0, 1.0, 0.0]);

    let config = TrainConfig {
        learning_rate: 0.5,
        batch_size: 4,
        max_epochs: 5000,
        momentum: 0.9,
        metrics: vec![Metric::Loss, Metric::Accuracy],
        target_loss: Some(1e-3),
        ..TrainConfig::default()
    };

    let mut history = History::default();
    let report = model.fit_observed(&inputs, &expected_outputs, &config, &mut history)?;

    for stats in history.epochs.iter().step_by(500) {
        println!("Epoch {}: loss = {:.6}", stats.epoch, stats.loss);
    }
    println!("{:?} after {} epochs", report.outcome, report.epochs_run);

    let outputs = model.predict(&inputs)?;
    for (input, output) in inputs.iter_rows().zip(outputs.iter_rows()) {
        println!("Input: {:?} -> Output: {:.4}", input, output[0]);
    }
    Ok(())
}
