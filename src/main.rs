// Fits a small tanh network to a noisy sine wave.
//
//   cargo run -- [train_config.json]
//
// Set RUST_LOG=info for per-epoch progress.
use std::f64::consts::PI;
use std::process::ExitCode;

use log::{error, info};
use rand::Rng;

use backprop_nn::math::random::seeded_rng;
use backprop_nn::train::LrSchedule;
use backprop_nn::{ActivationFunction, Dense, LossType, Matrix, Model, TrainConfig};

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("backprop-nn: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> backprop_nn::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("loading training config from {path}");
            TrainConfig::load_json(path)?
        }
        None => TrainConfig {
            batch_size: 2,
            max_epochs: 100,
            learning_rate_schedule: LrSchedule::Decay,
            seed: Some(42),
            ..TrainConfig::default()
        },
    };

    let mut rng = seeded_rng(42);
    let xs: Vec<f64> = (0..100).map(|i| 2.0 * PI * i as f64 / 99.0).collect();
    let ys: Vec<f64> = xs.iter().map(|x| x.sin() + rng.gen_range(-0.1..0.1)).collect();
    let x = Matrix::column_from(&xs);
    let y = Matrix::column_from(&ys);

    let mut model = Model::with_seed(1, LossType::Square, 42);
    model
        .add_layer(Dense::new(10, Some(ActivationFunction::Tanh)))?
        .add_layer(Dense::new(10, Some(ActivationFunction::Tanh)))?
        .add_layer(Dense::new(1, None))?;

    let report = model.fit(&x, &y, &config)?;
    let first = report.history.first().map_or(f64::NAN, |s| s.loss);
    println!(
        "{:?} after {} epochs: loss {first:.6} -> {:.6}",
        report.outcome, report.epochs_run, report.final_loss
    );

    let probe = Matrix::column_from(&[0.0, PI / 2.0, PI, 3.0 * PI / 2.0]);
    let prediction = model.predict(&probe)?;
    for (x, p) in probe.iter_rows().zip(prediction.iter_rows()) {
        println!("sin({:.3}) ~ {:+.4}", x[0], p[0]);
    }
    Ok(())
}
