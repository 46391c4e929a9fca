//! Sine regression with a validation split, early stopping and checkpoints.
use std::f64::consts::PI;
use std::sync::mpsc;
use std::thread;

use rand::Rng;

use backprop_nn::math::seeded_rng;
use backprop_nn::train::{DirectoryCheckpoint, EpochStats, LrSchedule, Metric};
use backprop_nn::{
    ActivationFunction, Dense, Executor, LossType, Matrix, Model, TrainConfig, TrainHooks,
};

fn noisy_sine(n: usize, seed: u64) -> (Matrix, Matrix) {
    let mut rng = seeded_rng(seed);
    let xs: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..2.0 * PI)).collect();
    let ys: Vec<f64> = xs.iter().map(|x| x.sin() + rng.gen_range(-0.05..0.05)).collect();
    (Matrix::column_from(&xs), Matrix::column_from(&ys))
}

fn main() -> backprop_nn::Result<()> {
    env_logger::init();

    let (x, y) = noisy_sine(200, 1);
    let (vx, vy) = noisy_sine(50, 2);

    let mut model = Model::with_seed(1, LossType::Square, 3);
    model
        .add_layer(Dense::new(16, Some(ActivationFunction::Tanh)))?
        .add_layer(Dense::new(16, Some(ActivationFunction::Tanh)))?
        .add_layer(Dense::new(1, None))?;
    model.set_executor(Executor::thread_pool(2)?);

    let config = TrainConfig {
        learning_rate: 0.05,
        learning_rate_decay: 0.01,
        learning_rate_schedule: LrSchedule::Decay,
        batch_size: 8,
        max_epochs: 300,
        early_stopping_patience: 20,
        early_stopping_min_delta: 1e-5,
        gradient_clip_norm: 5.0,
        checkpoint_frequency: 50,
        metrics: vec![Metric::Loss, Metric::Mse, Metric::R2],
        ..TrainConfig::default()
    };

    let (tx, rx) = mpsc::channel::<EpochStats>();
    let printer = thread::spawn(move || {
        for stats in rx {
            if stats.epoch % 25 == 0 {
                println!(
                    "epoch {:>3}/{}: loss {:.5}  val {:.5}  r2 {:.3}",
                    stats.epoch,
                    stats.total_epochs,
                    stats.loss,
                    stats.validation_loss.unwrap_or(f64::NAN),
                    stats.metrics.get(&Metric::R2).copied().unwrap_or(f64::NAN),
                );
            }
        }
    });

    let mut checkpoints = DirectoryCheckpoint::new(std::env::temp_dir().join("backprop-nn-sine"));
    let hooks = TrainHooks::default()
        .with_progress(tx)
        .with_checkpoint(&mut checkpoints);
    let report = model.train(&x, &y, Some((&vx, &vy)), &config, hooks)?;
    let _ = printer.join();

    println!(
        "{:?}: {} epochs, best validation loss {:.5}",
        report.outcome,
        report.epochs_run,
        report.best_validation_loss.unwrap_or(f64::NAN)
    );
    println!("checkpoints in {}", checkpoints.dir().display());
    Ok(())
}
