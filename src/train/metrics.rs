use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Evaluation metrics reported per batch and averaged per epoch. They never
/// take part in backprop.
///
/// Classification metrics read a single output column as a binary
/// probability (threshold 0.5, positive class 1) and several columns as class
/// scores (argmax). Precision and recall are macro-averaged over classes in
/// the multi-class case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Loss,
    Accuracy,
    Precision,
    Recall,
    F1,
    Mse,
    R2,
}

impl Metric {
    /// `Loss` is supplied by the training loop and is not computed here.
    pub fn compute(&self, prediction: &Matrix, target: &Matrix) -> Result<f64> {
        if prediction.shape() != target.shape() {
            return Err(NnError::shape("metric", prediction.shape(), target.shape()));
        }
        if prediction.rows() == 0 {
            return Ok(0.0);
        }

        Ok(match self {
            Metric::Loss => 0.0,
            Metric::Accuracy => {
                let (pred, truth) = labels(prediction, target)?;
                let correct = pred.iter().zip(&truth).filter(|(p, t)| p == t).count();
                correct as f64 / pred.len() as f64
            }
            Metric::Precision => precision_recall(prediction, target)?.0,
            Metric::Recall => precision_recall(prediction, target)?.1,
            Metric::F1 => {
                let (p, r) = precision_recall(prediction, target)?;
                ratio(2.0 * p * r, p + r)
            }
            Metric::Mse => {
                let n = (prediction.rows() * prediction.cols()) as f64;
                squared_error(prediction, target) / n
            }
            Metric::R2 => {
                let mean = target.mean_all();
                let ss_tot: f64 = target.iter_rows().flatten().map(|t| (t - mean).powi(2)).sum();
                if ss_tot == 0.0 {
                    0.0
                } else {
                    1.0 - squared_error(prediction, target) / ss_tot
                }
            }
        })
    }
}

fn squared_error(prediction: &Matrix, target: &Matrix) -> f64 {
    prediction
        .iter_rows()
        .flatten()
        .zip(target.iter_rows().flatten())
        .map(|(p, t)| (p - t).powi(2))
        .sum()
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

/// Predicted and true class per example.
fn labels(prediction: &Matrix, target: &Matrix) -> Result<(Vec<usize>, Vec<usize>)> {
    if prediction.cols() == 1 {
        let threshold =
            |m: &Matrix| -> Vec<usize> { m.column(0).iter().map(|&v| usize::from(v >= 0.5)).collect() };
        return Ok((threshold(prediction), threshold(target)));
    }
    Ok((prediction.argmax_axis(1)?, target.argmax_axis(1)?))
}

fn precision_recall(prediction: &Matrix, target: &Matrix) -> Result<(f64, f64)> {
    let (pred, truth) = labels(prediction, target)?;

    let count = |pred_class: Option<usize>, true_class: Option<usize>| {
        pred.iter()
            .zip(&truth)
            .filter(|(p, t)| {
                pred_class.map_or(true, |c| **p == c) && true_class.map_or(true, |c| **t == c)
            })
            .count() as f64
    };

    if prediction.cols() == 1 {
        let tp = count(Some(1), Some(1));
        let predicted_pos = count(Some(1), None);
        let actual_pos = count(None, Some(1));
        return Ok((ratio(tp, predicted_pos), ratio(tp, actual_pos)));
    }

    let mut classes: Vec<usize> = pred.iter().chain(&truth).copied().collect();
    classes.sort_unstable();
    classes.dedup();

    let (mut p_sum, mut r_sum) = (0.0, 0.0);
    for &c in &classes {
        let tp = count(Some(c), Some(c));
        p_sum += ratio(tp, count(Some(c), None));
        r_sum += ratio(tp, count(None, Some(c)));
    }
    let k = classes.len() as f64;
    Ok((p_sum / k, r_sum / k))
}
