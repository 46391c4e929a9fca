use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::math::elementwise::Elementwise;

/// Fixed-length sequence of `f64`. The length never changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    values: Vec<f64>,
}

impl Vector {
    pub fn new(values: Vec<f64>) -> Vector {
        Vector { values }
    }

    pub fn zeros(len: usize) -> Vector {
        Vector { values: vec![0.0; len] }
    }

    pub fn ones(len: usize) -> Vector {
        Vector { values: vec![1.0; len] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.values.iter()
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        if self.len() != other.len() {
            return Err(NnError::shape("dot", self.dims(), other.dims()));
        }
        Ok(self.values.iter().zip(&other.values).map(|(a, b)| a * b).sum())
    }

    /// Index of the largest element; `None` for an empty vector. NaN never wins.
    pub fn argmax(&self) -> Option<usize> {
        arg_best(&self.values, |candidate, best| candidate > best)
    }

    /// Index of the smallest element; `None` for an empty vector. NaN never wins.
    pub fn argmin(&self) -> Option<usize> {
        arg_best(&self.values, |candidate, best| candidate < best)
    }

    /// Arithmetic mean; NaN when empty.
    pub fn mean(&self) -> f64 {
        mean_of(&self.values)
    }

    /// Variance with `ddof` degrees of freedom removed from the denominator.
    pub fn var(&self, ddof: usize) -> f64 {
        var_of(&self.values, ddof)
    }

    pub fn std(&self, ddof: usize) -> f64 {
        self.var(ddof).sqrt()
    }
}

impl Elementwise for Vector {
    fn dims(&self) -> (usize, usize) {
        (self.values.len(), 1)
    }

    fn as_slice(&self) -> &[f64] {
        &self.values
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

impl From<Vec<f64>> for Vector {
    fn from(values: Vec<f64>) -> Self {
        Vector::new(values)
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

pub(crate) fn arg_best<F>(values: &[f64], better: F) -> Option<usize>
where
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if !better(v, b) => {}
            _ => best = Some((i, v)),
        }
    }
    // All-NaN input still has a first element to point at.
    best.map(|(i, _)| i).or(if values.is_empty() { None } else { Some(0) })
}

pub(crate) fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn var_of(values: &[f64], ddof: usize) -> f64 {
    let mean = mean_of(values);
    let ss: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    let denom = values.len() as f64 - ddof as f64;
    if denom <= 0.0 {
        return f64::NAN;
    }
    ss / denom
}
