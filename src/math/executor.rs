use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{NnError, Result};
use crate::math::elementwise::Elementwise;
use crate::math::matrix::Matrix;

/// Runs matrix products either on the calling thread or on an injected rayon
/// pool.
///
/// Both paths compute each output element with the same summation order, so
/// results are bit-identical whichever one is used.
#[derive(Debug, Clone, Default)]
pub enum Executor {
    #[default]
    Serial,
    ThreadPool(Arc<rayon::ThreadPool>),
}

impl Executor {
    /// Builds a dedicated pool with `threads` workers.
    pub fn thread_pool(threads: usize) -> Result<Executor> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| NnError::InvalidConfig(format!("cannot build thread pool: {e}")))?;
        Ok(Executor::ThreadPool(Arc::new(pool)))
    }

    pub fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        if a.cols() != b.rows() {
            return Err(NnError::shape("matmul", a.shape(), b.shape()));
        }

        let mut res = Matrix::zeros(a.rows(), b.cols());
        if res.rows() == 0 || res.cols() == 0 {
            return Ok(res);
        }

        let out_cols = b.cols();
        match self {
            Executor::Serial => {
                for (i, out_row) in res.as_mut_slice().chunks_mut(out_cols).enumerate() {
                    row_product(a.row(i), b, out_row);
                }
            }
            Executor::ThreadPool(pool) => pool.install(|| {
                res.as_mut_slice()
                    .par_chunks_mut(out_cols)
                    .enumerate()
                    .for_each(|(i, out_row)| row_product(a.row(i), b, out_row));
            }),
        }

        Ok(res)
    }
}

/// `out_row = a_row · b`, accumulating over k in ascending order.
fn row_product(a_row: &[f64], b: &Matrix, out_row: &mut [f64]) {
    for (k, &a_ik) in a_row.iter().enumerate() {
        for (out, &b_kj) in out_row.iter_mut().zip(b.row(k)) {
            *out += a_ik * b_kj;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::random::seeded_rng;

    #[test]
    fn thread_pool_matches_serial_bit_for_bit() {
        let mut rng = seeded_rng(3);
        let a = Matrix::randn_with(37, 19, &mut rng);
        let b = Matrix::randn_with(19, 23, &mut rng);

        let serial = Executor::Serial.matmul(&a, &b).unwrap();
        let pooled = Executor::thread_pool(4).unwrap().matmul(&a, &b).unwrap();

        assert_eq!(serial, pooled);
    }

    #[test]
    fn empty_products_do_not_touch_the_pool() {
        let a = Matrix::zeros(0, 3);
        let b = Matrix::zeros(3, 4);
        let out = Executor::thread_pool(2).unwrap().matmul(&a, &b).unwrap();
        assert_eq!(out.shape(), (0, 4));
    }
}
