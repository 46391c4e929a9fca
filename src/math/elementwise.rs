use crate::error::{NnError, Result};

/// Element-wise arithmetic shared by [`Vector`](super::Vector) and
/// [`Matrix`](super::Matrix).
///
/// Every operation comes in two flavours: a pure one that allocates a new
/// container and an `_inplace` one that mutates the left operand. Binary
/// operations require identical shapes and never broadcast.
///
/// `ln` and `recip` follow IEEE semantics on non-positive / zero inputs
/// (`-inf`, `NaN`, `inf`); callers clamp where they need to.
pub trait Elementwise: Clone {
    /// `(rows, cols)`; vectors report `(len, 1)`.
    fn dims(&self) -> (usize, usize);
    fn as_slice(&self) -> &[f64];
    fn as_mut_slice(&mut self) -> &mut [f64];

    fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64,
    {
        for x in self.as_mut_slice() {
            *x = f(*x);
        }
    }

    fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let mut out = self.clone();
        out.map_inplace(f);
        out
    }

    /// Combines `self` with `other` element by element, in place.
    fn zip_with_inplace<F>(&mut self, other: &Self, op: &'static str, f: F) -> Result<()>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.dims() != other.dims() {
            return Err(NnError::shape(op, self.dims(), other.dims()));
        }
        for (x, &y) in self.as_mut_slice().iter_mut().zip(other.as_slice()) {
            *x = f(*x, y);
        }
        Ok(())
    }

    fn add_inplace(&mut self, other: &Self) -> Result<()> {
        self.zip_with_inplace(other, "add", |a, b| a + b)
    }

    fn subtract_inplace(&mut self, other: &Self) -> Result<()> {
        self.zip_with_inplace(other, "subtract", |a, b| a - b)
    }

    /// Hadamard product.
    fn multiply_inplace(&mut self, other: &Self) -> Result<()> {
        self.zip_with_inplace(other, "multiply", |a, b| a * b)
    }

    fn add(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        out.add_inplace(other)?;
        Ok(out)
    }

    fn subtract(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        out.subtract_inplace(other)?;
        Ok(out)
    }

    fn multiply(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        out.multiply_inplace(other)?;
        Ok(out)
    }

    fn scale_inplace(&mut self, scalar: f64) {
        self.map_inplace(|x| x * scalar);
    }

    fn scale(&self, scalar: f64) -> Self {
        self.map(|x| x * scalar)
    }

    fn pow_inplace(&mut self, exponent: f64) {
        self.map_inplace(|x| x.powf(exponent));
    }

    fn pow(&self, exponent: f64) -> Self {
        self.map(|x| x.powf(exponent))
    }

    fn exp_inplace(&mut self) {
        self.map_inplace(f64::exp);
    }

    fn exp(&self) -> Self {
        self.map(f64::exp)
    }

    fn ln_inplace(&mut self) {
        self.map_inplace(f64::ln);
    }

    fn ln(&self) -> Self {
        self.map(f64::ln)
    }

    fn abs_inplace(&mut self) {
        self.map_inplace(f64::abs);
    }

    fn abs(&self) -> Self {
        self.map(f64::abs)
    }

    fn recip_inplace(&mut self) {
        self.map_inplace(f64::recip);
    }

    fn recip(&self) -> Self {
        self.map(f64::recip)
    }

    /// Grand total of all elements.
    fn sum(&self) -> f64 {
        self.as_slice().iter().sum()
    }

    fn l2_norm(&self) -> f64 {
        self.as_slice().iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    fn has_non_finite(&self) -> bool {
        self.as_slice().iter().any(|x| !x.is_finite())
    }
}
