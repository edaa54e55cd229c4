use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use ndarray::ArrayD;
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::error::{PhiError, Result};
use crate::extended::ExtFloat;

/// Tensor representation accepted wherever a scalar is.
pub type Tensor = ArrayD<f64>;

/// Arithmetic the phi formulas need, uniformly over scalars, tensors and
/// extended-precision values.
///
/// Binary operators consume their operands; tensor operands co-broadcast
/// the way `ndarray` arithmetic does. Constants are materialized with
/// [`PhiValue::integer_like`] so they take the shape (or precision) of the
/// value they combine with.
pub trait PhiValue:
    Clone
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// The integer `n` in the same shape / precision as `self`.
    fn integer_like(&self, n: i64) -> Self;

    /// True when every element is exactly zero.
    fn is_zero(&self) -> bool;

    fn exp(&self) -> Self;

    fn powi(&self, n: i32) -> Self;

    /// Multiply by an exact integer such as a factorial.
    fn mul_integer(&self, n: &BigUint) -> Self;

    /// Divide by an exact integer such as a factorial.
    fn div_integer(&self, n: &BigUint) -> Self;

    /// Largest absolute element, as f64. Used for series convergence tests.
    fn max_abs(&self) -> f64;

    /// `Ok` when `self` and `other` combine elementwise. Scalars always do.
    fn check_broadcast(&self, _other: &Self) -> Result<()> {
        Ok(())
    }
}

/// Shape two tensors co-broadcast to. Dimensions align from the right; each
/// pair must be equal or contain a 1.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let axis = |shape: &[usize], k: usize| {
        (k + shape.len())
            .checked_sub(ndim)
            .map_or(1, |i| shape[i])
    };
    (0..ndim)
        .map(|k| match (axis(lhs, k), axis(rhs, k)) {
            (a, b) if a == b => Ok(a),
            (1, b) => Ok(b),
            (a, 1) => Ok(a),
            _ => Err(PhiError::Shape {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
            }),
        })
        .collect()
}

/// Integers beyond f64 range saturate to infinity.
fn integer_to_f64(n: &BigUint) -> f64 {
    n.to_f64().unwrap_or(f64::INFINITY)
}

impl PhiValue for f64 {
    fn integer_like(&self, n: i64) -> Self {
        n as f64
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn exp(&self) -> Self {
        f64::exp(*self)
    }

    fn powi(&self, n: i32) -> Self {
        f64::powi(*self, n)
    }

    fn mul_integer(&self, n: &BigUint) -> Self {
        self * integer_to_f64(n)
    }

    fn div_integer(&self, n: &BigUint) -> Self {
        self / integer_to_f64(n)
    }

    fn max_abs(&self) -> f64 {
        self.abs()
    }
}

impl PhiValue for Tensor {
    fn integer_like(&self, n: i64) -> Self {
        ArrayD::from_elem(self.raw_dim(), n as f64)
    }

    fn is_zero(&self) -> bool {
        self.iter().all(|&x| x == 0.0)
    }

    fn exp(&self) -> Self {
        self.mapv(f64::exp)
    }

    fn powi(&self, n: i32) -> Self {
        self.mapv(|x| x.powi(n))
    }

    fn mul_integer(&self, n: &BigUint) -> Self {
        let factor = integer_to_f64(n);
        self.mapv(|x| x * factor)
    }

    fn div_integer(&self, n: &BigUint) -> Self {
        let divisor = integer_to_f64(n);
        self.mapv(|x| x / divisor)
    }

    fn max_abs(&self) -> f64 {
        self.iter().fold(0.0, |acc, x| acc.max(x.abs()))
    }

    fn check_broadcast(&self, other: &Self) -> Result<()> {
        broadcast_shape(self.shape(), other.shape()).map(|_| ())
    }
}

impl PhiValue for ExtFloat {
    fn integer_like(&self, n: i64) -> Self {
        ExtFloat::from_i64(n, self.digits())
    }

    fn is_zero(&self) -> bool {
        ExtFloat::is_zero(self)
    }

    fn exp(&self) -> Self {
        ExtFloat::exp(self)
    }

    fn powi(&self, n: i32) -> Self {
        ExtFloat::powi(self, n)
    }

    fn mul_integer(&self, n: &BigUint) -> Self {
        self.clone() * ExtFloat::from_biguint(n, self.digits())
    }

    fn div_integer(&self, n: &BigUint) -> Self {
        self.clone() / ExtFloat::from_biguint(n, self.digits())
    }

    fn max_abs(&self) -> f64 {
        self.to_f64().abs()
    }
}
