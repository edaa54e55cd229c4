use ndarray::{ArrayViewD, IxDyn};
use tracing::trace;

use crate::config::Precision;
use crate::constants::{DEFAULT_DIGITS, MIN_DIGITS};
use crate::error::{PhiError, Result};
use crate::extended::ExtFloat;
use crate::kernel::{PhiKernel, RemainderPhi, check_order};
use crate::value::{Tensor, broadcast_shape};

/// The remainder formula evaluated in `ExtFloat` at `digits` significant
/// digits, rounded back to f64 on return.
///
/// Scaled calls lift h and c separately before forming -h·c, so the product
/// is exact instead of rounded to 53 bits. Tensors are evaluated element by
/// element.
///
/// Digit counts below `MIN_DIGITS` are raised to it, matching what
/// `PhiConfig::validate` accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HighPrecisionPhi {
    digits: u32,
}

impl Default for HighPrecisionPhi {
    fn default() -> Self {
        Self::new(DEFAULT_DIGITS)
    }
}

impl HighPrecisionPhi {
    pub fn new(digits: u32) -> Self {
        Self {
            digits: digits.max(MIN_DIGITS),
        }
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Exact conversion of an f64 into this kernel's precision.
    pub fn lift(&self, x: f64) -> Result<ExtFloat> {
        ExtFloat::from_f64(x, self.digits)
    }

    /// ϕⱼ(z) at full extended precision, without rounding to f64.
    pub fn phi_extended(&self, j: u32, z: &ExtFloat) -> Result<ExtFloat> {
        RemainderPhi.phi(j, &z.clone().with_digits(self.digits))
    }

    fn scalar(&self, j: u32, z: ExtFloat) -> Result<f64> {
        let value = self.phi_extended(j, &z)?;
        trace!("phi_{j}({z}) = {value} at {} digits", self.digits);
        Ok(value.to_f64())
    }

    /// -h·c formed from the lifted operands.
    fn scaled_argument(&self, h: f64, c: f64) -> Result<ExtFloat> {
        Ok(-(self.lift(h)? * self.lift(c)?))
    }

    fn elementwise<F>(&self, h: &Tensor, c: &Tensor, f: F) -> Result<Tensor>
    where
        F: Fn(ExtFloat) -> Result<f64>,
    {
        let (h, c) = broadcast_pair(h, c)?;
        let mut out = Tensor::zeros(h.raw_dim());
        for ((o, &hv), &cv) in out.iter_mut().zip(h.iter()).zip(c.iter()) {
            *o = f(self.scaled_argument(hv, cv)?)?;
        }
        Ok(out)
    }
}

/// Views of `h` and `c` broadcast to their common shape.
fn broadcast_pair<'a>(
    h: &'a Tensor,
    c: &'a Tensor,
) -> Result<(ArrayViewD<'a, f64>, ArrayViewD<'a, f64>)> {
    let shape = broadcast_shape(h.shape(), c.shape())?;
    let shape_error = || PhiError::Shape {
        lhs: h.shape().to_vec(),
        rhs: c.shape().to_vec(),
    };
    let hv = h.broadcast(IxDyn(&shape)).ok_or_else(shape_error)?;
    let cv = c.broadcast(IxDyn(&shape)).ok_or_else(shape_error)?;
    Ok((hv, cv))
}

impl PhiKernel<f64> for HighPrecisionPhi {
    fn name(&self) -> &'static str {
        "high-precision"
    }

    fn precision(&self) -> Precision {
        Precision::Extended {
            digits: self.digits,
        }
    }

    fn phi(&self, j: u32, neg_h: &f64) -> Result<f64> {
        check_order(j, neg_h)?;
        self.scalar(j, self.lift(*neg_h)?)
    }

    fn phi_scaled(&self, j: u32, h: &f64, c: &f64) -> Result<f64> {
        self.scalar(j, self.scaled_argument(*h, *c)?)
    }

    fn order_zero(&self, h: &f64, c: &f64) -> Result<f64> {
        Ok(self.scaled_argument(*h, *c)?.exp().to_f64())
    }
}

impl PhiKernel<Tensor> for HighPrecisionPhi {
    fn name(&self) -> &'static str {
        "high-precision"
    }

    fn precision(&self) -> Precision {
        Precision::Extended {
            digits: self.digits,
        }
    }

    fn phi(&self, j: u32, neg_h: &Tensor) -> Result<Tensor> {
        let mut out = neg_h.clone();
        for o in out.iter_mut() {
            *o = self.scalar(j, self.lift(*o)?)?;
        }
        Ok(out)
    }

    fn phi_scaled(&self, j: u32, h: &Tensor, c: &Tensor) -> Result<Tensor> {
        self.elementwise(h, c, |z| self.scalar(j, z))
    }

    fn order_zero(&self, h: &Tensor, c: &Tensor) -> Result<Tensor> {
        self.elementwise(h, c, |z| Ok(z.exp().to_f64()))
    }
}
