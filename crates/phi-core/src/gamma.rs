//! Exact gamma and incomplete-gamma helpers for positive integer order.

use num_bigint::BigUint;
use num_traits::One;

use crate::constants::MAX_SERIES_TERMS;
use crate::error::{PhiError, Result};
use crate::value::PhiValue;

/// k! as an exact integer.
pub fn factorial(k: u32) -> BigUint {
    (1..=k).fold(BigUint::one(), |acc, i| acc * i)
}

/// Γ(n) = (n-1)! for positive integer n.
pub fn gamma_exact(n: u32) -> Result<BigUint> {
    if n < 1 {
        return Err(PhiError::Domain(format!("gamma requires n >= 1, got {n}")));
    }
    Ok(factorial(n - 1))
}

/// Upper incomplete gamma Γ(s, x) for positive integer s, via the finite sum
///
/// Γ(s, x) = (s-1)! · e^(-x) · Σ_{k=0}^{s-1} x^k / k!
///
/// Terms are accumulated in increasing k. `gamma_s` is Γ(s) when the caller
/// already has it.
pub fn upper_incomplete_gamma<V: PhiValue>(
    s: u32,
    x: &V,
    gamma_s: Option<&BigUint>,
) -> Result<V> {
    if s < 1 {
        return Err(PhiError::Domain(format!(
            "incomplete gamma requires s >= 1, got {s}"
        )));
    }
    let owned;
    let gamma_s = match gamma_s {
        Some(g) => g,
        None => {
            owned = gamma_exact(s)?;
            &owned
        }
    };

    let mut sum = x.integer_like(0);
    for k in 0..s {
        sum = sum + x.powi(k as i32).div_integer(&factorial(k));
    }
    Ok((sum * (-x.clone()).exp()).mul_integer(gamma_s))
}

/// Lower incomplete gamma γ(s, x) from its Pochhammer series
///
/// γ(s, x) = x^s · e^(-x) · Σ_{n≥0} x^n / (s·(s+1)·…·(s+n))
///
/// The series is entire in x, so unlike the finite-sum form it has no
/// subtractive cancellation for small |x|.
pub fn lower_incomplete_gamma<V: PhiValue>(s: u32, x: &V) -> Result<V> {
    if s < 1 {
        return Err(PhiError::Domain(format!(
            "incomplete gamma requires s >= 1, got {s}"
        )));
    }
    let mut term = x.integer_like(1).div_integer(&BigUint::from(s));
    let mut sum = term.clone();
    let mut converged = false;
    for n in 1..MAX_SERIES_TERMS {
        term = (term * x.clone()).div_integer(&BigUint::from(s + n as u32));
        sum = sum + term.clone();
        if term.max_abs() <= sum.max_abs() * f64::EPSILON {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(PhiError::NoConvergence(MAX_SERIES_TERMS));
    }
    Ok(x.powi(s as i32) * (-x.clone()).exp() * sum)
}
