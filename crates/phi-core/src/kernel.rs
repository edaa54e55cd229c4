//! Interchangeable formulations of the phi functions.
//!
//! ϕⱼ(-h) = 1/h^j · ∫₀ʰ e^(τ-h) · τ^(j-1) / (j-1)! dτ
//!
//! Every kernel takes `neg_h` (the already negated, already scaled argument
//! -h·c) and requires j ≥ 1. Order zero is e^(neg_h) and is handled through
//! [`PhiKernel::order_zero`] so no formula ever sees Γ(0).

use num_bigint::BigUint;

use crate::config::Precision;
use crate::error::{PhiError, Result};
use crate::gamma::{factorial, gamma_exact, lower_incomplete_gamma, upper_incomplete_gamma};
use crate::value::PhiValue;

/// One formulation of ϕⱼ over values of type `V`.
pub trait PhiKernel<V: PhiValue> {
    fn name(&self) -> &'static str;

    fn precision(&self) -> Precision {
        Precision::Standard
    }

    /// ϕⱼ(neg_h) for j ≥ 1.
    fn phi(&self, j: u32, neg_h: &V) -> Result<V>;

    /// ϕⱼ(-h·c). Kernels that want to form the product themselves (e.g. at
    /// higher precision) override this.
    fn phi_scaled(&self, j: u32, h: &V, c: &V) -> Result<V> {
        h.check_broadcast(c)?;
        self.phi(j, &-(h.clone() * c.clone()))
    }

    /// ϕ₀(-h·c) = e^(-h·c).
    fn order_zero(&self, h: &V, c: &V) -> Result<V> {
        h.check_broadcast(c)?;
        Ok((-(h.clone() * c.clone())).exp())
    }
}

/// Rejects the inputs every j ≥ 1 formula divides by zero on.
pub(crate) fn check_order<V: PhiValue>(j: u32, neg_h: &V) -> Result<()> {
    if j == 0 {
        return Err(PhiError::Domain(
            "phi formulas require order j >= 1".to_string(),
        ));
    }
    if neg_h.is_zero() {
        return Err(PhiError::ZeroArgument { order: j });
    }
    Ok(())
}

/// Closed form through the integer incomplete gamma function:
///
/// ϕⱼ(-h) = e^(-h) · (-h)^(-j) · (1 - Γ(j, -h) / Γ(j))
#[derive(Clone, Copy, Debug, Default)]
pub struct SeriesPhi;

impl<V: PhiValue> PhiKernel<V> for SeriesPhi {
    fn name(&self) -> &'static str {
        "series"
    }

    fn phi(&self, j: u32, neg_h: &V) -> Result<V> {
        check_order(j, neg_h)?;
        let gamma = gamma_exact(j)?;
        let incomplete = upper_incomplete_gamma(j, neg_h, Some(&gamma))?;
        let ratio = incomplete.div_integer(&gamma);
        Ok(neg_h.exp() * neg_h.powi(-(j as i32)) * (neg_h.integer_like(1) - ratio))
    }
}

/// The truncated exponential remainder:
///
/// ϕⱼ(z) = (e^z - Σ_{k=0}^{j-1} z^k / k!) / z^j
///
/// Loses roughly log10(j!/|z|^j) digits to cancellation for small |z|.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemainderPhi;

impl RemainderPhi {
    /// Σ_{k=0}^{j-1} z^k / k!
    pub fn truncated_exp<V: PhiValue>(j: u32, z: &V) -> V {
        (0..j).fold(z.integer_like(0), |acc, k| {
            acc + z.powi(k as i32).div_integer(&factorial(k))
        })
    }
}

impl<V: PhiValue> PhiKernel<V> for RemainderPhi {
    fn name(&self) -> &'static str {
        "remainder"
    }

    fn phi(&self, j: u32, neg_h: &V) -> Result<V> {
        check_order(j, neg_h)?;
        let remainder = Self::truncated_exp(j, neg_h);
        Ok((neg_h.exp() - remainder) / neg_h.powi(j as i32))
    }
}

/// Through the lower incomplete gamma series:
///
/// ϕⱼ(z) = e^z · z^(-j) · γ(j, z) / Γ(j)
///
/// Free of cancellation, so it doubles as a reference for the other kernels.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncompleteGammaPhi;

impl<V: PhiValue> PhiKernel<V> for IncompleteGammaPhi {
    fn name(&self) -> &'static str {
        "incomplete-gamma"
    }

    fn phi(&self, j: u32, neg_h: &V) -> Result<V> {
        check_order(j, neg_h)?;
        let gamma: BigUint = gamma_exact(j)?;
        let lower = lower_incomplete_gamma(j, neg_h)?;
        Ok((neg_h.exp() * neg_h.powi(-(j as i32)) * lower).div_integer(&gamma))
    }
}
