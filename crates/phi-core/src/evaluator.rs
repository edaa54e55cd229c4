use std::collections::HashMap;

use tracing::{debug, trace};

use crate::config::{PhiConfig, Precision};
use crate::constants::DEFAULT_DIGITS;
use crate::error::{PhiError, Result};
use crate::high_precision::HighPrecisionPhi;
use crate::kernel::{PhiKernel, SeriesPhi};
use crate::value::PhiValue;

/// (order j, coefficient index). `None` is the unscaled call.
type CacheKey = (u32, Option<usize>);

/// Memoizing phi evaluator for one solver step.
///
/// Holds the step size h and the step's coefficients c, and answers
/// ϕⱼ(-h·cᵢ) queries through a single kernel chosen at construction.
/// Results are cached per (j, i) for the evaluator's lifetime; there is no
/// invalidation, build a new evaluator for the next step.
///
/// Conventions:
/// - `i = None` means no scaling (c = 1); `Some(i)` is 1-based into c.
/// - A coefficient that is exactly zero yields 0 for every j, without
///   evaluating any formula. Note ϕⱼ(0) is really 1/j!; callers use a zero
///   coefficient to drop the term.
/// - j = 0 is e^(-h·c) via the kernel's order-zero path, never a ϕⱼ formula.
pub struct PhiEvaluator<V: PhiValue> {
    h: V,
    c: Vec<V>,
    kernel: Box<dyn PhiKernel<V>>,
    cache: HashMap<CacheKey, V>,
}

impl<V: PhiValue> PhiEvaluator<V> {
    /// Evaluator backed by the gamma closed form in standard precision.
    pub fn standard(h: V, c: Vec<V>) -> Self {
        Self::with_kernel(h, c, Box::new(SeriesPhi))
    }

    pub fn with_kernel(h: V, c: Vec<V>, kernel: Box<dyn PhiKernel<V>>) -> Self {
        debug!(
            "phi evaluator using {} kernel ({:?}), {} coefficients",
            kernel.name(),
            kernel.precision(),
            c.len()
        );
        Self {
            h,
            c,
            kernel,
            cache: HashMap::new(),
        }
    }

    /// ϕⱼ(-h·cᵢ), memoized.
    ///
    /// Errors leave the cache untouched, so a failed key can be retried and
    /// other keys keep working. Tensor h and cᵢ whose shapes do not
    /// co-broadcast give `PhiError::Shape` at either precision.
    pub fn evaluate(&mut self, j: u32, i: Option<usize>) -> Result<V> {
        let key = (j, i);
        if let Some(hit) = self.cache.get(&key) {
            trace!("phi cache hit: j={j} i={i:?}");
            return Ok(hit.clone());
        }

        let c = self.coefficient(i)?;
        self.h.check_broadcast(&c)?;
        let result = if c.is_zero() {
            debug!("zero coefficient at index {i:?}: phi_{j} defined as 0");
            (self.h.clone() * c).integer_like(0)
        } else if j == 0 {
            self.kernel.order_zero(&self.h, &c)?
        } else {
            self.kernel.phi_scaled(j, &self.h, &c)?
        };

        trace!("phi cache miss: j={j} i={i:?} ({} cached)", self.cache.len() + 1);
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// ϕⱼ(-h).
    pub fn unscaled(&mut self, j: u32) -> Result<V> {
        self.evaluate(j, None)
    }

    /// ϕⱼ(-h·cᵢ) with 1-based `i`.
    pub fn scaled(&mut self, j: u32, i: usize) -> Result<V> {
        self.evaluate(j, Some(i))
    }

    fn coefficient(&self, i: Option<usize>) -> Result<V> {
        match i {
            None => Ok(self.h.integer_like(1)),
            Some(index) => index
                .checked_sub(1)
                .and_then(|k| self.c.get(k))
                .cloned()
                .ok_or(PhiError::Index {
                    index,
                    len: self.c.len(),
                }),
        }
    }

    pub fn h(&self) -> &V {
        &self.h
    }

    pub fn coefficients(&self) -> &[V] {
        &self.c
    }

    pub fn precision(&self) -> Precision {
        self.kernel.precision()
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl<V: PhiValue> PhiEvaluator<V>
where
    HighPrecisionPhi: PhiKernel<V>,
{
    /// `analytic_solution` selects the extended-precision kernel at the
    /// default digit count; otherwise the gamma closed form in f64.
    pub fn new(h: V, c: Vec<V>, analytic_solution: bool) -> Self {
        if analytic_solution {
            Self::with_kernel(h, c, Box::new(HighPrecisionPhi::new(DEFAULT_DIGITS)))
        } else {
            Self::standard(h, c)
        }
    }

    pub fn with_config(h: V, c: Vec<V>, config: &PhiConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config.precision() {
            Precision::Standard => Self::standard(h, c),
            Precision::Extended { digits } => {
                Self::with_kernel(h, c, Box::new(HighPrecisionPhi::new(digits)))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::RemainderPhi;
    use crate::value::Tensor;
    use approx::assert_relative_eq;
    use ndarray::{IxDyn, arr1, arr2};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Wraps a kernel and counts formula evaluations.
    struct Counting<K> {
        inner: K,
        calls: Rc<Cell<usize>>,
    }

    impl<K: PhiKernel<f64>> PhiKernel<f64> for Counting<K> {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn phi(&self, j: u32, neg_h: &f64) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            self.inner.phi(j, neg_h)
        }
    }

    fn counting(h: f64, c: Vec<f64>) -> (PhiEvaluator<f64>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let kernel = Counting {
            inner: SeriesPhi,
            calls: Rc::clone(&calls),
        };
        (PhiEvaluator::with_kernel(h, c, Box::new(kernel)), calls)
    }

    #[test]
    fn test_repeat_call_hits_cache() {
        let (mut phi, calls) = counting(0.5, vec![0.25, 0.75]);
        let first = phi.evaluate(2, Some(2)).unwrap();
        let second = phi.evaluate(2, Some(2)).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(phi.cached_len(), 1);

        phi.evaluate(2, Some(1)).unwrap();
        phi.evaluate(3, Some(2)).unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(phi.cached_len(), 3);
    }

    #[test]
    fn test_order_zero_is_exponential_without_formula() {
        let (mut phi, calls) = counting(0.8, vec![0.5, 1.0]);
        for i in 1..=2 {
            let got = phi.scaled(0, i).unwrap();
            let expected = (-0.8 * phi.coefficients()[i - 1]).exp();
            assert_relative_eq!(got, expected, max_relative = 1e-15);
        }
        assert_relative_eq!(phi.unscaled(0).unwrap(), (-0.8_f64).exp());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_zero_coefficient_short_circuits() {
        let (mut phi, calls) = counting(0.5, vec![0.0, 1.0]);
        for j in 0..5 {
            assert_eq!(phi.scaled(j, 1).unwrap(), 0.0);
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_unscaled_uses_unit_coefficient() {
        let mut phi = PhiEvaluator::standard(0.4_f64, vec![2.0]);
        let unscaled = phi.unscaled(2).unwrap();
        let direct = SeriesPhi.phi(2, &-0.4_f64).unwrap();
        assert_eq!(unscaled, direct);
    }

    #[test]
    fn test_scaled_argument_is_negated_product() {
        let mut phi = PhiEvaluator::standard(0.5_f64, vec![0.25, 0.75]);
        let got = phi.scaled(1, 2).unwrap();
        let expected = ((-0.375_f64).exp() - 1.0) / -0.375;
        assert_relative_eq!(got, expected, max_relative = 1e-13);
    }

    #[test]
    fn test_index_out_of_range() {
        let mut phi = PhiEvaluator::standard(0.5_f64, vec![0.25, 0.75]);
        assert_eq!(
            phi.scaled(1, 0),
            Err(PhiError::Index { index: 0, len: 2 })
        );
        assert_eq!(
            phi.scaled(1, 3),
            Err(PhiError::Index { index: 3, len: 2 })
        );
        // evaluator stays usable and nothing was cached for the failures
        assert_eq!(phi.cached_len(), 0);
        assert!(phi.scaled(1, 1).is_ok());
    }

    #[test]
    fn test_zero_step_errors_without_poisoning_cache() {
        let mut phi = PhiEvaluator::standard(0.0_f64, vec![1.0]);
        assert_eq!(phi.scaled(2, 1), Err(PhiError::ZeroArgument { order: 2 }));
        assert_eq!(phi.cached_len(), 0);
        assert_eq!(phi.scaled(0, 1).unwrap(), 1.0);
    }

    #[test]
    fn test_analytic_flag_selects_extended_kernel() {
        let standard = PhiEvaluator::new(0.5_f64, vec![1.0], false);
        assert_eq!(standard.precision(), Precision::Standard);
        assert_eq!(standard.kernel_name(), "series");

        let extended = PhiEvaluator::new(0.5_f64, vec![1.0], true);
        assert_eq!(extended.precision(), Precision::Extended { digits: 80 });
        assert_eq!(extended.kernel_name(), "high-precision");
    }

    #[test]
    fn test_extended_evaluator_matches_standard_away_from_zero() {
        let c = vec![0.5, 1.0, 1.5_f64];
        let mut standard = PhiEvaluator::new(0.7, c.clone(), false);
        let mut extended = PhiEvaluator::new(0.7, c, true);
        for j in 0..=4 {
            for i in 1..=3 {
                let a = standard.scaled(j, i).unwrap();
                let b = extended.scaled(j, i).unwrap();
                assert_relative_eq!(a, b, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_with_config_validates() {
        let bad = PhiConfig::extended(4);
        assert!(matches!(
            PhiEvaluator::with_config(0.5_f64, vec![1.0], &bad),
            Err(PhiError::InvalidConfig(_))
        ));
        let good = PhiConfig::extended(40);
        let phi = PhiEvaluator::with_config(0.5_f64, vec![1.0], &good).unwrap();
        assert_eq!(phi.precision(), Precision::Extended { digits: 40 });
    }

    #[test]
    fn test_alternate_kernel() {
        let mut phi = PhiEvaluator::<f64>::with_kernel(1.0, vec![2.0], Box::new(RemainderPhi));
        assert_eq!(phi.kernel_name(), "remainder");
        assert_relative_eq!(phi.scaled(2, 1).unwrap(), 0.283_833_820_809_153_2, max_relative = 1e-12);
    }

    #[test]
    fn test_tensor_step() {
        let h: Tensor = arr1(&[0.1, 0.2, 0.4]).into_dyn();
        let c = vec![
            Tensor::from_elem(IxDyn(&[]), 0.5),
            Tensor::zeros(IxDyn(&[])),
        ];
        let mut phi = PhiEvaluator::standard(h.clone(), c);

        let out = phi.scaled(1, 1).unwrap();
        for (k, &hv) in h.iter().enumerate() {
            let z = -hv * 0.5;
            assert_relative_eq!(out[IxDyn(&[k])], (z.exp() - 1.0) / z, max_relative = 1e-13);
        }

        let zero = phi.scaled(3, 2).unwrap();
        assert_eq!(zero.shape(), &[3]);
        assert!(zero.iter().all(|&x| x == 0.0));

        let exp = phi.unscaled(0).unwrap();
        assert_relative_eq!(exp[IxDyn(&[2])], (-0.4_f64).exp());
    }

    #[test]
    fn test_tensor_extended_step() {
        let h: Tensor = arr1(&[1e-4, 0.5]).into_dyn();
        let mut phi = PhiEvaluator::new(h, vec![Tensor::from_elem(IxDyn(&[]), 1.0)], true);
        let out = phi.scaled(3, 1).unwrap();
        assert_relative_eq!(out[IxDyn(&[0])], 0.166_662_500_083_331_94, max_relative = 1e-14);
    }

    #[test]
    fn test_tensor_extended_order_zero_and_unscaled() {
        let h: Tensor = arr1(&[1e-4, 0.5]).into_dyn();
        let mut phi = PhiEvaluator::new(h.clone(), vec![Tensor::from_elem(IxDyn(&[]), 2.0)], true);

        let exp_scaled = phi.scaled(0, 1).unwrap();
        let exp_unscaled = phi.unscaled(0).unwrap();
        let phi2 = phi.unscaled(2).unwrap();
        assert_eq!(phi2.shape(), &[2]);
        assert_eq!(phi.cached_len(), 3);

        // ϕ₂(-1e-4) and ϕ₂(-0.5) at 50 digits
        let phi2_reference = [0.499_983_333_749_991_666_8, 0.426_122_638_850_533_7];
        for (k, &hv) in h.iter().enumerate() {
            assert_relative_eq!(exp_scaled[IxDyn(&[k])], (-2.0 * hv).exp(), max_relative = 1e-15);
            assert_relative_eq!(exp_unscaled[IxDyn(&[k])], (-hv).exp(), max_relative = 1e-15);
            assert_relative_eq!(phi2[IxDyn(&[k])], phi2_reference[k], max_relative = 1e-15);
        }
    }

    #[test]
    fn test_tensor_shape_mismatch_is_an_error_at_both_precisions() {
        let h: Tensor = arr1(&[0.1, 0.2, 0.3]).into_dyn();
        let c = vec![arr1(&[0.5, 1.0]).into_dyn(), Tensor::zeros(IxDyn(&[2]))];
        let shape_error = PhiError::Shape {
            lhs: vec![3],
            rhs: vec![2],
        };
        for analytic_solution in [false, true] {
            let mut phi = PhiEvaluator::new(h.clone(), c.clone(), analytic_solution);
            for j in 0..=2 {
                assert_eq!(phi.scaled(j, 1), Err(shape_error.clone()));
                assert_eq!(phi.scaled(j, 2), Err(shape_error.clone()));
            }
            assert_eq!(phi.cached_len(), 0);
            assert!(phi.unscaled(1).is_ok());
        }
    }

    #[test]
    fn test_tensor_co_broadcast_agrees_across_precisions() {
        let h: Tensor = arr2(&[[0.1], [0.2], [0.4]]).into_dyn();
        let c = vec![arr2(&[[0.5, 1.0, 1.5, 2.0]]).into_dyn()];
        let mut standard = PhiEvaluator::new(h.clone(), c.clone(), false);
        let mut extended = PhiEvaluator::new(h, c, true);
        for j in 0..=2 {
            let a = standard.scaled(j, 1).unwrap();
            let b = extended.scaled(j, 1).unwrap();
            assert_eq!(a.shape(), &[3, 4]);
            assert_eq!(b.shape(), &[3, 4]);
            for (x, y) in a.iter().zip(b.iter()) {
                assert_relative_eq!(*x, *y, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_huge_step_matches_standard_underflow() {
        let mut extended = PhiEvaluator::new(1e20_f64, vec![1.0], true);
        let mut standard = PhiEvaluator::new(1e20_f64, vec![1.0], false);
        assert_eq!(extended.scaled(0, 1), Ok(0.0));
        assert_eq!(standard.scaled(0, 1), Ok(0.0));
        // ϕ₁(z) = (e^z - 1) / z with e^z gone
        assert_relative_eq!(extended.scaled(1, 1).unwrap(), 1e-20, max_relative = 1e-15);
        assert_relative_eq!(extended.unscaled(2).unwrap(), 1e-20, max_relative = 1e-15);
    }
}
