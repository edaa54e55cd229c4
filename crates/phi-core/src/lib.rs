//! Phi functions ϕⱼ(-h) for exponential-integrator solvers.
//!
//! ϕⱼ(-h) = 1/h^j · ∫₀ʰ e^(τ-h) · τ^(j-1) / (j-1)! dτ
//!
//! Several equivalent formulations sit behind the [`PhiKernel`] trait: the
//! integer incomplete-gamma closed form, the truncated exponential remainder,
//! the lower incomplete gamma series, and the remainder evaluated in
//! arbitrary precision. [`PhiEvaluator`] binds one kernel to a solver step
//! (h and its coefficients) and memoizes results.
//!
//! Zero I/O. Pure math with no opinions about the surrounding sampler.

pub mod coefficient;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluator;
pub mod extended;
pub mod gamma;
pub mod high_precision;
pub mod kernel;
pub mod value;

pub use coefficient::rk_gamma;
pub use config::{PhiConfig, Precision};
pub use constants::{DEFAULT_DIGITS, MIN_DIGITS};
pub use error::{PhiError, Result};
pub use evaluator::PhiEvaluator;
pub use extended::ExtFloat;
pub use gamma::{factorial, gamma_exact, lower_incomplete_gamma, upper_incomplete_gamma};
pub use high_precision::HighPrecisionPhi;
pub use kernel::{IncompleteGammaPhi, PhiKernel, RemainderPhi, SeriesPhi};
pub use value::{PhiValue, Tensor};
