/// Runge-Kutta exponential-integrator tableau coefficient
///
/// γ = (3·c3³ - 2·c3) / (c2·(2 - 3·c2))
///
/// Degenerate c2 (0 or 2/3) follows IEEE semantics: ±∞ or NaN.
pub fn rk_gamma(c2: f64, c3: f64) -> f64 {
    (3.0 * c3.powi(3) - 2.0 * c3) / (c2 * (2.0 - 3.0 * c2))
}
