/// Default significant decimal digits for the extended-precision path (~ float256)
pub const DEFAULT_DIGITS: u32 = 80;

/// Smallest digit count accepted by `PhiConfig::validate`.
/// Anything below f64's ~16 significant digits gains nothing.
pub const MIN_DIGITS: u32 = 16;

/// Extra digits carried inside `ExtFloat::exp` before rounding back
pub const GUARD_DIGITS: u32 = 10;

/// Term limit for the lower incomplete gamma series
pub const MAX_SERIES_TERMS: usize = 500;

/// `ExtFloat::exp` saturates for arguments with |x| >= 10^this:
/// the decimal exponent of the result would leave i64 range.
pub const EXP_MAGNITUDE_LIMIT: i64 = 18;
