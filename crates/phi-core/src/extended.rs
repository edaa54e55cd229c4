use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_bigint::{BigInt, BigUint};
use num_traits::{Float, Signed, Zero};

use crate::constants::{EXP_MAGNITUDE_LIMIT, GUARD_DIGITS};
use crate::error::{PhiError, Result};

/// Arbitrary-precision decimal float: `mantissa × 10^exponent`.
///
/// The mantissa is rounded half away from zero to at most `digits`
/// significant decimal digits after every operation. Binary operations on
/// operands of different precision run at the larger of the two.
#[derive(Clone, Debug)]
pub struct ExtFloat {
    mantissa: BigInt,
    exponent: i64,
    digits: u32,
}

/// Exponent of the stand-in for results beyond any finite f64. Exponent
/// arithmetic saturates, so it stays out of range instead of wrapping.
const OVERFLOW_EXPONENT: i64 = i64::MAX / 4;

fn pow10(n: u32) -> BigInt {
    BigInt::from(10u32).pow(n)
}

/// Number of decimal digits in |m|. Zero counts as one digit.
fn decimal_len(m: &BigInt) -> u32 {
    m.magnitude().to_str_radix(10).len() as u32
}

impl ExtFloat {
    fn from_parts(mantissa: BigInt, exponent: i64, digits: u32) -> Self {
        Self {
            mantissa,
            exponent,
            digits: digits.max(1),
        }
        .normalize()
    }

    pub fn zero(digits: u32) -> Self {
        Self::from_parts(BigInt::zero(), 0, digits)
    }

    /// A positive value whose `to_f64` is +∞.
    fn overflow(digits: u32) -> Self {
        Self::from_parts(BigInt::from(1u32), OVERFLOW_EXPONENT, digits)
    }

    pub fn from_i64(n: i64, digits: u32) -> Self {
        Self::from_parts(BigInt::from(n), 0, digits)
    }

    pub fn from_biguint(n: &BigUint, digits: u32) -> Self {
        Self::from_parts(BigInt::from(n.clone()), 0, digits)
    }

    /// Exact conversion from binary floating point.
    ///
    /// Every finite f64 is `m·2^e`, which for negative `e` equals
    /// `m·5^(-e)·10^e`, so no rounding happens unless the result needs more
    /// than `digits` significant digits. NaN and infinities are rejected.
    pub fn from_f64(x: f64, digits: u32) -> Result<Self> {
        if !x.is_finite() {
            return Err(PhiError::NonFinite(x));
        }
        let (bits, exp2, sign) = x.integer_decode();
        let mut m = BigInt::from(bits);
        if sign < 0 {
            m = -m;
        }
        if exp2 >= 0 {
            Ok(Self::from_parts(m << exp2 as usize, 0, digits))
        } else {
            let k = u32::from(exp2.unsigned_abs());
            Ok(Self::from_parts(
                m * BigInt::from(5u32).pow(k),
                -i64::from(k),
                digits,
            ))
        }
    }

    /// Parse a decimal literal such as `-2.5`, `1e-30` or `3.14159E+0`.
    pub fn parse(s: &str, digits: u32) -> Result<Self> {
        let invalid = || PhiError::Domain(format!("not a decimal number: {s:?}"));
        let s = s.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (number, exp10) = match body.find(['e', 'E']) {
            Some(pos) => (
                &body[..pos],
                body[pos + 1..].parse::<i64>().map_err(|_| invalid())?,
            ),
            None => (body, 0),
        };
        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part
            .chars()
            .chain(frac_part.chars())
            .all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let mut m: BigInt = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| invalid())?;
        if negative {
            m = -m;
        }
        Ok(Self::from_parts(m, exp10 - frac_part.len() as i64, digits))
    }

    /// Nearest f64, correctly rounded by the standard library's decimal parser.
    pub fn to_f64(&self) -> f64 {
        format!("{}e{}", self.mantissa, self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Same value at a different precision, rounding if `digits` shrinks.
    pub fn with_digits(self, digits: u32) -> Self {
        Self::from_parts(self.mantissa, self.exponent, digits)
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// Smallest `m` with |self| < 10^m, or `None` for zero.
    pub fn magnitude(&self) -> Option<i64> {
        if self.is_zero() {
            None
        } else {
            Some(self.exponent.saturating_add(i64::from(decimal_len(&self.mantissa))))
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            mantissa: BigInt::from(self.mantissa.magnitude().clone()),
            ..self.clone()
        }
    }

    /// Integer power by repeated squaring. Negative `n` takes the reciprocal.
    pub fn powi(&self, n: i32) -> Self {
        let mut base = self.clone();
        let mut acc = Self::from_i64(1, self.digits);
        let mut e = n.unsigned_abs();
        while e > 0 {
            if e & 1 == 1 {
                acc = acc * base.clone();
            }
            e >>= 1;
            if e > 0 {
                base = base.clone() * base;
            }
        }
        if n < 0 {
            Self::from_i64(1, self.digits) / acc
        } else {
            acc
        }
    }

    /// e^self.
    ///
    /// Halves the argument k times until |r| < 1e-3, sums the Taylor series
    /// of e^r, then squares k times. Squaring amplifies relative error by
    /// 2^k, so the working precision carries log10(2^k) extra digits on top
    /// of `GUARD_DIGITS`.
    ///
    /// For |x| ≥ 10^`EXP_MAGNITUDE_LIMIT` the decimal exponent of e^x no
    /// longer fits; negative x gives zero, positive x a value that converts
    /// to +∞.
    pub fn exp(&self) -> Self {
        let Some(mag) = self.magnitude() else {
            return Self::from_i64(1, self.digits);
        };
        if mag > EXP_MAGNITUDE_LIMIT {
            return if self.is_negative() {
                Self::zero(self.digits)
            } else {
                Self::overflow(self.digits)
            };
        }
        let halvings = ((mag + 3).clamp(0, 1000) as u32 * 10).div_ceil(3);
        let work = self.digits + GUARD_DIGITS + halvings * 3 / 10 + 1;

        // 2^-k == 5^k · 10^-k
        let scale = Self::from_parts(
            BigInt::from(5u32).pow(halvings),
            -i64::from(halvings),
            work,
        );
        let r = self.clone().with_digits(work) * scale;

        let one = Self::from_i64(1, work);
        let mut sum = one.clone();
        let mut term = one;
        for n in 1i64.. {
            term = term * r.clone() / Self::from_i64(n, work);
            match (term.magnitude(), sum.magnitude()) {
                (Some(t), Some(s)) if t > s - i64::from(work) - 1 => sum = sum + term.clone(),
                _ => break,
            }
        }
        for _ in 0..halvings {
            sum = sum.clone() * sum;
        }
        sum.with_digits(self.digits)
    }

    fn normalize(mut self) -> Self {
        if self.mantissa.is_zero() {
            self.exponent = 0;
            return self;
        }
        let len = decimal_len(&self.mantissa);
        if len > self.digits {
            let drop = len - self.digits;
            let divisor = pow10(drop);
            let remainder = &self.mantissa % &divisor;
            let mut quotient = &self.mantissa / &divisor;
            if remainder.magnitude() * 2u32 >= *divisor.magnitude() {
                quotient += self.mantissa.signum();
            }
            self.exponent = self.exponent.saturating_add(i64::from(drop));
            // 99…9 rounded up gains a digit
            if decimal_len(&quotient) > self.digits {
                quotient /= BigInt::from(10u32);
                self.exponent = self.exponent.saturating_add(1);
            }
            self.mantissa = quotient;
        }
        self
    }
}

impl Add for ExtFloat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let digits = self.digits.max(rhs.digits);
        if rhs.is_zero() {
            return self.with_digits(digits);
        }
        if self.is_zero() {
            return rhs.with_digits(digits);
        }
        let (hi, lo) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        // below half an ulp of the larger operand
        if let (Some(mh), Some(ml)) = (hi.magnitude(), lo.magnitude())
            && mh.saturating_sub(ml) > i64::from(digits) + 2
        {
            return hi.with_digits(digits);
        }
        let gap = hi.exponent.saturating_sub(lo.exponent) as u32;
        Self::from_parts(hi.mantissa * pow10(gap) + lo.mantissa, lo.exponent, digits)
    }
}

impl Sub for ExtFloat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for ExtFloat {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let digits = self.digits.max(rhs.digits);
        Self::from_parts(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
            digits,
        )
    }
}

/// # Panics
///
/// Panics when `rhs` is zero, like integer division.
impl Div for ExtFloat {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        assert!(!rhs.is_zero(), "ExtFloat division by zero");
        let digits = self.digits.max(rhs.digits);
        if self.is_zero() {
            return Self::zero(digits);
        }
        // quotient keeps two digits beyond the target before rounding
        let shift = (digits + 2 + decimal_len(&rhs.mantissa))
            .saturating_sub(decimal_len(&self.mantissa));
        let quotient = (self.mantissa * pow10(shift)) / &rhs.mantissa;
        Self::from_parts(
            quotient,
            self.exponent
                .saturating_sub(i64::from(shift))
                .saturating_sub(rhs.exponent),
            digits,
        )
    }
}

impl Neg for ExtFloat {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            mantissa: -self.mantissa,
            ..self
        }
    }
}

impl PartialEq for ExtFloat {
    fn eq(&self, other: &Self) -> bool {
        (self.clone() - other.clone()).is_zero()
    }
}

impl fmt::Display for ExtFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let digits = self.mantissa.magnitude().to_str_radix(10);
        let sign = if self.is_negative() { "-" } else { "" };
        let exp = self.exponent.saturating_add(digits.len() as i64 - 1);
        let (lead, rest) = digits.split_at(1);
        let rest = rest.trim_end_matches('0');
        if rest.is_empty() {
            write!(f, "{sign}{lead}e{exp}")
        } else {
            write!(f, "{sign}{lead}.{rest}e{exp}")
        }
    }
}
