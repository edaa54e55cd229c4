use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DIGITS, MIN_DIGITS};
use crate::error::{PhiError, Result};

/// Numeric representation an evaluator works in. Fixed for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Standard,
    Extended { digits: u32 },
}

/// Evaluator settings, loadable from TOML:
///
/// ```toml
/// analytic_solution = true
/// digits = 80
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhiConfig {
    /// Evaluate in extended precision instead of f64.
    pub analytic_solution: bool,
    /// Significant decimal digits of the extended-precision path.
    pub digits: u32,
}

impl Default for PhiConfig {
    fn default() -> Self {
        Self {
            analytic_solution: false,
            digits: DEFAULT_DIGITS,
        }
    }
}

impl PhiConfig {
    pub fn standard() -> Self {
        Self::default()
    }

    pub fn extended(digits: u32) -> Self {
        Self {
            analytic_solution: true,
            digits,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.digits < MIN_DIGITS {
            return Err(PhiError::InvalidConfig(format!(
                "digits must be at least {MIN_DIGITS}, got {}",
                self.digits
            )));
        }
        Ok(())
    }

    pub fn precision(&self) -> Precision {
        if self.analytic_solution {
            Precision::Extended {
                digits: self.digits,
            }
        } else {
            Precision::Standard
        }
    }
}
