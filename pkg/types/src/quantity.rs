//! Resource quantities in the Kubernetes notation (`500m`, `1.5`, `512Mi`, `10G`).
//!
//! A [`Quantity`] is stored as an integral number of milli-units so that CPU
//! (`250m`) and byte counts (`2Gi`) share one comparable representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a quantity string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The input was empty or only whitespace.
    #[error("quantity cannot be empty")]
    Empty,

    /// The numeric part could not be read.
    #[error("invalid quantity '{0}': malformed number")]
    InvalidNumber(String),

    /// The suffix is not a known decimal or binary SI suffix.
    #[error("invalid quantity '{input}': unknown suffix '{suffix}'")]
    UnknownSuffix { input: String, suffix: String },

    /// The value does not fit in the supported range.
    #[error("quantity '{0}' is out of range")]
    Overflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    millis: u64,
}

const KI: u128 = 1 << 10;

fn multiplier(suffix: &str) -> Option<u128> {
    // Multiplier expressed in milli-units.
    let m = match suffix {
        "m" => 1,
        "" => 1_000,
        "k" => 1_000 * 1_000,
        "M" => 1_000 * 1_000_000,
        "G" => 1_000 * 1_000_000_000,
        "T" => 1_000 * 1_000_000_000_000,
        "P" => 1_000 * 1_000_000_000_000_000,
        "E" => 1_000 * 1_000_000_000_000_000_000,
        "Ki" => 1_000 * KI,
        "Mi" => 1_000 * KI.pow(2),
        "Gi" => 1_000 * KI.pow(3),
        "Ti" => 1_000 * KI.pow(4),
        "Pi" => 1_000 * KI.pow(5),
        "Ei" => 1_000 * KI.pow(6),
        _ => return None,
    };
    Some(m)
}

impl Quantity {
    pub const ZERO: Quantity = Quantity { millis: 0 };

    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Quantity of `value` whole units (bytes, cores, ...).
    pub fn from_value(value: u64) -> Self {
        Self {
            millis: value.saturating_mul(1_000),
        }
    }

    /// Parse a quantity such as `512Mi`, `0.5`, `250m` or `10G`.
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }
        let s = s.strip_prefix('+').unwrap_or(s);

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);

        let (whole, frac) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(QuantityError::InvalidNumber(input.to_string()));
        }

        let mult = multiplier(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
            input: input.to_string(),
            suffix: suffix.to_string(),
        })?;

        let overflow = || QuantityError::Overflow(input.to_string());
        let digits = format!("{}{}", whole, frac);
        let mantissa: u128 = digits.parse().map_err(|_| overflow())?;
        let scale = 10u128
            .checked_pow(frac.len() as u32)
            .ok_or_else(overflow)?;

        // Round sub-milli remainders up, as the cluster does.
        let scaled = mantissa.checked_mul(mult).ok_or_else(overflow)?;
        let millis = scaled.div_ceil(scale);
        let millis = u64::try_from(millis).map_err(|_| overflow())?;
        Ok(Self { millis })
    }

    pub fn milli_value(&self) -> u64 {
        self.millis
    }

    /// Value in whole units, rounded up.
    pub fn value(&self) -> u64 {
        self.millis.div_ceil(1_000)
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    pub fn add(&mut self, other: Quantity) {
        self.millis = self.millis.saturating_add(other.millis);
    }

    /// `n` copies of this quantity, saturating at the largest representable value.
    pub fn times(self, n: u32) -> Quantity {
        Self {
            millis: self.millis.saturating_mul(u64::from(n)),
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quantity::parse(s)
    }
}

impl TryFrom<String> for Quantity {
    type Error = QuantityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Quantity::parse(&value)
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis % 1_000 != 0 {
            return write!(f, "{}m", self.millis);
        }
        let value = self.millis / 1_000;
        for (suffix, unit) in [("Ei", 60), ("Pi", 50), ("Ti", 40), ("Gi", 30), ("Mi", 20), ("Ki", 10)] {
            let unit = 1u64 << unit;
            if value >= unit && value % unit == 0 {
                return write!(f, "{}{}", value / unit, suffix);
            }
        }
        write!(f, "{}", value)
    }
}
