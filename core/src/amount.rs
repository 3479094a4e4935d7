//! Fixed-point decimal used for access-unit balances, prices and quantities.
//!
//! Values carry exactly four fractional digits and are stored as a signed
//! count of ten-thousandths, so balances never drift the way floats do.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{AgroError, Result};

/// Number of fractional digits kept by [`Amount`]
pub const AMOUNT_SCALE: u32 = 4;

const SCALE_FACTOR: i64 = 10_000;

/// Decimal value with four fractional digits.
///
/// # Examples
///
/// ```rust
/// use agro_core::Amount;
///
/// let balance: Amount = "12.5".parse().unwrap();
/// assert_eq!(balance.to_string(), "12.5000");
/// assert_eq!(balance.scaled(), 125_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Build from a raw count of ten-thousandths
    pub const fn from_scaled(scaled: i64) -> Self {
        Self(scaled)
    }

    /// Build from a whole number of units
    pub const fn from_units(units: i64) -> Self {
        Self(units * SCALE_FACTOR)
    }

    /// Raw count of ten-thousandths, as persisted in the database
    pub const fn scaled(&self) -> i64 {
        self.0
    }

    /// Round a float to the nearest representable amount
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(AgroError::Validation(format!(
                "amount must be a finite number, got {value}"
            )));
        }
        let scaled = (value * SCALE_FACTOR as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return Err(AgroError::Validation(format!("amount {value} is out of range")));
        }
        Ok(Self(scaled as i64))
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / SCALE_FACTOR as f64
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Number of significant fractional digits (0 to 4)
    pub fn fractional_digits(&self) -> u32 {
        let mut frac = (self.0 % SCALE_FACTOR).abs();
        if frac == 0 {
            return 0;
        }
        let mut digits = AMOUNT_SCALE;
        while frac % 10 == 0 {
            frac /= 10;
            digits -= 1;
        }
        digits
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Multiply two amounts, rounding half away from zero to four places
    pub fn checked_mul(self, other: Amount) -> Option<Amount> {
        let product = self.0 as i128 * other.0 as i128;
        let factor = SCALE_FACTOR as i128;
        let half = factor / 2;
        let rounded = if product >= 0 {
            (product + half) / factor
        } else {
            (product - half) / factor
        };
        i64::try_from(rounded).ok().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let factor = SCALE_FACTOR as u64;
        write!(f, "{sign}{}.{:04}", abs / factor, abs % factor)
    }
}

impl FromStr for Amount {
    type Err = AgroError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AgroError::Validation(format!("invalid decimal amount: '{s}'"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (digits, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac_part.len() > AMOUNT_SCALE as usize {
            return Err(AgroError::Validation(format!(
                "amount '{s}' has more than {AMOUNT_SCALE} decimal places"
            )));
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let mut frac: i64 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| invalid())?
        };
        for _ in frac_part.len()..AMOUNT_SCALE as usize {
            frac *= 10;
        }

        let scaled = whole
            .checked_mul(SCALE_FACTOR)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(invalid)?;

        Ok(Self(if negative { -scaled } else { scaled }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal number or a decimal string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Amount, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Amount, E> {
                v.checked_mul(SCALE_FACTOR)
                    .map(Amount)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Amount, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(SCALE_FACTOR))
                    .map(Amount)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Amount, E> {
                Amount::from_f64(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
