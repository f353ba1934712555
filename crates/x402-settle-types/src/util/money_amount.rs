//! Human-readable USD prices.
//!
//! Challenges are priced in dollars (`"$0.01"`, `"1,000.50"`) but settled in
//! token atomic units (`"10000"` for one cent of 6-decimal USDC). [`MoneyAmount`]
//! does the conversion without ever touching floating point.
//!
//! ```rust
//! use x402_settle_types::util::MoneyAmount;
//!
//! let price = MoneyAmount::parse("$0.01").unwrap();
//! assert_eq!(price.to_atomic_units(6).unwrap(), 10_000);
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

/// A non-negative decimal amount, parsed from a human-readable string.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        constants::MIN_STR,
        constants::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the token supports.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision { money: u32, token: u32 },
}

mod constants {
    use super::*;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

/// Anything that is not a digit, a dot, or a minus sign.
static NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));

impl MoneyAmount {
    /// Parses a price, stripping currency symbols, thousands separators and whitespace.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = NOISE.replace_all(input, "");
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;
        Self::try_from(parsed)
    }

    /// Decimal places of the amount, trailing zeros ignored.
    pub fn scale(&self) -> u32 {
        self.0.normalize().scale()
    }

    /// Converts to integer atomic units of a token with `decimals` places.
    ///
    /// Fails with [`MoneyAmountParseError::WrongPrecision`] rather than rounding
    /// when the amount is finer than the token can express.
    pub fn to_atomic_units(&self, decimals: u8) -> Result<u128, MoneyAmountParseError> {
        let normalized = self.0.normalize();
        let scale = normalized.scale();
        let decimals = u32::from(decimals);
        if scale > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token: decimals,
            });
        }
        let mantissa = normalized.mantissa().unsigned_abs();
        10u128
            .checked_pow(decimals - scale)
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or(MoneyAmountParseError::OutOfRange)
    }
}

impl TryFrom<Decimal> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyAmountParseError::Negative);
        }
        if value < *constants::MIN || value > *constants::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(MoneyAmount(value))
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
