//! Native currency amounts
//!
//! Values are fixed-point integers with 18 decimal places, the same
//! granularity the chain's native token (STT) uses. 1 STT = 10^18 atomic units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw atomic unit representation.
pub type AtomicUnits = u128;

/// Number of decimal places for native token precision.
pub const NATIVE_DECIMALS: u32 = 18;

/// Conversion factor: 1 token = 10^18 atomic units.
pub const ATOMIC_PER_TOKEN: AtomicUnits = 10u128.pow(NATIVE_DECIMALS);

/// Ticker shown when formatting amounts.
pub const NATIVE_SYMBOL: &str = "STT";

/// Errors raised when parsing a decimal amount string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount string is empty")]
    Empty,
    #[error("invalid digit in amount: {0}")]
    InvalidDigit(String),
    #[error("amount has more than 18 decimal places")]
    TooPrecise,
    #[error("amount overflows 128-bit atomic units")]
    Overflow,
}

/// An amount of native currency in atomic units.
///
/// Serialised as a decimal string of atomic units, since JSON numbers do not
/// carry 128 bits reliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub AtomicUnits);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_atomic(atomic: AtomicUnits) -> Self {
        Self(atomic)
    }

    /// Whole tokens, saturating on overflow.
    pub fn from_tokens(tokens: u64) -> Self {
        Self((tokens as u128).saturating_mul(ATOMIC_PER_TOKEN))
    }

    /// Parse a decimal token string such as `"1.5"` into atomic units.
    pub fn parse_tokens(input: &str) -> Result<Self, AmountError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, fraction) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::Empty);
        }
        if fraction.len() > NATIVE_DECIMALS as usize {
            return Err(AmountError::TooPrecise);
        }

        let parse_digits = |digits: &str| -> Result<u128, AmountError> {
            if digits.is_empty() {
                return Ok(0);
            }
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AmountError::InvalidDigit(input.to_string()));
            }
            digits.parse::<u128>().map_err(|_| AmountError::Overflow)
        };

        let whole_units = parse_digits(whole)?
            .checked_mul(ATOMIC_PER_TOKEN)
            .ok_or(AmountError::Overflow)?;
        let scale = 10u128.pow(NATIVE_DECIMALS - fraction.len() as u32);
        let fraction_units = parse_digits(fraction)? * scale;

        whole_units
            .checked_add(fraction_units)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Decimal token string without the ticker, e.g. `"1.5"`.
    pub fn format_tokens(&self) -> String {
        let whole = self.0 / ATOMIC_PER_TOKEN;
        let fraction = self.0 % ATOMIC_PER_TOKEN;
        if fraction == 0 {
            return whole.to_string();
        }
        let digits = format!("{:018}", fraction);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }

    pub fn atomic(&self) -> AtomicUnits {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {NATIVE_SYMBOL}", self.format_tokens())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_tokens(s)
    }
}

impl From<AtomicUnits> for Amount {
    fn from(atomic: AtomicUnits) -> Self {
        Self(atomic)
    }
}

impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<AtomicUnits>()
            .map(Amount)
            .map_err(|_| serde::de::Error::custom(format!("invalid atomic amount: {raw}")))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_whole_and_fractional_tokens() {
        assert_eq!(Amount::parse_tokens("1").unwrap(), Amount::from_tokens(1));
        assert_eq!(
            Amount::parse_tokens("1.5").unwrap().atomic(),
            ATOMIC_PER_TOKEN + ATOMIC_PER_TOKEN / 2
        );
        assert_eq!(Amount::parse_tokens(".25").unwrap().atomic(), ATOMIC_PER_TOKEN / 4);
        assert_eq!(Amount::parse_tokens("0.000000000000000001").unwrap().atomic(), 1);
        assert!(Amount::parse_tokens("0").unwrap().is_zero());
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Amount::parse_tokens("").unwrap_err(), AmountError::Empty);
        assert_eq!(Amount::parse_tokens(".").unwrap_err(), AmountError::Empty);
        assert!(matches!(
            Amount::parse_tokens("1.2.3").unwrap_err(),
            AmountError::InvalidDigit(_)
        ));
        assert!(matches!(
            Amount::parse_tokens("-1").unwrap_err(),
            AmountError::InvalidDigit(_)
        ));
        assert_eq!(
            Amount::parse_tokens("0.0000000000000000001").unwrap_err(),
            AmountError::TooPrecise
        );
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::from_tokens(1).to_string(), "1 STT");
        assert_eq!(Amount::parse_tokens("2.50").unwrap().to_string(), "2.5 STT");
        assert_eq!(Amount::from_atomic(1).to_string(), "0.000000000000000001 STT");
        assert_eq!(Amount::ZERO.to_string(), "0 STT");
        assert_eq!(Amount::parse_tokens("0.75").unwrap().format_tokens(), "0.75");
    }

    #[test]
    fn checked_arithmetic() {
        let one = Amount::from_tokens(1);
        assert_eq!(one.checked_sub(Amount::from_tokens(2)), None);
        assert_eq!(Amount(u128::MAX).checked_add(Amount(1)), None);
        let total: Amount = [one, one, Amount::from_atomic(5)].into_iter().sum();
        assert_eq!(total.atomic(), 2 * ATOMIC_PER_TOKEN + 5);
    }

    #[test]
    fn serialises_as_atomic_string() {
        let amount = Amount::from_tokens(2);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"2000000000000000000\"");
        assert_eq!(serde_json::from_str::<Amount>(&json).unwrap(), amount);
        assert!(serde_json::from_str::<Amount>("\"1.5\"").is_err());
    }

    proptest! {
        #[test]
        fn formatted_amounts_parse_back(atomic in any::<u128>()) {
            let amount = Amount::from_atomic(atomic);
            prop_assert_eq!(Amount::parse_tokens(&amount.format_tokens()).unwrap(), amount);
        }
    }
}
