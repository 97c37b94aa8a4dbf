use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WalletError;

/// A monetary value in the chain's smallest unit (satoshi, wei, piconero).
///
/// Always encoded as a base-10 integer string so values wider than 64 bits
/// never lose precision.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigInt);

impl Amount {
    /// Wrap any integer convertible to `BigInt`.
    pub fn new(value: impl Into<BigInt>) -> Self {
        Amount(value.into())
    }

    pub fn zero() -> Self {
        Amount(BigInt::from(0u8))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigInt::from(0u8)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < BigInt::from(0u8)
    }

    /// Borrow the underlying arbitrary-precision value.
    pub fn as_big_int(&self) -> &BigInt {
        &self.0
    }

    /// Consume the amount, returning its `BigInt`.
    pub fn into_big_int(self) -> BigInt {
        self.0
    }
}

/// Optional sign followed by at least one ASCII digit.
///
/// `BigInt::from_str` alone is too lenient: it skips `_` separators.
fn is_base10(s: &str) -> bool {
    let digits = s
        .strip_prefix('-')
        .or_else(|| s.strip_prefix('+'))
        .unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_base10(s) {
            return Err(WalletError::Format(format!("amount is not base 10: {s:?}")));
        }
        BigInt::from_str(s)
            .map(Amount)
            .map_err(|e| WalletError::Format(format!("amount is not base 10: {e}")))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Amount(BigInt::from(v))
    }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Amount(BigInt::from(v))
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Amount(BigInt::from(v))
    }
}

impl From<BigInt> for Amount {
    fn from(v: BigInt) -> Self {
        Amount(v)
    }
}

impl TryFrom<&Amount> for u64 {
    type Error = WalletError;

    fn try_from(amount: &Amount) -> Result<Self, Self::Error> {
        u64::try_from(&amount.0)
            .map_err(|_| WalletError::Format(format!("amount {amount} does not fit in u64")))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn add(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |acc, a| acc + a)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integer() {
        let a: Amount = "12345".parse().unwrap();
        assert_eq!(a, Amount::from(12345u64));
    }

    #[test]
    fn round_trips_values_wider_than_u128() {
        let inputs = [
            "0",
            "-1",
            "18446744073709551616",
            "340282366920938463463374607431768211457",
            "-99999999999999999999999999999999999999999999",
        ];
        for s in inputs {
            let a: Amount = s.parse().unwrap();
            assert_eq!(a.to_string(), s);
            assert_eq!(a.to_string().parse::<Amount>().unwrap(), a);
        }
    }

    #[test]
    fn leading_plus_is_accepted_and_dropped() {
        let a: Amount = "+42".parse().unwrap();
        assert_eq!(a.to_string(), "42");
    }

    #[test]
    fn rejects_non_integers() {
        for s in ["", "-", "12.5", "1e9", "1_000", "0x10", " 7", "7 ", "abc", "1,000"] {
            let err = s.parse::<Amount>().unwrap_err();
            assert!(matches!(err, WalletError::Format(_)), "{s:?} should be rejected");
        }
    }

    #[test]
    fn sign_is_preserved() {
        let a = Amount::from(-250i64);
        assert!(a.is_negative());
        assert_eq!(a.to_string(), "-250");
    }

    #[test]
    fn arithmetic() {
        let total: Amount = vec![Amount::from(1u64), Amount::from(2u64), Amount::from(3u64)]
            .into_iter()
            .sum();
        assert_eq!(total, Amount::from(6u64));
        assert_eq!(&total + &Amount::from(4u64), Amount::from(10u64));
        assert_eq!(total - Amount::from(7u64), Amount::from(-1i64));
    }

    #[test]
    fn converts_to_u64_when_in_range() {
        assert_eq!(u64::try_from(&Amount::from(7u64)).unwrap(), 7);
        assert!(u64::try_from(&Amount::from(-7i64)).is_err());
        let big: Amount = "18446744073709551616".parse().unwrap();
        assert!(u64::try_from(&big).is_err());
    }

    #[test]
    fn serializes_as_string() {
        let a: Amount = "100000000000000000000".parse().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"100000000000000000000\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn numeric_json_literal_is_rejected() {
        assert!(serde_json::from_str::<Amount>("100").is_err());
        assert!(serde_json::from_str::<Amount>("\"1.5\"").is_err());
    }

    #[test]
    fn zero_and_default_agree() {
        assert_eq!(Amount::default(), Amount::zero());
        assert!(Amount::zero().is_zero());
    }

    #[test]
    fn new_wraps_the_big_int() {
        let amount = Amount::new(-42i64);
        assert_eq!(amount.as_big_int(), &BigInt::from(-42));
        assert_eq!(amount.into_big_int(), BigInt::from(-42));
    }
}
