use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WalletError;

/// A cryptocurrency that implements the wallet interface.
///
/// Any code is representable. Whether it names a supported chain is a
/// registry question (`is_registered`), which callers that need a known
/// chain must ask themselves. Two coin types are equal when their currency
/// codes are, so `"btc"` and `"BTC"` name the same chain.
#[derive(Debug, Clone)]
pub struct CoinType(Cow<'static, str>);

impl CoinType {
    pub const MOCK: CoinType = CoinType(Cow::Borrowed("MCK"));
    pub const BITCOIN: CoinType = CoinType(Cow::Borrowed("BTC"));
    pub const BITCOIN_CASH: CoinType = CoinType(Cow::Borrowed("BCH"));
    pub const LITECOIN: CoinType = CoinType(Cow::Borrowed("LTC"));
    pub const ZCASH: CoinType = CoinType(Cow::Borrowed("ZEC"));
    pub const ETHEREUM: CoinType = CoinType(Cow::Borrowed("ETH"));
    pub const MONERO: CoinType = CoinType(Cow::Borrowed("XMR"));
    pub const DASH: CoinType = CoinType(Cow::Borrowed("DASH"));
    pub const BNB: CoinType = CoinType(Cow::Borrowed("BNB"));

    /// Coin type for an arbitrary code; it need not be registered.
    pub fn new(code: impl Into<String>) -> Self {
        CoinType(Cow::Owned(code.into()))
    }

    /// The code exactly as it was constructed.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical uppercase code used for display and interchange.
    pub fn currency_code(&self) -> String {
        self.0.to_uppercase()
    }

    /// Registry lookup by currency code, case-insensitive.
    pub fn from_currency_code(code: &str) -> Option<CoinType> {
        find_by_code(code).map(|info| CoinType(Cow::Borrowed(info.code)))
    }

    pub fn info(&self) -> Option<&'static CoinInfo> {
        find_by_code(&self.0)
    }

    pub fn is_registered(&self) -> bool {
        self.info().is_some()
    }

    /// Reject codes that are not in the registry.
    pub fn require_registered(&self) -> Result<(), WalletError> {
        if self.is_registered() {
            Ok(())
        } else {
            Err(WalletError::UnsupportedCoin(self.currency_code()))
        }
    }
}

impl PartialEq for CoinType {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 || self.currency_code() == other.currency_code()
    }
}

impl Eq for CoinType {}

impl Hash for CoinType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.currency_code().hash(state);
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.currency_code())
    }
}

impl From<&str> for CoinType {
    fn from(code: &str) -> Self {
        CoinType::new(code)
    }
}

impl Serialize for CoinType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.currency_code())
    }
}

impl<'de> Deserialize<'de> for CoinType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(CoinType::new)
    }
}

/// Static description of a registered coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoinInfo {
    pub code: &'static str,
    pub name: &'static str,
    /// Decimal places between the smallest unit and one whole coin.
    pub decimals: u8,
}

pub const MOCK: CoinInfo = CoinInfo {
    code: "MCK",
    name: "Mock",
    decimals: 8,
};

pub const BITCOIN: CoinInfo = CoinInfo {
    code: "BTC",
    name: "Bitcoin",
    decimals: 8,
};

pub const BITCOIN_CASH: CoinInfo = CoinInfo {
    code: "BCH",
    name: "Bitcoin Cash",
    decimals: 8,
};

pub const LITECOIN: CoinInfo = CoinInfo {
    code: "LTC",
    name: "Litecoin",
    decimals: 8,
};

pub const ZCASH: CoinInfo = CoinInfo {
    code: "ZEC",
    name: "Zcash",
    decimals: 8,
};

pub const ETHEREUM: CoinInfo = CoinInfo {
    code: "ETH",
    name: "Ethereum",
    decimals: 18,
};

pub const MONERO: CoinInfo = CoinInfo {
    code: "XMR",
    name: "Monero",
    decimals: 12,
};

pub const DASH: CoinInfo = CoinInfo {
    code: "DASH",
    name: "Dash",
    decimals: 8,
};

pub const BNB: CoinInfo = CoinInfo {
    code: "BNB",
    name: "BNB",
    decimals: 18,
};

/// All registered coins. Extend by adding an entry here and a matching
/// `CoinType` constant.
pub const ALL_COINS: &[&CoinInfo] = &[
    &MOCK,
    &BITCOIN,
    &BITCOIN_CASH,
    &LITECOIN,
    &ZCASH,
    &ETHEREUM,
    &MONERO,
    &DASH,
    &BNB,
];

/// Returns the registry entry for a currency code, or `None` if unregistered.
pub fn find_by_code(code: &str) -> Option<&'static CoinInfo> {
    let code = code.to_uppercase();
    ALL_COINS.iter().find(|c| c.code == code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_code_is_uppercase() {
        assert_eq!(CoinType::new("btc").currency_code(), "BTC");
        assert_eq!(CoinType::new("Dash").currency_code(), "DASH");
    }

    #[test]
    fn as_str_keeps_original_case() {
        assert_eq!(CoinType::new("btc").as_str(), "btc");
    }

    #[test]
    fn display_uses_currency_code() {
        assert_eq!(CoinType::new("xmr").to_string(), "XMR");
    }

    #[test]
    fn equality_ignores_case() {
        assert_eq!(CoinType::new("btc"), CoinType::BITCOIN);
        assert_ne!(CoinType::new("btc"), CoinType::BITCOIN_CASH);
    }

    #[test]
    fn hash_agrees_with_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(CoinType::new("eth"));
        assert!(set.contains(&CoinType::ETHEREUM));
    }

    #[test]
    fn registry_lookup() {
        assert_eq!(CoinType::from_currency_code("LTC"), Some(CoinType::LITECOIN));
        assert_eq!(CoinType::from_currency_code("zec"), Some(CoinType::ZCASH));
        assert!(CoinType::from_currency_code("DOGE").is_none());
    }

    #[test]
    fn registry_has_all_codes() {
        let codes: Vec<_> = ALL_COINS.iter().map(|c| c.code).collect();
        assert_eq!(
            codes,
            vec!["MCK", "BTC", "BCH", "LTC", "ZEC", "ETH", "XMR", "DASH", "BNB"]
        );
    }

    #[test]
    fn every_constant_is_registered() {
        for ct in [
            CoinType::MOCK,
            CoinType::BITCOIN,
            CoinType::BITCOIN_CASH,
            CoinType::LITECOIN,
            CoinType::ZCASH,
            CoinType::ETHEREUM,
            CoinType::MONERO,
            CoinType::DASH,
            CoinType::BNB,
        ] {
            assert!(ct.is_registered(), "{ct} should be registered");
        }
    }

    #[test]
    fn unknown_code_is_representable_but_unregistered() {
        let doge = CoinType::new("doge");
        assert_eq!(doge.currency_code(), "DOGE");
        assert!(!doge.is_registered());
        assert_eq!(
            doge.require_registered(),
            Err(WalletError::UnsupportedCoin("DOGE".into()))
        );
    }

    #[test]
    fn info_reports_decimals() {
        assert_eq!(CoinType::ETHEREUM.info().map(|i| i.decimals), Some(18));
        assert_eq!(CoinType::new("btc").info().map(|i| i.name), Some("Bitcoin"));
    }

    #[test]
    fn serializes_as_uppercase_code() {
        let json = serde_json::to_string(&CoinType::new("bch")).unwrap();
        assert_eq!(json, "\"BCH\"");
    }

    #[test]
    fn deserializes_code_as_given() {
        let ct: CoinType = serde_json::from_str("\"Foo\"").unwrap();
        assert_eq!(ct.as_str(), "Foo");
        assert!(!ct.is_registered());
    }
}
