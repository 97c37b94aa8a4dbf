use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coin_type::CoinType;

/// A chain address. The string is opaque and only meaningful together with
/// its coin type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "address")]
    addr: String,
    #[serde(rename = "cointype")]
    coin_type: CoinType,
}

impl Address {
    /// Address `addr` on the chain identified by `coin_type`.
    pub fn new(addr: impl Into<String>, coin_type: CoinType) -> Self {
        Address {
            addr: addr.into(),
            coin_type,
        }
    }

    /// The address string as the chain encodes it.
    pub fn as_str(&self) -> &str {
        &self.addr
    }

    pub fn coin_type(&self) -> &CoinType {
        &self.coin_type
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}
