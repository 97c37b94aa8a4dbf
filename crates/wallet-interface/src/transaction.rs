use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::Address;
use crate::amount::Amount;
use crate::block::BlockInfo;
use crate::error::WalletError;

/// Opaque transaction identifier in the chain's own encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        TransactionId::new(id)
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        TransactionId(id)
    }
}

/// One input or output of a transaction.
///
/// `id` is backend metadata sufficient to reconstruct the spend reference;
/// for a UTXO chain input it is typically a serialized outpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendInfo {
    pub id: Vec<u8>,
    pub address: Address,
    pub amount: Amount,
}

#[derive(Serialize, Deserialize)]
struct SpendInfoJson {
    id: String,
    address: Address,
    amount: String,
}

impl Serialize for SpendInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SpendInfoJson {
            id: hex::encode(&self.id),
            address: self.address.clone(),
            amount: self.amount.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpendInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let j = SpendInfoJson::deserialize(deserializer)?;
        let id = hex::decode(&j.id).map_err(|e| D::Error::custom(format!("id is not hex: {e}")))?;
        let amount = j.amount.parse::<Amount>().map_err(D::Error::custom)?;
        Ok(SpendInfo {
            id,
            address: j.address,
            amount,
        })
    }
}

impl SpendInfo {
    pub fn to_json(&self) -> Result<Vec<u8>, WalletError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, WalletError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A chain-agnostic transaction record.
///
/// When spending from a multisig, the `to` entries of the funding
/// transaction are used as the `from` entries of the spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: Vec<SpendInfo>,
    pub to: Vec<SpendInfo>,
    pub value: Amount,
    /// Zero while unconfirmed.
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    /// `None` while unconfirmed.
    pub block_info: Option<BlockInfo>,
}

#[derive(Serialize, Deserialize)]
struct TransactionJson {
    #[serde(rename = "transactionID")]
    id: String,
    from: Vec<SpendInfo>,
    to: Vec<SpendInfo>,
    value: String,
    height: u64,
    timestamp: DateTime<Utc>,
    #[serde(
        rename = "blockInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    block_info: Option<BlockInfo>,
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TransactionJson {
            id: self.id.to_string(),
            from: self.from.clone(),
            to: self.to.clone(),
            value: self.value.to_string(),
            height: self.height,
            timestamp: self.timestamp,
            block_info: self.block_info.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let j = TransactionJson::deserialize(deserializer)?;
        let value = j.value.parse::<Amount>().map_err(D::Error::custom)?;
        Ok(Transaction {
            id: TransactionId(j.id),
            from: j.from,
            to: j.to,
            value,
            height: j.height,
            timestamp: j.timestamp,
            block_info: j.block_info,
        })
    }
}

impl Transaction {
    pub fn to_json(&self) -> Result<Vec<u8>, WalletError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode the interchange format. Any malformed field is a `Format` error.
    pub fn from_json(bytes: &[u8]) -> Result<Self, WalletError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn is_confirmed(&self) -> bool {
        self.height > 0 && self.block_info.is_some()
    }

    /// Whether any input or output pays from or to `addr`.
    pub fn touches(&self, addr: &Address) -> bool {
        self.from
            .iter()
            .chain(self.to.iter())
            .any(|s| &s.address == addr)
    }

    /// Confirmation count relative to a chain tip; zero while unconfirmed.
    pub fn confirmations(&self, tip_height: u64) -> u64 {
        if !self.is_confirmed() || tip_height < self.height {
            return 0;
        }
        tip_height - self.height + 1
    }
}
