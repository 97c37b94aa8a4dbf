use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A partial signature for a multi-party escrow spend.
///
/// `index` identifies which of the required signers produced it. Combining
/// signatures into a satisfying witness is the chain client's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowSignature {
    pub index: usize,
    pub signature: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct EscrowSignatureJson {
    index: usize,
    signature: String,
}

impl EscrowSignature {
    pub fn new(index: usize, signature: impl Into<Vec<u8>>) -> Self {
        EscrowSignature {
            index,
            signature: signature.into(),
        }
    }

    /// Order signatures by signer index, the order multisig scripts expect.
    pub fn sort_by_index(sigs: &mut [EscrowSignature]) {
        sigs.sort_by_key(|s| s.index);
    }

    /// Distinct signer indices present, ascending.
    pub fn signer_indices(sigs: &[EscrowSignature]) -> Vec<usize> {
        let mut indices: Vec<usize> = sigs.iter().map(|s| s.index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl Serialize for EscrowSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EscrowSignatureJson {
            index: self.index,
            signature: hex::encode(&self.signature),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EscrowSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let j = EscrowSignatureJson::deserialize(deserializer)?;
        let signature = hex::decode(&j.signature)
            .map_err(|e| D::Error::custom(format!("signature is not hex: {e}")))?;
        Ok(EscrowSignature {
            index: j.index,
            signature,
        })
    }
}
