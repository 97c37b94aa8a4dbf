use thiserror::Error;

/// Errors surfaced across the wallet/chain-backend boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Malformed serialized data (bad hex, non-base-10 numeric string).
    #[error("format error: {0}")]
    Format(String),

    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The queried transaction, address or block is unknown to the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected the request for domain reasons.
    #[error("backend error: {0}")]
    Backend(String),

    /// The caller violated the contract, e.g. querying a closed client.
    #[error("usage error: {0}")]
    Usage(String),

    /// The coin type is not in the registry or not served by this backend.
    #[error("unsupported coin: {0}")]
    UnsupportedCoin(String),
}

impl WalletError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Only connectivity failures qualify; a backend rejection needs a
    /// different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Connection(_))
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(e: hex::FromHexError) -> Self {
        WalletError::Format(format!("invalid hex: {e}"))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Format(e.to_string())
    }
}
