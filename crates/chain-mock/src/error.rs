use thiserror::Error;
use wallet_interface::WalletError;

/// Mock chain operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    #[error("backend unreachable")]
    Unreachable,

    #[error("broadcast rejected: {0}")]
    Rejected(String),

    #[error("invalid transaction encoding: {0}")]
    InvalidEncoding(String),

    #[error("transaction already known: {0}")]
    DuplicateTransaction(String),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("cannot reorg {depth} blocks with tip at height {tip}")]
    ReorgTooDeep { depth: u64, tip: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The next block's timestamp would leave chrono's representable range.
    #[error("block time overflows at height {height}")]
    ClockOverflow { height: u64 },
}

impl From<MockError> for WalletError {
    fn from(e: MockError) -> Self {
        match e {
            MockError::Unreachable => WalletError::Connection(e.to_string()),
            MockError::UnknownTransaction(_) => WalletError::NotFound(e.to_string()),
            MockError::Rejected(_)
            | MockError::InvalidEncoding(_)
            | MockError::DuplicateTransaction(_)
            | MockError::ClockOverflow { .. } => WalletError::Backend(e.to_string()),
            MockError::ReorgTooDeep { .. } => WalletError::Usage(e.to_string()),
            MockError::InvalidConfig(_) => WalletError::Format(e.to_string()),
        }
    }
}
