use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("response decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transaction {tx_hash} rejected with code {code}: {raw_log}")]
    TxRejected {
        tx_hash: String,
        code: u32,
        raw_log: String,
    },
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl LedgerError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LedgerError::Cancelled | LedgerError::Keyring(_))
    }
}
