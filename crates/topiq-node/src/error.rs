use thiserror::Error;

use topiq_ledger_client::LedgerError;
use topiq_protocol::{ProtocolError, TopicId};

/// Why a registration pass ended without aligning on-chain state.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("failed to fetch registered topics for {address}: {source}")]
    FetchTopics {
        address: String,
        #[source]
        source: LedgerError,
    },

    #[error("failed to list balances for {address}: {source}")]
    FetchBalances {
        address: String,
        #[source]
        source: LedgerError,
    },

    #[error("account {address} has no balances; fund it before registering")]
    AccountUnfunded { address: String },

    #[error("insufficient stake: balance {balance} < required {required}")]
    InsufficientStake { balance: u128, required: u128 },

    #[error("no valid topics configured; nothing to register")]
    NothingToRegister,

    #[error("register transaction failed: {0}")]
    Register(#[source] LedgerError),

    #[error("failed to remove registration for topic {topic_id}: {source}")]
    Deregister {
        topic_id: TopicId,
        #[source]
        source: LedgerError,
    },
}

/// Pass-level failures of the reputer aggregator. Peer-level problems are
/// logged and never surface here.
#[derive(Debug, Error)]
pub enum ReputerError {
    #[error("malformed value bundle from peer {peer}: {source}")]
    NestedValueBundle {
        peer: String,
        #[source]
        source: ProtocolError,
    },

    #[error("bulk reputer payload submission failed: {0}")]
    Submit(#[from] LedgerError),
}
