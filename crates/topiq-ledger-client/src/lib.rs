// topiq-ledger-client: JSON-RPC client for the ledger gateway.
// Broadcasts signed transactions and answers the registration, peer-address
// and balance queries the node agent needs.

pub mod client;
pub mod error;
pub mod keyring;

pub use client::{HttpLedgerClient, LedgerClient};
pub use error::LedgerError;
pub use keyring::{Keyring, LocalKeyring};
