use std::collections::HashMap;

use ed25519_dalek::{Signer, SigningKey};

use crate::error::LedgerError;

/// Signing surface over named accounts.
pub trait Keyring: Send + Sync {
    /// Detached signature over `msg` with the named account's key.
    fn sign(&self, account: &str, msg: &[u8]) -> Result<Vec<u8>, LedgerError>;

    /// Raw public key bytes of the named account.
    fn public_key(&self, account: &str) -> Result<Vec<u8>, LedgerError>;
}

/// In-memory ed25519 keyring.
#[derive(Default)]
pub struct LocalKeyring {
    keys: HashMap<String, SigningKey>,
}

impl LocalKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, account: impl Into<String>, key: SigningKey) -> Self {
        self.keys.insert(account.into(), key);
        self
    }

    fn key(&self, account: &str) -> Result<&SigningKey, LedgerError> {
        self.keys
            .get(account)
            .ok_or_else(|| LedgerError::Keyring(format!("unknown account {account:?}")))
    }
}

impl Keyring for LocalKeyring {
    fn sign(&self, account: &str, msg: &[u8]) -> Result<Vec<u8>, LedgerError> {
        Ok(self.key(account)?.sign(msg).to_bytes().to_vec())
    }

    fn public_key(&self, account: &str) -> Result<Vec<u8>, LedgerError> {
        Ok(self.key(account)?.verifying_key().to_bytes().to_vec())
    }
}
