use ed25519_dalek::{SigningKey, VerifyingKey};
use libp2p::{identity, PeerId};
use rand::rngs::OsRng;
use std::path::Path;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Ledger role the node registers and submits as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Produces inferences/forecasts.
    Worker,
    /// Evaluates worker output (losses).
    Reputer,
}

impl NodeRole {
    pub fn is_reputer(self) -> bool {
        matches!(self, NodeRole::Reputer)
    }
}

/// Process-wide node identity. Built once at startup and shared read-only.
///
/// The same Ed25519 secret backs the ledger account (through the keyring) and
/// the libp2p peer id other nodes know this node by.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    /// Ledger address (base58 of the verifying key).
    pub address: String,
    /// Keyring account name used for every signature.
    pub account_name: String,
    pub role: NodeRole,
    /// libp2p peer id registered on-chain as the node's p2p key.
    pub peer_id: PeerId,
}

impl NodeIdentity {
    pub fn new(signing_key: &SigningKey, account_name: impl Into<String>, role: NodeRole) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            address: ledger_address(&verifying_key),
            account_name: account_name.into(),
            role,
            peer_id: to_libp2p_keypair(signing_key).public().to_peer_id(),
        }
    }
}

pub fn ledger_address(verifying_key: &VerifyingKey) -> String {
    bs58::encode(verifying_key.to_bytes()).into_string()
}

// ============================================================================
// Key file
// ============================================================================

pub fn save_key(key: &SigningKey, path: &Path) -> anyhow::Result<()> {
    use std::io::Write;
    // mode 0o600: owner read/write only.
    #[cfg(unix)]
    let mut file = std::fs::OpenOptions::new()
        .write(true).create(true).truncate(true).mode(0o600)
        .open(path)?;
    #[cfg(not(unix))]
    let mut file = std::fs::OpenOptions::new()
        .write(true).create(true).truncate(true)
        .open(path)?;
    file.write_all(&key.to_bytes())?;
    Ok(())
}

pub fn load_key(path: &Path) -> anyhow::Result<SigningKey> {
    let bytes = std::fs::read(path)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("invalid key file: expected 32 bytes"))?;
    Ok(SigningKey::from_bytes(&arr))
}

pub fn load_or_generate_key(path: &Path) -> anyhow::Result<SigningKey> {
    if path.exists() {
        let key = load_key(path)?;
        tracing::info!(
            address = %ledger_address(&key.verifying_key()),
            "Loaded node key from {:?}", path,
        );
        Ok(key)
    } else {
        let key = SigningKey::generate(&mut OsRng);
        save_key(&key, path)?;
        tracing::info!(
            address = %ledger_address(&key.verifying_key()),
            "Generated new node key, saved to {:?}", path,
        );
        Ok(key)
    }
}

fn to_libp2p_keypair(signing_key: &SigningKey) -> identity::Keypair {
    let mut bytes = signing_key.to_bytes();
    let secret = identity::ed25519::SecretKey::try_from_bytes(&mut bytes)
        .expect("32-byte ed25519 secret is always valid");
    identity::Keypair::from(identity::ed25519::Keypair::from(secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_round_trip_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");

        let first = load_or_generate_key(&path).unwrap();
        let second = load_or_generate_key(&path).unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());

        let a = NodeIdentity::new(&first, "node", NodeRole::Worker);
        let b = NodeIdentity::new(&second, "node", NodeRole::Worker);
        assert_eq!(a.address, b.address);
        assert_eq!(a.peer_id, b.peer_id);
    }

    #[test]
    fn truncated_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.key");
        std::fs::write(&path, [1u8; 16]).unwrap();
        assert!(load_key(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.key");
        load_or_generate_key(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn role_flags() {
        assert!(NodeRole::Reputer.is_reputer());
        assert!(!NodeRole::Worker.is_reputer());
    }
}
