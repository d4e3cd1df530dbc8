//! In-memory collaborators for node tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use libp2p::{identity, PeerId};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use topiq_ledger_client::{Keyring, LedgerClient, LedgerError, LocalKeyring};
use topiq_protocol::{
    message::{MsgRemoveRegistration, TxResponse},
    types::{Coin, PageRequest},
    TopicId, TxMsg,
};

use crate::{
    execution::{ResultGroup, RuntimeOutput},
    identity::{NodeIdentity, NodeRole},
    pipeline::Pipeline,
    submit::RetryPolicy,
};

pub const ACCOUNT: &str = "node";

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

pub fn peer(seed: u8) -> PeerId {
    identity::Keypair::ed25519_from_bytes([seed; 32])
        .unwrap()
        .public()
        .to_peer_id()
}

pub fn identity(role: NodeRole) -> NodeIdentity {
    NodeIdentity::new(&signing_key(), ACCOUNT, role)
}

/// Result group whose peers all printed `stdout`.
pub fn group(peers: Vec<PeerId>, stdout: impl Into<String>) -> ResultGroup {
    ResultGroup {
        peers,
        result: RuntimeOutput { stdout: stdout.into(), ..Default::default() },
    }
}

pub fn remove_registration(topic_id: TopicId) -> TxMsg {
    TxMsg::RemoveRegistration(MsgRemoveRegistration {
        sender: "addr".into(),
        topic_id,
        is_reputer: false,
    })
}

/// Pipeline over `ledger` with an immediate, single-attempt retry policy.
pub fn pipeline(ledger: Arc<MockLedger>, role: NodeRole) -> Pipeline {
    pipeline_with_keyring(
        ledger,
        role,
        Arc::new(LocalKeyring::new().with_key(ACCOUNT, signing_key())),
    )
}

pub fn pipeline_with_keyring(
    ledger: Arc<MockLedger>,
    role: NodeRole,
    keyring: Arc<dyn Keyring>,
) -> Pipeline {
    Pipeline {
        ledger,
        keyring,
        identity: Arc::new(identity(role)),
        policy: RetryPolicy::new(0, 0, 0).unwrap(),
        cancel: CancellationToken::new(),
        submit_tx: true,
    }
}

// ============================================================================
// MockLedger
// ============================================================================

/// Scriptable ledger. Broadcasts succeed with `TX<n>` (n = 1-based call index)
/// unless a scripted result is queued.
#[derive(Default)]
pub struct MockLedger {
    on_chain_topics: Vec<TopicId>,
    fail_topic_query: bool,
    balances: Vec<Coin>,
    fail_balance_query: bool,
    worker_addresses: HashMap<String, String>,
    reputer_addresses: HashMap<String, String>,
    script: Mutex<VecDeque<Result<TxResponse, LedgerError>>>,
    broadcasts: Mutex<Vec<TxMsg>>,
    balance_pages: Mutex<Vec<PageRequest>>,
    calls: AtomicUsize,
    notify: Option<mpsc::UnboundedSender<TxMsg>>,
    gate: Option<Arc<Notify>>,
}

impl MockLedger {
    pub fn on_chain(mut self, topics: &[TopicId]) -> Self {
        self.on_chain_topics = topics.to_vec();
        self
    }

    pub fn failing_topic_query(mut self) -> Self {
        self.fail_topic_query = true;
        self
    }

    pub fn balances(mut self, balances: Vec<Coin>) -> Self {
        self.balances = balances;
        self
    }

    pub fn failing_balance_query(mut self) -> Self {
        self.fail_balance_query = true;
        self
    }

    pub fn worker(mut self, peer: PeerId, address: &str) -> Self {
        self.worker_addresses.insert(peer.to_base58(), address.to_owned());
        self
    }

    pub fn reputer(mut self, peer: PeerId, address: &str) -> Self {
        self.reputer_addresses.insert(peer.to_base58(), address.to_owned());
        self
    }

    pub fn script_broadcasts(
        self,
        results: impl IntoIterator<Item = Result<TxResponse, LedgerError>>,
    ) -> Self {
        self.script
            .lock()
            .unwrap()
            .extend(results);
        self
    }

    /// Forward every broadcast message to the returned receiver.
    pub fn notifying(mut self) -> (Self, mpsc::UnboundedReceiver<TxMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify = Some(tx);
        (self, rx)
    }

    /// Hold every broadcast until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn broadcast_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn broadcasts(&self) -> Vec<TxMsg> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn balance_pages(&self) -> Vec<PageRequest> {
        self.balance_pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn broadcast_tx(&self, _account: &str, msg: &TxMsg) -> Result<TxResponse, LedgerError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.broadcasts.lock().unwrap().push(msg.clone());
        if let Some(tx) = &self.notify {
            let _ = tx.send(msg.clone());
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(TxResponse { tx_hash: format!("TX{n}"), code: 0, raw_log: String::new() })
        })
    }

    async fn registered_topic_ids(
        &self,
        _address: &str,
        _is_reputer: bool,
    ) -> Result<Vec<TopicId>, LedgerError> {
        if self.fail_topic_query {
            return Err(LedgerError::Http("connection refused".into()));
        }
        Ok(self.on_chain_topics.clone())
    }

    async fn worker_address_by_p2p_key(&self, libp2p_key: &str) -> Result<String, LedgerError> {
        self.worker_addresses
            .get(libp2p_key)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("worker {libp2p_key}")))
    }

    async fn reputer_address_by_p2p_key(&self, libp2p_key: &str) -> Result<String, LedgerError> {
        self.reputer_addresses
            .get(libp2p_key)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("reputer {libp2p_key}")))
    }

    async fn bank_balances(
        &self,
        _address: &str,
        page: PageRequest,
    ) -> Result<Vec<Coin>, LedgerError> {
        self.balance_pages.lock().unwrap().push(page);
        if self.fail_balance_query {
            return Err(LedgerError::Rpc("balances unavailable".into()));
        }
        Ok(self.balances.clone())
    }
}

// ============================================================================
// Keyrings
// ============================================================================

/// Signs successfully `remaining` times, then fails every call.
pub struct FlakyKeyring {
    inner: LocalKeyring,
    remaining: AtomicUsize,
}

impl FlakyKeyring {
    pub fn new(successes: usize) -> Self {
        Self {
            inner: LocalKeyring::new().with_key(ACCOUNT, signing_key()),
            remaining: AtomicUsize::new(successes),
        }
    }
}

impl Keyring for FlakyKeyring {
    fn sign(&self, account: &str, msg: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(LedgerError::Keyring("keyring locked".into()));
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        self.inner.sign(account, msg)
    }

    fn public_key(&self, account: &str) -> Result<Vec<u8>, LedgerError> {
        self.inner.public_key(account)
    }
}
