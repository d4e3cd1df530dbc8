//! Ledger gateway client.
//!
//! The gateway speaks JSON-RPC 2.0 over HTTP (`POST <gateway_url>`).
//! Methods used:
//!   broadcastTx               — verify signature, wrap message in a tx, broadcast
//!   getRegisteredTopicIds     — topics an address is registered for (per role)
//!   getWorkerAddressByP2PKey  — ledger address registered for a worker peer
//!   getReputerAddressByP2PKey — ledger address registered for a reputer peer
//!   getBankBalances           — paginated account balances

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use topiq_protocol::{
    message::TxResponse,
    topic::TopicId,
    types::{Coin, PageRequest},
    TxMsg,
};

use crate::{error::LedgerError, keyring::Keyring};

/// Everything the node agent needs from the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Sign `msg` with the keyring account `account` and broadcast it.
    async fn broadcast_tx(&self, account: &str, msg: &TxMsg) -> Result<TxResponse, LedgerError>;

    async fn registered_topic_ids(
        &self,
        address: &str,
        is_reputer: bool,
    ) -> Result<Vec<TopicId>, LedgerError>;

    async fn worker_address_by_p2p_key(&self, libp2p_key: &str) -> Result<String, LedgerError>;

    async fn reputer_address_by_p2p_key(&self, libp2p_key: &str) -> Result<String, LedgerError>;

    async fn bank_balances(
        &self,
        address: &str,
        page: PageRequest,
    ) -> Result<Vec<Coin>, LedgerError>;
}

// ============================================================================
// JSON-RPC primitives
// ============================================================================

#[derive(Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Gateway error code for "no such record".
const RPC_NOT_FOUND: i64 = -32004;

// ============================================================================
// Method-specific types
// ============================================================================

#[derive(Serialize)]
struct BroadcastParams<'a> {
    msg: &'a TxMsg,
    /// Hex ed25519 public key of the signing account.
    pubkey: String,
    /// Hex ed25519 signature over sha256(JSON(msg)).
    signature: String,
}

#[derive(Serialize)]
struct RegisteredTopicsParams<'a> {
    address: &'a str,
    is_reputer: bool,
}

#[derive(Deserialize)]
struct RegisteredTopicsResult {
    #[serde(default)]
    topic_ids: Vec<TopicId>,
}

#[derive(Serialize)]
struct P2PKeyParams<'a> {
    libp2p_key: &'a str,
}

#[derive(Deserialize)]
struct AddressResult {
    address: String,
}

#[derive(Serialize)]
struct BalancesParams<'a> {
    address: &'a str,
    pagination: PageRequest,
}

#[derive(Deserialize)]
struct BalancesResult {
    #[serde(default)]
    balances: Vec<Coin>,
}

// ============================================================================
// HttpLedgerClient
// ============================================================================

/// JSON-RPC client for a ledger gateway node. Transactions are signed locally
/// through the supplied keyring; the gateway never sees private keys.
pub struct HttpLedgerClient {
    url: String,
    http: reqwest::Client,
    keyring: Arc<dyn Keyring>,
    next_id: AtomicU64,
}

impl HttpLedgerClient {
    pub fn new(url: &str, keyring: Arc<dyn Keyring>) -> Self {
        Self {
            url: url.to_owned(),
            http: reqwest::Client::new(),
            keyring,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, LedgerError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp: JsonRpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| LedgerError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        match (resp.result, resp.error) {
            (_, Some(e)) if e.code == RPC_NOT_FOUND => {
                Err(LedgerError::NotFound(format!("{method}: {}", e.message)))
            }
            (_, Some(e)) => Err(LedgerError::Rpc(format!(
                "{method} failed: code={} msg={}",
                e.code, e.message
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(LedgerError::Rpc(format!(
                "{method} failed: no result and no error"
            ))),
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn broadcast_tx(&self, account: &str, msg: &TxMsg) -> Result<TxResponse, LedgerError> {
        let bytes = msg
            .sign_bytes()
            .map_err(|e| LedgerError::Decode(format!("encode {}: {e}", msg.kind())))?;
        let digest = Sha256::digest(&bytes);
        let signature = self.keyring.sign(account, &digest)?;
        let pubkey = self.keyring.public_key(account)?;

        let params = BroadcastParams {
            msg,
            pubkey: hex::encode(pubkey),
            signature: hex::encode(signature),
        };
        let resp: TxResponse = self.call("broadcastTx", params).await?;
        if resp.code != 0 {
            return Err(LedgerError::TxRejected {
                tx_hash: resp.tx_hash,
                code: resp.code,
                raw_log: resp.raw_log,
            });
        }
        tracing::debug!(tx_hash = %resp.tx_hash, kind = msg.kind(), "Gateway accepted transaction");
        Ok(resp)
    }

    async fn registered_topic_ids(
        &self,
        address: &str,
        is_reputer: bool,
    ) -> Result<Vec<TopicId>, LedgerError> {
        let result: RegisteredTopicsResult = self
            .call("getRegisteredTopicIds", RegisteredTopicsParams { address, is_reputer })
            .await?;
        Ok(result.topic_ids)
    }

    async fn worker_address_by_p2p_key(&self, libp2p_key: &str) -> Result<String, LedgerError> {
        let result: AddressResult = self
            .call("getWorkerAddressByP2PKey", P2PKeyParams { libp2p_key })
            .await?;
        Ok(result.address)
    }

    async fn reputer_address_by_p2p_key(&self, libp2p_key: &str) -> Result<String, LedgerError> {
        let result: AddressResult = self
            .call("getReputerAddressByP2PKey", P2PKeyParams { libp2p_key })
            .await?;
        Ok(result.address)
    }

    async fn bank_balances(
        &self,
        address: &str,
        page: PageRequest,
    ) -> Result<Vec<Coin>, LedgerError> {
        let result: BalancesResult = self
            .call("getBankBalances", BalancesParams { address, pagination: page })
            .await?;
        Ok(result.balances)
    }
}
