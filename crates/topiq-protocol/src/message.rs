use serde::{Deserialize, Serialize};

use crate::{
    topic::TopicId,
    types::{amount_string, Nonce, ReputerRequestNonce, ReputerValueBundle, WorkerDataBundle},
};

// ============================================================================
// Ledger transaction messages
// ============================================================================

/// Register the sender for a set of topics. `initial_stake` is only present on
/// the very first registration of an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRegister {
    pub sender: String,
    pub libp2p_key: String,
    pub multi_address: String,
    pub topic_ids: Vec<TopicId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "amount_string::option"
    )]
    pub initial_stake: Option<u128>,
    pub owner: String,
    pub is_reputer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRemoveRegistration {
    pub sender: String,
    pub topic_id: TopicId,
    pub is_reputer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgInsertBulkWorkerPayload {
    pub sender: String,
    pub nonce: Nonce,
    pub topic_id: TopicId,
    pub worker_data_bundles: Vec<WorkerDataBundle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgInsertBulkReputerPayload {
    pub sender: String,
    pub reputer_request_nonce: ReputerRequestNonce,
    pub topic_id: TopicId,
    pub reputer_value_bundles: Vec<ReputerValueBundle>,
}

/// Every message this node broadcasts, tagged with its type URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum TxMsg {
    #[serde(rename = "/emissions.v1.MsgRegister")]
    Register(MsgRegister),
    #[serde(rename = "/emissions.v1.MsgRemoveRegistration")]
    RemoveRegistration(MsgRemoveRegistration),
    #[serde(rename = "/emissions.v1.MsgInsertBulkWorkerPayload")]
    InsertBulkWorkerPayload(MsgInsertBulkWorkerPayload),
    #[serde(rename = "/emissions.v1.MsgInsertBulkReputerPayload")]
    InsertBulkReputerPayload(MsgInsertBulkReputerPayload),
}

impl TxMsg {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TxMsg::Register(_) => "register",
            TxMsg::RemoveRegistration(_) => "remove_registration",
            TxMsg::InsertBulkWorkerPayload(_) => "insert_bulk_worker_payload",
            TxMsg::InsertBulkReputerPayload(_) => "insert_bulk_reputer_payload",
        }
    }

    /// Canonical bytes the broadcaster signs.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Ledger acknowledgement of a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    pub tx_hash: String,
    /// 0 on success; anything else is an application-level rejection.
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_tagged_and_stake_is_optional() {
        let mut msg = MsgRegister {
            sender: "addr".into(),
            libp2p_key: "12D3Koo".into(),
            multi_address: "/ip4/127.0.0.1/tcp/9000".into(),
            topic_ids: vec![1, 2],
            initial_stake: None,
            owner: "addr".into(),
            is_reputer: false,
        };
        let json = serde_json::to_value(TxMsg::Register(msg.clone())).unwrap();
        assert_eq!(json["@type"], "/emissions.v1.MsgRegister");
        assert!(json.get("initial_stake").is_none());

        msg.initial_stake = Some(100);
        let json = serde_json::to_value(TxMsg::Register(msg.clone())).unwrap();
        assert_eq!(json["initial_stake"], "100");

        let back: TxMsg = serde_json::from_value(json).unwrap();
        assert_eq!(back, TxMsg::Register(msg));
    }

    #[test]
    fn kind_names_every_variant() {
        let msg = TxMsg::RemoveRegistration(MsgRemoveRegistration {
            sender: "a".into(),
            topic_id: 9,
            is_reputer: false,
        });
        assert_eq!(msg.kind(), "remove_registration");
        assert!(!msg.sign_bytes().unwrap().is_empty());
    }
}
