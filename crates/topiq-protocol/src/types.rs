use serde::{Deserialize, Serialize};

use crate::{dec::Dec, topic::TopicId};

// ============================================================================
// Nonces
// ============================================================================

/// Block height correlating a submission with one round of off-chain work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce {
    pub block_height: i64,
}

impl Nonce {
    pub fn new(block_height: i64) -> Self {
        Self { block_height }
    }
}

/// Nonce pair carried by a reputer payload: the reputer round and the worker
/// round being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputerRequestNonce {
    pub reputer_nonce: Nonce,
    pub worker_nonce: Nonce,
}

// ============================================================================
// Worker payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub topic_id: TopicId,
    #[serde(default)]
    pub block_height: i64,
    #[serde(default)]
    pub inferer: String,
    pub value: Dec,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra_data: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proof: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastElement {
    pub inferer: String,
    pub value: Dec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub topic_id: TopicId,
    #[serde(default)]
    pub block_height: i64,
    #[serde(default)]
    pub forecaster: String,
    #[serde(default)]
    pub forecast_elements: Vec<ForecastElement>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceForecastBundle {
    #[serde(default)]
    pub inference: Option<Inference>,
    #[serde(default)]
    pub forecast: Option<Forecast>,
}

/// One worker's contribution to a bulk worker payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDataBundle {
    #[serde(default)]
    pub worker: String,
    #[serde(default)]
    pub inference_forecasts_bundle: Option<InferenceForecastBundle>,
    /// Worker's own signature over the bundle, passed through untouched.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inferences_forecasts_bundle_signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pubkey: String,
}

// ============================================================================
// Reputer payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAttributedValue {
    pub worker: String,
    pub value: Dec,
}

/// Value computed with one worker withheld from the ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithheldWorkerAttributedValue {
    pub worker: String,
    pub value: Dec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBundle {
    pub topic_id: TopicId,
    pub combined_value: Dec,
    pub naive_value: Dec,
    pub inferer_values: Vec<WorkerAttributedValue>,
    pub forecaster_values: Vec<WorkerAttributedValue>,
    pub one_out_inferer_values: Vec<WithheldWorkerAttributedValue>,
    pub one_out_forecaster_values: Vec<WithheldWorkerAttributedValue>,
    pub one_in_forecaster_values: Vec<WorkerAttributedValue>,
}

/// A value bundle plus this node's signature over the round nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputerValueBundle {
    pub value_bundle: ValueBundle,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

// ============================================================================
// Accounts
// ============================================================================

/// An account balance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self { denom: denom.into(), amount }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

// ============================================================================
// Serde helpers
// ============================================================================

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Integer amounts travel as decimal strings so they survive JSON number limits.
pub(crate) mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::error::ProtocolError;

    pub fn serialize<S: Serializer>(amount: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom(ProtocolError::InvalidAmount(s)))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(amount: &Option<u128>, s: S) -> Result<S::Ok, S::Error> {
            match amount {
                Some(a) => s.collect_str(a),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u128>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| s.parse().map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
