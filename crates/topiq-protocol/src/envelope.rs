//! Schemas for the JSON that peer processes print on stdout.
//!
//! Worker processes print a [`WorkerDataEnvelope`]. Reputer processes print a
//! [`LossEnvelope`] whose `value` field is itself a JSON document
//! ([`PeerValueBundle`]) serialized into a string.
//!
//! Field names are snake_case; camelCase spellings are accepted as aliases.

use serde::{Deserialize, Deserializer};

use crate::{
    dec::Dec,
    error::ProtocolError,
    topic::TopicId,
    types::{
        Nonce, ValueBundle, WithheldWorkerAttributedValue, WorkerAttributedValue,
        WorkerDataBundle,
    },
};

// ============================================================================
// Worker output
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerDataEnvelope {
    #[serde(default, alias = "workerDataBundle")]
    pub worker_data_bundle: Option<WorkerDataBundle>,
    #[serde(default, alias = "blockHeight")]
    pub block_height: Option<i64>,
    #[serde(default, alias = "topicId")]
    pub topic_id: Option<TopicId>,
}

impl WorkerDataEnvelope {
    pub fn parse(stdout: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(stdout).map_err(|e| ProtocolError::MalformedEnvelope {
            kind: "worker data envelope",
            reason: e.to_string(),
        })
    }

    pub fn nonce(&self) -> Option<Nonce> {
        self.block_height.map(Nonce::new)
    }

    /// Extract the bundle if it is complete and belongs to `topic_id`.
    ///
    /// The inference/forecast bundle must be present; when it carries an
    /// inference, that inference's topic must match.
    pub fn into_bundle_for(self, topic_id: TopicId) -> Result<WorkerDataBundle, ProtocolError> {
        let bundle = self.worker_data_bundle.ok_or(ProtocolError::MissingField {
            kind: "worker data envelope",
            field: "worker_data_bundle",
        })?;
        let inner = bundle
            .inference_forecasts_bundle
            .as_ref()
            .ok_or(ProtocolError::MissingField {
                kind: "worker data bundle",
                field: "inference_forecasts_bundle",
            })?;
        if let Some(inference) = &inner.inference {
            if inference.topic_id != topic_id {
                return Err(ProtocolError::TopicMismatch {
                    expected: topic_id,
                    found: inference.topic_id,
                });
            }
        }
        Ok(bundle)
    }
}

// ============================================================================
// Reputer output
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LossEnvelope {
    /// JSON-encoded [`PeerValueBundle`].
    pub value: String,
    /// Block height of the evaluated round, as printed by the reputer.
    #[serde(deserialize_with = "string_or_number")]
    pub nonce: String,
}

impl LossEnvelope {
    pub fn parse(stdout: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(stdout).map_err(|e| ProtocolError::MalformedEnvelope {
            kind: "loss envelope",
            reason: e.to_string(),
        })
    }

    pub fn value_bundle(&self) -> Result<PeerValueBundle, ProtocolError> {
        serde_json::from_str(&self.value).map_err(|e| ProtocolError::MalformedEnvelope {
            kind: "nested value bundle",
            reason: e.to_string(),
        })
    }

    pub fn parse_nonce(&self) -> Result<Nonce, ProtocolError> {
        self.nonce
            .parse::<i64>()
            .map(Nonce::new)
            .map_err(|e| ProtocolError::InvalidNonce {
                input: self.nonce.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerAttributedValue {
    pub worker: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

/// Loss/value data as printed by a reputer, before decimal conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerValueBundle {
    #[serde(alias = "combinedValue", deserialize_with = "string_or_number")]
    pub combined_value: String,
    #[serde(alias = "naiveValue", deserialize_with = "string_or_number")]
    pub naive_value: String,
    #[serde(default, alias = "infererValues")]
    pub inferer_values: Vec<PeerAttributedValue>,
    #[serde(default, alias = "forecasterValues")]
    pub forecaster_values: Vec<PeerAttributedValue>,
    #[serde(default, alias = "oneOutInfererValues")]
    pub one_out_inferer_values: Vec<PeerAttributedValue>,
    #[serde(default, alias = "oneOutForecasterValues")]
    pub one_out_forecaster_values: Vec<PeerAttributedValue>,
    #[serde(default, alias = "oneInForecasterValues")]
    pub one_in_forecaster_values: Vec<PeerAttributedValue>,
}

impl PeerValueBundle {
    /// Convert every value into the ledger decimal type. The first value that
    /// does not parse fails the whole bundle.
    pub fn into_value_bundle(self, topic_id: TopicId) -> Result<ValueBundle, ProtocolError> {
        fn attributed(values: Vec<PeerAttributedValue>) -> Result<Vec<WorkerAttributedValue>, ProtocolError> {
            values
                .into_iter()
                .map(|v| Ok(WorkerAttributedValue { value: v.value.parse::<Dec>()?, worker: v.worker }))
                .collect()
        }
        fn withheld(values: Vec<PeerAttributedValue>) -> Result<Vec<WithheldWorkerAttributedValue>, ProtocolError> {
            values
                .into_iter()
                .map(|v| Ok(WithheldWorkerAttributedValue { value: v.value.parse::<Dec>()?, worker: v.worker }))
                .collect()
        }

        Ok(ValueBundle {
            topic_id,
            combined_value: self.combined_value.parse()?,
            naive_value: self.naive_value.parse()?,
            inferer_values: attributed(self.inferer_values)?,
            forecaster_values: attributed(self.forecaster_values)?,
            one_out_inferer_values: withheld(self.one_out_inferer_values)?,
            one_out_forecaster_values: withheld(self.one_out_forecaster_values)?,
            one_in_forecaster_values: attributed(self.one_in_forecaster_values)?,
        })
    }
}

/// Accept `"0.5"` as well as `0.5`; numbers keep their JSON spelling.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKER_OK: &str = r#"{
        "worker_data_bundle": {
            "worker": "w1",
            "inference_forecasts_bundle": {
                "inference": {"topic_id": 7, "block_height": 100, "inferer": "w1", "value": "2.5"}
            }
        },
        "block_height": 100,
        "topic_id": 7
    }"#;

    #[test]
    fn worker_envelope_yields_bundle_for_matching_topic() {
        let env = WorkerDataEnvelope::parse(WORKER_OK).unwrap();
        assert_eq!(env.nonce(), Some(Nonce::new(100)));
        let bundle = env.into_bundle_for(7).unwrap();
        let inference = bundle.inference_forecasts_bundle.unwrap().inference.unwrap();
        assert_eq!(inference.value, "2.5".parse().unwrap());
    }

    #[test]
    fn worker_envelope_rejects_other_topic() {
        let env = WorkerDataEnvelope::parse(WORKER_OK).unwrap();
        assert!(matches!(
            env.into_bundle_for(8),
            Err(ProtocolError::TopicMismatch { expected: 8, found: 7 })
        ));
    }

    #[test]
    fn worker_envelope_requires_inner_bundle() {
        let env = WorkerDataEnvelope::parse(r#"{"blockHeight": 5, "workerDataBundle": {"worker": "w"}}"#)
            .unwrap();
        assert_eq!(env.nonce(), Some(Nonce::new(5)));
        assert!(matches!(
            env.into_bundle_for(1),
            Err(ProtocolError::MissingField { field: "inference_forecasts_bundle", .. })
        ));

        let env = WorkerDataEnvelope::parse("{}").unwrap();
        assert_eq!(env.nonce(), None);
        assert!(env.into_bundle_for(1).is_err());
    }

    #[test]
    fn worker_value_with_huge_exponent_is_a_parse_error() {
        let stdout = WORKER_OK.replace("\"2.5\"", "\"1e-9223372036854775808\"");
        assert!(matches!(
            WorkerDataEnvelope::parse(&stdout),
            Err(ProtocolError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn forecast_only_bundle_is_accepted() {
        let env = WorkerDataEnvelope::parse(
            r#"{"worker_data_bundle": {"inference_forecasts_bundle": {"forecast": {"topic_id": 3, "forecast_elements": [{"inferer": "a", "value": 1}]}}}}"#,
        )
        .unwrap();
        assert!(env.into_bundle_for(9).is_ok());
    }

    #[test]
    fn loss_envelope_and_nested_bundle() {
        let nested = r#"{"combinedValue": 0.5, "naiveValue": "0.25",
            "infererValues": [{"worker": "w1", "value": "0.1"}],
            "one_out_forecaster_values": [{"worker": "w2", "value": "1e-2"}]}"#;
        let stdout = serde_json::json!({ "value": nested, "nonce": "42" }).to_string();

        let env = LossEnvelope::parse(&stdout).unwrap();
        assert_eq!(env.parse_nonce().unwrap(), Nonce::new(42));

        let bundle = env.value_bundle().unwrap().into_value_bundle(3).unwrap();
        assert_eq!(bundle.topic_id, 3);
        assert_eq!(bundle.combined_value.to_string(), "0.5");
        assert_eq!(bundle.inferer_values[0].worker, "w1");
        assert_eq!(bundle.one_out_forecaster_values[0].value.to_string(), "0.01");
        assert!(bundle.forecaster_values.is_empty());
    }

    #[test]
    fn loss_envelope_errors_are_typed() {
        assert!(LossEnvelope::parse("not json").is_err());

        let env = LossEnvelope::parse(r#"{"value": "{oops", "nonce": "x1"}"#).unwrap();
        assert!(matches!(
            env.value_bundle(),
            Err(ProtocolError::MalformedEnvelope { kind: "nested value bundle", .. })
        ));
        assert!(matches!(env.parse_nonce(), Err(ProtocolError::InvalidNonce { .. })));
    }

    #[test]
    fn bad_decimal_fails_conversion() {
        let env = LossEnvelope::parse(
            r#"{"value": "{\"combined_value\": \"abc\", \"naive_value\": \"1\"}", "nonce": 7}"#,
        )
        .unwrap();
        assert_eq!(env.nonce, "7");
        assert!(env.value_bundle().unwrap().into_value_bundle(1).is_err());
    }
}
