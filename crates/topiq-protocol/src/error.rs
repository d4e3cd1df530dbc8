use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid decimal {input:?}: {reason}")]
    InvalidDecimal { input: String, reason: &'static str },

    #[error("decimal {0:?} overflows the fixed-point range")]
    DecimalOverflow(String),

    #[error("invalid topic id {0:?}")]
    InvalidTopicId(String),

    #[error("invalid nonce {input:?}: {reason}")]
    InvalidNonce { input: String, reason: String },

    #[error("malformed {kind}: {reason}")]
    MalformedEnvelope { kind: &'static str, reason: String },

    #[error("{kind} is missing {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("topic mismatch: bundle carries topic {found}, expected {expected}")]
    TopicMismatch { expected: u64, found: u64 },

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
}
