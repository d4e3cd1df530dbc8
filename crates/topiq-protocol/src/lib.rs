pub mod constants;
pub mod dec;
pub mod envelope;
pub mod error;
pub mod message;
pub mod topic;
pub mod types;

pub use constants::*;
pub use dec::Dec;
pub use error::ProtocolError;
pub use message::TxMsg;
pub use topic::{ReconciliationPlan, TopicId, TopicSet};
