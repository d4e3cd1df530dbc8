//! Results handed over by the distributed execution engine.
//!
//! Peers that produced byte-identical output are grouped; every peer in a
//! group shares the group's runtime output.

use libp2p::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGroup {
    pub peers: Vec<PeerId>,
    pub result: RuntimeOutput,
}

pub type ExecutionResults = Vec<ResultGroup>;
