use clap::Parser;
use std::path::PathBuf;

use topiq_protocol::{
    DEFAULT_MAX_DELAY_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY_SECS, DEFAULT_STAKE_DENOM,
};

use crate::{identity::NodeRole, submit::RetryPolicy};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "topiq-node",
    about = "topiq node agent — keeps topic registration in sync and submits peer results to the ledger"
)]
pub struct Config {
    /// Ledger role of this node.
    #[arg(long, value_enum, env = "TOPIQ_ROLE", default_value = "worker")]
    pub role: NodeRole,

    /// Topics this node wants to serve (comma separated or repeated).
    /// Non-numeric entries are ignored with a warning.
    #[arg(long = "topics", env = "TOPIQ_TOPICS", value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Stake attached to the first registration, in `--stake-denom` units.
    #[arg(long, env = "TOPIQ_INITIAL_STAKE", default_value_t = 0)]
    pub initial_stake: u128,

    /// Balance denomination the initial stake is checked against.
    #[arg(long, env = "TOPIQ_STAKE_DENOM", default_value = DEFAULT_STAKE_DENOM)]
    pub stake_denom: String,

    /// Ledger gateway JSON-RPC endpoint.
    #[arg(long, env = "TOPIQ_GATEWAY_URL", default_value = "http://127.0.0.1:26657")]
    pub gateway_url: String,

    /// Keyring account name the node signs with.
    #[arg(long, env = "TOPIQ_ACCOUNT_NAME", default_value = "topiq-node")]
    pub account_name: String,

    /// Path to the 32-byte Ed25519 secret key file.
    #[arg(long, env = "TOPIQ_KEYPAIR_PATH", default_value = "topiq-identity.key")]
    pub keypair_path: PathBuf,

    /// Multiaddress advertised in the on-chain registration.
    #[arg(long, env = "TOPIQ_MULTIADDR", default_value = "")]
    pub multiaddr: String,

    /// Result-ingestion API listen address, e.g. 127.0.0.1:8080.
    /// If absent, the API server is not started.
    #[arg(long, env = "TOPIQ_API_ADDR")]
    pub api_addr: Option<String>,

    /// Bearer token required on POST routes of the API.
    #[arg(long, env = "TOPIQ_API_SECRET")]
    pub api_secret: Option<String>,

    /// Build and log transactions without broadcasting them.
    #[arg(long, env = "TOPIQ_NO_SUBMIT_TX", default_value = "false")]
    pub no_submit_tx: bool,

    /// Retries after the first attempt for every transaction.
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Lower bound of the randomized base backoff (seconds).
    #[arg(long, default_value_t = DEFAULT_MIN_DELAY_SECS)]
    pub min_delay_secs: u64,

    /// Upper bound of the randomized base backoff (seconds).
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY_SECS)]
    pub max_delay_secs: u64,
}

impl Config {
    pub fn retry_policy(&self) -> anyhow::Result<RetryPolicy> {
        RetryPolicy::new(self.max_retries, self.min_delay_secs, self.max_delay_secs)
            .map_err(|e| anyhow::anyhow!("invalid retry policy: {e}"))
    }

    pub fn submit_tx(&self) -> bool {
        !self.no_submit_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_topics_and_role() {
        let cfg = Config::try_parse_from([
            "topiq-node",
            "--role",
            "reputer",
            "--topics",
            "1,2,x",
            "--topics",
            "9",
            "--initial-stake",
            "100",
        ])
        .unwrap();
        assert_eq!(cfg.role, NodeRole::Reputer);
        assert_eq!(cfg.topics, vec!["1", "2", "x", "9"]);
        assert_eq!(cfg.initial_stake, 100);
        assert_eq!(cfg.stake_denom, "uallo");
        assert!(cfg.submit_tx());
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(Config::try_parse_from(["topiq-node", "--role", "validator"]).is_err());
    }

    #[test]
    fn retry_policy_bounds_are_checked() {
        let cfg = Config::try_parse_from([
            "topiq-node",
            "--min-delay-secs",
            "5",
            "--max-delay-secs",
            "1",
        ])
        .unwrap();
        assert!(cfg.retry_policy().is_err());
    }
}
