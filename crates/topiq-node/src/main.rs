mod api;
mod config;
mod error;
mod execution;
mod identity;
mod pipeline;
mod registration;
mod reputer;
mod submit;
#[cfg(test)]
mod testing;
mod worker;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use topiq_ledger_client::{HttpLedgerClient, Keyring, LedgerClient, LocalKeyring};

use crate::{
    identity::{NodeIdentity, NodeRole},
    pipeline::Pipeline,
    registration::RegistrationSettings,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topiq_node=info")),
        )
        .init();

    let config = config::Config::parse();
    let policy = config.retry_policy()?;
    let api_addr: Option<SocketAddr> = config
        .api_addr
        .as_deref()
        .map(|a| a.parse().with_context(|| format!("invalid --api-addr {a:?}")))
        .transpose()?;

    let signing_key = identity::load_or_generate_key(&config.keypair_path)?;
    let identity = Arc::new(NodeIdentity::new(&signing_key, &config.account_name, config.role));

    tracing::info!(
        address = %identity.address,
        peer_id = %identity.peer_id,
        role    = ?identity.role,
        gateway = %config.gateway_url,
        dry_run = config.no_submit_tx,
        "topiq node starting",
    );

    let keyring: Arc<dyn Keyring> =
        Arc::new(LocalKeyring::new().with_key(config.account_name.clone(), signing_key));
    let ledger: Arc<dyn LedgerClient> =
        Arc::new(HttpLedgerClient::new(&config.gateway_url, keyring.clone()));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                cancel.cancel();
            }
        });
    }

    let pipeline = Pipeline {
        ledger,
        keyring,
        identity,
        policy,
        cancel: cancel.clone(),
        submit_tx: config.submit_tx(),
    };

    if config.role == NodeRole::Worker {
        let settings = RegistrationSettings {
            topics: config.topics.clone(),
            initial_stake: config.initial_stake,
            stake_denom: config.stake_denom.clone(),
            multiaddr: config.multiaddr.clone(),
        };
        // A failed pass leaves the node serving; registration is retried on next start.
        match registration::reconcile(&pipeline, &settings).await {
            Ok(report) => tracing::info!(
                registered    = ?report.registered,
                deregistered  = ?report.deregistered,
                initial_stake = ?report.initial_stake,
                "Topic registration reconciled",
            ),
            Err(e) => tracing::error!(error = %e, "Topic registration failed"),
        }
    } else {
        tracing::info!("Reputer role: skipping topic registration");
    }

    match api_addr {
        Some(addr) => {
            let state = api::ApiState::new(pipeline, config.api_secret.clone());
            api::serve(state, addr, cancel).await?;
        }
        None => {
            tracing::info!("No --api-addr configured; waiting for Ctrl-C");
            cancel.cancelled().await;
        }
    }

    tracing::info!("topiq node stopped");
    Ok(())
}
