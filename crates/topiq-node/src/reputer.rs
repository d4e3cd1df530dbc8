//! Reputer-mode aggregation: loss/value bundles from the first peer of each
//! result group, signed over the round nonce and submitted as one
//! `MsgInsertBulkReputerPayload`.

use serde::Serialize;

use topiq_protocol::{
    envelope::LossEnvelope,
    message::MsgInsertBulkReputerPayload,
    types::{Nonce, ReputerRequestNonce, ReputerValueBundle},
    TopicId, TxMsg,
};

use crate::{
    error::ReputerError, execution::ExecutionResults, pipeline::Pipeline, submit::cancellable,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReputerSubmission {
    Submitted { tx_hash: String, bundles: usize, block_height: i64 },
    /// Built and logged only.
    DryRun { bundles: usize, block_height: i64 },
    NothingToSubmit,
}

/// Aggregate reputer results for `topic_id` and submit them, waiting for the
/// ledger.
///
/// A malformed nested value bundle fails the whole call. Other per-peer
/// problems drop that peer; a signing failure ends the sweep and whatever
/// was collected so far is still submitted.
pub async fn aggregate_reputer_results(
    ctx: &Pipeline,
    topic_id: TopicId,
    results: &ExecutionResults,
) -> Result<ReputerSubmission, ReputerError> {
    let mut bundles: Vec<ReputerValueBundle> = Vec::new();
    let mut nonce: Option<Nonce> = None;

    for group in results {
        let Some(peer) = group.peers.first() else {
            tracing::warn!(topic = topic_id, "Result group has no peers; skipping");
            continue;
        };
        let peer_key = peer.to_base58();

        let address = match cancellable(
            &ctx.cancel,
            ctx.ledger.reputer_address_by_p2p_key(&peer_key),
        )
        .await
        {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(topic = topic_id, peer = %peer, error = %e, "Unknown reputer peer; skipping");
                continue;
            }
        };

        let envelope = match LossEnvelope::parse(&group.result.stdout) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(topic = topic_id, peer = %peer, error = %e, "Unparsable reputer output; skipping");
                continue;
            }
        };

        let peer_bundle = envelope.value_bundle().map_err(|source| {
            tracing::error!(topic = topic_id, peer = %peer, error = %source, "Malformed value bundle; aborting");
            ReputerError::NestedValueBundle { peer: peer_key.clone(), source }
        })?;

        if nonce.is_none() {
            match envelope.parse_nonce() {
                Ok(n) => nonce = Some(n),
                Err(e) => {
                    tracing::warn!(topic = topic_id, peer = %peer, error = %e, "Invalid reputer nonce; skipping");
                    continue;
                }
            }
        }

        let value_bundle = match peer_bundle.into_value_bundle(topic_id) {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(topic = topic_id, peer = %peer, error = %e, "Invalid value in reputer bundle; skipping");
                continue;
            }
        };

        let signature = match ctx
            .keyring
            .sign(&ctx.identity.account_name, envelope.nonce.as_bytes())
        {
            Ok(signature) => signature,
            Err(e) => {
                tracing::error!(
                    topic   = topic_id,
                    account = %ctx.identity.account_name,
                    error   = %e,
                    "Signing failed; submitting {} bundle(s) collected so far",
                    bundles.len(),
                );
                break;
            }
        };

        tracing::debug!(topic = topic_id, peer = %peer, address = %address, "Accepted reputer bundle");
        bundles.push(ReputerValueBundle { value_bundle, signature });
    }

    let nonce = match nonce {
        Some(nonce) if !bundles.is_empty() => nonce,
        _ => {
            tracing::warn!(topic = topic_id, "No usable reputer bundle; nothing to submit");
            return Ok(ReputerSubmission::NothingToSubmit);
        }
    };

    let count = bundles.len();
    let msg = TxMsg::InsertBulkReputerPayload(MsgInsertBulkReputerPayload {
        sender: ctx.identity.address.clone(),
        reputer_request_nonce: ReputerRequestNonce { reputer_nonce: nonce, worker_nonce: nonce },
        topic_id,
        reputer_value_bundles: bundles,
    });

    tracing::debug!(
        topic = topic_id,
        msg   = %serde_json::to_string(&msg).unwrap_or_default(),
        "Built reputer payload",
    );

    if !ctx.submit_tx {
        tracing::info!(topic = topic_id, bundles = count, "Dry run: reputer payload not broadcast");
        return Ok(ReputerSubmission::DryRun { bundles: count, block_height: nonce.block_height });
    }

    let resp = ctx.send(&msg).await.map_err(|e| {
        tracing::error!(topic = topic_id, bundles = count, error = %e, "Reputer payload submission failed");
        ReputerError::Submit(e)
    })?;

    tracing::info!(topic = topic_id, tx_hash = %resp.tx_hash, bundles = count, "Reputer payload submitted");
    Ok(ReputerSubmission::Submitted {
        tx_hash: resp.tx_hash,
        bundles: count,
        block_height: nonce.block_height,
    })
}
