//! Worker-mode aggregation: every peer's inference/forecast bundle for a
//! topic, collected into one `MsgInsertBulkWorkerPayload`.

use serde::Serialize;

use topiq_protocol::{
    envelope::WorkerDataEnvelope,
    message::MsgInsertBulkWorkerPayload,
    types::{Nonce, WorkerDataBundle},
    TopicId, TxMsg,
};

use crate::{execution::ExecutionResults, pipeline::Pipeline, submit::cancellable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerDispatch {
    /// Handed to a background submission task.
    Dispatched { bundles: usize, block_height: i64 },
    /// Built and logged only.
    DryRun { bundles: usize, block_height: i64 },
    /// No usable bundle; nothing sent.
    Skipped,
}

/// Collect worker bundles from `results` and dispatch them without waiting
/// for the ledger. Peers with unknown addresses or unusable output are dropped.
pub async fn aggregate_worker_results(
    ctx: &Pipeline,
    topic_id: TopicId,
    results: &ExecutionResults,
) -> WorkerDispatch {
    let mut bundles: Vec<WorkerDataBundle> = Vec::new();
    let mut nonce: Option<Nonce> = None;

    for group in results {
        for peer in &group.peers {
            let peer_key = peer.to_base58();
            let address = match cancellable(
                &ctx.cancel,
                ctx.ledger.worker_address_by_p2p_key(&peer_key),
            )
            .await
            {
                Ok(address) => address,
                Err(e) => {
                    tracing::warn!(topic = topic_id, peer = %peer, error = %e, "Unknown worker peer; skipping");
                    continue;
                }
            };

            let envelope = match WorkerDataEnvelope::parse(&group.result.stdout) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(topic = topic_id, peer = %peer, error = %e, "Unparsable worker output; skipping");
                    continue;
                }
            };

            if nonce.is_none() {
                nonce = envelope.nonce();
            }

            match envelope.into_bundle_for(topic_id) {
                Ok(bundle) => {
                    tracing::debug!(topic = topic_id, peer = %peer, address = %address, "Accepted worker bundle");
                    bundles.push(bundle);
                }
                Err(e) => {
                    tracing::warn!(topic = topic_id, peer = %peer, address = %address, error = %e, "Rejected worker bundle");
                }
            }
        }
    }

    let nonce = match nonce {
        Some(nonce) if !bundles.is_empty() => nonce,
        _ => {
            tracing::warn!(
                topic   = topic_id,
                bundles = bundles.len(),
                "No usable worker bundle with a block height; nothing to submit",
            );
            return WorkerDispatch::Skipped;
        }
    };

    let count = bundles.len();
    let msg = TxMsg::InsertBulkWorkerPayload(MsgInsertBulkWorkerPayload {
        sender: ctx.identity.address.clone(),
        nonce,
        topic_id,
        worker_data_bundles: bundles,
    });

    if !ctx.submit_tx {
        tracing::info!(
            topic = topic_id,
            msg   = %serde_json::to_string(&msg).unwrap_or_default(),
            "Dry run: worker payload not broadcast",
        );
        return WorkerDispatch::DryRun { bundles: count, block_height: nonce.block_height };
    }

    let task_ctx = ctx.clone();
    tokio::spawn(async move {
        match task_ctx.send(&msg).await {
            Ok(resp) => tracing::info!(
                topic   = topic_id,
                tx_hash = %resp.tx_hash,
                bundles = count,
                "Worker payload submitted",
            ),
            Err(e) => tracing::error!(
                topic   = topic_id,
                bundles = count,
                error   = %e,
                "Worker payload submission failed",
            ),
        }
    });

    tracing::info!(topic = topic_id, bundles = count, block_height = nonce.block_height, "Worker payload dispatched");
    WorkerDispatch::Dispatched { bundles: count, block_height: nonce.block_height }
}
