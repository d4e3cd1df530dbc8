use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use topiq_ledger_client::{Keyring, LedgerClient, LedgerError};
use topiq_protocol::{message::TxResponse, TopicId, TxMsg};

use crate::{
    error::ReputerError,
    execution::ExecutionResults,
    identity::{NodeIdentity, NodeRole},
    reputer::{aggregate_reputer_results, ReputerSubmission},
    submit::{send_with_retry, RetryPolicy},
    worker::{aggregate_worker_results, WorkerDispatch},
};

/// Collaborators shared by the reconciler and both aggregators.
///
/// Cheap to clone; everything behind it is read-only for the life of the process.
#[derive(Clone)]
pub struct Pipeline {
    pub ledger: Arc<dyn LedgerClient>,
    pub keyring: Arc<dyn Keyring>,
    pub identity: Arc<NodeIdentity>,
    pub policy: RetryPolicy,
    pub cancel: CancellationToken,
    /// False in dry-run mode: messages are built and logged, never broadcast.
    pub submit_tx: bool,
}

/// What happened to one batch of execution results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Worker(WorkerDispatch),
    Reputer(ReputerSubmission),
}

impl Pipeline {
    /// Broadcast `msg` from this node's account with the configured policy.
    pub async fn send(&self, msg: &TxMsg) -> Result<TxResponse, LedgerError> {
        send_with_retry(
            self.ledger.as_ref(),
            &self.identity.account_name,
            msg,
            &self.policy,
            &self.cancel,
        )
        .await
    }

    /// Route `results` to the aggregator matching this node's role.
    pub async fn process(
        &self,
        topic_id: TopicId,
        results: &ExecutionResults,
    ) -> Result<Outcome, ReputerError> {
        match self.identity.role {
            NodeRole::Worker => Ok(Outcome::Worker(
                aggregate_worker_results(self, topic_id, results).await,
            )),
            NodeRole::Reputer => Ok(Outcome::Reputer(
                aggregate_reputer_results(self, topic_id, results).await?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pipeline, MockLedger};

    #[tokio::test]
    async fn results_follow_the_node_role() {
        let ledger = Arc::new(MockLedger::default());

        let worker = pipeline(ledger.clone(), NodeRole::Worker);
        assert_eq!(
            worker.process(1, &Vec::new()).await.unwrap(),
            Outcome::Worker(WorkerDispatch::Skipped)
        );

        let reputer = pipeline(ledger.clone(), NodeRole::Reputer);
        assert_eq!(
            reputer.process(1, &Vec::new()).await.unwrap(),
            Outcome::Reputer(ReputerSubmission::NothingToSubmit)
        );
        assert_eq!(ledger.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn send_uses_the_node_account_and_policy() {
        let ledger = Arc::new(MockLedger::default());
        let ctx = pipeline(ledger.clone(), NodeRole::Worker);

        let resp = ctx.send(&crate::testing::remove_registration(4)).await.unwrap();

        assert_eq!(resp.tx_hash, "TX1");
        assert_eq!(ledger.broadcast_count(), 1);
    }
}
