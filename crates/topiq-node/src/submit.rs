//! Ledger submission with bounded, randomized exponential backoff.
//!
//! Every transaction this node sends (registration, deregistration, bulk
//! worker/reputer payloads) goes through [`send_with_retry`]:
//!
//!   attempt 0 .. max_retries:
//!     broadcast → success: return
//!               → failure: sleep uniform(min, max) << attempt seconds
//!
//! The shifted delay is not clamped to `max_delay`; only the base
//! is drawn from `[min, max]`. Broadcasts are not idempotent, so a transaction
//! may land even when the client saw a failure (e.g. a timeout).

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use topiq_ledger_client::{LedgerClient, LedgerError};
use topiq_protocol::{
    message::TxResponse, TxMsg, DEFAULT_MAX_DELAY_SECS, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_DELAY_SECS,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("min delay {min_delay_secs}s exceeds max delay {max_delay_secs}s")]
pub struct InvalidRetryPolicy {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    min_delay_secs: u64,
    max_delay_secs: u64,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        min_delay_secs: u64,
        max_delay_secs: u64,
    ) -> Result<Self, InvalidRetryPolicy> {
        if min_delay_secs > max_delay_secs {
            return Err(InvalidRetryPolicy { min_delay_secs, max_delay_secs });
        }
        Ok(Self { max_retries, min_delay_secs, max_delay_secs })
    }

    /// Sleep after the failed attempt `attempt` (0-based).
    pub fn backoff_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = rng.gen_range(self.min_delay_secs..=self.max_delay_secs);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(base.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
        }
    }
}

/// Race a ledger call against cancellation.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LedgerError::Cancelled),
        result = call => result,
    }
}

/// Broadcast `msg` from `account`, retrying per `policy`.
///
/// Returns the first successful response, or the error of the last attempt.
/// Cancellation stops further attempts and sleeps; a cancellation observed
/// during a backoff sleep returns the error that caused that sleep.
pub async fn send_with_retry(
    ledger: &dyn LedgerClient,
    account: &str,
    msg: &TxMsg,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<TxResponse, LedgerError> {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let err = match cancellable(cancel, ledger.broadcast_tx(account, msg)).await {
            Ok(resp) => {
                tracing::info!(
                    tx_hash = %resp.tx_hash,
                    kind    = msg.kind(),
                    attempt,
                    "Transaction accepted by ledger",
                );
                return Ok(resp);
            }
            Err(e) => e,
        };

        tracing::warn!(
            kind  = msg.kind(),
            error = %err,
            "Failed to send transaction (attempt {}/{})",
            attempt + 1,
            policy.max_retries.saturating_add(1),
        );

        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = policy.backoff_delay(attempt, &mut rand::thread_rng());
        tracing::debug!(kind = msg.kind(), ?delay, "Backing off before retry");
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(kind = msg.kind(), "Retry loop cancelled during backoff");
                return Err(err);
            }
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
