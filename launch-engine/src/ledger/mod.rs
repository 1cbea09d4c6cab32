//! Ledger adapters and bounded retry helpers

pub mod mock;
pub mod rpc_client;

use solana_sdk::{signature::Signature, transaction::Transaction};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::core::{Deadline, LedgerClient, LedgerError, SignatureStatus};

pub use mock::MockLedger;
pub use rpc_client::RpcLedgerClient;

/// Bounded retry for interruptible ledger reads
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt, policy.max_attempts, e);
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Submit a signed transaction and poll until it is confirmed or `deadline` passes.
///
/// A duplicate submission is reported as `AlreadyProcessed` so callers can
/// treat it as success.
pub async fn send_and_confirm(
    ledger: &dyn LedgerClient,
    transaction: &Transaction,
    deadline: Deadline,
    poll_interval: Duration,
) -> Result<Signature, LedgerError> {
    let signature = ledger.send_transaction(transaction).await?;
    debug!("Sent transaction {}", signature);

    loop {
        match ledger.get_signature_status(&signature).await {
            Ok(Some(SignatureStatus::Failed(reason))) => {
                return Err(LedgerError::TransactionFailed(reason));
            }
            Ok(Some(status)) if status.is_confirmed() => return Ok(signature),
            Ok(_) => {}
            Err(e) if e.is_transient() => debug!("Status poll for {} failed: {}", signature, e),
            Err(e) => return Err(e),
        }

        if deadline.is_expired() {
            return Err(LedgerError::Timeout(format!("confirmation of {}", signature)));
        }
        tokio::time::sleep(poll_interval.min(deadline.remaining())).await;
    }
}
