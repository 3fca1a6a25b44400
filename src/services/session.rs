//! Exchanges an identity session for a data-store credential.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::AppError,
    identity::{Identity, IdentityBridge},
    store::StoreCredential,
};

/// Retry schedule for credential minting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first attempt.
    pub settle_delay: Duration,
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No waiting, single attempt.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Source of delays, swappable in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Mints a store credential for `identity`, retrying per `policy`.
///
/// Both "no credential" and bridge errors count as a failed attempt.
/// Exhausting the attempts yields `AppError::CredentialMint`.
pub async fn establish_session(
    bridge: &dyn IdentityBridge,
    identity: &Identity,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> Result<StoreCredential, AppError> {
    clock.sleep(policy.settle_delay).await;

    let attempts = policy.max_attempts.max(1);
    let mut last_failure = String::from("no credential returned");

    for attempt in 1..=attempts {
        match bridge.mint_store_credential(identity).await {
            Ok(Some(credential)) => {
                tracing::debug!(user_id = %identity.id, attempt, "store credential minted");
                return Ok(credential);
            }
            Ok(None) => {
                tracing::warn!(user_id = %identity.id, attempt, "identity provider returned no store token");
                last_failure = String::from("no credential returned");
            }
            Err(e) => {
                tracing::warn!(user_id = %identity.id, attempt, "store token mint failed: {}", e);
                last_failure = e.to_string();
            }
        }

        if attempt < attempts {
            clock.sleep(policy.backoff).await;
        }
    }

    Err(AppError::CredentialMint(format!(
        "gave up after {} attempts: {}",
        attempts, last_failure
    )))
}
