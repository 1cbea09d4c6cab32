//! Mint identity pool
//!
//! Hands out pre-generated mint keypairs exactly once. Ownership changes are
//! delegated to the `IdentityStore`; the ledger is consulted before handing an
//! identity out so one already initialized elsewhere is never reused.

pub mod admin;
pub mod cache;

use chrono::{DateTime, Utc};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{decode_keypair, PoolConfig};
use crate::core::types::{MintIdentity, CORRUPT_SECRET, STALE_ON_CHAIN};
use crate::core::{Deadline, IdentityStore, LaunchError, LaunchResult, LedgerClient, StorageError};
use crate::ledger::{with_retries, RetryPolicy};

pub use admin::GenerationReport;
pub use cache::{CachedIdentity, LaunchBinding, SecretCache};

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_attempts: u32,
    pub signing_window: Duration,
    pub reservation_ttl: Duration,
    pub max_generate_batch: usize,
    /// Written to `reserved_by` so operators can tell which process holds a reservation
    pub owner: String,
    pub read_retry: RetryPolicy,
}

impl PoolSettings {
    pub fn from_config(config: &PoolConfig, read_retry: RetryPolicy) -> Self {
        Self {
            max_attempts: config.max_allocation_attempts,
            signing_window: Duration::from_secs(config.signing_window_secs),
            reservation_ttl: Duration::from_secs(config.reservation_ttl_secs),
            max_generate_batch: config.max_generate_batch,
            owner: format!("launch-engine:{}", std::process::id()),
            read_retry,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default(), RetryPolicy::default())
    }
}

/// A reserved, verified-fresh identity
#[derive(Clone)]
pub struct AllocatedIdentity {
    pub address: Pubkey,
    pub keypair: Arc<Keypair>,
    pub queue_position: i64,
    pub reserved_at: DateTime<Utc>,
    /// End of the signing window
    pub expires: Deadline,
}

impl std::fmt::Debug for AllocatedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatedIdentity")
            .field("address", &self.address)
            .field("queue_position", &self.queue_position)
            .field("reserved_at", &self.reserved_at)
            .finish_non_exhaustive()
    }
}

/// Decode stored secret material and check it names the recorded address
fn decode_identity(identity: &MintIdentity) -> Result<(Pubkey, Keypair), String> {
    let address = Pubkey::from_str(&identity.public_address).map_err(|e| e.to_string())?;
    let keypair = decode_keypair(&identity.secret_material).map_err(|e| e.to_string())?;
    if keypair.pubkey() != address {
        return Err("secret does not match public address".to_string());
    }
    Ok((address, keypair))
}

/// Launch binding recorded with the reservation; unparseable values count as unbound
fn stored_binding(identity: &MintIdentity) -> Option<LaunchBinding> {
    let wallet = Pubkey::from_str(identity.reserved_for.as_deref()?).ok()?;
    let message_hash = Hash::from_str(identity.launch_message_hash.as_deref()?).ok()?;
    Some(LaunchBinding { wallet, message_hash })
}

pub struct KeypairPool {
    store: Arc<dyn IdentityStore>,
    ledger: Arc<dyn LedgerClient>,
    cache: SecretCache,
    settings: PoolSettings,
}

impl KeypairPool {
    pub fn new(store: Arc<dyn IdentityStore>, ledger: Arc<dyn LedgerClient>, settings: PoolSettings) -> Self {
        Self {
            store,
            ledger,
            cache: SecretCache::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn cache(&self) -> &SecretCache {
        &self.cache
    }

    /// Reserve the next fresh identity, preferring one pre-assigned to `for_wallet`.
    ///
    /// Identities already present on the ledger are quarantined and skipped.
    /// A failed freshness check skips the identity without quarantining it; it
    /// stays reserved until the sweep returns it to the queue.
    pub async fn allocate(&self, for_wallet: Option<&Pubkey>) -> LaunchResult<AllocatedIdentity> {
        let wallet = for_wallet.map(|w| w.to_string());

        for attempt in 1..=self.settings.max_attempts {
            let Some(identity) = self
                .store
                .reserve_next(wallet.as_deref(), &self.settings.owner)
                .await?
            else {
                warn!("Mint identity pool is empty");
                return Err(LaunchError::PoolExhausted { attempts: attempt });
            };

            let (address, keypair) = match decode_identity(&identity) {
                Ok(decoded) => decoded,
                Err(reason) => {
                    warn!("Quarantining identity {}: {}", identity.public_address, reason);
                    self.store.mark_used(&identity.public_address, CORRUPT_SECRET).await?;
                    continue;
                }
            };

            let ledger = self.ledger.clone();
            let freshness = with_retries(self.settings.read_retry, "freshness check", || {
                let ledger = ledger.clone();
                async move { ledger.get_account(&address).await }
            })
            .await;

            match freshness {
                Ok(None) => {
                    let reserved_at = identity.reserved_at.unwrap_or_else(Utc::now);
                    let keypair = Arc::new(keypair);
                    self.cache
                        .insert(CachedIdentity {
                            address,
                            keypair: keypair.clone(),
                            reserved_at: Some(reserved_at),
                            wallet: wallet.clone(),
                            launch: None,
                        })
                        .await;

                    info!(
                        "Allocated mint identity {} (queue position {}, attempt {})",
                        address, identity.queue_position, attempt
                    );
                    return Ok(AllocatedIdentity {
                        address,
                        keypair,
                        queue_position: identity.queue_position,
                        reserved_at,
                        expires: Deadline::from_start(Some(reserved_at), self.settings.signing_window),
                    });
                }
                Ok(Some(_)) => {
                    warn!("Identity {} already exists on chain, quarantining", address);
                    self.store.mark_used(&identity.public_address, STALE_ON_CHAIN).await?;
                }
                Err(e) => {
                    warn!(
                        "Freshness check for {} failed, skipping until the sweep releases it: {}",
                        address, e
                    );
                }
            }
        }

        Err(LaunchError::PoolExhausted {
            attempts: self.settings.max_attempts,
        })
    }

    /// Secret material for an unused identity: memory first, then the store
    pub async fn retrieve_cached(&self, address: &Pubkey) -> LaunchResult<Option<CachedIdentity>> {
        if let Some(hit) = self.cache.get(address).await {
            return Ok(Some(hit));
        }

        let Some(identity) = self.store.find_unused(&address.to_string()).await? else {
            debug!("No unused identity for {}", address);
            return Ok(None);
        };

        let (_, keypair) = decode_identity(&identity).map_err(|reason| {
            LaunchError::Storage(StorageError::CorruptRecord {
                address: identity.public_address.clone(),
                reason,
            })
        })?;

        let entry = CachedIdentity {
            address: *address,
            keypair: Arc::new(keypair),
            reserved_at: identity.reserved_at,
            wallet: identity.assigned_wallet.clone(),
            launch: stored_binding(&identity),
        };
        if entry.reserved_at.is_some() {
            self.cache.insert(entry.clone()).await;
        }
        debug!("Recovered identity {} from the store", address);
        Ok(Some(entry))
    }

    /// Tie a live reservation to the launch prepared for it, in the store and
    /// in the local cache, so any process can check a submission against it
    pub async fn bind_launch(&self, address: &Pubkey, binding: LaunchBinding) -> LaunchResult<()> {
        let bound = self
            .store
            .bind_launch(
                &address.to_string(),
                &binding.wallet.to_string(),
                &binding.message_hash.to_string(),
            )
            .await?;
        if !bound {
            return Err(LaunchError::IdentityNotFound(format!(
                "{} has no live reservation to bind",
                address
            )));
        }
        self.cache.bind(address, binding).await;
        debug!("Bound {} to a launch for {}", address, binding.wallet);
        Ok(())
    }

    /// End of the signing window for a cached identity
    pub fn signing_deadline(&self, identity: &CachedIdentity) -> Deadline {
        Deadline::from_start(identity.reserved_at, self.settings.signing_window)
    }

    /// When the sweep may reclaim the identity
    pub fn reservation_deadline(&self, identity: &CachedIdentity) -> Deadline {
        Deadline::from_start(identity.reserved_at, self.settings.reservation_ttl)
    }

    /// Permanently consume an identity. Returns false when it was already consumed.
    pub async fn commit(&self, address: &Pubkey, wallet: &Pubkey) -> LaunchResult<bool> {
        let flipped = self
            .store
            .mark_used(&address.to_string(), &wallet.to_string())
            .await?;
        self.cache.evict(address).await;

        if flipped {
            info!("Committed mint identity {} to {}", address, wallet);
        } else {
            debug!("Mint identity {} was already committed", address);
        }
        Ok(flipped)
    }

    /// Return a reserved identity to the queue
    pub async fn release(&self, address: &Pubkey) -> LaunchResult<bool> {
        self.cache.evict(address).await;
        let released = self.store.release(&address.to_string()).await?;
        if released {
            info!("Released mint identity {}", address);
        }
        Ok(released)
    }

    /// Release every reservation older than the reservation TTL
    pub async fn reap_expired_reservations(&self) -> LaunchResult<u64> {
        let ttl = self.settings.reservation_ttl;
        let released = self.store.release_expired(ttl).await?;

        if let Ok(ttl) = chrono::Duration::from_std(ttl) {
            let purged = self.cache.purge_older_than(Utc::now() - ttl).await;
            if purged > 0 {
                debug!("Purged {} expired cache entries", purged);
            }
        }
        if released > 0 {
            info!("Sweep released {} abandoned reservations", released);
        }
        Ok(released)
    }
}
