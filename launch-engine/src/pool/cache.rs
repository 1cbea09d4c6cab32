//! Process-local secret cache
//!
//! Best-effort only. A miss is never an error: callers fall back to the
//! identity store.

use chrono::{DateTime, Utc};
use solana_sdk::{
    hash::{hash, Hash},
    message::Message,
    pubkey::Pubkey,
    signature::Keypair,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The launch a reservation was prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchBinding {
    pub wallet: Pubkey,
    pub message_hash: Hash,
}

impl LaunchBinding {
    pub fn new(wallet: Pubkey, message: &Message) -> Self {
        Self {
            wallet,
            message_hash: hash(&message.serialize()),
        }
    }

    pub fn matches(&self, wallet: &Pubkey, message: &Message) -> bool {
        self.wallet == *wallet && self.message_hash == hash(&message.serialize())
    }
}

#[derive(Clone)]
pub struct CachedIdentity {
    pub address: Pubkey,
    pub keypair: Arc<Keypair>,
    /// When the store recorded the reservation; `None` once it was cleared
    pub reserved_at: Option<DateTime<Utc>>,
    pub wallet: Option<String>,
    /// Set once a launch has been prepared for the reservation
    pub launch: Option<LaunchBinding>,
}

impl std::fmt::Debug for CachedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedIdentity")
            .field("address", &self.address)
            .field("reserved_at", &self.reserved_at)
            .field("wallet", &self.wallet)
            .field("launch", &self.launch)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct SecretCache {
    entries: RwLock<HashMap<Pubkey, CachedIdentity>>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, address: &Pubkey) -> Option<CachedIdentity> {
        self.entries.read().await.get(address).cloned()
    }

    pub async fn insert(&self, identity: CachedIdentity) {
        self.entries.write().await.insert(identity.address, identity);
    }

    /// Attach a launch binding to a cached entry; false when the entry is gone
    pub async fn bind(&self, address: &Pubkey, binding: LaunchBinding) -> bool {
        match self.entries.write().await.get_mut(address) {
            Some(entry) => {
                entry.launch = Some(binding);
                true
            }
            None => false,
        }
    }

    pub async fn evict(&self, address: &Pubkey) -> bool {
        self.entries.write().await.remove(address).is_some()
    }

    /// Drop entries reserved before `cutoff` or no longer reserved at all
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.reserved_at.map_or(false, |at| at >= cutoff));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
