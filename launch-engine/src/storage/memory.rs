//! In-memory identity store
//!
//! Each operation runs under one mutex guard, which gives the same
//! atomicity as the database functions within a single process.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::core::types::{IdentitySummary, MintIdentity, NewIdentity, SupplyStats};
use crate::core::{IdentityStore, StorageError};

#[derive(Default)]
struct Inner {
    rows: Vec<MintIdentity>,
    next_position: i64,
}

impl Inner {
    fn find_mut(&mut self, address: &str) -> Option<&mut MintIdentity> {
        self.rows.iter_mut().find(|row| row.public_address == address)
    }

    fn next_available(&self, wallet: Option<&str>) -> Option<usize> {
        let candidates = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_available());

        let preferred = wallet.and_then(|wallet| {
            candidates
                .clone()
                .filter(|(_, row)| row.assigned_wallet.as_deref() == Some(wallet))
                .min_by_key(|(_, row)| row.queue_position)
        });

        preferred
            .or_else(|| {
                candidates
                    .filter(|(_, row)| row.assigned_wallet.is_none())
                    .min_by_key(|(_, row)| row.queue_position)
            })
            .map(|(index, _)| index)
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<Inner>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift an existing reservation into the past
    pub async fn backdate_reservation(&self, address: &str, by: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.find_mut(address) {
            Some(row) => match (row.reserved_at, chrono::Duration::from_std(by)) {
                (Some(reserved_at), Ok(by)) => {
                    row.reserved_at = Some(reserved_at - by);
                    true
                }
                _ => false,
            },
            None => false,
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn reserve_next(
        &self,
        wallet: Option<&str>,
        reserved_by: &str,
    ) -> Result<Option<MintIdentity>, StorageError> {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.next_available(wallet) else {
            return Ok(None);
        };

        let row = &mut inner.rows[index];
        row.reserved_at = Some(Utc::now());
        row.reserved_by = Some(reserved_by.to_string());
        Ok(Some(row.clone()))
    }

    async fn find_unused(&self, address: &str) -> Result<Option<MintIdentity>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .find(|row| row.public_address == address && !row.used)
            .cloned())
    }

    async fn mark_used(&self, address: &str, used_by: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.find_mut(address) {
            Some(row) if !row.used => {
                row.used = true;
                row.used_at = Some(Utc::now());
                row.used_by = Some(used_by.to_string());
                row.clear_reservation();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, address: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.find_mut(address) {
            Some(row) if !row.used && row.reserved_at.is_some() => {
                row.clear_reservation();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn bind_launch(
        &self,
        address: &str,
        wallet: &str,
        message_hash: &str,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.find_mut(address) {
            Some(row) if !row.used && row.reserved_at.is_some() && row.launch_message_hash.is_none() => {
                row.reserved_for = Some(wallet.to_string());
                row.launch_message_hash = Some(message_hash.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_expired(&self, max_age: Duration) -> Result<u64, StorageError> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let cutoff = Utc::now() - max_age;

        let mut inner = self.inner.lock().await;
        let mut released = 0;
        for row in inner.rows.iter_mut() {
            if !row.used && row.reserved_at.map_or(false, |at| at < cutoff) {
                row.clear_reservation();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn insert_batch(&self, identities: &[NewIdentity]) -> Result<u64, StorageError> {
        let mut inner = self.inner.lock().await;
        let mut inserted = 0;
        for identity in identities {
            if inner.rows.iter().any(|row| row.public_address == identity.public_address) {
                continue;
            }
            inner.next_position += 1;
            let queue_position = inner.next_position;
            inner.rows.push(MintIdentity {
                id: identity.id,
                public_address: identity.public_address.clone(),
                secret_material: identity.secret_material.clone(),
                used: false,
                used_at: None,
                used_by: None,
                queue_position,
                assigned_wallet: None,
                assignment_note: None,
                reserved_at: None,
                reserved_by: None,
                reserved_for: None,
                launch_message_hash: None,
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn supply_stats(&self) -> Result<SupplyStats, StorageError> {
        let inner = self.inner.lock().await;
        let mut stats = SupplyStats::default();
        for row in &inner.rows {
            stats.total += 1;
            if row.used {
                stats.used += 1;
                continue;
            }
            if row.reserved_at.is_some() {
                stats.reserved += 1;
            } else {
                stats.available += 1;
            }
            if row.assigned_wallet.is_some() {
                stats.assigned += 1;
            }
        }
        Ok(stats)
    }

    async fn assign(
        &self,
        address: &str,
        wallet: &str,
        note: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.find_mut(address) {
            Some(row) if row.is_available() => {
                row.assigned_wallet = Some(wallet.to_string());
                row.assignment_note = note.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unassign(&self, address: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.lock().await;
        match inner.find_mut(address) {
            Some(row) if !row.used && row.assigned_wallet.is_some() => {
                row.assigned_wallet = None;
                row.assignment_note = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn queue(&self, limit: i64, offset: i64) -> Result<Vec<IdentitySummary>, StorageError> {
        let inner = self.inner.lock().await;
        let mut unused: Vec<&MintIdentity> = inner.rows.iter().filter(|row| !row.used).collect();
        unused.sort_by_key(|row| row.queue_position);
        Ok(unused
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(MintIdentity::summary)
            .collect())
    }

    async fn assigned_to(&self, wallet: &str) -> Result<Vec<IdentitySummary>, StorageError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<&MintIdentity> = inner
            .rows
            .iter()
            .filter(|row| !row.used && row.assigned_wallet.as_deref() == Some(wallet))
            .collect();
        rows.sort_by_key(|row| row.queue_position);
        Ok(rows.into_iter().map(MintIdentity::summary).collect())
    }
}
