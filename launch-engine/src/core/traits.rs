//! Core trait abstractions (ports)
//!
//! The pool and the coordinators only talk to storage and to the ledger through
//! these traits, so the backing mechanism can change without touching them.

use async_trait::async_trait;
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use std::time::Duration;

use super::error::{LedgerError, StorageError};
use super::types::{IdentitySummary, MintIdentity, NewIdentity, SupplyStats};

/// Persistence port for the mint identity pool.
///
/// `reserve_next`, `bind_launch`, `mark_used`, `release`, `release_expired`,
/// `assign` and `unassign` must each be a single atomic operation in the
/// backing store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Reserve the next available identity, preferring one assigned to `wallet`
    async fn reserve_next(
        &self,
        wallet: Option<&str>,
        reserved_by: &str,
    ) -> Result<Option<MintIdentity>, StorageError>;

    /// Record the wallet and message hash of the launch prepared for a live
    /// reservation. Returns false when the identity is not reserved or is
    /// already bound.
    async fn bind_launch(
        &self,
        address: &str,
        wallet: &str,
        message_hash: &str,
    ) -> Result<bool, StorageError>;

    /// Look up an identity that has not been consumed yet
    async fn find_unused(&self, address: &str) -> Result<Option<MintIdentity>, StorageError>;

    /// Irreversibly mark an identity as used. Returns false when it already was.
    async fn mark_used(&self, address: &str, used_by: &str) -> Result<bool, StorageError>;

    /// Clear the reservation of an unused identity
    async fn release(&self, address: &str) -> Result<bool, StorageError>;

    /// Clear every reservation older than `max_age`, returning how many were cleared
    async fn release_expired(&self, max_age: Duration) -> Result<u64, StorageError>;

    /// Append identities to the end of the queue
    async fn insert_batch(&self, identities: &[NewIdentity]) -> Result<u64, StorageError>;

    async fn supply_stats(&self) -> Result<SupplyStats, StorageError>;

    async fn assign(
        &self,
        address: &str,
        wallet: &str,
        note: Option<&str>,
    ) -> Result<bool, StorageError>;

    async fn unassign(&self, address: &str) -> Result<bool, StorageError>;

    /// Unused identities in queue order
    async fn queue(&self, limit: i64, offset: i64) -> Result<Vec<IdentitySummary>, StorageError>;

    /// Unused identities pre-assigned to `wallet`
    async fn assigned_to(&self, wallet: &str) -> Result<Vec<IdentitySummary>, StorageError>;
}

/// Confirmation state of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Processed,
    Confirmed,
    Finalized,
    Failed(String),
}

impl SignatureStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SignatureStatus::Confirmed | SignatureStatus::Finalized)
    }
}

/// Ledger port: the handful of RPC calls the engine depends on
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account data at `address`, `None` when the account does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Submit a fully signed transaction
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError>;

    /// `None` when the ledger has not seen the signature
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError>;
}
