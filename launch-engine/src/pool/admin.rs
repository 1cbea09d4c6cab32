//! Administrative pool operations: generation, supply, assignment, queue

use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tracing::info;
use uuid::Uuid;

use super::KeypairPool;
use crate::core::types::{IdentitySummary, NewIdentity, SupplyStats};
use crate::core::{LaunchError, LaunchResult};

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub requested: usize,
    pub inserted: u64,
    pub addresses: Vec<String>,
}

impl KeypairPool {
    /// Generate `count` fresh identities and append them to the queue
    pub async fn generate_identities(&self, count: usize) -> LaunchResult<GenerationReport> {
        let max = self.settings.max_generate_batch;
        if count == 0 || count > max {
            return Err(LaunchError::InvalidParameters(format!(
                "count must be within 1..={}, got {}",
                max, count
            )));
        }

        let identities: Vec<NewIdentity> = (0..count)
            .map(|_| {
                let keypair = Keypair::new();
                NewIdentity {
                    id: Uuid::new_v4(),
                    public_address: keypair.pubkey().to_string(),
                    secret_material: bs58::encode(keypair.to_bytes()).into_string(),
                }
            })
            .collect();

        let inserted = self.store.insert_batch(&identities).await?;
        info!("Generated {} mint identities ({} inserted)", count, inserted);

        Ok(GenerationReport {
            requested: count,
            inserted,
            addresses: identities.into_iter().map(|i| i.public_address).collect(),
        })
    }

    pub async fn supply_stats(&self) -> LaunchResult<SupplyStats> {
        Ok(self.store.supply_stats().await?)
    }

    /// Pre-assign an available identity to `wallet`
    pub async fn assign_identity(
        &self,
        address: &Pubkey,
        wallet: &Pubkey,
        note: Option<&str>,
    ) -> LaunchResult<()> {
        if !self
            .store
            .assign(&address.to_string(), &wallet.to_string(), note)
            .await?
        {
            return Err(LaunchError::IdentityNotFound(format!(
                "{} is not an available identity",
                address
            )));
        }
        info!("Assigned mint identity {} to {}", address, wallet);
        Ok(())
    }

    pub async fn unassign_identity(&self, address: &Pubkey) -> LaunchResult<()> {
        if !self.store.unassign(&address.to_string()).await? {
            return Err(LaunchError::IdentityNotFound(format!(
                "{} is not an assigned unused identity",
                address
            )));
        }
        info!("Unassigned mint identity {}", address);
        Ok(())
    }

    /// Unused identities in queue order
    pub async fn queue(&self, limit: i64, offset: i64) -> LaunchResult<Vec<IdentitySummary>> {
        if limit < 1 || offset < 0 {
            return Err(LaunchError::InvalidParameters(
                "limit must be positive and offset non-negative".into(),
            ));
        }
        Ok(self.store.queue(limit, offset).await?)
    }

    pub async fn assigned_identities(&self, wallet: &Pubkey) -> LaunchResult<Vec<IdentitySummary>> {
        Ok(self.store.assigned_to(&wallet.to_string()).await?)
    }
}
