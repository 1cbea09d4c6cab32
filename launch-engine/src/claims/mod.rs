//! Claim transaction batching
//!
//! Builds one unsigned transaction per reward source the creator can claim
//! from. Sources are built concurrently against one shared blockhash; a
//! failing source is reported and skipped.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, instruction::Instruction, message::Message, pubkey::Pubkey, transaction::Transaction};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::encode_transaction;
use crate::core::{LaunchError, LaunchResult, LedgerClient};
use crate::launch::instructions::{
    AccountsBuilder, ClaimArgs, InstructionArgs, LaunchPrograms, MigrationFeeArgs, PositionFeeArgs,
};
use crate::launch::parse_pubkey;
use crate::ledger::{with_retries, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSource {
    /// Creator share of bonding-curve trading fees
    TradingFees,
    /// One-time fee paid to the creator at migration
    MigrationFee,
    /// Post-migration exchange pool position fees
    PoolFees,
}

impl ClaimSource {
    pub const ALL: [ClaimSource; 3] = [
        ClaimSource::TradingFees,
        ClaimSource::MigrationFee,
        ClaimSource::PoolFees,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFeeSnapshot {
    pub pool: String,
    pub position: String,
    pub claimable_lamports: u64,
}

/// Claimable balances as reported by the pricing service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimableSnapshot {
    pub mint: String,
    #[serde(default)]
    pub trading_fees_lamports: u64,
    #[serde(default)]
    pub migration_fee_lamports: u64,
    #[serde(default)]
    pub pool_fees: Option<PoolFeeSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTransaction {
    pub source: ClaimSource,
    pub transaction_base64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSourceFailure {
    pub source: ClaimSource,
    pub reason: String,
}

/// Transactions in source order plus the sources that failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimBatch {
    pub transactions: Vec<ClaimTransaction>,
    pub failures: Vec<ClaimSourceFailure>,
}

pub struct ClaimTransactionBuilder {
    ledger: Arc<dyn LedgerClient>,
    programs: LaunchPrograms,
    read_retry: RetryPolicy,
}

impl ClaimTransactionBuilder {
    pub fn new(ledger: Arc<dyn LedgerClient>, programs: LaunchPrograms, read_retry: RetryPolicy) -> Self {
        Self {
            ledger,
            programs,
            read_retry,
        }
    }

    /// Build a claim transaction for every source with a positive balance
    pub async fn build_claim_batch(
        &self,
        creator_wallet: &str,
        snapshot: &ClaimableSnapshot,
    ) -> LaunchResult<ClaimBatch> {
        let creator = parse_pubkey(creator_wallet, "creator_wallet")?;
        let mint = parse_pubkey(&snapshot.mint, "mint")?;

        let sources: Vec<ClaimSource> = ClaimSource::ALL
            .into_iter()
            .filter(|source| claimable_amount(source, snapshot) > 0)
            .collect();
        if sources.is_empty() {
            return Err(LaunchError::NoClaimableSources { failures: Vec::new() });
        }

        let ledger = self.ledger.clone();
        let blockhash = with_retries(self.read_retry, "blockhash fetch", || {
            let ledger = ledger.clone();
            async move { ledger.get_latest_blockhash().await }
        })
        .await?;

        let results = join_all(
            sources
                .iter()
                .map(|source| self.build_source(*source, &creator, &mint, snapshot, blockhash)),
        )
        .await;

        let mut batch = ClaimBatch {
            transactions: Vec::new(),
            failures: Vec::new(),
        };
        for (source, result) in sources.into_iter().zip(results) {
            match result {
                Ok(transaction_base64) => batch.transactions.push(ClaimTransaction {
                    source,
                    transaction_base64,
                }),
                Err(e) => {
                    warn!("Skipping {:?} claim for {}: {}", source, creator, e);
                    batch.failures.push(ClaimSourceFailure {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if batch.transactions.is_empty() {
            return Err(LaunchError::NoClaimableSources {
                failures: batch.failures,
            });
        }
        info!(
            "Built {} claim transactions for {} ({} sources failed)",
            batch.transactions.len(),
            creator,
            batch.failures.len()
        );
        Ok(batch)
    }

    async fn build_source(
        &self,
        source: ClaimSource,
        creator: &Pubkey,
        mint: &Pubkey,
        snapshot: &ClaimableSnapshot,
        blockhash: Hash,
    ) -> LaunchResult<String> {
        let amount = claimable_amount(&source, snapshot);
        let quote_mint = self.programs.quote_mint;
        let receiver = get_associated_token_address(creator, &quote_mint);

        let mut ixs = vec![create_associated_token_account_idempotent(
            creator,
            creator,
            &quote_mint,
            &spl_token::id(),
        )];
        ixs.push(match source {
            ClaimSource::TradingFees => self.trading_fee_claim(creator, mint, &receiver, amount).await?,
            ClaimSource::MigrationFee => self.migration_fee_claim(creator, mint, &receiver, amount).await?,
            ClaimSource::PoolFees => self.pool_fee_claim(creator, &receiver, snapshot).await?,
        });

        let mut transaction = Transaction::new_unsigned(Message::new(&ixs, Some(creator)));
        transaction.message.recent_blockhash = blockhash;
        debug!("Built {:?} claim of {} lamports for {}", source, amount, creator);
        encode_transaction(&transaction)
    }

    async fn account_exists(&self, address: &Pubkey) -> LaunchResult<bool> {
        Ok(self.ledger.get_account(address).await?.is_some())
    }

    /// Bonding-curve pool of `mint`, under its own config or the shared default
    async fn find_pool(&self, mint: &Pubkey) -> LaunchResult<(Pubkey, Pubkey)> {
        let configs = std::iter::once(self.programs.config_address(mint))
            .chain(self.programs.default_curve_config);
        for config in configs {
            let pool = self.programs.pool_address(&config, mint);
            if self.account_exists(&pool).await? {
                return Ok((config, pool));
            }
        }
        Err(LaunchError::InvalidParameters(format!("no bonding-curve pool for {}", mint)))
    }

    async fn trading_fee_claim(
        &self,
        creator: &Pubkey,
        mint: &Pubkey,
        receiver: &Pubkey,
        amount: u64,
    ) -> LaunchResult<Instruction> {
        let (config, pool) = self.find_pool(mint).await?;
        let programs = &self.programs;

        Ok(AccountsBuilder::new()
            .readonly(programs.pool_authority())
            .readonly(config)
            .writable(pool)
            .writable(*receiver)
            .writable(programs.vault_address(&programs.quote_mint, &pool))
            .readonly(programs.quote_mint)
            .signer(*creator)
            .readonly(spl_token::id())
            .readonly(programs.event_authority())
            .readonly(programs.launch_program)
            .build(programs.launch_program, ClaimArgs { max_amount: amount }.build_data()?))
    }

    async fn migration_fee_claim(
        &self,
        creator: &Pubkey,
        mint: &Pubkey,
        receiver: &Pubkey,
        amount: u64,
    ) -> LaunchResult<Instruction> {
        let (config, pool) = self.find_pool(mint).await?;
        let programs = &self.programs;
        let migration_metadata = programs.migration_metadata(&pool);
        if !self.account_exists(&migration_metadata).await? {
            return Err(LaunchError::InvalidParameters(format!("pool {} has not migrated", pool)));
        }

        Ok(AccountsBuilder::new()
            .readonly(programs.pool_authority())
            .readonly(config)
            .writable(pool)
            .readonly(migration_metadata)
            .writable(*receiver)
            .writable(programs.vault_address(&programs.quote_mint, &pool))
            .readonly(programs.quote_mint)
            .signer(*creator)
            .readonly(spl_token::id())
            .readonly(programs.event_authority())
            .readonly(programs.launch_program)
            .build(programs.launch_program, MigrationFeeArgs { max_amount: amount }.build_data()?))
    }

    async fn pool_fee_claim(
        &self,
        creator: &Pubkey,
        receiver: &Pubkey,
        snapshot: &ClaimableSnapshot,
    ) -> LaunchResult<Instruction> {
        let pool_program = self
            .programs
            .pool_program
            .ok_or_else(|| LaunchError::Configuration("platform.pool_program_id is not set".into()))?;
        let fees = snapshot
            .pool_fees
            .as_ref()
            .ok_or_else(|| LaunchError::InvalidParameters("no pool fee snapshot".into()))?;
        let pool = parse_pubkey(&fees.pool, "pool_fees.pool")?;
        let position = parse_pubkey(&fees.position, "pool_fees.position")?;

        if !self.account_exists(&position).await? {
            return Err(LaunchError::InvalidParameters(format!("position {} does not exist", position)));
        }

        Ok(AccountsBuilder::new()
            .readonly(pool)
            .writable(position)
            .writable(*receiver)
            .signer(*creator)
            .readonly(spl_token::id())
            .build(pool_program, PositionFeeArgs {}.build_data()?))
    }
}

fn claimable_amount(source: &ClaimSource, snapshot: &ClaimableSnapshot) -> u64 {
    match source {
        ClaimSource::TradingFees => snapshot.trading_fees_lamports,
        ClaimSource::MigrationFee => snapshot.migration_fee_lamports,
        ClaimSource::PoolFees => snapshot.pool_fees.as_ref().map_or(0, |f| f.claimable_lamports),
    }
}
