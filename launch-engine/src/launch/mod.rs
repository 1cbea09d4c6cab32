//! Launch transaction coordinator
//!
//! Runs the reverse partial signing flow: the caller signs the prepared
//! transaction first, then the mint identity and the platform authority sign
//! on submit.

pub mod instructions;
pub mod reaper;
pub mod session;

use serde::{Deserialize, Serialize};
use solana_sdk::{
    message::Message, pubkey::Pubkey, signature::Keypair, signer::Signer, transaction::Transaction,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::codec::{decode_transaction, encode_transaction};
use crate::config::EngineConfig;
use crate::core::{Deadline, LaunchError, LaunchResult, LedgerClient, LedgerError};
use crate::curve::{CurveConfig, CurveConfigCalculator, CustomCurveParams};
use crate::ledger::{send_and_confirm, with_retries, RetryPolicy};
use crate::pool::{AllocatedIdentity, KeypairPool, LaunchBinding};

pub use instructions::LaunchPrograms;
pub use reaper::spawn_reaper;
pub use session::{LaunchPhase, LaunchSession, SessionRegistry};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LaunchRequest {
    #[validate(length(min = 1, max = 32))]
    pub name: String,
    #[validate(length(min = 1, max = 10))]
    pub symbol: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 200))]
    pub image_uri: String,
    pub caller_wallet: String,
    #[serde(default)]
    pub initial_buy_lamports: Option<u64>,
    #[serde(default)]
    pub custom_config: Option<CustomCurveParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedLaunch {
    pub unsigned_tx_base64: String,
    pub mint_address: String,
    pub expires_at_epoch_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub signed_tx_base64: String,
    pub mint_address: String,
    pub caller_wallet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedLaunch {
    pub tx_signature: String,
    pub mint_address: String,
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub compute_unit_limit: u32,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    pub read_retry: RetryPolicy,
}

impl CoordinatorSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            compute_unit_limit: config.platform.compute_unit_limit,
            confirm_timeout: config.ledger.confirm_timeout(),
            poll_interval: config.ledger.poll_interval(),
            read_retry: RetryPolicy::from_config(&config.ledger),
        }
    }
}

pub(crate) fn parse_pubkey(value: &str, field: &str) -> LaunchResult<Pubkey> {
    Pubkey::from_str(value.trim())
        .map_err(|_| LaunchError::InvalidParameters(format!("{} is not a valid address", field)))
}

/// Position of `key` among the transaction's required signers
fn signer_index(message: &Message, key: &Pubkey) -> Option<usize> {
    let signers = message.header.num_required_signatures as usize;
    message.account_keys.iter().take(signers).position(|k| k == key)
}

fn is_fully_signed(transaction: &Transaction) -> bool {
    transaction.is_signed() && transaction.verify().is_ok()
}

pub struct LaunchTransactionCoordinator {
    pool: Arc<KeypairPool>,
    calculator: CurveConfigCalculator,
    ledger: Arc<dyn LedgerClient>,
    platform: Arc<Keypair>,
    programs: LaunchPrograms,
    sessions: SessionRegistry,
    settings: CoordinatorSettings,
}

impl LaunchTransactionCoordinator {
    pub fn new(
        pool: Arc<KeypairPool>,
        calculator: CurveConfigCalculator,
        ledger: Arc<dyn LedgerClient>,
        platform: Arc<Keypair>,
        programs: LaunchPrograms,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            pool,
            calculator,
            ledger,
            platform,
            programs,
            sessions: SessionRegistry::new(),
            settings,
        }
    }

    pub fn pool(&self) -> &Arc<KeypairPool> {
        &self.pool
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn platform_authority(&self) -> Pubkey {
        self.platform.pubkey()
    }

    /// Allocate an identity and build the unsigned launch transaction
    pub async fn prepare(&self, request: LaunchRequest) -> LaunchResult<PreparedLaunch> {
        request.validate()?;
        let caller = parse_pubkey(&request.caller_wallet, "caller_wallet")?;

        // Parameter and configuration errors surface before an identity is reserved
        let curve = request
            .custom_config
            .as_ref()
            .map(|params| self.calculator.calculate(params))
            .transpose()?;
        if curve.is_none() && self.programs.default_curve_config.is_none() {
            return Err(LaunchError::Configuration(
                "platform.default_curve_config is not set".into(),
            ));
        }

        debug!("Launch for {} entering {:?}", caller, LaunchPhase::Preparing);
        let identity = self.pool.allocate(Some(&caller)).await?;

        match self.build_launch(&request, &caller, &identity, curve.as_ref()).await {
            Ok(prepared) => Ok(prepared),
            Err(e) => {
                warn!("Prepare failed for {}, releasing: {}", identity.address, e);
                if let Err(release_err) = self.pool.release(&identity.address).await {
                    warn!("Release of {} failed, the sweep will reclaim it: {}", identity.address, release_err);
                }
                Err(e)
            }
        }
    }

    async fn build_launch(
        &self,
        request: &LaunchRequest,
        caller: &Pubkey,
        identity: &AllocatedIdentity,
        curve: Option<&CurveConfig>,
    ) -> LaunchResult<PreparedLaunch> {
        let mint = identity.address;
        let ledger = self.ledger.clone();
        let blockhash = with_retries(self.settings.read_retry, "blockhash fetch", || {
            let ledger = ledger.clone();
            async move { ledger.get_latest_blockhash().await }
        })
        .await?;

        let mut ixs = vec![instructions::compute_unit_limit(self.settings.compute_unit_limit)];

        let config = match curve {
            Some(curve) => {
                ixs.push(instructions::create_config(&self.programs, caller, &mint, curve)?);
                self.programs.config_address(&mint)
            }
            None => self.programs.default_curve_config.ok_or_else(|| {
                LaunchError::Configuration("platform.default_curve_config is not set".into())
            })?,
        };

        let args = instructions::InitializeLaunchArgs {
            name: request.name.clone(),
            symbol: request.symbol.clone(),
            uri: request.image_uri.clone(),
        };
        ixs.push(instructions::initialize_launch(&self.programs, &config, caller, &mint, &args)?);

        if let Some(lamports) = request.initial_buy_lamports.filter(|l| *l > 0) {
            ixs.extend(instructions::initial_buy(&self.programs, &config, caller, &mint, lamports)?);
        }
        ixs.push(instructions::platform_marker(&self.platform.pubkey(), &mint));

        let mut transaction = Transaction::new_unsigned(Message::new(&ixs, Some(caller)));
        transaction.message.recent_blockhash = blockhash;
        let unsigned_tx_base64 = encode_transaction(&transaction)?;

        self.pool
            .bind_launch(&mint, LaunchBinding::new(*caller, &transaction.message))
            .await?;
        self.sessions.insert(LaunchSession {
            mint,
            caller: *caller,
            message: transaction.message.clone(),
            expires: identity.expires,
            phase: LaunchPhase::AwaitingUserSignature,
        });

        info!(
            "Prepared launch of {} for {} ({} instructions, expires {})",
            mint,
            caller,
            ixs.len(),
            identity.expires.expires_at()
        );
        Ok(PreparedLaunch {
            unsigned_tx_base64,
            mint_address: mint.to_string(),
            expires_at_epoch_ms: identity.expires.epoch_millis(),
        })
    }

    /// Counter-sign a caller-signed launch and submit it
    pub async fn submit(&self, request: SubmitRequest) -> LaunchResult<SubmittedLaunch> {
        let mint = parse_pubkey(&request.mint_address, "mint_address")?;
        let caller = parse_pubkey(&request.caller_wallet, "caller_wallet")?;
        let mut transaction = decode_transaction(&request.signed_tx_base64)?;

        self.verify_caller_signed(&transaction, &caller, &mint)?;

        let Some(identity) = self.pool.retrieve_cached(&mint).await? else {
            return self.resubmit_signed(transaction, mint, caller).await;
        };

        // Nothing is signed or released for a transaction other than the prepared one
        match identity.launch {
            Some(binding) if binding.matches(&caller, &transaction.message) => {}
            _ => {
                warn!("Rejected submission for {} that does not match its prepared launch", mint);
                return Err(LaunchError::InvalidTransaction(
                    "transaction does not match the prepared launch".into(),
                ));
            }
        }

        if self.pool.signing_deadline(&identity).is_expired() {
            if is_fully_signed(&transaction) {
                return self.resubmit_signed(transaction, mint, caller).await;
            }
            warn!("Signing window for {} expired, releasing", mint);
            self.sessions.finish(&mint, LaunchPhase::Failed);
            self.pool.release(&mint).await?;
            return Err(LaunchError::SigningWindowExpired { mint: mint.to_string() });
        }

        self.sessions.begin_submit(&mint, &caller, &transaction.message)?;

        // Caller signature is in place; the mint identity and the platform follow
        let blockhash = transaction.message.recent_blockhash;
        let signed = transaction
            .try_partial_sign(&[identity.keypair.as_ref()], blockhash)
            .and_then(|_| transaction.try_partial_sign(&[self.platform.as_ref()], blockhash));
        if let Err(e) = signed {
            self.sessions.finish(&mint, LaunchPhase::Failed);
            self.pool.release(&mint).await?;
            return Err(LaunchError::InvalidTransaction(format!("counter-signing failed: {}", e)));
        }

        // Settle before the sweep could hand the identity to someone else
        let confirm_by = Deadline::after(self.settings.confirm_timeout)
            .earlier(self.pool.reservation_deadline(&identity));
        let outcome = send_and_confirm(
            self.ledger.as_ref(),
            &transaction,
            confirm_by,
            self.settings.poll_interval,
        )
        .await;
        self.settle(outcome, &transaction, mint, caller).await
    }

    /// A submission without live secret material must already carry every signature
    async fn resubmit_signed(
        &self,
        transaction: Transaction,
        mint: Pubkey,
        caller: Pubkey,
    ) -> LaunchResult<SubmittedLaunch> {
        if !is_fully_signed(&transaction) {
            warn!("No live signing window for {}", mint);
            return Err(LaunchError::SigningWindowExpired { mint: mint.to_string() });
        }

        info!("Resubmitting fully signed launch of {}", mint);
        let confirm_by = Deadline::after(self.settings.confirm_timeout);
        let outcome = send_and_confirm(
            self.ledger.as_ref(),
            &transaction,
            confirm_by,
            self.settings.poll_interval,
        )
        .await;
        self.settle(outcome, &transaction, mint, caller).await
    }

    /// Commit on confirmation, release on every failure
    async fn settle(
        &self,
        outcome: Result<solana_sdk::signature::Signature, LedgerError>,
        transaction: &Transaction,
        mint: Pubkey,
        caller: Pubkey,
    ) -> LaunchResult<SubmittedLaunch> {
        match outcome {
            Ok(_) | Err(LedgerError::AlreadyProcessed) => {
                self.pool.commit(&mint, &caller).await?;
                self.sessions.finish(&mint, LaunchPhase::Confirmed);
                let signature = transaction.signatures.first().copied().unwrap_or_default();
                info!("Launch of {} confirmed: {}", mint, signature);
                Ok(SubmittedLaunch {
                    tx_signature: signature.to_string(),
                    mint_address: mint.to_string(),
                })
            }
            Err(e) => {
                warn!("Launch of {} failed, releasing identity: {}", mint, e);
                self.sessions.finish(&mint, LaunchPhase::Failed);
                self.pool.release(&mint).await?;
                Err(match e {
                    LedgerError::BlockhashExpired => LaunchError::BlockhashExpired,
                    LedgerError::Simulation(reason) | LedgerError::TransactionFailed(reason) => {
                        LaunchError::LedgerRejection(reason)
                    }
                    other => LaunchError::Ledger(other),
                })
            }
        }
    }

    /// The fee payer must be the caller, who has already signed; the mint and
    /// the platform authority must be required signers.
    fn verify_caller_signed(&self, transaction: &Transaction, caller: &Pubkey, mint: &Pubkey) -> LaunchResult<()> {
        let message = &transaction.message;
        if message.account_keys.first() != Some(caller) {
            return Err(LaunchError::InvalidTransaction(
                "fee payer is not the caller wallet".into(),
            ));
        }
        if signer_index(message, mint).is_none() || signer_index(message, &self.platform.pubkey()).is_none() {
            return Err(LaunchError::InvalidTransaction(
                "transaction is not a launch of this mint".into(),
            ));
        }

        let caller_signature = transaction.signatures.first().copied().unwrap_or_default();
        if caller_signature == Default::default()
            || !caller_signature.verify(caller.as_ref(), &message.serialize())
        {
            return Err(LaunchError::InvalidTransaction(
                "caller signature missing or invalid".into(),
            ));
        }
        Ok(())
    }

    /// Sweep abandoned reservations and stale sessions
    pub async fn reap_expired(&self) -> LaunchResult<u64> {
        let purged = self.sessions.purge_expired();
        if purged > 0 {
            debug!("Purged {} expired launch sessions", purged);
        }
        self.pool.reap_expired_reservations().await
    }
}
