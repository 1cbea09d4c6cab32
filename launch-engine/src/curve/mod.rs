//! Curve configuration calculator
//!
//! Pure translation of creator-facing economics (fee tier, grace period,
//! vesting, graduation threshold) into the numeric configuration the launch
//! program stores on chain.

pub mod fee_tiers;
pub mod grace;
pub mod vesting;

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};
use tracing::{debug, warn};

use crate::config::CurveConfigSettings;
use crate::core::types::pubkey_serde;
use crate::core::{LaunchError, LaunchResult};

pub use fee_tiers::{resolve_fee_tier, FeeTier, ResolvedFeeTier, FEE_TIERS};
pub use grace::{GracePeriodFeeScheduler, GRACE_DURATION, GRACE_NUMBER_OF_PERIODS, GRACE_STARTING_FEE_BPS};
pub use vesting::{
    compute_locked_vesting, CliffParams, DurationUnit, HumanDuration, LockedVesting, VestingParams,
};

/// Migration market cap as a multiple of the graduation threshold
pub const DEFAULT_MIGRATION_MARKET_CAP_MULTIPLIER: f64 = 2.0;
/// Actual fee multiple applied to displayed fees missing from the tier table
pub const DEFAULT_FALLBACK_FEE_MULTIPLIER: u32 = 2;
/// Creator share for displayed fees missing from the tier table
pub const DEFAULT_FALLBACK_CREATOR_SHARE: u8 = 50;
/// A fee can never exceed the whole trade
pub const MAX_FEE_BPS: u64 = 10_000;

/// Economics requested by a creator for a custom launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCurveParams {
    /// Displayed trading fee in basis points
    pub fee_tier_bps: u32,
    #[serde(default)]
    pub grace_period: bool,
    #[serde(default)]
    pub vesting: Option<VestingParams>,
    #[serde(default)]
    pub graduation_threshold_sol: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub enum FeeSchedulerMode {
    Linear,
    Exponential,
}

/// Base fee as the pool program consumes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub struct BaseFeeSchedule {
    pub cliff_fee_bps: u64,
    pub number_of_period: u16,
    pub period_frequency_ms: u64,
    pub reduction_factor: u64,
    pub mode: FeeSchedulerMode,
}

impl BaseFeeSchedule {
    fn flat(fee_bps: u32) -> Self {
        Self {
            cliff_fee_bps: fee_bps as u64,
            number_of_period: 0,
            period_frequency_ms: 0,
            reduction_factor: 0,
            mode: FeeSchedulerMode::Linear,
        }
    }

    fn grace(scheduler: &GracePeriodFeeScheduler) -> Self {
        Self {
            cliff_fee_bps: scheduler.starting_fee_bps() as u64,
            number_of_period: scheduler.number_of_periods(),
            period_frequency_ms: scheduler.period_frequency().as_millis() as u64,
            reduction_factor: scheduler.reduction_factor(),
            mode: FeeSchedulerMode::Exponential,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub struct LpSplit {
    pub creator_lp_percentage: u8,
    pub partner_lp_percentage: u8,
    pub creator_locked_lp_percentage: u8,
    pub partner_locked_lp_percentage: u8,
}

impl LpSplit {
    pub fn total(&self) -> u32 {
        self.creator_lp_percentage as u32
            + self.partner_lp_percentage as u32
            + self.creator_locked_lp_percentage as u32
            + self.partner_locked_lp_percentage as u32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub struct CreatorFeeShare {
    pub creator_percentage: u8,
    pub platform_percentage: u8,
}

/// Accounts the config names; they travel as instruction accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveAuthorities {
    #[serde(with = "pubkey_serde")]
    pub fee_claimer: Pubkey,
    #[serde(with = "pubkey_serde")]
    pub leftover_receiver: Pubkey,
}

/// Derived curve configuration, immutable once submitted
#[derive(Debug, Clone, PartialEq, Serialize, BorshSerialize)]
pub struct CurveConfig {
    /// Raw token units
    pub total_supply: u64,
    pub decimals: u8,
    pub base_fee: BaseFeeSchedule,
    pub vesting: Option<LockedVesting>,
    pub migration_threshold_lamports: u64,
    pub migration_market_cap_lamports: u64,
    pub lp_split: LpSplit,
    pub creator_fee_share: CreatorFeeShare,
    /// Tier fee the grace period decays to, or the flat fee
    pub ending_fee_bps: u64,
    #[borsh_skip]
    pub grace_period: bool,
    #[borsh_skip]
    pub fee_tier_degraded: bool,
    #[borsh_skip]
    pub authorities: CurveAuthorities,
}

impl CurveConfig {
    /// Scheduler driving the grace decay, when enabled
    pub fn grace_scheduler(&self) -> Option<GracePeriodFeeScheduler> {
        self.grace_period
            .then(|| GracePeriodFeeScheduler::new(self.ending_fee_bps as u32))
    }

    /// Instruction data encoding
    pub fn to_instruction_data(&self) -> LaunchResult<Vec<u8>> {
        let mut data = Vec::new();
        BorshSerialize::serialize(self, &mut data)
            .map_err(|e| LaunchError::Serialization(e.to_string()))?;
        Ok(data)
    }

    /// Output validation: fees stay within bounds, splits sum to 100 and
    /// vesting fits inside supply
    pub fn validate(&self) -> LaunchResult<()> {
        if self.ending_fee_bps > MAX_FEE_BPS {
            return Err(LaunchError::InvalidParameters(format!(
                "fee of {} bps exceeds {} bps",
                self.ending_fee_bps, MAX_FEE_BPS
            )));
        }
        // The grace period only ever decays towards the tier fee
        if self.grace_period && self.ending_fee_bps >= GRACE_STARTING_FEE_BPS as u64 {
            return Err(LaunchError::InvalidParameters(format!(
                "fee of {} bps leaves no grace period below {} bps",
                self.ending_fee_bps, GRACE_STARTING_FEE_BPS
            )));
        }
        if self.lp_split.total() != 100 {
            return Err(LaunchError::InvalidParameters(format!(
                "LP split sums to {}",
                self.lp_split.total()
            )));
        }
        let share = self.creator_fee_share;
        if share.creator_percentage as u32 + share.platform_percentage as u32 != 100 {
            return Err(LaunchError::InvalidParameters("creator fee share must sum to 100".into()));
        }
        if self.total_supply == 0 || self.migration_threshold_lamports == 0 {
            return Err(LaunchError::InvalidParameters("supply and threshold must be positive".into()));
        }
        if let Some(vesting) = &self.vesting {
            if vesting.total_locked_amount > self.total_supply
                || vesting.scheduled_total() != vesting.total_locked_amount as u128
            {
                return Err(LaunchError::InvalidParameters("vesting does not fit the supply".into()));
            }
        }
        Ok(())
    }
}

/// Maps creator economics to `CurveConfig`
#[derive(Debug, Clone)]
pub struct CurveConfigCalculator {
    settings: CurveConfigSettings,
    fee_claimer: Option<Pubkey>,
    leftover_receiver: Option<Pubkey>,
}

impl CurveConfigCalculator {
    pub fn new(
        settings: CurveConfigSettings,
        fee_claimer: Option<Pubkey>,
        leftover_receiver: Option<Pubkey>,
    ) -> Self {
        Self { settings, fee_claimer, leftover_receiver }
    }

    pub fn settings(&self) -> &CurveConfigSettings {
        &self.settings
    }

    fn authorities(&self) -> LaunchResult<CurveAuthorities> {
        let fee_claimer = self
            .fee_claimer
            .ok_or_else(|| LaunchError::Configuration("platform.fee_claimer is not set".into()))?;
        let leftover_receiver = self
            .leftover_receiver
            .ok_or_else(|| LaunchError::Configuration("platform.leftover_receiver is not set".into()))?;
        Ok(CurveAuthorities { fee_claimer, leftover_receiver })
    }

    fn total_supply(&self) -> LaunchResult<u64> {
        10u64
            .checked_pow(self.settings.decimals as u32)
            .and_then(|scale| self.settings.total_supply_tokens.checked_mul(scale))
            .ok_or_else(|| LaunchError::Configuration("total supply overflows u64".into()))
    }

    fn sol_to_lamports(sol: f64) -> LaunchResult<u64> {
        let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
        if !lamports.is_finite() || lamports < 1.0 || lamports > u64::MAX as f64 {
            return Err(LaunchError::InvalidParameters(format!("invalid SOL amount {}", sol)));
        }
        Ok(lamports as u64)
    }

    pub fn calculate(&self, params: &CustomCurveParams) -> LaunchResult<CurveConfig> {
        let authorities = self.authorities()?;
        let total_supply = self.total_supply()?;

        let resolved = resolve_fee_tier(
            params.fee_tier_bps,
            self.settings.fallback_fee_multiplier,
            self.settings.fallback_creator_share,
        );
        let tier = resolved.tier;
        if tier.actual_bps == 0 {
            return Err(LaunchError::InvalidParameters("fee tier must be positive".into()));
        }

        let base_fee = if params.grace_period {
            BaseFeeSchedule::grace(&GracePeriodFeeScheduler::new(tier.actual_bps))
        } else {
            BaseFeeSchedule::flat(tier.actual_bps)
        };

        let vesting = params
            .vesting
            .as_ref()
            .map(|v| compute_locked_vesting(v, total_supply))
            .transpose()?;

        let threshold_sol = params
            .graduation_threshold_sol
            .unwrap_or(self.settings.default_graduation_threshold_sol);
        let migration_threshold_lamports = Self::sol_to_lamports(threshold_sol)?;
        let migration_market_cap_lamports =
            Self::sol_to_lamports(threshold_sol * self.settings.migration_market_cap_multiplier)?;

        let config = CurveConfig {
            total_supply,
            decimals: self.settings.decimals,
            base_fee,
            vesting,
            migration_threshold_lamports,
            migration_market_cap_lamports,
            lp_split: LpSplit {
                creator_lp_percentage: self.settings.creator_lp_percentage,
                partner_lp_percentage: self.settings.partner_lp_percentage,
                creator_locked_lp_percentage: self.settings.creator_locked_lp_percentage,
                partner_locked_lp_percentage: self.settings.partner_locked_lp_percentage,
            },
            creator_fee_share: CreatorFeeShare {
                creator_percentage: tier.creator_share,
                platform_percentage: tier.platform_share(),
            },
            ending_fee_bps: tier.actual_bps as u64,
            grace_period: params.grace_period,
            fee_tier_degraded: resolved.degraded,
            authorities,
        };
        config.validate()?;

        if resolved.degraded {
            warn!("Curve config built with degraded fee tier {} bps", params.fee_tier_bps);
        }
        debug!(
            "Curve config: fee {} bps, grace {}, vesting {}, threshold {} lamports",
            tier.actual_bps,
            params.grace_period,
            config.vesting.is_some(),
            migration_threshold_lamports
        );
        Ok(config)
    }
}
