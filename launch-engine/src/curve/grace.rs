//! Anti-sniper grace period fee decay
//!
//! Right after launch the trading fee starts high and decays exponentially
//! towards the tier fee. The same schedule drives the on-chain configuration
//! and any live "current fee" display.

use std::time::Duration;

/// Fee charged at the first instant of trading
pub const GRACE_STARTING_FEE_BPS: u32 = 5_000;
pub const GRACE_NUMBER_OF_PERIODS: u16 = 12;
pub const GRACE_DURATION: Duration = Duration::from_secs(20);

const BPS_DENOMINATOR: f64 = 10_000.0;

/// Deterministic exponential fee decay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePeriodFeeScheduler {
    starting_fee_bps: u32,
    ending_fee_bps: u32,
    number_of_periods: u16,
    duration: Duration,
}

impl GracePeriodFeeScheduler {
    /// Standard grace period ending at `ending_fee_bps`
    pub fn new(ending_fee_bps: u32) -> Self {
        Self::with_params(
            GRACE_STARTING_FEE_BPS,
            ending_fee_bps,
            GRACE_NUMBER_OF_PERIODS,
            GRACE_DURATION,
        )
    }

    pub fn with_params(
        starting_fee_bps: u32,
        ending_fee_bps: u32,
        number_of_periods: u16,
        duration: Duration,
    ) -> Self {
        Self {
            starting_fee_bps,
            ending_fee_bps: ending_fee_bps.min(starting_fee_bps),
            number_of_periods: number_of_periods.max(1),
            duration,
        }
    }

    pub fn starting_fee_bps(&self) -> u32 {
        self.starting_fee_bps
    }

    pub fn ending_fee_bps(&self) -> u32 {
        self.ending_fee_bps
    }

    pub fn number_of_periods(&self) -> u16 {
        self.number_of_periods
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Per-period reduction in basis points:
    /// `10000 × (1 − (ending / starting)^(1 / periods))`, rounded.
    pub fn reduction_factor(&self) -> u64 {
        if self.starting_fee_bps == 0 || self.ending_fee_bps >= self.starting_fee_bps {
            return 0;
        }
        let ratio = self.ending_fee_bps as f64 / self.starting_fee_bps as f64;
        let per_period = ratio.powf(1.0 / self.number_of_periods as f64);
        (BPS_DENOMINATOR * (1.0 - per_period)).round() as u64
    }

    /// Length of one decay period
    pub fn period_frequency(&self) -> Duration {
        self.duration / self.number_of_periods as u32
    }

    /// Fee after `period` reductions, never below the ending fee
    pub fn fee_at_period(&self, period: u16) -> u32 {
        if period >= self.number_of_periods {
            return self.ending_fee_bps;
        }
        let keep = 1.0 - self.reduction_factor() as f64 / BPS_DENOMINATOR;
        let fee = self.starting_fee_bps as f64 * keep.powi(period as i32);
        (fee.round() as u32).max(self.ending_fee_bps)
    }

    /// Fee in effect `elapsed` after trading opened
    pub fn fee_at(&self, elapsed: Duration) -> u32 {
        if elapsed >= self.duration {
            return self.ending_fee_bps;
        }
        let frequency = self.period_frequency().as_millis().max(1);
        let period = (elapsed.as_millis() / frequency).min(u16::MAX as u128) as u16;
        self.fee_at_period(period)
    }

    /// Fee for every period, from the starting fee to the ending fee inclusive
    pub fn schedule(&self) -> Vec<u32> {
        (0..=self.number_of_periods).map(|p| self.fee_at_period(p)).collect()
    }
}
