//! Creator vesting: human durations → locked vesting parameters

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};

use crate::core::{LaunchError, LaunchResult};

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;
/// A month is counted as 30 days
pub const SECONDS_PER_MONTH: u64 = 30 * SECONDS_PER_DAY;

/// Percentages are carried in hundredths of a percent
const PERCENT_SCALE: u128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

impl DurationUnit {
    pub const fn seconds(&self) -> u64 {
        match self {
            DurationUnit::Days => SECONDS_PER_DAY,
            DurationUnit::Weeks => SECONDS_PER_WEEK,
            DurationUnit::Months => SECONDS_PER_MONTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanDuration {
    pub value: u32,
    pub unit: DurationUnit,
}

impl HumanDuration {
    pub fn new(value: u32, unit: DurationUnit) -> Self {
        Self { value, unit }
    }

    pub fn as_secs(&self) -> u64 {
        self.value as u64 * self.unit.seconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CliffParams {
    pub duration: HumanDuration,
    /// Share of the locked amount released at the cliff, in percent
    pub unlock_percent: f64,
}

/// Vesting as entered by the creator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VestingParams {
    /// Share of total supply locked, in percent
    pub percent_of_supply: f64,
    pub duration: HumanDuration,
    pub unlock_frequency: DurationUnit,
    #[serde(default)]
    pub cliff: Option<CliffParams>,
}

/// On-chain locked vesting parameters. Amounts are raw token units, durations seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize)]
pub struct LockedVesting {
    pub total_locked_amount: u64,
    pub amount_per_period: u64,
    pub cliff_unlock_amount: u64,
    pub number_of_vesting_period: u64,
    pub frequency: u64,
    pub cliff_duration_from_migration_time: u64,
    /// Always `number_of_vesting_period × frequency`
    pub total_vesting_duration: u64,
}

impl LockedVesting {
    /// Locked amount in whole tokens
    pub fn locked_tokens(&self, decimals: u8) -> u64 {
        self.total_locked_amount / 10u64.pow(decimals as u32)
    }

    /// Everything ever released by the schedule
    pub fn scheduled_total(&self) -> u128 {
        self.cliff_unlock_amount as u128
            + self.amount_per_period as u128 * self.number_of_vesting_period as u128
    }
}

fn percent_to_hundredths(percent: f64, field: &str) -> LaunchResult<u128> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(LaunchError::InvalidParameters(format!(
            "{} must be within 0..=100, got {}",
            field, percent
        )));
    }
    Ok((percent * 100.0).round() as u128)
}

fn share_of(amount: u128, hundredths: u128) -> u128 {
    amount * hundredths / PERCENT_SCALE
}

/// Translate creator vesting input into on-chain parameters for a supply of
/// `total_supply` raw units.
///
/// The period count is `floor(post_cliff / frequency)` and the reported total
/// duration is derived from it, so the ledger's cadence equals the chosen
/// unlock frequency. A cliff longer than the vesting duration is rejected; a
/// cliff equal to it releases everything at the cliff.
pub fn compute_locked_vesting(params: &VestingParams, total_supply: u64) -> LaunchResult<LockedVesting> {
    let supply_share = percent_to_hundredths(params.percent_of_supply, "vesting percent_of_supply")?;
    if supply_share == 0 {
        return Err(LaunchError::InvalidParameters("vesting percent_of_supply must be positive".into()));
    }
    if params.duration.value == 0 {
        return Err(LaunchError::InvalidParameters("vesting duration must be positive".into()));
    }

    let total_locked = share_of(total_supply as u128, supply_share);
    let duration = params.duration.as_secs();
    let frequency = params.unlock_frequency.seconds();

    let (cliff_duration, cliff_share) = match &params.cliff {
        Some(cliff) => (
            cliff.duration.as_secs(),
            percent_to_hundredths(cliff.unlock_percent, "cliff unlock_percent")?,
        ),
        None => (0, 0),
    };
    if cliff_duration > duration {
        return Err(LaunchError::InvalidParameters(format!(
            "cliff ({}s) exceeds vesting duration ({}s)",
            cliff_duration, duration
        )));
    }

    let post_cliff = duration - cliff_duration;
    let periods = post_cliff / frequency;

    if periods == 0 {
        if post_cliff == 0 {
            // Cliff-only schedule
            return Ok(LockedVesting {
                total_locked_amount: total_locked as u64,
                amount_per_period: 0,
                cliff_unlock_amount: total_locked as u64,
                number_of_vesting_period: 0,
                frequency,
                cliff_duration_from_migration_time: cliff_duration,
                total_vesting_duration: 0,
            });
        }
        return Err(LaunchError::InvalidParameters(format!(
            "vesting window after cliff ({}s) is shorter than the unlock frequency ({}s)",
            post_cliff, frequency
        )));
    }

    let mut cliff_unlock = share_of(total_locked, cliff_share);
    let remaining = total_locked - cliff_unlock;
    let per_period = remaining / periods as u128;
    cliff_unlock += remaining - per_period * periods as u128;

    Ok(LockedVesting {
        total_locked_amount: total_locked as u64,
        amount_per_period: per_period as u64,
        cliff_unlock_amount: cliff_unlock as u64,
        number_of_vesting_period: periods,
        frequency,
        cliff_duration_from_migration_time: cliff_duration,
        total_vesting_duration: periods * frequency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPPLY: u64 = 1_000_000_000 * 1_000_000;

    #[test]
    fn test_ninety_days_weekly() {
        let params = VestingParams {
            percent_of_supply: 10.0,
            duration: HumanDuration::new(90, DurationUnit::Days),
            unlock_frequency: DurationUnit::Weeks,
            cliff: None,
        };
        let vesting = compute_locked_vesting(&params, SUPPLY).unwrap();
        assert_eq!(vesting.locked_tokens(6), 100_000_000);
        assert_eq!(vesting.number_of_vesting_period, 12);
        assert_eq!(vesting.total_vesting_duration, 12 * 604_800);
        assert_eq!(vesting.scheduled_total(), vesting.total_locked_amount as u128);
    }

    #[test]
    fn test_cliff_layers_on_top() {
        let params = VestingParams {
            percent_of_supply: 20.0,
            duration: HumanDuration::new(12, DurationUnit::Months),
            unlock_frequency: DurationUnit::Months,
            cliff: Some(CliffParams {
                duration: HumanDuration::new(3, DurationUnit::Months),
                unlock_percent: 25.0,
            }),
        };
        let vesting = compute_locked_vesting(&params, SUPPLY).unwrap();
        assert_eq!(vesting.number_of_vesting_period, 9);
        assert_eq!(vesting.cliff_duration_from_migration_time, 3 * SECONDS_PER_MONTH);
        assert_eq!(vesting.total_vesting_duration, 9 * SECONDS_PER_MONTH);
        assert!(vesting.cliff_unlock_amount >= vesting.total_locked_amount / 4);
        assert_eq!(vesting.scheduled_total(), vesting.total_locked_amount as u128);
    }

    #[test]
    fn test_cliff_longer_than_duration_is_rejected() {
        let params = VestingParams {
            percent_of_supply: 5.0,
            duration: HumanDuration::new(30, DurationUnit::Days),
            unlock_frequency: DurationUnit::Days,
            cliff: Some(CliffParams {
                duration: HumanDuration::new(2, DurationUnit::Months),
                unlock_percent: 0.0,
            }),
        };
        let err = compute_locked_vesting(&params, SUPPLY).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETERS");
    }

    #[test]
    fn test_cliff_equal_to_duration_is_cliff_only() {
        let params = VestingParams {
            percent_of_supply: 5.0,
            duration: HumanDuration::new(4, DurationUnit::Weeks),
            unlock_frequency: DurationUnit::Weeks,
            cliff: Some(CliffParams {
                duration: HumanDuration::new(28, DurationUnit::Days),
                unlock_percent: 10.0,
            }),
        };
        let vesting = compute_locked_vesting(&params, SUPPLY).unwrap();
        assert_eq!(vesting.number_of_vesting_period, 0);
        assert_eq!(vesting.total_vesting_duration, 0);
        assert_eq!(vesting.cliff_unlock_amount, vesting.total_locked_amount);
    }

    #[test]
    fn test_duration_shorter_than_frequency_is_rejected() {
        let params = VestingParams {
            percent_of_supply: 5.0,
            duration: HumanDuration::new(10, DurationUnit::Days),
            unlock_frequency: DurationUnit::Months,
            cliff: None,
        };
        assert!(compute_locked_vesting(&params, SUPPLY).is_err());
    }
}
