//! Displayed fee tier → on-chain fee lookup
//!
//! Creators pick a displayed trading fee. The pool charges a slightly higher
//! actual fee and the difference is the platform's cut, so the creator keeps
//! roughly `displayed / actual` of every fee collected.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One row of the fee tier table, all values in basis points / percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub displayed_bps: u32,
    pub actual_bps: u32,
    /// Creator share of collected trading fees, in percent
    pub creator_share: u8,
}

impl FeeTier {
    pub const fn platform_share(&self) -> u8 {
        100 - self.creator_share
    }
}

pub const FEE_TIERS: &[FeeTier] = &[
    FeeTier { displayed_bps: 25, actual_bps: 50, creator_share: 50 },
    FeeTier { displayed_bps: 50, actual_bps: 75, creator_share: 67 },
    FeeTier { displayed_bps: 100, actual_bps: 140, creator_share: 71 },
    FeeTier { displayed_bps: 200, actual_bps: 260, creator_share: 77 },
    FeeTier { displayed_bps: 300, actual_bps: 380, creator_share: 79 },
    FeeTier { displayed_bps: 500, actual_bps: 600, creator_share: 83 },
];

/// Outcome of a tier lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFeeTier {
    pub tier: FeeTier,
    /// The displayed fee was not in the table and the fallback rule applied
    pub degraded: bool,
}

/// Resolve a displayed fee against the table, falling back to
/// `displayed × fallback_multiplier` with `fallback_creator_share`.
pub fn resolve_fee_tier(
    displayed_bps: u32,
    fallback_multiplier: u32,
    fallback_creator_share: u8,
) -> ResolvedFeeTier {
    if let Some(tier) = FEE_TIERS.iter().find(|t| t.displayed_bps == displayed_bps) {
        return ResolvedFeeTier { tier: *tier, degraded: false };
    }

    let tier = FeeTier {
        displayed_bps,
        actual_bps: displayed_bps.saturating_mul(fallback_multiplier),
        creator_share: fallback_creator_share.min(100),
    };
    warn!(
        "Unrecognized fee tier {} bps, degraded to {} bps with {}/{} split",
        displayed_bps,
        tier.actual_bps,
        tier.creator_share,
        tier.platform_share()
    );
    ResolvedFeeTier { tier, degraded: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tiers() {
        let top = resolve_fee_tier(500, 2, 50);
        assert!(!top.degraded);
        assert_eq!(top.tier.actual_bps, 600);
        assert_eq!(top.tier.creator_share, 83);
        assert_eq!(top.tier.platform_share(), 17);

        let bottom = resolve_fee_tier(25, 2, 50);
        assert_eq!(bottom.tier.actual_bps, 50);
        assert_eq!(bottom.tier.creator_share, 50);
    }

    #[test]
    fn test_creator_share_tracks_displayed_over_actual() {
        for tier in FEE_TIERS {
            let expected = (tier.displayed_bps as f64 * 100.0 / tier.actual_bps as f64).round() as u8;
            assert_eq!(tier.creator_share, expected, "tier {}", tier.displayed_bps);
        }
        assert!(FEE_TIERS.windows(2).all(|w| w[0].creator_share < w[1].creator_share));
    }

    #[test]
    fn test_unknown_tier_falls_back() {
        let resolved = resolve_fee_tier(150, 2, 50);
        assert!(resolved.degraded);
        assert_eq!(resolved.tier.actual_bps, 300);
        assert_eq!(resolved.tier.creator_share, 50);
    }
}
