//! Gas planning for pending contract calls

use ethers::types::U256;

/// Gas parameters applied to one submission.
///
/// `applied_units` is always `ceil(estimated_units * 1.2)`: the estimate is
/// a point-in-time value and state can move between estimation and
/// inclusion, so the envelope carries 20% head-room.
#[derive(Debug, Clone)]
pub struct GasPlan {
    pub estimated_units: U256,
    pub applied_units: U256,
    pub unit_price: U256,
}

impl GasPlan {
    pub fn new(estimated_units: U256, unit_price: U256) -> Self {
        Self {
            estimated_units,
            applied_units: buffered_units(estimated_units),
            unit_price,
        }
    }

    /// Worst-case fee for this plan, in wei
    pub fn max_fee(&self) -> U256 {
        self.applied_units * self.unit_price
    }
}

/// 120% of the estimate, rounded up
fn buffered_units(estimated: U256) -> U256 {
    (estimated * U256::from(120) + U256::from(99)) / U256::from(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_exact_on_round_estimates() {
        // 50_000 * 1.2 lands on an integer; ceiling must not overshoot
        let plan = GasPlan::new(U256::from(50_000u64), U256::from(1_000_000_000u64));
        assert_eq!(plan.applied_units, U256::from(60_000u64));
    }

    #[test]
    fn buffer_rounds_up_on_fractional_estimates() {
        // 33_334 * 1.2 = 40_000.8, which must round up
        let plan = GasPlan::new(U256::from(33_334u64), U256::from(1u64));
        assert_eq!(plan.applied_units, U256::from(40_001u64));
    }

    #[test]
    fn applied_never_falls_below_estimate() {
        for estimate in [1u64, 2, 3, 5, 21_000, 33_334, 50_000, 1_000_000, u64::MAX / 200] {
            let plan = GasPlan::new(U256::from(estimate), U256::one());
            assert!(
                plan.applied_units >= plan.estimated_units,
                "buffer shrank the estimate {}",
                estimate
            );
        }
    }

    #[test]
    fn max_fee_uses_applied_units() {
        let plan = GasPlan::new(U256::from(50_000u64), U256::from(2u64));
        assert_eq!(plan.max_fee(), U256::from(120_000u64));
    }
}
