//! Reward arithmetic, per protocol family.
//!
//! Every formula here is version-specific and preserved exactly as the
//! version defined it; nothing is generalized across versions. Integer
//! division keeps explicit remainders, which always stay with the payer
//! (they are simply not minted).

use crate::entity::ProtoConstants;
use crate::value::Mutez;

/// How attestation work is paid.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttestationRewardMode {
    /// Pre-Ithaca: each included endorsement pays immediately, scaled
    /// by its slot count.
    PerOperation,
    /// Ithaca and later: participation accumulates and a single
    /// settlement pays out at cycle end.
    CycleEnd,
}

/// Fixed block reward for the legacy (pre-Ithaca) families. The round
/// scales the reward down: a round-`r` block earns the round-0 reward
/// divided by `r + 1`.
pub fn legacy_block_reward(c: &ProtoConstants, round: i32) -> Mutez {
    Mutez(c.block_reward.0 / (round as u64 + 1))
}

/// Legacy per-endorsement reward: per-slot reward times slots, with the
/// same round discount as the block reward.
pub fn legacy_endorsement_reward(c: &ProtoConstants, slots: u32, round: i32) -> Mutez {
    Mutez(c.attestation_reward_per_slot.0 * slots as u64 / (round as u64 + 1))
}

/// Ithaca-style fixed baking reward, independent of the round.
pub fn fixed_block_reward(c: &ProtoConstants) -> Mutez {
    c.block_reward
}

/// Ithaca-style bonus for attestation power included above the
/// consensus threshold (two thirds of the committee).
pub fn block_bonus(c: &ProtoConstants, included_power: u32) -> Mutez {
    let threshold = consensus_threshold(c);
    if included_power <= threshold {
        return Mutez::zero();
    }
    Mutez(c.block_bonus_per_slot.0 * (included_power - threshold) as u64)
}

pub fn consensus_threshold(c: &ProtoConstants) -> u32 {
    (c.attesters_per_block as u32 * 2) / 3
}

/// Cycle-end attestation settlement: full participation (no missed
/// slot) earns the per-slot reward for every realized slot; any miss
/// forfeits the whole cycle's attestation rewards.
pub fn cycle_end_attestation_reward(
    c: &ProtoConstants,
    attested_slots: i32,
    missed_slots: i32,
) -> Mutez {
    if missed_slots > 0 {
        return Mutez::zero();
    }
    Mutez(c.attestation_reward_per_slot.0 * attested_slots.max(0) as u64)
}

/// Expected attestation rewards for a cycle, priced at cycle creation
/// from the future slot count.
pub fn expected_attestation_rewards(c: &ProtoConstants, future_slots: i32) -> Mutez {
    Mutez(c.attestation_reward_per_slot.0 * future_slots.max(0) as u64)
}

/// Expected baking rewards for a cycle, priced at cycle creation.
/// `max_basis` prices every expected block at its maximum (fixed reward
/// plus full bonus); the legacy basis prices the round-0 reward only.
pub fn expected_block_rewards(c: &ProtoConstants, future_blocks: i32, max_basis: bool) -> Mutez {
    let per_block = if max_basis {
        c.block_reward.0 + c.block_bonus_per_slot.0 * (c.attesters_per_block as u32 - consensus_threshold(c)) as u64
    } else {
        c.block_reward.0
    };
    Mutez(per_block * future_blocks.max(0) as u64)
}

/// Slashing outcome of a double-signing accusation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SlashingSplit {
    /// Taken from the offender's frozen deposit.
    pub offender_loss: Mutez,
    /// Minted to the accuser out of the slashed amount.
    pub accuser_reward: Mutez,
    /// Remainder of the slash, burned.
    pub burned: Mutez,
}

/// Compute the slash for a frozen deposit of `frozen` at `percent`,
/// splitting the accuser's share off. The slash saturates at the
/// available deposit.
pub fn slashing_split(frozen: Mutez, percent: u32, accuser_percent: u32) -> SlashingSplit {
    let loss = Mutez((frozen.0 * percent as u64) / 100).min(frozen);
    let accuser_reward = Mutez((loss.0 * accuser_percent as u64) / 100);
    SlashingSplit {
        offender_loss: loss,
        accuser_reward,
        burned: loss.saturating_sub(accuser_reward),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    fn constants() -> ProtoConstants {
        crate::entity::protocol::tests::constants()
    }

    #[test]
    fn legacy_round_discount() {
        let c = constants();
        assert_eq!(legacy_block_reward(&c, 0), c.block_reward);
        assert_eq!(legacy_block_reward(&c, 1), Mutez(c.block_reward.0 / 2));
    }

    #[test]
    fn bonus_below_threshold_is_zero() {
        let c = constants();
        assert_eq!(block_bonus(&c, consensus_threshold(&c)), Mutez::zero());
        assert!(block_bonus(&c, c.attesters_per_block as u32) > Mutez::zero());
    }

    #[test]
    fn missed_slot_forfeits_cycle_rewards() {
        let c = constants();
        assert_eq!(cycle_end_attestation_reward(&c, 100, 1), Mutez::zero());
        assert_eq!(
            cycle_end_attestation_reward(&c, 100, 0),
            Mutez(c.attestation_reward_per_slot.0 * 100)
        );
    }

    #[quickcheck]
    fn slash_conserves_value(frozen: Mutez, percent: u32, accuser_percent: u32) -> TestResult {
        let percent = percent % 101;
        let accuser_percent = accuser_percent % 101;
        if frozen.0 > u64::MAX / 100 {
            return TestResult::discard();
        }
        let split = slashing_split(frozen, percent, accuser_percent);
        TestResult::from_bool(
            (split.accuser_reward + split.burned).unwrap() == split.offender_loss
                && split.offender_loss <= frozen,
        )
    }
}
