use crate::address::Address;
use crate::ids::ProtoCode;
use crate::value::Mutez;

/// Protocol constant set, normalized across versions.
///
/// Each protocol version fills this from its own parameter shape in its
/// activator; later passes only ever read the normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoConstants {
    pub blocks_per_cycle: i32,
    /// Number of balance-snapshot sampling points per cycle.
    pub snapshots_per_cycle: i32,
    /// How many cycles ahead rights are known (consensus rights delay).
    pub preserved_cycles: i32,

    /// Attestation committee size per block.
    pub attesters_per_block: i32,
    /// Number of fallback baking rounds materialized per level.
    pub baking_rounds: u32,

    pub block_reward: Mutez,
    /// Bonus per included attestation slot above the threshold.
    pub block_bonus_per_slot: Mutez,
    /// Attestation reward for a whole cycle of full participation,
    /// per slot.
    pub attestation_reward_per_slot: Mutez,
    pub nonce_revelation_reward: Mutez,
    pub lb_subsidy: Mutez,

    /// Portion of the offender's frozen stake slashed on double baking,
    /// in percent.
    pub double_baking_slash_percent: u32,
    /// Same for double (pre)attestation.
    pub double_attesting_slash_percent: u32,
    /// Share of the slashed amount awarded to the accuser, in percent.
    pub accuser_reward_percent: u32,

    /// Fraction of the staking balance frozen as security deposit,
    /// in percent.
    pub frozen_deposit_percent: u32,

    pub time_between_blocks: i64,
    pub blocks_per_voting_period: i32,

    /// Testnet dictator, when configured. A proposal signed by this key
    /// short-circuits the voting pipeline.
    pub dictator: Option<Address>,
}

impl ProtoConstants {
    pub fn cycle_of(&self, level: i32, first_cycle_level: i32, first_cycle: i32) -> i32 {
        first_cycle + (level - first_cycle_level) / self.blocks_per_cycle
    }
}

/// One row per protocol version that has been active on the indexed
/// branch. Exactly one protocol is current at any level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub code: ProtoCode,
    pub hash: String,
    pub first_level: i32,
    /// Still-active protocols have no last level yet.
    pub last_level: Option<i32>,
    /// Cycle at which this protocol took over.
    pub first_cycle: i32,
    /// Level at which `first_cycle` started (cycle lengths can change
    /// across migrations, so cycles are anchored, not derived).
    pub first_cycle_level: i32,
    pub constants: ProtoConstants,
}

impl Protocol {
    pub fn cycle_of(&self, level: i32) -> i32 {
        self.constants
            .cycle_of(level, self.first_cycle_level, self.first_cycle)
    }

    pub fn first_level_of_cycle(&self, cycle: i32) -> i32 {
        self.first_cycle_level + (cycle - self.first_cycle) * self.constants.blocks_per_cycle
    }

    pub fn last_level_of_cycle(&self, cycle: i32) -> i32 {
        self.first_level_of_cycle(cycle + 1) - 1
    }

    pub fn is_cycle_begin(&self, level: i32) -> bool {
        (level - self.first_cycle_level) % self.constants.blocks_per_cycle == 0
    }

    pub fn is_cycle_end(&self, level: i32) -> bool {
        self.is_cycle_begin(level + 1)
    }

    /// Snapshot sampling points are spread evenly within the cycle.
    pub fn is_snapshot_level(&self, level: i32) -> bool {
        let offset = (level - self.first_cycle_level)
            % (self.constants.blocks_per_cycle / self.constants.snapshots_per_cycle);
        offset == 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn constants() -> ProtoConstants {
        ProtoConstants {
            blocks_per_cycle: 128,
            snapshots_per_cycle: 8,
            preserved_cycles: 5,
            attesters_per_block: 32,
            baking_rounds: 4,
            block_reward: Mutez(40_000_000),
            block_bonus_per_slot: Mutez(5_000),
            attestation_reward_per_slot: Mutez(2_000),
            nonce_revelation_reward: Mutez(125_000),
            lb_subsidy: Mutez(1_250_000),
            double_baking_slash_percent: 5,
            double_attesting_slash_percent: 50,
            accuser_reward_percent: 50,
            frozen_deposit_percent: 10,
            time_between_blocks: 8,
            blocks_per_voting_period: 256,
            dictator: None,
        }
    }

    fn protocol() -> Protocol {
        Protocol {
            code: ProtoCode(1),
            hash: "PtAlpha1".into(),
            first_level: 1,
            last_level: None,
            first_cycle: 0,
            first_cycle_level: 1,
            constants: constants(),
        }
    }

    #[test]
    fn cycle_arithmetic() {
        let p = protocol();
        assert_eq!(p.cycle_of(1), 0);
        assert_eq!(p.cycle_of(128), 0);
        assert_eq!(p.cycle_of(129), 1);
        assert_eq!(p.first_level_of_cycle(1), 129);
        assert_eq!(p.last_level_of_cycle(0), 128);
        assert!(p.is_cycle_begin(129));
        assert!(p.is_cycle_end(128));
    }

    #[test]
    fn snapshot_points() {
        let p = protocol();
        // 128 / 8 = 16 block sub-periods
        assert!(p.is_snapshot_level(1));
        assert!(p.is_snapshot_level(17));
        assert!(!p.is_snapshot_level(18));
    }
}
