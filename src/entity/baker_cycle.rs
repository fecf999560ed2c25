use crate::ids::AccountId;
use crate::value::Mutez;

/// Per-(cycle, baker) aggregate, accumulated incrementally as each block
/// of the cycle is committed. Never recomputed from scratch; every
/// forward accumulation has an exact inverse in the matching revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakerCycle {
    pub cycle: i32,
    pub baker: AccountId,

    /// Stake figures fixed at snapshot time.
    pub own_balance: Mutez,
    pub delegated_balance: Mutez,
    pub delegators_count: i32,
    pub baking_power: Mutez,

    pub future_blocks: i32,
    pub blocks: i32,
    pub missed_blocks: i32,

    /// Reward expectations priced at cycle creation; realization moves
    /// value from the `future_*` columns into the earned ones. Protocol
    /// migrations re-price these (and only these) columns.
    pub future_block_rewards: Mutez,
    pub future_attestation_rewards: Mutez,

    /// Attestation figures count committee slots, not operations.
    pub future_attestations: i32,
    pub attestations: i32,
    pub missed_attestations: i32,

    pub block_rewards: Mutez,
    pub block_fees: Mutez,
    pub attestation_rewards: Mutez,
    pub nonce_revelation_rewards: Mutez,

    pub double_baking_rewards: Mutez,
    pub double_baking_losses: Mutez,
    pub double_attesting_rewards: Mutez,
    pub double_attesting_losses: Mutez,
}

impl BakerCycle {
    pub fn new(cycle: i32, baker: AccountId) -> Self {
        BakerCycle {
            cycle,
            baker,
            own_balance: Mutez::zero(),
            delegated_balance: Mutez::zero(),
            delegators_count: 0,
            baking_power: Mutez::zero(),
            future_blocks: 0,
            blocks: 0,
            missed_blocks: 0,
            future_block_rewards: Mutez::zero(),
            future_attestation_rewards: Mutez::zero(),
            future_attestations: 0,
            attestations: 0,
            missed_attestations: 0,
            block_rewards: Mutez::zero(),
            block_fees: Mutez::zero(),
            attestation_rewards: Mutez::zero(),
            nonce_revelation_rewards: Mutez::zero(),
            double_baking_rewards: Mutez::zero(),
            double_baking_losses: Mutez::zero(),
            double_attesting_rewards: Mutez::zero(),
            double_attesting_losses: Mutez::zero(),
        }
    }
}

/// Per-(cycle, delegator) stake figure fixed at snapshot time, keyed by
/// the delegate it was counted towards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatorCycle {
    pub cycle: i32,
    pub delegator: AccountId,
    pub baker: AccountId,
    pub balance: Mutez,
}

/// Raw per-account balance measurement recorded on snapshot blocks,
/// consumed `preserved_cycles` later by the cycle engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBalance {
    pub level: i32,
    pub account: AccountId,
    /// The delegate the balance counts towards; delegates point at
    /// themselves.
    pub delegate: Option<AccountId>,
    pub balance: Mutez,
    /// Delegates only: full staking balance and delegator count at the
    /// snapshot level.
    pub staking_balance: Mutez,
    pub delegators_count: i32,
}
