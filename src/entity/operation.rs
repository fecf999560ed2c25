use crate::address::Address;
use crate::ids::{AccountId, BigMapId, OpId, TicketId};
use crate::value::Mutez;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpStatus {
    Applied,
    Failed,
    Backtracked,
    Skipped,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DoubleKind {
    Baking,
    Attesting,
    Preattesting,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RevelationKind {
    SeedNonce,
    Vdf,
}

/// Persisted operation row.
///
/// Besides the forward effects, the payload records the prior state that
/// the reverse branch of a conditional side effect needs (previous
/// delegate, previous deactivation level, previous account kind), so a
/// revert can be driven entirely from the row looked up by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: OpId,
    pub level: i32,
    /// Operation group hash; implicit operations synthesize one.
    pub hash: String,
    pub sender: Option<AccountId>,
    /// Set on internal operations: the top-level manager source.
    pub initiator: Option<AccountId>,
    /// Parent operation for internal results.
    pub parent: Option<OpId>,
    pub counter: Option<i64>,
    pub status: OpStatus,
    pub fee: Mutez,
    pub details: OperationDetails,
}

impl Operation {
    pub fn is_internal(&self) -> bool {
        self.parent.is_some()
    }
}

/// Kind-specific payload; one variant per operation kind the engine
/// understands. An unknown kind never reaches this type: it fails the
/// block parse and aborts indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationDetails {
    Endorsement {
        delegate: AccountId,
        slots: u32,
        /// Right realized by this endorsement, used to finalize
        /// per-cycle expected vs. actual figures.
        reward: Mutez,
    },
    Preendorsement {
        delegate: AccountId,
        slots: u32,
    },
    Proposal {
        period: i32,
        proposals: Vec<String>,
        /// Set when a dictator proposal short-circuited the group.
        dictator: bool,
        /// Proposals that were newly created by this upvote, needed to
        /// delete them again on revert.
        created: Vec<String>,
        upvoting_power: Mutez,
    },
    Ballot {
        period: i32,
        proposal: String,
        vote: BallotVote,
        voting_power: Mutez,
    },
    Activation {
        account: AccountId,
        balance: Mutez,
    },
    DoubleSigning {
        kind: DoubleKind,
        accused_level: i32,
        /// Cycle of the accused level; slashing applies there, not at
        /// the accusation block's cycle.
        accused_cycle: i32,
        offender: AccountId,
        accuser: AccountId,
        offender_loss: Mutez,
        accuser_reward: Mutez,
    },
    NonceRevelation {
        kind: RevelationKind,
        baker: AccountId,
        revealed_level: i32,
        reward: Mutez,
    },
    DrainDelegate {
        delegate: AccountId,
        target: AccountId,
        amount: Mutez,
        allocated_target: bool,
    },
    Reveal {
        public_key: String,
    },
    Transaction {
        target: Option<AccountId>,
        target_address: Option<Address>,
        amount: Mutez,
        entrypoint: Option<String>,
        storage_fee: Mutez,
        allocation_fee: Mutez,
        /// Target row was created by this transaction (revert removes it).
        allocated_target: bool,
    },
    Delegation {
        new_delegate: Option<AccountId>,
        prev_delegate: Option<AccountId>,
        /// Sender balance at delegation time; this is the amount moved
        /// between the old and new delegate's staking balances.
        amount: Mutez,
        self_delegation: bool,
        /// Prior state for the reverse branch of the User -> Delegate
        /// upgrade (or of a re-activation).
        prev_kind_was_user: bool,
        prev_delegation_level: Option<i32>,
        prev_activation_level: Option<i32>,
        prev_deactivation_level: Option<i32>,
    },
    Origination {
        contract: AccountId,
        balance: Mutez,
        delegate: Option<AccountId>,
        storage_fee: Mutez,
        allocation_fee: Mutez,
    },
    Staking {
        action: StakingAction,
        amount: Mutez,
        baker: Option<AccountId>,
    },
    SetDelegateParameters {
        limit_of_staking_over_baking: i64,
        edge_of_baking_over_staking: i64,
        prev_limit: i64,
        prev_edge: i64,
    },
    TransferTicket {
        target: AccountId,
        ticket: TicketId,
        amount: i64,
        storage_fee: Mutez,
    },
    SmartRollupOriginate {
        rollup: AccountId,
        genesis_commitment: String,
        storage_fee: Mutez,
    },
    /// Messages go to the shared rollup inbox, not to a specific rollup.
    SmartRollupAddMessages {
        messages_count: i32,
    },
    SmartRollupCement {
        rollup: AccountId,
        commitment: String,
    },
    SmartRollupPublish {
        rollup: AccountId,
        commitment: String,
        bond: Mutez,
    },
    SmartRollupRefute {
        rollup: AccountId,
        game_status: RefutationOutcome,
        /// Bond moved from the loser to the winner/burn, when resolved.
        slashed_bond: Mutez,
        opponent: Option<AccountId>,
    },
    SmartRollupRecoverBond {
        rollup: AccountId,
        staker: AccountId,
        bond: Mutez,
    },
    SmartRollupExecute {
        rollup: AccountId,
        commitment: String,
    },
    DalPublishCommitment {
        slot_index: i32,
        commitment: String,
    },
    /// Implicit cycle-end settlement of attestation rewards for one
    /// baker, based on realized participation.
    EndorsingReward {
        baker: AccountId,
        expected: Mutez,
        received: Mutez,
    },
    /// Implicit protocol-level operation (liquidity baking subsidy).
    Subsidy {
        target: AccountId,
        amount: Mutez,
    },
    /// Balance adjustment applied by a protocol migration.
    Migration {
        account: AccountId,
        balance_change: Mutez,
    },
    /// Implicit delegate deactivation listed in block metadata; the
    /// previous horizon is kept so the revert can restore it.
    Deactivation {
        delegate: AccountId,
        prev_deactivation_level: Option<i32>,
    },
    /// Big map side-table bookkeeping row; see `BigMapUpdate` for the
    /// actual diff content.
    BigMapDiff {
        bigmap: BigMapId,
    },
}

impl OperationDetails {
    /// Bit of this kind in the block's `OperationsMask`.
    pub fn mask_bit(&self) -> u32 {
        match self {
            OperationDetails::Endorsement { .. } => 0,
            OperationDetails::Preendorsement { .. } => 1,
            OperationDetails::Proposal { .. } => 2,
            OperationDetails::Ballot { .. } => 3,
            OperationDetails::Activation { .. } => 4,
            OperationDetails::DoubleSigning { .. } => 5,
            OperationDetails::NonceRevelation { .. } => 6,
            OperationDetails::DrainDelegate { .. } => 7,
            OperationDetails::Reveal { .. } => 8,
            OperationDetails::Transaction { .. } => 9,
            OperationDetails::Delegation { .. } => 10,
            OperationDetails::Origination { .. } => 11,
            OperationDetails::Staking { .. } => 12,
            OperationDetails::SetDelegateParameters { .. } => 13,
            OperationDetails::TransferTicket { .. } => 14,
            OperationDetails::SmartRollupOriginate { .. } => 15,
            OperationDetails::SmartRollupAddMessages { .. } => 16,
            OperationDetails::SmartRollupCement { .. } => 17,
            OperationDetails::SmartRollupPublish { .. } => 18,
            OperationDetails::SmartRollupRefute { .. } => 19,
            OperationDetails::SmartRollupRecoverBond { .. } => 20,
            OperationDetails::SmartRollupExecute { .. } => 21,
            OperationDetails::DalPublishCommitment { .. } => 22,
            OperationDetails::EndorsingReward { .. } => 23,
            OperationDetails::Subsidy { .. } => 24,
            OperationDetails::Migration { .. } => 25,
            OperationDetails::Deactivation { .. } => 26,
            OperationDetails::BigMapDiff { .. } => 27,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BallotVote {
    Yay,
    Nay,
    Pass,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StakingAction {
    Stake,
    Unstake,
    FinalizeUnstake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefutationOutcome {
    Ongoing,
    Won,
    Lost,
    Draw,
}
