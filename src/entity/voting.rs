use crate::value::Mutez;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PeriodKind {
    Proposal,
    Exploration,
    Cooldown,
    Promotion,
    Adoption,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProposalStatus {
    Active,
    Accepted,
    Rejected,
    Skipped,
}

/// A governance voting period. Ballot totals accumulate as ballots are
/// committed within the period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingPeriod {
    pub index: i32,
    /// Voting epoch: a full proposal->adoption run shares one epoch.
    pub epoch: i32,
    pub kind: PeriodKind,
    pub first_level: i32,
    pub last_level: i32,
    pub proposals_count: i32,
    pub yay_power: Mutez,
    pub nay_power: Mutez,
    pub pass_power: Mutez,
    /// Set when a dictator proposal terminated the period early.
    pub dictator_override: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub hash: String,
    pub epoch: i32,
    pub first_period: i32,
    pub upvotes_power: Mutez,
    pub status: ProposalStatus,
}
