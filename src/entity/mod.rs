//! The relational projection the engine maintains.
//!
//! Every row type here is identified by a dense integer id or by its
//! natural key (level, cycle index, ...). Ownership lives in the cache
//! and the staged transaction, never in cross-references between rows.

pub mod account;
pub mod baker_cycle;
pub mod bigmap;
pub mod block;
pub mod cycle;
pub mod operation;
pub mod protocol;
pub mod rights;
pub mod statistics;
pub mod ticket;
pub mod token;
pub mod voting;

pub use account::{Account, AccountKind};
pub use baker_cycle::{BakerCycle, DelegatorCycle, SnapshotBalance};
pub use bigmap::{BigMap, BigMapAction, BigMapKey, BigMapUpdate};
pub use block::{Block, BlockEvents, OperationsMask};
pub use cycle::Cycle;
pub use operation::{
    BallotVote, DoubleKind, Operation, OperationDetails, OpStatus, RefutationOutcome,
    RevelationKind, StakingAction,
};
pub use protocol::{ProtoConstants, Protocol};
pub use rights::{BakingRight, RightKind, RightStatus};
pub use statistics::Statistics;
pub use ticket::{Ticket, TicketBalance, TicketTransfer};
pub use token::{Token, TokenBalance, TokenStandard, TokenTransfer};
pub use voting::{PeriodKind, Proposal, ProposalStatus, VotingPeriod};
