//! End-of-period governance transitions.
//!
//! Runs in the after-commit phase of the last block of a voting period
//! (or of the block where a dictator proposal landed). The transition
//! settles proposal statuses and opens the next period; every outcome
//! is a pure function of the period row and the epoch's proposals, so
//! the revert recomputes what was settled instead of storing it.

use crate::entity::{BlockEvents, PeriodKind, ProposalStatus, VotingPeriod};
use crate::error::Result;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::store::WriteOp;
use crate::value::Mutez;

/// Whether the current block closes the active period.
pub fn period_ends(ctx: &BlockContext) -> Result<bool> {
    let period = ctx.cache.voting.current_period()?;
    Ok(ctx.dictator_fired || period.last_level == ctx.level())
}

/// Close the current period, settle proposals and open the successor.
pub fn end_of_period(ctx: &mut BlockContext) -> Result<()> {
    let period = ctx.cache.voting.current_period()?.clone();
    let epoch = period.epoch;

    let (next_kind, next_epoch) = if period.dictator_override {
        settle_active(ctx, epoch, ProposalStatus::Rejected)?;
        (PeriodKind::Proposal, epoch + 1)
    } else {
        match period.kind {
            PeriodKind::Proposal => match winning_proposal(ctx, epoch) {
                Some(winner) => {
                    settle_active_except(ctx, epoch, &winner, ProposalStatus::Skipped)?;
                    (PeriodKind::Exploration, epoch)
                }
                None => (PeriodKind::Proposal, epoch + 1),
            },
            PeriodKind::Exploration => {
                if period.yay_power > period.nay_power {
                    (PeriodKind::Cooldown, epoch)
                } else {
                    settle_active(ctx, epoch, ProposalStatus::Rejected)?;
                    (PeriodKind::Proposal, epoch + 1)
                }
            }
            PeriodKind::Cooldown => (PeriodKind::Promotion, epoch),
            PeriodKind::Promotion => {
                if period.yay_power > period.nay_power {
                    (PeriodKind::Adoption, epoch)
                } else {
                    settle_active(ctx, epoch, ProposalStatus::Rejected)?;
                    (PeriodKind::Proposal, epoch + 1)
                }
            }
            PeriodKind::Adoption => {
                settle_active(ctx, epoch, ProposalStatus::Accepted)?;
                (PeriodKind::Proposal, epoch + 1)
            }
        }
    };

    let level = ctx.level();
    let span = ctx.proto.constants.blocks_per_voting_period;
    let next = VotingPeriod {
        index: period.index + 1,
        epoch: next_epoch,
        kind: next_kind,
        first_level: level + 1,
        last_level: level + span,
        proposals_count: 0,
        yay_power: Mutez::zero(),
        nay_power: Mutez::zero(),
        pass_power: Mutez::zero(),
        dictator_override: false,
    };
    ctx.cache.journal.push(WriteOp::UpsertVotingPeriod {
        index: next.index,
    });
    ctx.cache.voting.insert_period(next);
    ctx.block.events.set(BlockEvents::VOTING_PERIOD_END);
    Ok(())
}

/// The proposal advancing out of a proposal period: highest upvote
/// power, ties broken by the lexicographically smallest hash.
fn winning_proposal(ctx: &BlockContext, epoch: i32) -> Option<String> {
    ctx.cache
        .voting
        .proposals_of_epoch(epoch)
        .filter(|p| p.status == ProposalStatus::Active)
        .max_by(|a, b| {
            a.upvotes_power
                .cmp(&b.upvotes_power)
                .then_with(|| b.hash.cmp(&a.hash))
        })
        .map(|p| p.hash.clone())
}

fn settle_active(ctx: &mut BlockContext, epoch: i32, status: ProposalStatus) -> Result<()> {
    settle_active_except(ctx, epoch, "", status)
}

fn settle_active_except(
    ctx: &mut BlockContext,
    epoch: i32,
    keep: &str,
    status: ProposalStatus,
) -> Result<()> {
    let hashes: Vec<String> = ctx
        .cache
        .voting
        .proposals_of_epoch(epoch)
        .filter(|p| p.status == ProposalStatus::Active && p.hash != keep)
        .map(|p| p.hash.clone())
        .collect();
    for hash in hashes {
        ctx.cache.voting.settle_proposal(epoch, &hash, status)?;
        ctx.cache.journal.push(WriteOp::UpsertProposal {
            epoch,
            hash,
        });
    }
    Ok(())
}

/// Undo the transition of the reverted block: drop the period it
/// opened and restore the statuses it settled.
///
/// What was settled is recomputable: within one epoch only the epoch's
/// closing transition can have produced `Rejected` or `Accepted` rows,
/// and only the proposal period's end produces `Skipped` ones.
pub fn revert_end_of_period(rctx: &mut RevertContext) -> Result<()> {
    let removed = rctx.cache.voting.current_period()?.clone();
    rctx.cache.voting.remove_period(removed.index)?;
    rctx.cache.journal.push(WriteOp::DeleteVotingPeriod {
        index: removed.index,
    });

    let prev = rctx.cache.voting.current_period()?.clone();
    let epoch = prev.epoch;
    let restore_from = if removed.epoch != epoch {
        if prev.kind == PeriodKind::Adoption && !prev.dictator_override {
            Some(ProposalStatus::Accepted)
        } else {
            Some(ProposalStatus::Rejected)
        }
    } else if prev.kind == PeriodKind::Proposal && !prev.dictator_override {
        Some(ProposalStatus::Skipped)
    } else {
        None
    };

    if let Some(from) = restore_from {
        let hashes: Vec<String> = rctx
            .cache
            .voting
            .proposals_of_epoch(epoch)
            .filter(|p| p.status == from)
            .map(|p| p.hash.clone())
            .collect();
        for hash in hashes {
            rctx.cache
                .voting
                .settle_proposal(epoch, &hash, ProposalStatus::Active)?;
            rctx.cache.journal.push(WriteOp::UpsertProposal {
                epoch,
                hash,
            });
        }
    }
    Ok(())
}
