//! Voting group: proposals and ballots.
//!
//! Voting power is the proposer's current staking balance; tallies
//! accumulate on the active period row and are settled when the period
//! ends (see the after-commit transition in the pipeline). A proposal
//! signed by the configured dictator short-circuits the whole group.

use crate::address::Address;
use crate::entity::{BallotVote, OpStatus, OperationDetails, Proposal, ProposalStatus};
use crate::error::{Error, Result};
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::RawBallot;
use crate::store::WriteOp;
use crate::value::Mutez;

/// Apply a `proposals` operation. Returns `true` when the sender is the
/// dictator and the rest of the voting group must be skipped.
pub fn apply_proposals(
    ctx: &mut BlockContext,
    hash: &str,
    source: &Address,
    proposals: &[String],
) -> Result<bool> {
    let sender = ctx.cache.accounts.id_of(source)?;
    let period = ctx.cache.voting.current_period()?.clone();
    let dictator = ctx.proto.constants.dictator.as_ref() == Some(source);

    if dictator {
        let p = ctx.cache.voting.period_mut(period.index)?;
        p.dictator_override = true;
        ctx.cache.journal.push(WriteOp::UpsertVotingPeriod {
            index: period.index,
        });
        ctx.record(
            hash,
            Some(sender),
            Mutez::zero(),
            None,
            OpStatus::Applied,
            OperationDetails::Proposal {
                period: period.index,
                proposals: proposals.to_vec(),
                dictator: true,
                created: Vec::new(),
                upvoting_power: Mutez::zero(),
            },
        );
        return Ok(true);
    }

    let power = ctx.cache.accounts.get(sender)?.staking_balance;
    let mut created = Vec::new();
    for hash_p in proposals {
        if ctx.cache.voting.proposal(period.epoch, hash_p).is_none() {
            ctx.cache.voting.insert_proposal(Proposal {
                hash: hash_p.clone(),
                epoch: period.epoch,
                first_period: period.index,
                upvotes_power: Mutez::zero(),
                status: ProposalStatus::Active,
            });
            created.push(hash_p.clone());
            let p = ctx.cache.voting.period_mut(period.index)?;
            p.proposals_count += 1;
        }
        let proposal = ctx.cache.voting.proposal_mut(period.epoch, hash_p)?;
        proposal.upvotes_power = (proposal.upvotes_power + power)?;
        ctx.cache.journal.push(WriteOp::UpsertProposal {
            epoch: period.epoch,
            hash: hash_p.clone(),
        });
    }
    ctx.cache.journal.push(WriteOp::UpsertVotingPeriod {
        index: period.index,
    });

    ctx.record(
        hash,
        Some(sender),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::Proposal {
            period: period.index,
            proposals: proposals.to_vec(),
            dictator: false,
            created,
            upvoting_power: power,
        },
    );
    Ok(false)
}

pub fn apply_ballot(
    ctx: &mut BlockContext,
    hash: &str,
    source: &Address,
    proposal: &str,
    ballot: RawBallot,
) -> Result<()> {
    let sender = ctx.cache.accounts.id_of(source)?;
    let power = ctx.cache.accounts.get(sender)?.staking_balance;
    let period = ctx.cache.voting.current_period()?.index;
    let vote = match ballot {
        RawBallot::Yay => BallotVote::Yay,
        RawBallot::Nay => BallotVote::Nay,
        RawBallot::Pass => BallotVote::Pass,
    };
    {
        let p = ctx.cache.voting.period_mut(period)?;
        match vote {
            BallotVote::Yay => p.yay_power = (p.yay_power + power)?,
            BallotVote::Nay => p.nay_power = (p.nay_power + power)?,
            BallotVote::Pass => p.pass_power = (p.pass_power + power)?,
        }
    }
    ctx.cache
        .journal
        .push(WriteOp::UpsertVotingPeriod { index: period });

    ctx.record(
        hash,
        Some(sender),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::Ballot {
            period,
            proposal: proposal.to_string(),
            vote,
            voting_power: power,
        },
    );
    Ok(())
}

pub fn revert_proposals(
    rctx: &mut RevertContext,
    period: i32,
    dictator: bool,
    proposals: &[String],
    created: &[String],
    power: Mutez,
) -> Result<()> {
    if dictator {
        let p = rctx.cache.voting.period_mut(period)?;
        p.dictator_override = false;
        rctx.cache
            .journal
            .push(WriteOp::UpsertVotingPeriod { index: period });
        return Ok(());
    }
    let epoch = rctx.cache.voting.period(period)?.epoch;
    for hash_p in proposals {
        let proposal = rctx.cache.voting.proposal_mut(epoch, hash_p)?;
        proposal.upvotes_power = (proposal.upvotes_power - power)?;
        rctx.cache.journal.push(WriteOp::UpsertProposal {
            epoch,
            hash: hash_p.clone(),
        });
    }
    for hash_p in created {
        rctx.cache.voting.remove_proposal(epoch, hash_p)?;
        let p = rctx.cache.voting.period_mut(period)?;
        p.proposals_count -= 1;
    }
    rctx.cache
        .journal
        .push(WriteOp::UpsertVotingPeriod { index: period });
    Ok(())
}

pub fn revert_ballot(
    rctx: &mut RevertContext,
    period: i32,
    vote: BallotVote,
    power: Mutez,
) -> Result<()> {
    let p = rctx.cache.voting.period_mut(period)?;
    match vote {
        BallotVote::Yay => p.yay_power = (p.yay_power - power)?,
        BallotVote::Nay => p.nay_power = (p.nay_power - power)?,
        BallotVote::Pass => p.pass_power = (p.pass_power - power)?,
    }
    rctx.cache
        .journal
        .push(WriteOp::UpsertVotingPeriod { index: period });
    Ok(())
}

/// Ballots outside any period are a node inconsistency, not a protocol
/// state; surface them as fatal.
pub fn ensure_period_active(ctx: &BlockContext) -> Result<()> {
    ctx.cache
        .voting
        .current_period()
        .map(|_| ())
        .map_err(|_| Error::inconsistent("voting operation outside any voting period"))
}
