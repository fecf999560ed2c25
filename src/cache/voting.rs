use std::collections::BTreeMap;

use crate::entity::{PeriodKind, Proposal, ProposalStatus, VotingPeriod};
use crate::error::{Error, Result};

/// Voting periods and proposals of the current and past epochs.
pub struct VotingCache {
    periods: BTreeMap<i32, VotingPeriod>,
    /// Keyed by (epoch, hash): the same protocol hash can be proposed
    /// again in a later epoch.
    proposals: BTreeMap<(i32, String), Proposal>,
}

impl VotingCache {
    pub fn new() -> Self {
        VotingCache {
            periods: BTreeMap::new(),
            proposals: BTreeMap::new(),
        }
    }

    pub fn current_period(&self) -> Result<&VotingPeriod> {
        self.periods
            .values()
            .next_back()
            .ok_or_else(|| Error::inconsistent("no voting period cached"))
    }

    pub fn current_period_mut(&mut self) -> Result<&mut VotingPeriod> {
        self.periods
            .values_mut()
            .next_back()
            .ok_or_else(|| Error::inconsistent("no voting period cached"))
    }

    pub fn period(&self, index: i32) -> Result<&VotingPeriod> {
        self.periods
            .get(&index)
            .ok_or_else(|| Error::inconsistent(format!("voting period {} not cached", index)))
    }

    pub fn period_mut(&mut self, index: i32) -> Result<&mut VotingPeriod> {
        self.periods
            .get_mut(&index)
            .ok_or_else(|| Error::inconsistent(format!("voting period {} not cached", index)))
    }

    pub fn insert_period(&mut self, period: VotingPeriod) {
        self.periods.insert(period.index, period);
    }

    pub fn remove_period(&mut self, index: i32) -> Result<VotingPeriod> {
        self.periods
            .remove(&index)
            .ok_or_else(|| Error::inconsistent(format!("voting period {} not cached", index)))
    }

    pub fn start_first_period(&mut self, first_level: i32, blocks_per_voting_period: i32) {
        self.insert_period(VotingPeriod {
            index: 0,
            epoch: 0,
            kind: PeriodKind::Proposal,
            first_level,
            last_level: first_level + blocks_per_voting_period - 1,
            proposals_count: 0,
            yay_power: crate::value::Mutez::zero(),
            nay_power: crate::value::Mutez::zero(),
            pass_power: crate::value::Mutez::zero(),
            dictator_override: false,
        });
    }

    pub fn proposal(&self, epoch: i32, hash: &str) -> Option<&Proposal> {
        self.proposals.get(&(epoch, hash.to_string()))
    }

    pub fn proposal_mut(&mut self, epoch: i32, hash: &str) -> Result<&mut Proposal> {
        self.proposals
            .get_mut(&(epoch, hash.to_string()))
            .ok_or_else(|| Error::inconsistent(format!("proposal {} not cached", hash)))
    }

    pub fn insert_proposal(&mut self, proposal: Proposal) {
        self.proposals
            .insert((proposal.epoch, proposal.hash.clone()), proposal);
    }

    pub fn remove_proposal(&mut self, epoch: i32, hash: &str) -> Result<Proposal> {
        self.proposals
            .remove(&(epoch, hash.to_string()))
            .ok_or_else(|| Error::inconsistent(format!("proposal {} not cached", hash)))
    }

    /// Proposals of an epoch, for promotion decisions.
    pub fn proposals_of_epoch(&self, epoch: i32) -> impl Iterator<Item = &Proposal> {
        self.proposals
            .range((epoch, String::new())..(epoch + 1, String::new()))
            .map(|(_, p)| p)
    }

    /// Mark an active proposal with a terminal status; returns the
    /// previous status for the revert path.
    pub fn settle_proposal(
        &mut self,
        epoch: i32,
        hash: &str,
        status: ProposalStatus,
    ) -> Result<ProposalStatus> {
        let proposal = self.proposal_mut(epoch, hash)?;
        let prev = proposal.status;
        proposal.status = status;
        Ok(prev)
    }
}

impl Default for VotingCache {
    fn default() -> Self {
        VotingCache::new()
    }
}
