//! Per-block working state shared by all commits.
//!
//! Every balance movement inside a block goes through the helpers here,
//! which keep the delegate staking aggregates in lock-step with the
//! spendable balances and tally the block's supply deltas for the
//! statistics row. The revert side reuses the same primitives, so the
//! forward and reverse paths cannot drift apart.

use crate::cache::Cache;
use crate::entity::{Block, Operation, OperationDetails, Protocol};
use crate::error::Result;
use crate::ids::{AccountId, OpId};
use crate::rawblock::{RawBigMapDiff, RawTicketUpdate, RawTokenTransfer};
use crate::rewards::AttestationRewardMode;
use crate::store::WriteOp;
use crate::value::Mutez;

/// Behavioral switches a protocol version hands to the pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProtoFlags {
    pub reward_mode: AttestationRewardMode,
    /// Price expected block rewards at the maximum payout (fixed reward
    /// plus full bonus) instead of the round-0 reward.
    pub max_reward_basis: bool,
    /// Fixed (round-independent) block reward with an inclusion bonus.
    pub fixed_rewards: bool,
    /// Adjust frozen deposits automatically at cycle end.
    pub autostaking: bool,
}

/// Big map diff queued during group processing, applied once after the
/// manager group.
pub struct QueuedBigMapDiff {
    pub op: OpId,
    pub contract: AccountId,
    pub diff: RawBigMapDiff,
}

pub struct QueuedTicketUpdate {
    pub op: OpId,
    pub update: RawTicketUpdate,
}

pub struct QueuedTokenTransfer {
    pub op: OpId,
    pub transfer: RawTokenTransfer,
}

/// Mutable context of the block being committed.
pub struct BlockContext<'a> {
    pub cache: &'a mut Cache,
    pub proto: Protocol,
    pub flags: ProtoFlags,
    /// The block row under construction; inserted at the end of commit.
    pub block: Block,
    pub baker: AccountId,
    pub proposer: AccountId,

    /// Supply deltas of this block, folded into the statistics row.
    pub minted: Mutez,
    pub burned: Mutez,
    pub activated: Mutez,
    pub frozen_delta: i64,

    pub bigmap_diffs: Vec<QueuedBigMapDiff>,
    pub ticket_updates: Vec<QueuedTicketUpdate>,
    pub token_transfers: Vec<QueuedTokenTransfer>,

    /// Set when a dictator proposal short-circuited the voting group.
    pub dictator_fired: bool,
}

impl<'a> BlockContext<'a> {
    pub fn level(&self) -> i32 {
        self.block.level
    }

    pub fn cycle(&self) -> i32 {
        self.block.cycle
    }

    pub fn new_op_id(&mut self) -> OpId {
        OpId(self.cache.op_ids.next())
    }

    /// Record an operation row and flag its kind on the block mask.
    pub fn push_op(&mut self, op: Operation) {
        self.block.operations.set(op.details.mask_bit());
        self.cache.journal.push(WriteOp::InsertOperation(op.id));
        self.cache.operations.insert(op);
    }

    pub fn record(
        &mut self,
        hash: &str,
        sender: Option<AccountId>,
        fee: Mutez,
        counter: Option<i64>,
        status: crate::entity::OpStatus,
        details: OperationDetails,
    ) -> OpId {
        let id = self.new_op_id();
        let op = Operation {
            id,
            level: self.block.level,
            hash: hash.to_string(),
            sender,
            initiator: None,
            parent: None,
            counter,
            status,
            fee,
            details,
        };
        self.push_op(op);
        id
    }

    /// Record an internal operation row, linked to its parent and
    /// carrying the top-level initiator. Internal rows have no fee and
    /// no counter.
    pub fn record_internal(
        &mut self,
        hash: &str,
        sender: AccountId,
        initiator: AccountId,
        parent: OpId,
        status: crate::entity::OpStatus,
        details: OperationDetails,
    ) -> OpId {
        let id = self.new_op_id();
        let op = Operation {
            id,
            level: self.block.level,
            hash: hash.to_string(),
            sender: Some(sender),
            initiator: Some(initiator),
            parent: Some(parent),
            counter: None,
            status,
            fee: Mutez::zero(),
            details,
        };
        self.push_op(op);
        id
    }

    // --- balance movements ---

    pub fn credit(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        credit(self.cache, id, amount)
    }

    pub fn debit(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        debit(self.cache, id, amount)
    }

    pub fn transfer(&mut self, from: AccountId, to: AccountId, amount: Mutez) -> Result<()> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        debit(self.cache, from, amount)?;
        credit(self.cache, to, amount)
    }

    /// Credit newly created value and count it as minted.
    pub fn mint(&mut self, to: AccountId, amount: Mutez) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        credit(self.cache, to, amount)?;
        self.minted = (self.minted + amount)?;
        Ok(())
    }

    /// Destroy value from an account and count it as burned.
    pub fn burn(&mut self, from: AccountId, amount: Mutez) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        debit(self.cache, from, amount)?;
        self.burned = (self.burned + amount)?;
        Ok(())
    }

    /// Move spendable balance into the frozen deposit of the same
    /// account. The staking aggregate counts both, so it is untouched.
    pub fn freeze(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        freeze(self.cache, id, amount)?;
        self.frozen_delta += amount.0 as i64;
        Ok(())
    }

    pub fn unfreeze(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        unfreeze(self.cache, id, amount)?;
        self.frozen_delta -= amount.0 as i64;
        Ok(())
    }

    /// Take `amount` out of a frozen deposit entirely (slashing). The
    /// value leaves the account, so the staking aggregate shrinks too.
    /// The whole slash counts as burned; rewards paid back out of it
    /// (to an accuser) are minted separately, keeping the conservation
    /// equation exact.
    pub fn slash(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        slash(self.cache, id, amount)?;
        self.frozen_delta -= amount.0 as i64;
        self.burned = (self.burned + amount)?;
        Ok(())
    }
}

/// Context of the block being reverted (always the head).
pub struct RevertContext<'a> {
    pub cache: &'a mut Cache,
    pub proto: Protocol,
    pub flags: ProtoFlags,
    /// The committed row of the block under revert.
    pub block: Block,
}

impl<'a> RevertContext<'a> {
    pub fn level(&self) -> i32 {
        self.block.level
    }

    pub fn credit(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        credit(self.cache, id, amount)
    }

    pub fn debit(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        debit(self.cache, id, amount)
    }

    pub fn transfer(&mut self, from: AccountId, to: AccountId, amount: Mutez) -> Result<()> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        debit(self.cache, from, amount)?;
        credit(self.cache, to, amount)
    }

    pub fn freeze(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        freeze(self.cache, id, amount)
    }

    pub fn unfreeze(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        unfreeze(self.cache, id, amount)
    }

    /// Put a slashed amount back into the frozen deposit.
    pub fn unslash(&mut self, id: AccountId, amount: Mutez) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let (delegate, is_delegate) = {
            let account = self.cache.accounts.get_mut(id)?;
            account.frozen_deposit = (account.frozen_deposit + amount)?;
            (account.delegate, account.is_delegate())
        };
        self.cache.journal.push(WriteOp::UpsertAccount(id));
        bump_delegate(self.cache, id, delegate, is_delegate, amount, true)
    }
}

/// Add to the spendable balance, propagating into the delegate's
/// staking aggregates.
pub(crate) fn credit(cache: &mut Cache, id: AccountId, amount: Mutez) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let (delegate, is_delegate) = {
        let account = cache.accounts.get_mut(id)?;
        account.balance = (account.balance + amount)?;
        (account.delegate, account.is_delegate())
    };
    cache.journal.push(WriteOp::UpsertAccount(id));
    bump_delegate(cache, id, delegate, is_delegate, amount, true)
}

pub(crate) fn debit(cache: &mut Cache, id: AccountId, amount: Mutez) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let (delegate, is_delegate) = {
        let account = cache.accounts.get_mut(id)?;
        account.balance = (account.balance - amount)?;
        (account.delegate, account.is_delegate())
    };
    cache.journal.push(WriteOp::UpsertAccount(id));
    bump_delegate(cache, id, delegate, is_delegate, amount, false)
}

fn freeze(cache: &mut Cache, id: AccountId, amount: Mutez) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let account = cache.accounts.get_mut(id)?;
    account.balance = (account.balance - amount)?;
    account.frozen_deposit = (account.frozen_deposit + amount)?;
    cache.journal.push(WriteOp::UpsertAccount(id));
    Ok(())
}

fn unfreeze(cache: &mut Cache, id: AccountId, amount: Mutez) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let account = cache.accounts.get_mut(id)?;
    account.frozen_deposit = (account.frozen_deposit - amount)?;
    account.balance = (account.balance + amount)?;
    cache.journal.push(WriteOp::UpsertAccount(id));
    Ok(())
}

fn slash(cache: &mut Cache, id: AccountId, amount: Mutez) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let (delegate, is_delegate) = {
        let account = cache.accounts.get_mut(id)?;
        account.frozen_deposit = (account.frozen_deposit - amount)?;
        (account.delegate, account.is_delegate())
    };
    cache.journal.push(WriteOp::UpsertAccount(id));
    bump_delegate(cache, id, delegate, is_delegate, amount, false)
}

/// Propagate a balance change into the staking aggregates of the
/// delegate it counts towards. Delegates count towards themselves;
/// undelegated accounts count towards nobody.
fn bump_delegate(
    cache: &mut Cache,
    id: AccountId,
    delegate: Option<AccountId>,
    is_delegate: bool,
    amount: Mutez,
    add: bool,
) -> Result<()> {
    let target = if is_delegate { Some(id) } else { delegate };
    let target = match target {
        Some(t) => t,
        None => return Ok(()),
    };
    let delegate_row = cache.accounts.get_mut(target)?;
    if add {
        delegate_row.staking_balance = (delegate_row.staking_balance + amount)?;
        if target != id {
            delegate_row.delegated_balance = (delegate_row.delegated_balance + amount)?;
        }
    } else {
        delegate_row.staking_balance = (delegate_row.staking_balance - amount)?;
        if target != id {
            delegate_row.delegated_balance = (delegate_row.delegated_balance - amount)?;
        }
    }
    cache.journal.push(WriteOp::UpsertAccount(target));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::entity::AccountKind;

    fn setup() -> (Cache, AccountId, AccountId) {
        let mut cache = Cache::new();
        let delegate = cache
            .accounts
            .create(Address::new("tz1deleg"), AccountKind::Delegate, 1);
        let user = cache
            .accounts
            .create(Address::new("tz1user"), AccountKind::User, 1);
        cache.accounts.get_mut(user).unwrap().delegate = Some(delegate);
        (cache, delegate, user)
    }

    #[test]
    fn credit_to_delegator_grows_delegate_aggregates() {
        let (mut cache, delegate, user) = setup();
        credit(&mut cache, user, Mutez(500)).unwrap();
        let d = cache.accounts.get(delegate).unwrap();
        assert_eq!(d.staking_balance, Mutez(500));
        assert_eq!(d.delegated_balance, Mutez(500));
        assert_eq!(cache.accounts.get(user).unwrap().balance, Mutez(500));
    }

    #[test]
    fn credit_to_delegate_grows_only_staking() {
        let (mut cache, delegate, _) = setup();
        credit(&mut cache, delegate, Mutez(300)).unwrap();
        let d = cache.accounts.get(delegate).unwrap();
        assert_eq!(d.staking_balance, Mutez(300));
        assert_eq!(d.delegated_balance, Mutez::zero());
    }

    #[test]
    fn debit_below_zero_fails() {
        let (mut cache, _, user) = setup();
        credit(&mut cache, user, Mutez(100)).unwrap();
        assert!(debit(&mut cache, user, Mutez(200)).is_err());
    }

    #[test]
    fn freeze_keeps_staking_balance() {
        let (mut cache, delegate, _) = setup();
        credit(&mut cache, delegate, Mutez(1000)).unwrap();
        freeze(&mut cache, delegate, Mutez(400)).unwrap();
        let d = cache.accounts.get(delegate).unwrap();
        assert_eq!(d.balance, Mutez(600));
        assert_eq!(d.frozen_deposit, Mutez(400));
        assert_eq!(d.staking_balance, Mutez(1000));
    }

    #[test]
    fn slash_shrinks_staking_balance() {
        let (mut cache, delegate, _) = setup();
        credit(&mut cache, delegate, Mutez(1000)).unwrap();
        freeze(&mut cache, delegate, Mutez(400)).unwrap();
        slash(&mut cache, delegate, Mutez(100)).unwrap();
        let d = cache.accounts.get(delegate).unwrap();
        assert_eq!(d.frozen_deposit, Mutez(300));
        assert_eq!(d.staking_balance, Mutez(900));
    }
}
