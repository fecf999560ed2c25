//! Delegations, including the self-delegation upgrade.
//!
//! A self-delegation turns a `User` row into a `Delegate` in place; no
//! rows are rewritten, only the kind field flips. All prior state the
//! reverse branch needs (previous delegate, previous kind, previous
//! activation horizon) is recorded on the operation row.

use crate::address::Address;
use crate::entity::{AccountKind, OpStatus, OperationDetails};
use crate::error::{Error, Result};
use crate::ids::{AccountId, OpId};
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::{RawManagerInfo, RawManagerMeta};
use crate::store::WriteOp;
use crate::value::Mutez;

use super::manager;

pub fn apply(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    delegate: Option<&Address>,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let details = if status == OpStatus::Applied {
        switch_delegate(ctx, sender, delegate)?
    } else {
        unapplied_details(ctx, delegate)
    };
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        details,
    );
    Ok(())
}

pub fn apply_internal(
    ctx: &mut BlockContext,
    hash: &str,
    source: AccountId,
    initiator: AccountId,
    parent: OpId,
    delegate: Option<&Address>,
    status: OpStatus,
) -> Result<()> {
    let details = if status == OpStatus::Applied {
        switch_delegate(ctx, source, delegate)?
    } else {
        unapplied_details(ctx, delegate)
    };
    ctx.record_internal(hash, source, initiator, parent, status, details);
    Ok(())
}

fn unapplied_details(ctx: &BlockContext, delegate: Option<&Address>) -> OperationDetails {
    OperationDetails::Delegation {
        new_delegate: delegate.and_then(|d| ctx.cache.accounts.find(d)).map(|a| a.id),
        prev_delegate: None,
        amount: Mutez::zero(),
        self_delegation: false,
        prev_kind_was_user: false,
        prev_delegation_level: None,
        prev_activation_level: None,
        prev_deactivation_level: None,
    }
}

/// The applied branch: detach from the previous delegate, then either
/// register the sender as a delegate or attach it to the new one.
fn switch_delegate(
    ctx: &mut BlockContext,
    sender: AccountId,
    delegate: Option<&Address>,
) -> Result<OperationDetails> {
    let level = ctx.level();
    let (amount, prev_delegate, prev_kind, prev_delegation_level, prev_activation, prev_deactivation, own_address) = {
        let account = ctx.cache.accounts.get(sender)?;
        (
            account.balance,
            account.delegate,
            account.kind,
            account.delegation_level,
            account.activation_level,
            account.deactivation_level,
            account.address.clone(),
        )
    };

    let self_delegation = delegate == Some(&own_address);

    // detach from the previous delegate first
    if let Some(prev) = prev_delegate {
        detach(ctx, sender, prev, amount)?;
    }

    if self_delegation {
        let grace = deactivation_horizon(ctx);
        let account = ctx.cache.accounts.get_mut(sender)?;
        if account.kind == AccountKind::Delegate {
            // re-activation: only the horizon moves
            account.deactivation_level = Some(grace);
        } else {
            account.kind = AccountKind::Delegate;
            account.delegate = None;
            account.delegation_level = None;
            account.activation_level = Some(level);
            account.deactivation_level = Some(grace);
            account.staking_balance = (account.balance + account.frozen_deposit)?;
        }
        ctx.cache.journal.push(WriteOp::UpsertAccount(sender));
        return Ok(OperationDetails::Delegation {
            new_delegate: Some(sender),
            prev_delegate,
            amount,
            self_delegation: true,
            prev_kind_was_user: prev_kind != AccountKind::Delegate,
            prev_delegation_level,
            prev_activation_level: prev_activation,
            prev_deactivation_level: prev_deactivation,
        });
    }

    let new_delegate = match delegate {
        Some(addr) => {
            let id = ctx.cache.accounts.id_of(addr)?;
            if !ctx.cache.accounts.get(id)?.is_delegate() {
                return Err(Error::inconsistent(format!(
                    "delegation target {} is not a registered delegate",
                    addr
                )));
            }
            attach(ctx, sender, id, amount, level)?;
            Some(id)
        }
        None => {
            let account = ctx.cache.accounts.get_mut(sender)?;
            account.delegate = None;
            account.delegation_level = None;
            ctx.cache.journal.push(WriteOp::UpsertAccount(sender));
            None
        }
    };

    Ok(OperationDetails::Delegation {
        new_delegate,
        prev_delegate,
        amount,
        self_delegation: false,
        prev_kind_was_user: false,
        prev_delegation_level,
        prev_activation_level: prev_activation,
        prev_deactivation_level: prev_deactivation,
    })
}

/// First level of the cycle past the grace period: the delegate is
/// considered active until then.
fn deactivation_horizon(ctx: &BlockContext) -> i32 {
    let cycle = ctx.cycle() + ctx.proto.constants.preserved_cycles + 2;
    ctx.proto.first_level_of_cycle(cycle)
}

fn detach(ctx: &mut BlockContext, sender: AccountId, delegate: AccountId, amount: Mutez) -> Result<()> {
    let row = ctx.cache.accounts.get_mut(delegate)?;
    row.staking_balance = (row.staking_balance - amount)?;
    row.delegated_balance = (row.delegated_balance - amount)?;
    row.delegators_count -= 1;
    ctx.cache.journal.push(WriteOp::UpsertAccount(delegate));
    let account = ctx.cache.accounts.get_mut(sender)?;
    account.delegate = None;
    account.delegation_level = None;
    ctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    Ok(())
}

fn attach(
    ctx: &mut BlockContext,
    sender: AccountId,
    delegate: AccountId,
    amount: Mutez,
    level: i32,
) -> Result<()> {
    let row = ctx.cache.accounts.get_mut(delegate)?;
    row.staking_balance = (row.staking_balance + amount)?;
    row.delegated_balance = (row.delegated_balance + amount)?;
    row.delegators_count += 1;
    ctx.cache.journal.push(WriteOp::UpsertAccount(delegate));
    let account = ctx.cache.accounts.get_mut(sender)?;
    account.delegate = Some(delegate);
    account.delegation_level = Some(level);
    ctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn revert(
    rctx: &mut RevertContext,
    sender: AccountId,
    status: OpStatus,
    new_delegate: Option<AccountId>,
    prev_delegate: Option<AccountId>,
    amount: Mutez,
    self_delegation: bool,
    prev_kind_was_user: bool,
    prev_delegation_level: Option<i32>,
    prev_activation_level: Option<i32>,
    prev_deactivation_level: Option<i32>,
) -> Result<()> {
    if status != OpStatus::Applied {
        return Ok(());
    }

    if self_delegation {
        let account = rctx.cache.accounts.get_mut(sender)?;
        if prev_kind_was_user {
            account.kind = AccountKind::User;
            account.staking_balance = Mutez::zero();
        }
        account.activation_level = prev_activation_level;
        account.deactivation_level = prev_deactivation_level;
        rctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    } else if let Some(nd) = new_delegate {
        let row = rctx.cache.accounts.get_mut(nd)?;
        row.staking_balance = (row.staking_balance - amount)?;
        row.delegated_balance = (row.delegated_balance - amount)?;
        row.delegators_count -= 1;
        rctx.cache.journal.push(WriteOp::UpsertAccount(nd));
        let account = rctx.cache.accounts.get_mut(sender)?;
        account.delegate = None;
        rctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    }

    // re-attach to the previous delegate
    if let Some(prev) = prev_delegate {
        let row = rctx.cache.accounts.get_mut(prev)?;
        row.staking_balance = (row.staking_balance + amount)?;
        row.delegated_balance = (row.delegated_balance + amount)?;
        row.delegators_count += 1;
        rctx.cache.journal.push(WriteOp::UpsertAccount(prev));
    }
    let account = rctx.cache.accounts.get_mut(sender)?;
    if !self_delegation || prev_kind_was_user {
        account.delegate = prev_delegate;
        account.delegation_level = prev_delegation_level;
    }
    rctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    Ok(())
}
