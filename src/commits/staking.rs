//! Staking pseudo-operations and delegate parameters.
//!
//! These arrive on the wire as transactions to self; the dispatcher
//! rewrites them before any transfer logic runs. Unstaking is modeled
//! as an immediate move back to the spendable balance. The same
//! primitives drive the automatic deposit adjustment at cycle end.

use crate::entity::{OpStatus, OperationDetails, StakingAction};
use crate::error::Result;
use crate::ids::AccountId;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::{RawManagerInfo, RawManagerMeta, RawParameters};
use crate::store::WriteOp;
use crate::value::Mutez;

use super::manager;

pub fn apply(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    params: &RawParameters,
    tx_amount: Mutez,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let action = match params.entrypoint.as_str() {
        "stake" => StakingAction::Stake,
        "unstake" => StakingAction::Unstake,
        _ => StakingAction::FinalizeUnstake,
    };

    let baker = {
        let account = ctx.cache.accounts.get(sender)?;
        if account.is_delegate() {
            Some(sender)
        } else {
            account.delegate
        }
    };

    let amount = if status == OpStatus::Applied {
        match action {
            StakingAction::Stake => {
                ctx.freeze(sender, tx_amount)?;
                tx_amount
            }
            StakingAction::Unstake => {
                let frozen = ctx.cache.accounts.get(sender)?.frozen_deposit;
                let requested = Mutez(params.nat_value()).min(frozen);
                ctx.unfreeze(sender, requested)?;
                requested
            }
            StakingAction::FinalizeUnstake => Mutez::zero(),
        }
    } else {
        Mutez::zero()
    };

    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::Staking {
            action,
            amount,
            baker,
        },
    );
    Ok(())
}

pub fn apply_set_parameters(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    params: &RawParameters,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let limit = params.int_field("limit_of_staking_over_baking");
    let edge = params.int_field("edge_of_baking_over_staking");

    let (prev_limit, prev_edge) = {
        let account = ctx.cache.accounts.get(sender)?;
        (account.staking_limit, account.staking_edge)
    };
    if status == OpStatus::Applied {
        let account = ctx.cache.accounts.get_mut(sender)?;
        account.staking_limit = limit;
        account.staking_edge = edge;
        ctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    }

    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SetDelegateParameters {
            limit_of_staking_over_baking: limit,
            edge_of_baking_over_staking: edge,
            prev_limit,
            prev_edge,
        },
    );
    Ok(())
}

/// Implicit deposit adjustment for one delegate at cycle end: freeze or
/// unfreeze whatever brings the deposit to the target fraction of the
/// staking balance. Recorded as a staking operation with the block hash.
pub fn autostake(ctx: &mut BlockContext, delegate: AccountId) -> Result<()> {
    let percent = ctx.proto.constants.frozen_deposit_percent;
    let (staking, frozen, spendable) = {
        let account = ctx.cache.accounts.get(delegate)?;
        (account.staking_balance, account.frozen_deposit, account.balance)
    };
    let target = Mutez(staking.0 * percent as u64 / 100);
    let hash = ctx.block.hash.clone();
    if target > frozen {
        let amount = (target - frozen)?.min(spendable);
        if amount.is_zero() {
            return Ok(());
        }
        ctx.freeze(delegate, amount)?;
        ctx.record(
            &hash,
            Some(delegate),
            Mutez::zero(),
            None,
            OpStatus::Applied,
            OperationDetails::Staking {
                action: StakingAction::Stake,
                amount,
                baker: Some(delegate),
            },
        );
    } else if target < frozen {
        let amount = (frozen - target)?;
        ctx.unfreeze(delegate, amount)?;
        ctx.record(
            &hash,
            Some(delegate),
            Mutez::zero(),
            None,
            OpStatus::Applied,
            OperationDetails::Staking {
                action: StakingAction::Unstake,
                amount,
                baker: Some(delegate),
            },
        );
    }
    Ok(())
}

pub fn revert_staking(
    rctx: &mut RevertContext,
    sender: AccountId,
    action: StakingAction,
    amount: Mutez,
    status: OpStatus,
) -> Result<()> {
    if status != OpStatus::Applied {
        return Ok(());
    }
    match action {
        StakingAction::Stake => rctx.unfreeze(sender, amount),
        StakingAction::Unstake => rctx.freeze(sender, amount),
        StakingAction::FinalizeUnstake => Ok(()),
    }
}

pub fn revert_set_parameters(
    rctx: &mut RevertContext,
    sender: AccountId,
    prev_limit: i64,
    prev_edge: i64,
    status: OpStatus,
) -> Result<()> {
    if status != OpStatus::Applied {
        return Ok(());
    }
    let account = rctx.cache.accounts.get_mut(sender)?;
    account.staking_limit = prev_limit;
    account.staking_edge = prev_edge;
    rctx.cache.journal.push(WriteOp::UpsertAccount(sender));
    Ok(())
}
