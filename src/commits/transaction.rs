//! Transactions, including the pseudo-entrypoint redirects.
//!
//! A transaction from an account to itself whose entrypoint names a
//! staking action is not a transfer at all: it is rewritten into the
//! matching staking or delegate-parameter operation before any balance
//! moves.

use crate::address::Address;
use crate::entity::{OpStatus, OperationDetails};
use crate::error::Result;
use crate::ids::{AccountId, OpId};
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::{RawManagerInfo, RawManagerMeta, RawOperationResult, RawParameters};
use crate::value::Mutez;

use super::{manager, staking};

pub fn apply(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    destination: &Address,
    amount: Mutez,
    parameters: Option<&RawParameters>,
    meta: &RawManagerMeta,
) -> Result<()> {
    if let Some(params) = parameters {
        if info.source == *destination {
            match params.entrypoint.as_str() {
                "stake" | "unstake" | "finalize_unstake" => {
                    return staking::apply(ctx, hash, info, params, amount, meta);
                }
                "set_delegate_parameters" => {
                    return staking::apply_set_parameters(ctx, hash, info, params, meta);
                }
                _ => {}
            }
        }
    }

    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let result = &meta.operation_result;
    let level = ctx.level();

    let (target, allocated, storage_fee, allocation_fee) = if status == OpStatus::Applied {
        let (target, allocated) = ctx.cache.accounts.get_or_create(destination, level);
        ctx.transfer(sender, target, amount)?;
        let storage_fee = Mutez(result.storage_fee);
        let allocation_fee = Mutez(result.allocation_fee);
        ctx.burn(sender, storage_fee)?;
        ctx.burn(sender, allocation_fee)?;
        (Some(target), allocated, storage_fee, allocation_fee)
    } else {
        let target = ctx.cache.accounts.find(destination).map(|a| a.id);
        (target, false, Mutez::zero(), Mutez::zero())
    };

    let entrypoint = parameters.map(|p| p.entrypoint.clone());
    let op = ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::Transaction {
            target,
            target_address: Some(destination.clone()),
            amount,
            entrypoint,
            storage_fee,
            allocation_fee,
            allocated_target: allocated,
        },
    );

    if status == OpStatus::Applied {
        if let Some(target) = target {
            manager::queue_results(ctx, op, target, result);
        }
        manager::apply_internals(ctx, hash, sender, op, &meta.internal_operation_results)?;
    }
    Ok(())
}

/// Internal transaction triggered by contract execution. Storage and
/// allocation burns are charged to the initiator, who pays for storage
/// of the whole operation group.
#[allow(clippy::too_many_arguments)]
pub fn apply_internal(
    ctx: &mut BlockContext,
    hash: &str,
    source: AccountId,
    initiator: AccountId,
    parent: OpId,
    destination: &Address,
    amount: Mutez,
    entrypoint: Option<String>,
    status: OpStatus,
    result: &RawOperationResult,
) -> Result<()> {
    let level = ctx.level();
    let (target, allocated, storage_fee, allocation_fee) = if status == OpStatus::Applied {
        let (target, allocated) = ctx.cache.accounts.get_or_create(destination, level);
        ctx.transfer(source, target, amount)?;
        let storage_fee = Mutez(result.storage_fee);
        let allocation_fee = Mutez(result.allocation_fee);
        ctx.burn(initiator, storage_fee)?;
        ctx.burn(initiator, allocation_fee)?;
        (Some(target), allocated, storage_fee, allocation_fee)
    } else {
        let target = ctx.cache.accounts.find(destination).map(|a| a.id);
        (target, false, Mutez::zero(), Mutez::zero())
    };

    let op = ctx.record_internal(
        hash,
        source,
        initiator,
        parent,
        status,
        OperationDetails::Transaction {
            target,
            target_address: Some(destination.clone()),
            amount,
            entrypoint,
            storage_fee,
            allocation_fee,
            allocated_target: allocated,
        },
    );
    if status == OpStatus::Applied {
        if let Some(target) = target {
            manager::queue_results(ctx, op, target, result);
        }
    }
    Ok(())
}

/// Shared revert for top-level and internal transactions. Burns return
/// to whoever paid them: the sender for top-level rows, the initiator
/// for internal rows.
#[allow(clippy::too_many_arguments)]
pub fn revert(
    rctx: &mut RevertContext,
    sender: AccountId,
    payer: AccountId,
    target: Option<AccountId>,
    amount: Mutez,
    storage_fee: Mutez,
    allocation_fee: Mutez,
    status: OpStatus,
) -> Result<()> {
    if status != OpStatus::Applied {
        return Ok(());
    }
    rctx.credit(payer, allocation_fee)?;
    rctx.credit(payer, storage_fee)?;
    if let Some(target) = target {
        rctx.transfer(target, sender, amount)?;
    }
    Ok(())
}
