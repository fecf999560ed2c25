//! Contract originations, top-level and internal.

use crate::address::Address;
use crate::entity::{OpStatus, OperationDetails};
use crate::error::{Error, Result};
use crate::ids::{AccountId, OpId};
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::{RawManagerInfo, RawManagerMeta, RawOperationResult};
use crate::store::WriteOp;
use crate::value::Mutez;

use super::manager;

pub fn apply(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    balance: Mutez,
    delegate: Option<&Address>,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    if status != OpStatus::Applied {
        ctx.record(
            hash,
            Some(sender),
            Mutez(info.fee),
            Some(info.counter),
            status,
            OperationDetails::Origination {
                contract: sender,
                balance,
                delegate: None,
                storage_fee: Mutez::zero(),
                allocation_fee: Mutez::zero(),
            },
        );
        return Ok(());
    }

    let result = &meta.operation_result;
    let (contract, delegate_id) = originate(ctx, sender, sender, balance, delegate, result)?;
    let op = ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::Origination {
            contract,
            balance,
            delegate: delegate_id,
            storage_fee: Mutez(result.storage_fee),
            allocation_fee: Mutez(result.allocation_fee),
        },
    );
    manager::queue_results(ctx, op, contract, result);
    manager::apply_internals(ctx, hash, sender, op, &meta.internal_operation_results)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn apply_internal(
    ctx: &mut BlockContext,
    hash: &str,
    source: AccountId,
    initiator: AccountId,
    parent: OpId,
    balance: Mutez,
    delegate: Option<&Address>,
    status: OpStatus,
    result: &RawOperationResult,
) -> Result<()> {
    if status != OpStatus::Applied {
        ctx.record_internal(
            hash,
            source,
            initiator,
            parent,
            status,
            OperationDetails::Origination {
                contract: source,
                balance,
                delegate: None,
                storage_fee: Mutez::zero(),
                allocation_fee: Mutez::zero(),
            },
        );
        return Ok(());
    }
    let (contract, delegate_id) = originate(ctx, source, initiator, balance, delegate, result)?;
    let op = ctx.record_internal(
        hash,
        source,
        initiator,
        parent,
        status,
        OperationDetails::Origination {
            contract,
            balance,
            delegate: delegate_id,
            storage_fee: Mutez(result.storage_fee),
            allocation_fee: Mutez(result.allocation_fee),
        },
    );
    manager::queue_results(ctx, op, contract, result);
    Ok(())
}

/// Create the contract row, wire up its delegate, endow it and charge
/// the storage burns to `payer`.
fn originate(
    ctx: &mut BlockContext,
    sender: AccountId,
    payer: AccountId,
    balance: Mutez,
    delegate: Option<&Address>,
    result: &RawOperationResult,
) -> Result<(AccountId, Option<AccountId>)> {
    let level = ctx.level();
    let address = result
        .originated_contracts
        .first()
        .ok_or_else(|| Error::inconsistent("applied origination without an originated contract"))?;
    let (contract, _) = ctx.cache.accounts.get_or_create(address, level);
    {
        let row = ctx.cache.accounts.get_mut(contract)?;
        row.creator = Some(sender);
        ctx.cache.journal.push(WriteOp::UpsertAccount(contract));
    }

    let delegate_id = match delegate {
        Some(addr) => {
            let id = ctx.cache.accounts.id_of(addr)?;
            let row = ctx.cache.accounts.get_mut(contract)?;
            row.delegate = Some(id);
            row.delegation_level = Some(level);
            let delegate_row = ctx.cache.accounts.get_mut(id)?;
            delegate_row.delegators_count += 1;
            ctx.cache.journal.push(WriteOp::UpsertAccount(id));
            Some(id)
        }
        None => None,
    };

    // endowment flows through the aggregates now that the delegate is set
    ctx.transfer(sender, contract, balance)?;
    ctx.burn(payer, Mutez(result.storage_fee))?;
    ctx.burn(payer, Mutez(result.allocation_fee))?;
    Ok((contract, delegate_id))
}

#[allow(clippy::too_many_arguments)]
pub fn revert(
    rctx: &mut RevertContext,
    sender: AccountId,
    payer: AccountId,
    contract: AccountId,
    balance: Mutez,
    delegate: Option<AccountId>,
    storage_fee: Mutez,
    allocation_fee: Mutez,
    status: OpStatus,
) -> Result<()> {
    if status != OpStatus::Applied {
        return Ok(());
    }
    rctx.credit(payer, allocation_fee)?;
    rctx.credit(payer, storage_fee)?;
    rctx.transfer(contract, sender, balance)?;
    if let Some(id) = delegate {
        let contract_row = rctx.cache.accounts.get_mut(contract)?;
        contract_row.delegate = None;
        contract_row.delegation_level = None;
        let delegate_row = rctx.cache.accounts.get_mut(id)?;
        delegate_row.delegators_count -= 1;
        rctx.cache.journal.push(WriteOp::UpsertAccount(id));
    }
    // the contract row itself is pruned by the account sweep
    Ok(())
}
