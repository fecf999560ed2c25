//! Manager group dispatch.
//!
//! Fees and counters apply for every manager operation regardless of
//! its result status; the kind-specific effect only runs when the
//! result is `applied`. Internal results run right after their parent,
//! with the top-level source threaded through as initiator.

use crate::entity::{OpStatus, OperationDetails};
use crate::error::Result;
use crate::ids::{AccountId, OpId};
use crate::pipeline::context::{
    BlockContext, QueuedBigMapDiff, QueuedTicketUpdate, QueuedTokenTransfer, RevertContext,
};
use crate::rawblock::{
    RawContent, RawInternalContent, RawInternalResult, RawManagerInfo, RawManagerMeta,
    RawOperationResult, RawStatus,
};
use crate::value::Mutez;

use super::{delegation, origination, rollup, staking, transaction};

pub fn status_of(raw: RawStatus) -> OpStatus {
    match raw {
        RawStatus::Applied => OpStatus::Applied,
        RawStatus::Failed => OpStatus::Failed,
        RawStatus::Backtracked => OpStatus::Backtracked,
        RawStatus::Skipped => OpStatus::Skipped,
    }
}

/// Pay the fee to the block baker and bump the manager counter. Runs
/// for every manager operation, applied or not.
pub fn charge(ctx: &mut BlockContext, info: &RawManagerInfo) -> Result<AccountId> {
    let sender = ctx.cache.accounts.id_of(&info.source)?;
    let fee = Mutez(info.fee);
    if !fee.is_zero() {
        let baker = ctx.baker;
        ctx.transfer(sender, baker, fee)?;
        ctx.block.fees = (ctx.block.fees + fee)?;
    }
    let account = ctx.cache.accounts.get_mut(sender)?;
    account.counter = info.counter;
    ctx.cache
        .journal
        .push(crate::store::WriteOp::UpsertAccount(sender));
    Ok(sender)
}

/// Undo fee payment and counter bump of a top-level manager operation.
/// Runs after the kind-specific revert, mirroring the forward order.
pub fn uncharge(
    rctx: &mut RevertContext,
    sender: AccountId,
    fee: Mutez,
    counter: i64,
) -> Result<()> {
    if !fee.is_zero() {
        let baker = rctx
            .block
            .baker
            .ok_or_else(|| crate::error::Error::inconsistent("reverting a block without a baker"))?;
        rctx.transfer(baker, sender, fee)?;
    }
    let account = rctx.cache.accounts.get_mut(sender)?;
    account.counter = counter - 1;
    rctx.cache
        .journal
        .push(crate::store::WriteOp::UpsertAccount(sender));
    Ok(())
}

/// Queue the side-table consequences of one operation result.
pub fn queue_results(
    ctx: &mut BlockContext,
    op: OpId,
    contract: AccountId,
    result: &RawOperationResult,
) {
    for diff in &result.big_map_diffs {
        ctx.bigmap_diffs.push(QueuedBigMapDiff {
            op,
            contract,
            diff: diff.clone(),
        });
    }
    for update in &result.ticket_updates {
        ctx.ticket_updates.push(QueuedTicketUpdate {
            op,
            update: update.clone(),
        });
    }
    for transfer in &result.token_transfers {
        ctx.token_transfers.push(QueuedTokenTransfer {
            op,
            transfer: transfer.clone(),
        });
    }
}

/// Apply one top-level content of the manager group.
pub fn apply_content(ctx: &mut BlockContext, hash: &str, content: &RawContent) -> Result<()> {
    match content {
        RawContent::Reveal {
            manager,
            public_key,
            metadata,
        } => apply_reveal(ctx, hash, manager, public_key, metadata),
        RawContent::Transaction {
            manager,
            destination,
            amount,
            parameters,
            metadata,
        } => transaction::apply(
            ctx,
            hash,
            manager,
            destination,
            Mutez(*amount),
            parameters.as_ref(),
            metadata,
        ),
        RawContent::Delegation {
            manager,
            delegate,
            metadata,
        } => delegation::apply(ctx, hash, manager, delegate.as_ref(), metadata),
        RawContent::Origination {
            manager,
            balance,
            delegate,
            metadata,
        } => origination::apply(ctx, hash, manager, Mutez(*balance), delegate.as_ref(), metadata),
        RawContent::TransferTicket {
            manager,
            destination,
            ticketer,
            ticket_amount,
            ticket_content_hash,
            metadata,
        } => apply_transfer_ticket(
            ctx,
            hash,
            manager,
            destination,
            ticketer,
            *ticket_amount,
            ticket_content_hash,
            metadata,
        ),
        RawContent::SmartRollupOriginate { manager, metadata } => {
            rollup::apply_originate(ctx, hash, manager, metadata)
        }
        RawContent::SmartRollupAddMessages {
            manager,
            message,
            metadata,
        } => rollup::apply_add_messages(ctx, hash, manager, message.len() as i32, metadata),
        RawContent::SmartRollupCement {
            manager,
            rollup: r,
            metadata,
        } => rollup::apply_cement(ctx, hash, manager, r, metadata),
        RawContent::SmartRollupPublish {
            manager,
            rollup: r,
            commitment,
            metadata,
        } => rollup::apply_publish(ctx, hash, manager, r, commitment, metadata),
        RawContent::SmartRollupRefute {
            manager,
            rollup: r,
            opponent,
            metadata,
        } => rollup::apply_refute(ctx, hash, manager, r, opponent, metadata),
        RawContent::SmartRollupRecoverBond {
            manager,
            rollup: r,
            staker,
            metadata,
        } => rollup::apply_recover_bond(ctx, hash, manager, r, staker, metadata),
        RawContent::SmartRollupExecuteOutboxMessage {
            manager,
            rollup: r,
            commitment,
            metadata,
        } => rollup::apply_execute(ctx, hash, manager, r, commitment, metadata),
        RawContent::DalPublishCommitment {
            manager,
            slot_index,
            commitment,
            metadata,
        } => apply_dal_publish(ctx, hash, manager, *slot_index, commitment, metadata),
        // contract events carry no balance effect of their own
        RawContent::Event { .. } => Ok(()),
        other => Err(crate::error::Error::inconsistent(format!(
            "operation kind `{}` outside its group",
            other.kind_name()
        ))),
    }
}

fn apply_reveal(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    public_key: &str,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = charge(ctx, info)?;
    let status = status_of(meta.operation_result.status);
    if status == OpStatus::Applied {
        let account = ctx.cache.accounts.get_mut(sender)?;
        account.revealed = true;
        ctx.cache
            .journal
            .push(crate::store::WriteOp::UpsertAccount(sender));
    }
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::Reveal {
            public_key: public_key.to_string(),
        },
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn apply_transfer_ticket(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    destination: &crate::address::Address,
    ticketer: &crate::address::Address,
    amount: i64,
    content_hash: &str,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = charge(ctx, info)?;
    let status = status_of(meta.operation_result.status);
    let level = ctx.level();
    let (target, _) = ctx.cache.accounts.get_or_create(destination, level);
    let (ticketer_id, _) = ctx.cache.accounts.get_or_create(ticketer, level);
    let (ticket, _) = ctx
        .cache
        .side_tables
        .intern_ticket(ticketer_id, content_hash, level);

    let storage_fee = Mutez(meta.operation_result.storage_fee);
    if status == OpStatus::Applied {
        ctx.burn(sender, storage_fee)?;
    }
    let op = ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::TransferTicket {
            target,
            ticket,
            amount,
            storage_fee,
        },
    );
    if status == OpStatus::Applied {
        queue_results(ctx, op, target, &meta.operation_result);
    }
    Ok(())
}

fn apply_dal_publish(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    slot_index: i32,
    commitment: &str,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = charge(ctx, info)?;
    let status = status_of(meta.operation_result.status);
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::DalPublishCommitment {
            slot_index,
            commitment: commitment.to_string(),
        },
    );
    Ok(())
}

/// Run the internal results attached to a manager operation.
pub fn apply_internals(
    ctx: &mut BlockContext,
    hash: &str,
    initiator: AccountId,
    parent: OpId,
    internals: &[RawInternalResult],
) -> Result<()> {
    for internal in internals {
        apply_internal(ctx, hash, initiator, parent, internal)?;
    }
    Ok(())
}

fn apply_internal(
    ctx: &mut BlockContext,
    hash: &str,
    initiator: AccountId,
    parent: OpId,
    internal: &RawInternalResult,
) -> Result<()> {
    let source = ctx.cache.accounts.id_of(&internal.source)?;
    let status = status_of(internal.result.status);
    match &internal.content {
        RawInternalContent::Transaction {
            destination,
            amount,
            entrypoint,
        } => transaction::apply_internal(
            ctx,
            hash,
            source,
            initiator,
            parent,
            destination,
            Mutez(*amount),
            entrypoint.clone(),
            status,
            &internal.result,
        ),
        RawInternalContent::Delegation { delegate } => delegation::apply_internal(
            ctx,
            hash,
            source,
            initiator,
            parent,
            delegate.as_ref(),
            status,
        ),
        RawInternalContent::Origination { balance, delegate } => origination::apply_internal(
            ctx,
            hash,
            source,
            initiator,
            parent,
            Mutez(*balance),
            delegate.as_ref(),
            status,
            &internal.result,
        ),
        RawInternalContent::Event {} => {
            // events only matter through the transfers on their result
            if status == OpStatus::Applied {
                queue_results(ctx, parent, source, &internal.result);
            }
            Ok(())
        }
    }
}
