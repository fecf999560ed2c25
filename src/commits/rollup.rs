//! Smart rollup operations.
//!
//! Bonds are modeled through the frozen deposit of the staker, so the
//! freeze/unfreeze primitives and the conservation accounting apply
//! unchanged. A resolved refutation game slashes the loser's bond: half
//! goes to the winner, half is burned.

use crate::address::Address;
use crate::entity::{OpStatus, OperationDetails, RefutationOutcome};
use crate::error::{Error, Result};
use crate::ids::AccountId;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::{RawManagerInfo, RawManagerMeta};
use crate::store::WriteOp;
use crate::value::Mutez;

use super::manager;

pub fn apply_originate(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
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
            OperationDetails::SmartRollupOriginate {
                rollup: sender,
                genesis_commitment: String::new(),
                storage_fee: Mutez::zero(),
            },
        );
        return Ok(());
    }
    let result = &meta.operation_result;
    let address = result
        .originated_rollup
        .as_ref()
        .ok_or_else(|| Error::inconsistent("applied rollup origination without an address"))?;
    let level = ctx.level();
    let (rollup, _) = ctx.cache.accounts.get_or_create(address, level);
    {
        let row = ctx.cache.accounts.get_mut(rollup)?;
        row.creator = Some(sender);
        ctx.cache.journal.push(WriteOp::UpsertAccount(rollup));
    }
    ctx.burn(sender, Mutez(result.storage_fee))?;
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupOriginate {
            rollup,
            genesis_commitment: result.commitment.clone().unwrap_or_default(),
            storage_fee: Mutez(result.storage_fee),
        },
    );
    Ok(())
}

pub fn apply_add_messages(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    messages_count: i32,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupAddMessages { messages_count },
    );
    Ok(())
}

pub fn apply_cement(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    rollup_addr: &Address,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let rollup = ctx.cache.accounts.id_of(rollup_addr)?;
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupCement {
            rollup,
            commitment: meta.operation_result.commitment.clone().unwrap_or_default(),
        },
    );
    Ok(())
}

pub fn apply_publish(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    rollup_addr: &Address,
    commitment: &str,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let rollup = ctx.cache.accounts.id_of(rollup_addr)?;
    let bond = Mutez(meta.operation_result.bond);
    if status == OpStatus::Applied && !bond.is_zero() {
        ctx.freeze(sender, bond)?;
    }
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupPublish {
            rollup,
            commitment: commitment.to_string(),
            bond: if status == OpStatus::Applied {
                bond
            } else {
                Mutez::zero()
            },
        },
    );
    Ok(())
}

pub fn apply_refute(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    rollup_addr: &Address,
    opponent_addr: &Address,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let rollup = ctx.cache.accounts.id_of(rollup_addr)?;
    let opponent = ctx.cache.accounts.id_of(opponent_addr)?;

    let outcome = match meta.operation_result.game_status.as_deref() {
        None | Some("ongoing") => RefutationOutcome::Ongoing,
        Some("won") => RefutationOutcome::Won,
        Some("lost") => RefutationOutcome::Lost,
        Some("draw") => RefutationOutcome::Draw,
        Some(other) => {
            return Err(Error::inconsistent(format!(
                "unknown refutation game status `{}`",
                other
            )))
        }
    };

    let bond = Mutez(meta.operation_result.bond);
    let mut slashed = Mutez::zero();
    if status == OpStatus::Applied {
        match outcome {
            RefutationOutcome::Ongoing => {}
            RefutationOutcome::Won => {
                slashed = bond;
                settle_game(ctx, opponent, sender, bond)?;
            }
            RefutationOutcome::Lost => {
                slashed = bond;
                settle_game(ctx, sender, opponent, bond)?;
            }
            RefutationOutcome::Draw => {
                // both sides lose half their bond, everything burns
                let half = Mutez(bond.0 / 2);
                slashed = bond;
                ctx.slash(sender, half)?;
                ctx.slash(opponent, bond.saturating_sub(half))?;
            }
        }
    }

    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupRefute {
            rollup,
            game_status: outcome,
            slashed_bond: slashed,
            opponent: Some(opponent),
        },
    );
    Ok(())
}

/// The loser's bond is slashed; half is minted back to the winner, the
/// remainder stays burned.
fn settle_game(
    ctx: &mut BlockContext,
    loser: AccountId,
    winner: AccountId,
    bond: Mutez,
) -> Result<()> {
    ctx.slash(loser, bond)?;
    ctx.mint(winner, Mutez(bond.0 / 2))?;
    Ok(())
}

pub fn apply_recover_bond(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    rollup_addr: &Address,
    staker_addr: &Address,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let rollup = ctx.cache.accounts.id_of(rollup_addr)?;
    let staker = ctx.cache.accounts.id_of(staker_addr)?;
    let bond = Mutez(meta.operation_result.bond);
    if status == OpStatus::Applied && !bond.is_zero() {
        ctx.unfreeze(staker, bond)?;
    }
    ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupRecoverBond {
            rollup,
            staker,
            bond: if status == OpStatus::Applied {
                bond
            } else {
                Mutez::zero()
            },
        },
    );
    Ok(())
}

pub fn apply_execute(
    ctx: &mut BlockContext,
    hash: &str,
    info: &RawManagerInfo,
    rollup_addr: &Address,
    commitment: &str,
    meta: &RawManagerMeta,
) -> Result<()> {
    let sender = manager::charge(ctx, info)?;
    let status = manager::status_of(meta.operation_result.status);
    let rollup = ctx.cache.accounts.id_of(rollup_addr)?;
    let op = ctx.record(
        hash,
        Some(sender),
        Mutez(info.fee),
        Some(info.counter),
        status,
        OperationDetails::SmartRollupExecute {
            rollup,
            commitment: commitment.to_string(),
        },
    );
    if status == OpStatus::Applied {
        manager::queue_results(ctx, op, rollup, &meta.operation_result);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn revert_refute(
    rctx: &mut RevertContext,
    sender: AccountId,
    opponent: Option<AccountId>,
    outcome: &RefutationOutcome,
    slashed: Mutez,
    status: OpStatus,
) -> Result<()> {
    if status != OpStatus::Applied || slashed.is_zero() {
        return Ok(());
    }
    let opponent =
        opponent.ok_or_else(|| Error::inconsistent("resolved game without an opponent"))?;
    match outcome {
        RefutationOutcome::Ongoing => {}
        RefutationOutcome::Won => {
            rctx.debit(sender, Mutez(slashed.0 / 2))?;
            rctx.unslash(opponent, slashed)?;
        }
        RefutationOutcome::Lost => {
            rctx.debit(opponent, Mutez(slashed.0 / 2))?;
            rctx.unslash(sender, slashed)?;
        }
        RefutationOutcome::Draw => {
            let half = Mutez(slashed.0 / 2);
            rctx.unslash(opponent, slashed.saturating_sub(half))?;
            rctx.unslash(sender, half)?;
        }
    }
    Ok(())
}
