//! Deferred per-block passes: block rewards, right realization, the
//! cycle-end attestation settlement, deactivations and the protocol
//! subsidy.
//!
//! These run after the operation groups, reading the rows the groups
//! wrote. Their reverts run first when a block is rolled back,
//! mirroring the forward order exactly.

use std::collections::HashMap;

use crate::entity::{
    BlockEvents, OpStatus, OperationDetails, RightKind, RightStatus,
};
use crate::error::{Error, Result};
use crate::ids::AccountId;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::RawImplicitResult;
use crate::rewards::{
    block_bonus, cycle_end_attestation_reward, expected_attestation_rewards,
    expected_block_rewards, fixed_block_reward, legacy_block_reward, AttestationRewardMode,
};
use crate::store::WriteOp;
use crate::value::Mutez;

/// Attestation power included in the block, per delegate, read back
/// from the consensus rows.
fn included_attesters(ctx: &BlockContext) -> HashMap<AccountId, u32> {
    let mut included = HashMap::new();
    for id in ctx.cache.operations.at_level(ctx.level()) {
        if let Ok(op) = ctx.cache.operations.get(*id) {
            if let OperationDetails::Endorsement { delegate, slots, .. } = &op.details {
                *included.entry(*delegate).or_insert(0) += *slots;
            }
        }
    }
    included
}

/// Pay the baker for the block and settle the per-cycle figures.
pub fn apply_block_rewards(ctx: &mut BlockContext) -> Result<()> {
    let c = ctx.proto.constants.clone();
    let (reward, bonus) = if ctx.flags.fixed_rewards {
        let power: u32 = included_attesters(ctx).values().sum();
        (fixed_block_reward(&c), block_bonus(&c, power))
    } else {
        (legacy_block_reward(&c, ctx.block.round), Mutez::zero())
    };
    let baker = ctx.baker;
    ctx.mint(baker, (reward + bonus)?)?;
    ctx.block.reward = reward;
    ctx.block.bonus = bonus;

    let cycle = ctx.cycle();
    let fees = ctx.block.fees;
    let bc = ctx.cache.baker_cycle_mut(cycle, baker);
    bc.block_rewards = (bc.block_rewards + (reward + bonus)?)?;
    bc.block_fees = (bc.block_fees + fees)?;
    Ok(())
}

pub fn revert_block_rewards(rctx: &mut RevertContext) -> Result<()> {
    let baker = rctx
        .block
        .baker
        .ok_or_else(|| Error::inconsistent("reverting a block without a baker"))?;
    let paid = (rctx.block.reward + rctx.block.bonus)?;
    rctx.debit(baker, paid)?;
    let cycle = rctx.block.cycle;
    let fees = rctx.block.fees;
    let bc = rctx.cache.baker_cycle_mut(cycle, baker);
    bc.block_rewards = (bc.block_rewards - paid)?;
    bc.block_fees = (bc.block_fees - fees)?;
    Ok(())
}

/// Transition every right of this level to its terminal status and
/// fold the outcome into the per-cycle aggregates.
pub fn realize_rights(ctx: &mut BlockContext) -> Result<()> {
    let level = ctx.level();
    let c = ctx.proto.constants.clone();
    let included = included_attesters(ctx);
    let rights = ctx.cache.rights.at_level(level).to_vec();
    let per_block = expected_block_rewards(&c, 1, ctx.flags.max_reward_basis);

    for right in rights {
        match right.kind {
            RightKind::Baking => {
                let round = right.round.unwrap_or(0);
                let status = if round as i32 == ctx.block.round && right.baker == ctx.baker {
                    RightStatus::Realized
                } else {
                    RightStatus::Missed
                };
                ctx.cache
                    .rights
                    .realize(level, right.baker, RightKind::Baking, Some(round), status)?;
                ctx.cache.journal.push(WriteOp::UpdateRight {
                    level,
                    baker: right.baker,
                });
                let bc = ctx.cache.baker_cycle_mut(right.cycle, right.baker);
                if round == 0 {
                    bc.future_blocks -= 1;
                    bc.future_block_rewards = (bc.future_block_rewards - per_block)?;
                    if status == RightStatus::Missed {
                        bc.missed_blocks += 1;
                    }
                }
                if status == RightStatus::Realized {
                    bc.blocks += 1;
                }
            }
            RightKind::Attestation => {
                let slots = right.slots.unwrap_or(0);
                let covered = ctx.cache.accounts.get(right.baker)?.frozen_deposit
                    > Mutez::zero()
                    || c.frozen_deposit_percent == 0;
                let status = if included.contains_key(&right.baker) {
                    RightStatus::Realized
                } else if covered {
                    RightStatus::Missed
                } else {
                    RightStatus::Uncovered
                };
                ctx.cache.rights.realize(
                    level,
                    right.baker,
                    RightKind::Attestation,
                    None,
                    status,
                )?;
                ctx.cache.journal.push(WriteOp::UpdateRight {
                    level,
                    baker: right.baker,
                });
                let bc = ctx.cache.baker_cycle_mut(right.cycle, right.baker);
                bc.future_attestations -= slots as i32;
                bc.future_attestation_rewards = (bc.future_attestation_rewards
                    - expected_attestation_rewards(&c, slots as i32))?;
                if status == RightStatus::Realized {
                    bc.attestations += slots as i32;
                } else {
                    bc.missed_attestations += slots as i32;
                }
            }
            RightKind::Dal => {}
        }
    }
    Ok(())
}

pub fn revert_rights(rctx: &mut RevertContext) -> Result<()> {
    let level = rctx.level();
    let c = rctx.proto.constants.clone();
    let rights = rctx.cache.rights.at_level(level).to_vec();
    let per_block = expected_block_rewards(&c, 1, rctx.flags.max_reward_basis);

    for right in rights {
        if right.status == RightStatus::Future {
            continue;
        }
        match right.kind {
            RightKind::Baking => {
                let round = right.round.unwrap_or(0);
                rctx.cache
                    .rights
                    .unrealize(level, right.baker, RightKind::Baking, Some(round))?;
                let bc = rctx.cache.baker_cycle_mut(right.cycle, right.baker);
                if round == 0 {
                    bc.future_blocks += 1;
                    bc.future_block_rewards = (bc.future_block_rewards + per_block)?;
                    if right.status == RightStatus::Missed {
                        bc.missed_blocks -= 1;
                    }
                }
                if right.status == RightStatus::Realized {
                    bc.blocks -= 1;
                }
            }
            RightKind::Attestation => {
                let slots = right.slots.unwrap_or(0);
                rctx.cache
                    .rights
                    .unrealize(level, right.baker, RightKind::Attestation, None)?;
                let bc = rctx.cache.baker_cycle_mut(right.cycle, right.baker);
                bc.future_attestations += slots as i32;
                bc.future_attestation_rewards = (bc.future_attestation_rewards
                    + expected_attestation_rewards(&c, slots as i32))?;
                if right.status == RightStatus::Realized {
                    bc.attestations -= slots as i32;
                } else {
                    bc.missed_attestations -= slots as i32;
                }
            }
            RightKind::Dal => {}
        }
    }
    Ok(())
}

/// Cycle-end settlement of attestation rewards: full participation pays
/// every realized slot, any miss forfeits the cycle. One implicit
/// operation per baker, in id order for determinism.
pub fn settle_attestation_rewards(ctx: &mut BlockContext) -> Result<()> {
    if ctx.flags.reward_mode != AttestationRewardMode::CycleEnd {
        return Ok(());
    }
    let cycle = ctx.cycle();
    let c = ctx.proto.constants.clone();
    let hash = ctx.block.hash.clone();

    let mut bakers: Vec<AccountId> = ctx
        .cache
        .baker_cycles
        .keys()
        .filter(|(c, _)| *c == cycle)
        .map(|(_, b)| *b)
        .collect();
    bakers.sort_unstable();

    for baker in bakers {
        let (attested, missed) = {
            let bc = ctx.cache.baker_cycle(cycle, baker)?;
            (bc.attestations, bc.missed_attestations)
        };
        if attested == 0 && missed == 0 {
            continue;
        }
        let expected = expected_attestation_rewards(&c, attested + missed);
        let received = cycle_end_attestation_reward(&c, attested, missed);
        ctx.mint(baker, received)?;
        let bc = ctx.cache.baker_cycle_mut(cycle, baker);
        bc.attestation_rewards = (bc.attestation_rewards + received)?;
        ctx.record(
            &hash,
            Some(baker),
            Mutez::zero(),
            None,
            OpStatus::Applied,
            OperationDetails::EndorsingReward {
                baker,
                expected,
                received,
            },
        );
    }
    Ok(())
}

pub fn revert_endorsing_reward(
    rctx: &mut RevertContext,
    baker: AccountId,
    received: Mutez,
) -> Result<()> {
    rctx.debit(baker, received)?;
    let cycle = rctx.block.cycle;
    let bc = rctx.cache.baker_cycle_mut(cycle, baker);
    bc.attestation_rewards = (bc.attestation_rewards - received)?;
    Ok(())
}

/// Delegates listed as deactivated in the block metadata.
pub fn apply_deactivations(
    ctx: &mut BlockContext,
    deactivated: &[crate::address::Address],
) -> Result<()> {
    let hash = ctx.block.hash.clone();
    for addr in deactivated {
        let id = ctx.cache.accounts.id_of(addr)?;
        let prev = {
            let account = ctx.cache.accounts.get_mut(id)?;
            let prev = account.deactivation_level;
            account.deactivation_level = Some(ctx.block.level + 1);
            prev
        };
        ctx.cache.journal.push(WriteOp::UpsertAccount(id));
        ctx.block.events.set(BlockEvents::DEACTIVATIONS);
        ctx.record(
            &hash,
            Some(id),
            Mutez::zero(),
            None,
            OpStatus::Applied,
            OperationDetails::Deactivation {
                delegate: id,
                prev_deactivation_level: prev,
            },
        );
    }
    Ok(())
}

pub fn revert_deactivation(
    rctx: &mut RevertContext,
    delegate: AccountId,
    prev_deactivation_level: Option<i32>,
) -> Result<()> {
    let account = rctx.cache.accounts.get_mut(delegate)?;
    account.deactivation_level = prev_deactivation_level;
    rctx.cache.journal.push(WriteOp::UpsertAccount(delegate));
    Ok(())
}

/// Implicit protocol-level operations from the block metadata (the
/// liquidity baking subsidy).
pub fn apply_implicit(ctx: &mut BlockContext, results: &[RawImplicitResult]) -> Result<()> {
    let hash = ctx.block.hash.clone();
    for result in results {
        match result {
            RawImplicitResult::Transaction {
                destination,
                amount,
            } => {
                let level = ctx.level();
                let (target, _) = ctx.cache.accounts.get_or_create(destination, level);
                let amount = Mutez(*amount);
                ctx.mint(target, amount)?;
                ctx.record(
                    &hash,
                    None,
                    Mutez::zero(),
                    None,
                    OpStatus::Applied,
                    OperationDetails::Subsidy { target, amount },
                );
            }
        }
    }
    Ok(())
}

pub fn revert_subsidy(rctx: &mut RevertContext, target: AccountId, amount: Mutez) -> Result<()> {
    rctx.debit(target, amount)
}
