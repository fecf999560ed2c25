//! Consensus group: endorsements and preendorsements.
//!
//! The operation only records the inclusion; right realization and the
//! per-cycle participation figures happen in the deferred rights pass,
//! which scans the rows written here. Legacy protocols additionally pay
//! the per-operation endorsement reward immediately.

use crate::entity::{OpStatus, OperationDetails};
use crate::error::Result;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rawblock::RawConsensusMeta;
use crate::rewards::{legacy_endorsement_reward, AttestationRewardMode};
use crate::value::Mutez;

pub fn apply_endorsement(
    ctx: &mut BlockContext,
    hash: &str,
    meta: &RawConsensusMeta,
) -> Result<()> {
    let delegate = ctx.cache.accounts.id_of(&meta.delegate)?;
    let reward = match ctx.flags.reward_mode {
        AttestationRewardMode::PerOperation => {
            legacy_endorsement_reward(&ctx.proto.constants, meta.slots, ctx.block.round)
        }
        AttestationRewardMode::CycleEnd => Mutez::zero(),
    };
    if !reward.is_zero() {
        ctx.mint(delegate, reward)?;
        let cycle = ctx.cycle();
        let bc = ctx.cache.baker_cycle_mut(cycle, delegate);
        bc.attestation_rewards = (bc.attestation_rewards + reward)?;
    }
    ctx.record(
        hash,
        Some(delegate),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::Endorsement {
            delegate,
            slots: meta.slots,
            reward,
        },
    );
    Ok(())
}

pub fn apply_preendorsement(
    ctx: &mut BlockContext,
    hash: &str,
    meta: &RawConsensusMeta,
) -> Result<()> {
    let delegate = ctx.cache.accounts.id_of(&meta.delegate)?;
    ctx.record(
        hash,
        Some(delegate),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::Preendorsement {
            delegate,
            slots: meta.slots,
        },
    );
    Ok(())
}

pub fn revert_endorsement(
    rctx: &mut RevertContext,
    delegate: crate::ids::AccountId,
    reward: Mutez,
) -> Result<()> {
    if !reward.is_zero() {
        rctx.debit(delegate, reward)?;
        let cycle = rctx.block.cycle;
        let bc = rctx.cache.baker_cycle_mut(cycle, delegate);
        bc.attestation_rewards = (bc.attestation_rewards - reward)?;
    }
    Ok(())
}
