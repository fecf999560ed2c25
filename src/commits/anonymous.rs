//! Anonymous group: activations, double-signing evidence, nonce
//! revelations and delegate drains.

use crate::address::Address;
use crate::entity::{DoubleKind, OpStatus, OperationDetails, RevelationKind};
use crate::error::Result;
use crate::ids::AccountId;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::rewards::slashing_split;
use crate::value::Mutez;

pub fn apply_activation(
    ctx: &mut BlockContext,
    hash: &str,
    pkh: &Address,
    balance: Mutez,
) -> Result<()> {
    let level = ctx.level();
    let (account, _) = ctx.cache.accounts.get_or_create(pkh, level);
    ctx.mint(account, balance)?;
    ctx.activated = (ctx.activated + balance)?;
    ctx.record(
        hash,
        Some(account),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::Activation { account, balance },
    );
    Ok(())
}

pub fn revert_activation(rctx: &mut RevertContext, account: AccountId, balance: Mutez) -> Result<()> {
    rctx.debit(account, balance)
}

/// Double-signing evidence. The slash is computed against the frozen
/// deposit the offender holds *now*, booked into the cycle of the
/// accused level; the block baker collects the accuser share.
pub fn apply_double_signing(
    ctx: &mut BlockContext,
    hash: &str,
    kind: DoubleKind,
    accused_level: i32,
    offender_addr: &Address,
) -> Result<()> {
    let offender = ctx.cache.accounts.id_of(offender_addr)?;
    let accuser = ctx.baker;
    let accused_cycle = ctx.proto.cycle_of(accused_level);

    let c = &ctx.proto.constants;
    let percent = match kind {
        DoubleKind::Baking => c.double_baking_slash_percent,
        DoubleKind::Attesting | DoubleKind::Preattesting => c.double_attesting_slash_percent,
    };
    let accuser_percent = c.accuser_reward_percent;
    let frozen = ctx.cache.accounts.get(offender)?.frozen_deposit;
    let split = slashing_split(frozen, percent, accuser_percent);

    ctx.slash(offender, split.offender_loss)?;
    ctx.mint(accuser, split.accuser_reward)?;

    let bc = ctx.cache.baker_cycle_mut(accused_cycle, offender);
    match kind {
        DoubleKind::Baking => {
            bc.double_baking_losses = (bc.double_baking_losses + split.offender_loss)?
        }
        DoubleKind::Attesting | DoubleKind::Preattesting => {
            bc.double_attesting_losses = (bc.double_attesting_losses + split.offender_loss)?
        }
    }
    let bc = ctx.cache.baker_cycle_mut(accused_cycle, accuser);
    match kind {
        DoubleKind::Baking => {
            bc.double_baking_rewards = (bc.double_baking_rewards + split.accuser_reward)?
        }
        DoubleKind::Attesting | DoubleKind::Preattesting => {
            bc.double_attesting_rewards = (bc.double_attesting_rewards + split.accuser_reward)?
        }
    }

    ctx.record(
        hash,
        Some(accuser),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::DoubleSigning {
            kind,
            accused_level,
            accused_cycle,
            offender,
            accuser,
            offender_loss: split.offender_loss,
            accuser_reward: split.accuser_reward,
        },
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn revert_double_signing(
    rctx: &mut RevertContext,
    kind: DoubleKind,
    accused_cycle: i32,
    offender: AccountId,
    accuser: AccountId,
    offender_loss: Mutez,
    accuser_reward: Mutez,
) -> Result<()> {
    rctx.debit(accuser, accuser_reward)?;
    rctx.unslash(offender, offender_loss)?;

    let bc = rctx.cache.baker_cycle_mut(accused_cycle, offender);
    match kind {
        DoubleKind::Baking => bc.double_baking_losses = (bc.double_baking_losses - offender_loss)?,
        DoubleKind::Attesting | DoubleKind::Preattesting => {
            bc.double_attesting_losses = (bc.double_attesting_losses - offender_loss)?
        }
    }
    let bc = rctx.cache.baker_cycle_mut(accused_cycle, accuser);
    match kind {
        DoubleKind::Baking => {
            bc.double_baking_rewards = (bc.double_baking_rewards - accuser_reward)?
        }
        DoubleKind::Attesting | DoubleKind::Preattesting => {
            bc.double_attesting_rewards = (bc.double_attesting_rewards - accuser_reward)?
        }
    }
    Ok(())
}

/// Seed nonce and VDF revelations pay the revealing block's baker.
pub fn apply_revelation(
    ctx: &mut BlockContext,
    hash: &str,
    kind: RevelationKind,
    revealed_level: i32,
) -> Result<()> {
    let baker = ctx.baker;
    let reward = ctx.proto.constants.nonce_revelation_reward;
    ctx.mint(baker, reward)?;
    let cycle = ctx.cycle();
    let bc = ctx.cache.baker_cycle_mut(cycle, baker);
    bc.nonce_revelation_rewards = (bc.nonce_revelation_rewards + reward)?;

    ctx.record(
        hash,
        Some(baker),
        Mutez::zero(),
        None,
        OpStatus::Applied,
        OperationDetails::NonceRevelation {
            kind,
            baker,
            revealed_level,
            reward,
        },
    );
    Ok(())
}

pub fn revert_revelation(
    rctx: &mut RevertContext,
    baker: AccountId,
    reward: Mutez,
) -> Result<()> {
    rctx.debit(baker, reward)?;
    let cycle = rctx.block.cycle;
    let bc = rctx.cache.baker_cycle_mut(cycle, baker);
    bc.nonce_revelation_rewards = (bc.nonce_revelation_rewards - reward)?;
    Ok(())
}

/// Drain the full spendable balance of a delegate whose consensus key
/// leaked: everything moves to the target, with a one percent tip to the
/// block baker.
pub fn apply_drain(
    ctx: &mut BlockContext,
    hash: &str,
    delegate_addr: &Address,
    destination: &Address,
) -> Result<()> {
    let delegate = ctx.cache.accounts.id_of(delegate_addr)?;
    let level = ctx.level();
    let (target, allocated) = ctx.cache.accounts.get_or_create(destination, level);

    let amount = ctx.cache.accounts.get(delegate)?.balance;
    let fee = Mutez(amount.0 / 100);
    let moved = amount.saturating_sub(fee);
    let baker = ctx.baker;
    ctx.transfer(delegate, target, moved)?;
    ctx.transfer(delegate, baker, fee)?;

    ctx.record(
        hash,
        Some(delegate),
        fee,
        None,
        OpStatus::Applied,
        OperationDetails::DrainDelegate {
            delegate,
            target,
            amount,
            allocated_target: allocated,
        },
    );
    Ok(())
}

pub fn revert_drain(
    rctx: &mut RevertContext,
    delegate: AccountId,
    target: AccountId,
    amount: Mutez,
    fee: Mutez,
) -> Result<()> {
    let baker = rctx
        .block
        .baker
        .ok_or_else(|| crate::error::Error::inconsistent("reverting a block without a baker"))?;
    rctx.transfer(baker, delegate, fee)?;
    rctx.transfer(target, delegate, amount.saturating_sub(fee))?;
    Ok(())
}
