//! Per-kind commit logic.
//!
//! Each module owns the forward and reverse effects of one operation
//! family. `revert_operation` is the single entry point of the reverse
//! path: it dispatches on the persisted row, undoes the kind-specific
//! effect, then returns the fee and counter for top-level manager rows.
//! Rows are reverted in reverse insertion order, so the state each
//! revert sees is exactly the state its apply left behind.

pub mod anonymous;
pub mod baking;
pub mod bigmaps;
pub mod consensus;
pub mod delegation;
pub mod governance;
pub mod manager;
pub mod origination;
pub mod rollup;
pub mod staking;
pub mod tickets;
pub mod tokens;
pub mod transaction;

use crate::entity::{OpStatus, Operation, OperationDetails};
use crate::error::Result;
use crate::pipeline::context::RevertContext;
use crate::store::WriteOp;

/// Undo one operation row. The kind-specific inverse runs first, then
/// the fee/counter uncharge for top-level manager rows, mirroring the
/// forward order.
pub fn revert_operation(rctx: &mut RevertContext, op: &Operation) -> Result<()> {
    let sender = op.sender;
    match &op.details {
        OperationDetails::Endorsement {
            delegate, reward, ..
        } => consensus::revert_endorsement(rctx, *delegate, *reward)?,
        OperationDetails::Preendorsement { .. } => {}
        OperationDetails::Proposal {
            period,
            proposals,
            dictator,
            created,
            upvoting_power,
        } => governance::revert_proposals(
            rctx,
            *period,
            *dictator,
            proposals,
            created,
            *upvoting_power,
        )?,
        OperationDetails::Ballot {
            period,
            vote,
            voting_power,
            ..
        } => governance::revert_ballot(rctx, *period, *vote, *voting_power)?,
        OperationDetails::Activation { account, balance } => {
            anonymous::revert_activation(rctx, *account, *balance)?
        }
        OperationDetails::DoubleSigning {
            kind,
            accused_cycle,
            offender,
            accuser,
            offender_loss,
            accuser_reward,
            ..
        } => anonymous::revert_double_signing(
            rctx,
            *kind,
            *accused_cycle,
            *offender,
            *accuser,
            *offender_loss,
            *accuser_reward,
        )?,
        OperationDetails::NonceRevelation { baker, reward, .. } => {
            anonymous::revert_revelation(rctx, *baker, *reward)?
        }
        OperationDetails::DrainDelegate {
            delegate,
            target,
            amount,
            ..
        } => anonymous::revert_drain(rctx, *delegate, *target, *amount, op.fee)?,
        OperationDetails::Reveal { .. } => {
            if op.status == OpStatus::Applied {
                if let Some(sender) = sender {
                    let account = rctx.cache.accounts.get_mut(sender)?;
                    account.revealed = false;
                    rctx.cache.journal.push(WriteOp::UpsertAccount(sender));
                }
            }
        }
        OperationDetails::Transaction {
            target,
            amount,
            storage_fee,
            allocation_fee,
            ..
        } => {
            let sender = require_sender(sender)?;
            let payer = op.initiator.unwrap_or(sender);
            transaction::revert(
                rctx,
                sender,
                payer,
                *target,
                *amount,
                *storage_fee,
                *allocation_fee,
                op.status,
            )?
        }
        OperationDetails::Delegation {
            new_delegate,
            prev_delegate,
            amount,
            self_delegation,
            prev_kind_was_user,
            prev_delegation_level,
            prev_activation_level,
            prev_deactivation_level,
        } => delegation::revert(
            rctx,
            require_sender(sender)?,
            op.status,
            *new_delegate,
            *prev_delegate,
            *amount,
            *self_delegation,
            *prev_kind_was_user,
            *prev_delegation_level,
            *prev_activation_level,
            *prev_deactivation_level,
        )?,
        OperationDetails::Origination {
            contract,
            balance,
            delegate,
            storage_fee,
            allocation_fee,
        } => {
            let sender = require_sender(sender)?;
            let payer = op.initiator.unwrap_or(sender);
            origination::revert(
                rctx,
                sender,
                payer,
                *contract,
                *balance,
                *delegate,
                *storage_fee,
                *allocation_fee,
                op.status,
            )?
        }
        OperationDetails::Staking { action, amount, .. } => {
            staking::revert_staking(rctx, require_sender(sender)?, *action, *amount, op.status)?
        }
        OperationDetails::SetDelegateParameters {
            prev_limit,
            prev_edge,
            ..
        } => staking::revert_set_parameters(
            rctx,
            require_sender(sender)?,
            *prev_limit,
            *prev_edge,
            op.status,
        )?,
        OperationDetails::TransferTicket { storage_fee, .. } => {
            if op.status == OpStatus::Applied {
                rctx.credit(require_sender(sender)?, *storage_fee)?;
            }
        }
        OperationDetails::SmartRollupOriginate { storage_fee, .. } => {
            if op.status == OpStatus::Applied {
                rctx.credit(require_sender(sender)?, *storage_fee)?;
            }
        }
        OperationDetails::SmartRollupAddMessages { .. } => {}
        OperationDetails::SmartRollupCement { .. } => {}
        OperationDetails::SmartRollupPublish { bond, .. } => {
            if op.status == OpStatus::Applied && !bond.is_zero() {
                rctx.unfreeze(require_sender(sender)?, *bond)?;
            }
        }
        OperationDetails::SmartRollupRefute {
            game_status,
            slashed_bond,
            opponent,
            ..
        } => rollup::revert_refute(
            rctx,
            require_sender(sender)?,
            *opponent,
            game_status,
            *slashed_bond,
            op.status,
        )?,
        OperationDetails::SmartRollupRecoverBond { staker, bond, .. } => {
            if op.status == OpStatus::Applied && !bond.is_zero() {
                rctx.freeze(*staker, *bond)?;
            }
        }
        OperationDetails::SmartRollupExecute { .. } => {}
        OperationDetails::DalPublishCommitment { .. } => {}
        OperationDetails::EndorsingReward {
            baker, received, ..
        } => baking::revert_endorsing_reward(rctx, *baker, *received)?,
        OperationDetails::Subsidy { target, amount } => {
            baking::revert_subsidy(rctx, *target, *amount)?
        }
        OperationDetails::Migration {
            account,
            balance_change,
        } => rctx.debit(*account, *balance_change)?,
        OperationDetails::Deactivation {
            delegate,
            prev_deactivation_level,
        } => baking::revert_deactivation(rctx, *delegate, *prev_deactivation_level)?,
        OperationDetails::BigMapDiff { .. } => {}
    }

    if let (Some(sender), Some(counter)) = (sender, op.counter) {
        manager::uncharge(rctx, sender, op.fee, counter)?;
    }
    Ok(())
}

fn require_sender(sender: Option<crate::ids::AccountId>) -> Result<crate::ids::AccountId> {
    sender.ok_or_else(|| crate::error::Error::inconsistent("operation row without a sender"))
}
