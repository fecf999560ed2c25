//! Ticket update aggregation.
//!
//! Each queued update is a signed balance delta for one (ticket, holder)
//! pair; positive deltas log as mints, negative as burns. Tickets and
//! balance rows created by the reverted level are physically removed on
//! revert, everything else gets the inverse delta.

use std::collections::HashMap;

use crate::entity::TicketTransfer;
use crate::error::Result;
use crate::ids::TicketId;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::store::WriteOp;

pub fn apply(ctx: &mut BlockContext) -> Result<()> {
    let queued = std::mem::take(&mut ctx.ticket_updates);
    let level = ctx.level();
    for item in queued {
        let update = item.update;
        let (ticketer, _) = ctx.cache.accounts.get_or_create(&update.ticketer, level);
        let (ticket, _) =
            ctx.cache
                .side_tables
                .intern_ticket(ticketer, &update.content_hash, level);
        let (holder, _) = ctx.cache.accounts.get_or_create(&update.account, level);

        let balance = ctx.cache.side_tables.ticket_balance_mut(ticket, holder, level);
        balance.amount += update.amount;
        balance.last_level = level;
        ctx.cache.journal.push(WriteOp::UpsertTicketBalance {
            ticket,
            account: holder,
        });

        let id = ctx.cache.side_tables.next_ticket_transfer_id();
        let (from, to, amount) = if update.amount >= 0 {
            (None, Some(holder), update.amount)
        } else {
            (Some(holder), None, -update.amount)
        };
        ctx.cache.side_tables.ticket_transfers.push(TicketTransfer {
            id,
            ticket,
            from,
            to,
            amount,
            level,
            op: item.op,
        });
    }
    Ok(())
}

pub fn revert(rctx: &mut RevertContext) -> Result<()> {
    let level = rctx.level();
    let tables = &mut rctx.cache.side_tables;
    let mut released = 0u64;

    while let Some(last) = tables.ticket_transfers.last() {
        if last.level != level {
            break;
        }
        let transfer = tables.ticket_transfers.pop().expect("checked non-empty");
        released += 1;
        if let Some(to) = transfer.to {
            tables.ticket_balance_mut(transfer.ticket, to, level).amount -= transfer.amount;
        }
        if let Some(from) = transfer.from {
            tables.ticket_balance_mut(transfer.ticket, from, level).amount += transfer.amount;
        }
    }
    tables.release_ticket_transfers(released);

    // rows born in this block disappear with it
    tables.ticket_balances.retain(|_, b| b.first_level != level);

    let mut created: Vec<TicketId> = tables
        .tickets
        .values()
        .filter(|t| t.first_level == level)
        .map(|t| t.id)
        .collect();
    created.sort_unstable_by(|a, b| b.cmp(a));
    for id in created {
        tables.rollback_ticket(id)?;
    }

    // surviving rows get their last activity level recomputed
    let mut last_activity: HashMap<(TicketId, crate::ids::AccountId), i32> = HashMap::new();
    for transfer in &tables.ticket_transfers {
        for account in [transfer.from, transfer.to].iter().flatten() {
            let entry = last_activity.entry((transfer.ticket, *account)).or_insert(0);
            *entry = (*entry).max(transfer.level);
        }
    }
    for (key, balance) in tables.ticket_balances.iter_mut() {
        if balance.last_level == level {
            balance.last_level = last_activity
                .get(key)
                .copied()
                .unwrap_or(balance.first_level);
        }
    }
    Ok(())
}
