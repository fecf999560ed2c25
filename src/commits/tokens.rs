//! Token transfer aggregation (FA1.2 / FA2).
//!
//! Transfers are derived rows from contract execution; holders that
//! have never appeared on-chain themselves are created as `Ghost`
//! accounts so the balance rows have something to point at.

use std::collections::HashMap;

use crate::entity::TokenTransfer;
use crate::error::Result;
use crate::ids::TokenId;
use crate::pipeline::context::{BlockContext, RevertContext};
use crate::store::WriteOp;

pub fn apply(ctx: &mut BlockContext) -> Result<()> {
    let queued = std::mem::take(&mut ctx.token_transfers);
    let level = ctx.level();
    for item in queued {
        let transfer = item.transfer;
        let (contract, _) = ctx.cache.accounts.get_or_create(&transfer.contract, level);
        let standard = crate::cache::SideTables::parse_standard(&transfer.standard);
        let (token, _) =
            ctx.cache
                .side_tables
                .intern_token(contract, &transfer.token_id, standard, level);

        let from = transfer
            .from
            .as_ref()
            .map(|a| ctx.cache.accounts.get_or_create_ghost(a, level).0);
        let to = transfer
            .to
            .as_ref()
            .map(|a| ctx.cache.accounts.get_or_create_ghost(a, level).0);

        if let Some(from) = from {
            let balance = ctx.cache.side_tables.token_balance_mut(token, from, level);
            balance.balance -= transfer.amount;
            balance.last_level = level;
            ctx.cache.journal.push(WriteOp::UpsertTokenBalance {
                token,
                account: from,
            });
        }
        if let Some(to) = to {
            let balance = ctx.cache.side_tables.token_balance_mut(token, to, level);
            balance.balance += transfer.amount;
            balance.last_level = level;
            ctx.cache.journal.push(WriteOp::UpsertTokenBalance {
                token,
                account: to,
            });
        }

        let id = ctx.cache.side_tables.next_token_transfer_id();
        ctx.cache.side_tables.token_transfers.push(TokenTransfer {
            id,
            token,
            from,
            to,
            amount: transfer.amount,
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

    while let Some(last) = tables.token_transfers.last() {
        if last.level != level {
            break;
        }
        let transfer = tables.token_transfers.pop().expect("checked non-empty");
        released += 1;
        if let Some(to) = transfer.to {
            tables.token_balance_mut(transfer.token, to, level).balance -= transfer.amount;
        }
        if let Some(from) = transfer.from {
            tables.token_balance_mut(transfer.token, from, level).balance += transfer.amount;
        }
    }
    tables.release_token_transfers(released);

    tables.token_balances.retain(|_, b| b.first_level != level);

    let mut created: Vec<TokenId> = tables
        .tokens
        .values()
        .filter(|t| t.first_level == level)
        .map(|t| t.id)
        .collect();
    created.sort_unstable_by(|a, b| b.cmp(a));
    for id in created {
        tables.rollback_token(id)?;
    }

    let mut last_activity: HashMap<(TokenId, crate::ids::AccountId), i32> = HashMap::new();
    for transfer in &tables.token_transfers {
        for account in [transfer.from, transfer.to].iter().flatten() {
            let entry = last_activity.entry((transfer.token, *account)).or_insert(0);
            *entry = (*entry).max(transfer.level);
        }
    }
    for (key, balance) in tables.token_balances.iter_mut() {
        if balance.last_level == level {
            balance.last_level = last_activity
                .get(key)
                .copied()
                .unwrap_or(balance.first_level);
        }
    }
    Ok(())
}
