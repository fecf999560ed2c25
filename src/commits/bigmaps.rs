//! Big map diff aggregation.
//!
//! Diffs queue up while the operation groups run and are applied once,
//! after the manager group, in queue order. Every mutation appends an
//! update row carrying the prior state, which is all the revert needs.

use crate::entity::{BigMapAction, BigMapKey, BigMapUpdate};
use crate::error::{Error, Result};
use crate::pipeline::context::{BlockContext, QueuedBigMapDiff, RevertContext};
use crate::store::WriteOp;

pub fn apply(ctx: &mut BlockContext) -> Result<()> {
    let queued = std::mem::take(&mut ctx.bigmap_diffs);
    for item in queued {
        apply_diff(ctx, item)?;
    }
    Ok(())
}

fn apply_diff(ctx: &mut BlockContext, item: QueuedBigMapDiff) -> Result<()> {
    let level = ctx.level();
    let tables = &mut ctx.cache.side_tables;
    let diff = item.diff;

    match diff.action.as_str() {
        "alloc" => {
            let id = tables.allocate_bigmap(diff.big_map, item.contract, diff.path.clone(), level);
            let update_id = tables.next_bigmap_update_id();
            tables.bigmap_updates.push(BigMapUpdate {
                id: update_id,
                bigmap: id,
                level,
                op: item.op,
                action: BigMapAction::Allocate,
                key_hash: None,
                value: None,
                prev_value: None,
                prev_active: false,
            });
            ctx.cache.journal.push(WriteOp::UpsertBigMap(id));
        }
        "update" => {
            let id = tables.bigmap_by_ptr(diff.big_map)?;
            let key_hash = diff
                .key_hash
                .clone()
                .ok_or(Error::MissingField("big_map_diff.key_hash"))?;
            let (action, prev_value, prev_active) = match diff.value.clone() {
                Some(value) => {
                    match tables.bigmap_keys.get_mut(&(id, key_hash.clone())) {
                        Some(key) => {
                            let prev = (Some(key.value.clone()), key.active);
                            let was_inactive = !key.active;
                            key.value = value;
                            key.active = true;
                            key.updates += 1;
                            key.last_level = level;
                            let map = tables.bigmap_mut(id)?;
                            map.updates += 1;
                            if was_inactive {
                                map.active_keys += 1;
                            }
                            (BigMapAction::UpdateKey, prev.0, prev.1)
                        }
                        None => {
                            tables.bigmap_keys.insert(
                                (id, key_hash.clone()),
                                BigMapKey {
                                    bigmap: id,
                                    key_hash: key_hash.clone(),
                                    key: diff.key.clone().unwrap_or_default(),
                                    value,
                                    active: true,
                                    first_level: level,
                                    last_level: level,
                                    updates: 1,
                                },
                            );
                            let map = tables.bigmap_mut(id)?;
                            map.total_keys += 1;
                            map.active_keys += 1;
                            map.updates += 1;
                            (BigMapAction::AddKey, None, false)
                        }
                    }
                }
                None => {
                    let key = tables
                        .bigmap_keys
                        .get_mut(&(id, key_hash.clone()))
                        .ok_or_else(|| {
                            Error::inconsistent(format!("removal of unknown big map key {}", key_hash))
                        })?;
                    let prev = (Some(key.value.clone()), key.active);
                    key.active = false;
                    key.updates += 1;
                    key.last_level = level;
                    let map = tables.bigmap_mut(id)?;
                    map.active_keys -= 1;
                    map.updates += 1;
                    (BigMapAction::RemoveKey, prev.0, prev.1)
                }
            };
            let update_id = tables.next_bigmap_update_id();
            tables.bigmap_updates.push(BigMapUpdate {
                id: update_id,
                bigmap: id,
                level,
                op: item.op,
                action,
                key_hash: Some(key_hash.clone()),
                value: diff.value.clone(),
                prev_value,
                prev_active,
            });
            ctx.cache.journal.push(WriteOp::UpsertBigMapKey {
                bigmap: id,
                key_hash,
            });
            ctx.cache.journal.push(WriteOp::UpsertBigMap(id));
        }
        "remove" => {
            let id = tables.bigmap_by_ptr(diff.big_map)?;
            let map = tables.bigmap_mut(id)?;
            map.active = false;
            map.last_level = level;
            let update_id = tables.next_bigmap_update_id();
            tables.bigmap_updates.push(BigMapUpdate {
                id: update_id,
                bigmap: id,
                level,
                op: item.op,
                action: BigMapAction::Remove,
                key_hash: None,
                value: None,
                prev_value: None,
                prev_active: true,
            });
            ctx.cache.journal.push(WriteOp::UpsertBigMap(id));
        }
        other => {
            return Err(Error::inconsistent(format!(
                "unknown big map diff action `{}`",
                other
            )))
        }
    }
    Ok(())
}

/// Undo all big map mutations of the reverted level, newest first.
pub fn revert(rctx: &mut RevertContext) -> Result<()> {
    let level = rctx.level();
    let tables = &mut rctx.cache.side_tables;
    let mut released = 0u64;

    while let Some(last) = tables.bigmap_updates.last() {
        if last.level != level {
            break;
        }
        let update = tables.bigmap_updates.pop().expect("checked non-empty");
        released += 1;
        match update.action {
            BigMapAction::Allocate => tables.rollback_bigmap(update.bigmap)?,
            BigMapAction::AddKey => {
                let key_hash = update.key_hash.expect("add always carries a key hash");
                tables.bigmap_keys.remove(&(update.bigmap, key_hash));
                let map = tables.bigmap_mut(update.bigmap)?;
                map.total_keys -= 1;
                map.active_keys -= 1;
                map.updates -= 1;
            }
            BigMapAction::UpdateKey => {
                let key_hash = update.key_hash.expect("update always carries a key hash");
                let key = tables
                    .bigmap_keys
                    .get_mut(&(update.bigmap, key_hash))
                    .ok_or_else(|| Error::inconsistent("reverting update of unknown key"))?;
                key.value = update.prev_value.unwrap_or_default();
                key.active = update.prev_active;
                key.updates -= 1;
                let map = tables.bigmap_mut(update.bigmap)?;
                map.updates -= 1;
                if !update.prev_active {
                    map.active_keys -= 1;
                }
            }
            BigMapAction::RemoveKey => {
                let key_hash = update.key_hash.expect("removal always carries a key hash");
                let key = tables
                    .bigmap_keys
                    .get_mut(&(update.bigmap, key_hash))
                    .ok_or_else(|| Error::inconsistent("reverting removal of unknown key"))?;
                key.active = true;
                key.updates -= 1;
                let map = tables.bigmap_mut(update.bigmap)?;
                map.active_keys += 1;
                map.updates -= 1;
            }
            BigMapAction::Remove => {
                let map = tables.bigmap_mut(update.bigmap)?;
                map.active = true;
            }
        }
    }
    tables.release_bigmap_updates(released);
    Ok(())
}
