//! Loading and unloading of materialized future cycles.
//!
//! A `FutureCycle` arrives fully built from the snapshot engine; this
//! module generates its rights, prices the per-baker expectations and
//! installs everything into the cache. Unload is the exact inverse and
//! runs only from the revert of the cycle-begin block that loaded it.

use crate::cache::Cache;
use crate::entity::{Protocol, RightKind};
use crate::error::{Error, Result};
use crate::pipeline::context::ProtoFlags;
use crate::rewards::{expected_attestation_rewards, expected_block_rewards};
use crate::sampler::generate_rights;
use crate::snapshot::FutureCycle;
use crate::store::WriteOp;

/// Install a materialized cycle: rights, cycle row, per-baker and
/// per-delegator aggregates.
pub fn load_future_cycle(
    cache: &mut Cache,
    proto: &Protocol,
    flags: &ProtoFlags,
    fc: FutureCycle,
) -> Result<()> {
    let index = fc.cycle.index;
    let rights = generate_rights(&fc.cycle, &fc.sampler, &proto.constants);
    cache.rights.add_cycle(rights);
    cache.journal.push(WriteOp::BulkInsertRights { cycle: index });

    let mut baker_cycles = fc.baker_cycles;
    // price the expectations from the rights tagged with this cycle;
    // every tagged baker comes from this cycle's snapshot
    for bc in baker_cycles.iter_mut() {
        let mut future_blocks = 0;
        let mut future_slots = 0;
        for right in cache.rights.iter_cycle(index) {
            if right.baker != bc.baker {
                continue;
            }
            match right.kind {
                RightKind::Baking if right.round == Some(0) => future_blocks += 1,
                RightKind::Attestation => future_slots += right.slots.unwrap_or(0) as i32,
                _ => {}
            }
        }
        bc.future_blocks = future_blocks;
        bc.future_attestations = future_slots;
        bc.future_block_rewards =
            expected_block_rewards(&proto.constants, future_blocks, flags.max_reward_basis);
        bc.future_attestation_rewards =
            expected_attestation_rewards(&proto.constants, future_slots);
    }

    cache.journal.push(WriteOp::UpsertCycle(index));
    cache.cycles.insert(index, fc.cycle);
    for bc in baker_cycles {
        cache.journal.push(WriteOp::UpsertBakerCycle {
            cycle: index,
            baker: bc.baker,
        });
        cache.baker_cycles.insert((index, bc.baker), bc);
    }
    cache
        .journal
        .push(WriteOp::BulkInsertDelegatorCycles { cycle: index });
    for dc in fc.delegator_cycles {
        cache.delegator_cycles.insert((index, dc.delegator), dc);
    }
    Ok(())
}

/// Remove a future cycle on revert of the block that loaded it.
pub fn unload_cycle(cache: &mut Cache, index: i32) -> Result<()> {
    let cycle = cache
        .cycles
        .remove(&index)
        .ok_or_else(|| Error::inconsistent(format!("cycle {} not cached", index)))?;
    cache
        .rights
        .remove_cycle(cycle.first_level, cycle.last_level);
    cache.baker_cycles.retain(|(c, _), _| *c != index);
    cache.delegator_cycles.retain(|(c, _), _| *c != index);
    cache.journal.push(WriteOp::DeleteRights { cycle: index });
    cache.journal.push(WriteOp::DeleteBakerCycles { cycle: index });
    cache.journal.push(WriteOp::DeleteCycle(index));
    Ok(())
}
