//! Cycle bookkeeping: balance snapshots and future-cycle creation.
//!
//! On every snapshot block the engine records the stake/delegation
//! figures of all delegates and their delegators. When a cycle begins,
//! the cycle `preserved_cycles` ahead is materialized from one of those
//! historical measurements, never from live balances, so a baker
//! cannot influence its own selection odds with late stake movements.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::cache::Cache;
use crate::entity::{AccountKind, BakerCycle, Cycle, DelegatorCycle, Protocol, SnapshotBalance};
use crate::error::{Error, Result};
use crate::sampler::{evolve_seed, Sampler, SamplerBaker};
use crate::store::WriteOp;

/// Record the stake measurement rows for `level`.
///
/// One row per delegate (pointing at itself, carrying the aggregate
/// staking figures) and one per delegating account (pointing at its
/// delegate). Runs in `after_commit` of snapshot blocks.
pub fn take_balance_snapshot(cache: &mut Cache, level: i32) {
    let mut rows = Vec::new();
    for account in cache.accounts.iter() {
        match account.kind {
            AccountKind::Delegate => rows.push(SnapshotBalance {
                level,
                account: account.id,
                delegate: Some(account.id),
                balance: account.balance,
                staking_balance: account.staking_balance,
                delegators_count: account.delegators_count,
            }),
            _ => {
                if let Some(delegate) = account.delegate {
                    rows.push(SnapshotBalance {
                        level,
                        account: account.id,
                        delegate: Some(delegate),
                        balance: account.balance,
                        staking_balance: crate::value::Mutez::zero(),
                        delegators_count: 0,
                    });
                }
            }
        }
    }
    cache.snapshot_balances.insert(level, rows);
    cache
        .journal
        .push(WriteOp::BulkInsertSnapshotBalances { level });
}

/// Remove the measurement rows of a reverted snapshot block.
pub fn drop_balance_snapshot(cache: &mut Cache, level: i32) {
    if cache.snapshot_balances.remove(&level).is_some() {
        cache.journal.push(WriteOp::DeleteSnapshotBalances { level });
    }
}

/// A future cycle fully materialized from a snapshot, ready to be
/// loaded into the cache (rights are generated separately from the
/// returned sampler).
pub struct FutureCycle {
    pub cycle: Cycle,
    pub baker_cycles: Vec<BakerCycle>,
    pub delegator_cycles: Vec<DelegatorCycle>,
    pub sampler: Sampler,
}

/// Pick the snapshot point within `source_cycle` from the future
/// cycle's seed.
fn select_snapshot_level(proto: &Protocol, source_cycle: i32, seed: &[u8; 32]) -> i32 {
    let mut rng = ChaCha20Rng::from_seed(*seed);
    let index = rng.gen_range(0..proto.constants.snapshots_per_cycle);
    let stride = proto.constants.blocks_per_cycle / proto.constants.snapshots_per_cycle;
    proto.first_level_of_cycle(source_cycle) + index * stride
}

/// Materialize the cycle `preserved_cycles` ahead of `begun_cycle`,
/// sampling the snapshot from the cycle that just ended.
pub fn create_future_cycle(cache: &Cache, proto: &Protocol, begun_cycle: i32) -> Result<FutureCycle> {
    let future_index = begun_cycle + proto.constants.preserved_cycles;
    let parent = cache.cycle(future_index - 1)?;
    let seed = evolve_seed(&parent.seed, future_index);

    let source_cycle = begun_cycle - 1;
    let snapshot_level = select_snapshot_level(proto, source_cycle, &seed);
    let rows = cache.snapshot_balances.get(&snapshot_level).ok_or_else(|| {
        Error::inconsistent(format!(
            "no balance snapshot at level {} for cycle {}",
            snapshot_level, future_index
        ))
    })?;

    build_cycle(cache, proto, future_index, Some(snapshot_level), seed, rows)
}

/// Shared materialization used both by the live path and by genesis
/// bootstrap (which passes the genesis distribution as `rows`).
pub fn build_cycle(
    cache: &Cache,
    proto: &Protocol,
    index: i32,
    snapshot_level: Option<i32>,
    seed: [u8; 32],
    rows: &[SnapshotBalance],
) -> Result<FutureCycle> {
    let mut bakers = Vec::new();
    let mut baker_cycles = Vec::new();
    let mut delegator_cycles = Vec::new();
    let mut total_power = crate::value::Mutez::zero();

    for row in rows {
        if row.delegate == Some(row.account) {
            let account = cache.accounts.get(row.account)?;
            bakers.push(SamplerBaker {
                id: row.account,
                address: account.address.clone(),
                stake: row.staking_balance.0,
            });
            let mut bc = BakerCycle::new(index, row.account);
            bc.own_balance = row.balance;
            bc.delegated_balance = row.staking_balance.saturating_sub(row.balance);
            bc.delegators_count = row.delegators_count;
            bc.baking_power = row.staking_balance;
            total_power = (total_power + row.staking_balance)?;
            baker_cycles.push(bc);
        } else if let Some(delegate) = row.delegate {
            delegator_cycles.push(DelegatorCycle {
                cycle: index,
                delegator: row.account,
                baker: delegate,
                balance: row.balance,
            });
        }
    }

    let total_bakers = baker_cycles.len() as i32;
    let cycle = Cycle {
        index,
        first_level: proto.first_level_of_cycle(index),
        last_level: proto.last_level_of_cycle(index),
        snapshot_level,
        total_baking_power: total_power,
        total_bakers,
        seed,
    };

    Ok(FutureCycle {
        cycle,
        baker_cycles,
        delegator_cycles,
        sampler: Sampler::new(bakers),
    })
}

/// The genesis distribution expressed as snapshot rows, used to
/// bootstrap the first `preserved_cycles + 1` cycles.
pub fn genesis_distribution(cache: &Cache) -> Vec<SnapshotBalance> {
    let mut rows = Vec::new();
    for account in cache.accounts.iter() {
        if account.kind == AccountKind::Delegate {
            rows.push(SnapshotBalance {
                level: 1,
                account: account.id,
                delegate: Some(account.id),
                balance: account.balance,
                staking_balance: account.staking_balance,
                delegators_count: account.delegators_count,
            });
        } else if let Some(delegate) = account.delegate {
            rows.push(SnapshotBalance {
                level: 1,
                account: account.id,
                delegate: Some(delegate),
                balance: account.balance,
                staking_balance: crate::value::Mutez::zero(),
                delegators_count: 0,
            });
        }
    }
    rows
}
