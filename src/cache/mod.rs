//! Write-through, in-memory views of the relational projection.
//!
//! The cache is an explicitly constructed service handed into the
//! pipeline; there is no global state. All commits read and mutate
//! entities through it, and it journals the bulk-write instructions the
//! storage collaborator flushes per block.

pub mod accounts;
pub mod operations;
pub mod rights;
pub mod side_tables;
pub mod voting;

use std::collections::{BTreeMap, HashMap};

use crate::entity::{
    BakerCycle, Block, Cycle, DelegatorCycle, Protocol, SnapshotBalance, Statistics,
};
use crate::error::{Error, Result};
use crate::ids::{AccountId, IdSequence, ProtoCode};
use crate::store::{Journal, WriteOp};

pub use accounts::AccountCache;
pub use operations::OperationCache;
pub use rights::RightsCache;
pub use side_tables::SideTables;
pub use voting::VotingCache;

pub struct Cache {
    pub accounts: AccountCache,
    pub operations: OperationCache,
    pub rights: RightsCache,
    pub voting: VotingCache,
    pub side_tables: SideTables,

    pub blocks: BTreeMap<i32, Block>,
    pub cycles: BTreeMap<i32, Cycle>,
    pub protocols: BTreeMap<ProtoCode, Protocol>,
    pub statistics: BTreeMap<i32, Statistics>,

    pub baker_cycles: HashMap<(i32, AccountId), BakerCycle>,
    pub delegator_cycles: HashMap<(i32, AccountId), DelegatorCycle>,
    /// Raw balance measurements by snapshot level.
    pub snapshot_balances: BTreeMap<i32, Vec<SnapshotBalance>>,

    pub op_ids: IdSequence,
    pub journal: Journal,
}

impl Cache {
    pub fn new() -> Self {
        Cache {
            accounts: AccountCache::new(),
            operations: OperationCache::new(),
            rights: RightsCache::new(),
            voting: VotingCache::new(),
            side_tables: SideTables::new(),
            blocks: BTreeMap::new(),
            cycles: BTreeMap::new(),
            protocols: BTreeMap::new(),
            statistics: BTreeMap::new(),
            baker_cycles: HashMap::new(),
            delegator_cycles: HashMap::new(),
            snapshot_balances: BTreeMap::new(),
            op_ids: IdSequence::starting_at(0),
            journal: Journal::new(),
        }
    }

    /// Current head, if any block has been committed yet.
    pub fn head(&self) -> Option<&Block> {
        self.blocks.values().next_back()
    }

    pub fn head_level(&self) -> i32 {
        self.head().map(|b| b.level).unwrap_or(-1)
    }

    pub fn block(&self, level: i32) -> Result<&Block> {
        self.blocks
            .get(&level)
            .ok_or_else(|| Error::inconsistent(format!("block {} not cached", level)))
    }

    /// The protocol active at the current head.
    pub fn current_protocol(&self) -> Result<&Protocol> {
        self.protocols
            .values()
            .next_back()
            .ok_or_else(|| Error::inconsistent("no protocol cached"))
    }

    pub fn protocol(&self, code: ProtoCode) -> Result<&Protocol> {
        self.protocols
            .get(&code)
            .ok_or_else(|| Error::inconsistent(format!("protocol {} not cached", code)))
    }

    pub fn cycle(&self, index: i32) -> Result<&Cycle> {
        self.cycles
            .get(&index)
            .ok_or_else(|| Error::inconsistent(format!("cycle {} not cached", index)))
    }

    pub fn cycle_mut(&mut self, index: i32) -> Result<&mut Cycle> {
        self.journal.push(WriteOp::UpsertCycle(index));
        self.cycles
            .get_mut(&index)
            .ok_or_else(|| Error::inconsistent(format!("cycle {} not cached", index)))
    }

    /// Fetch-or-create the per-(cycle, baker) aggregate and journal its
    /// upsert.
    pub fn baker_cycle_mut(&mut self, cycle: i32, baker: AccountId) -> &mut BakerCycle {
        self.journal.push(WriteOp::UpsertBakerCycle { cycle, baker });
        self.baker_cycles
            .entry((cycle, baker))
            .or_insert_with(|| BakerCycle::new(cycle, baker))
    }

    pub fn baker_cycle(&self, cycle: i32, baker: AccountId) -> Result<&BakerCycle> {
        self.baker_cycles.get(&(cycle, baker)).ok_or_else(|| {
            Error::inconsistent(format!("baker cycle ({}, {}) not cached", cycle, baker))
        })
    }

    pub fn statistics_at(&self, level: i32) -> Result<&Statistics> {
        self.statistics
            .get(&level)
            .ok_or_else(|| Error::inconsistent(format!("statistics for level {} not cached", level)))
    }

    /// Latest statistics row (the running totals the next block builds on).
    pub fn current_statistics(&self) -> Statistics {
        self.statistics
            .values()
            .next_back()
            .cloned()
            .unwrap_or_else(Statistics::zero)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Cache::new()
    }
}
