use std::collections::{BTreeMap, HashMap};

use crate::entity::Operation;
use crate::error::{Error, Result};
use crate::ids::OpId;

/// Operation rows with a per-level index.
///
/// The per-level index is what drives reverts: the rows of the head
/// level are replayed in reverse insertion order against their commits'
/// `revert`.
pub struct OperationCache {
    rows: HashMap<OpId, Operation>,
    by_level: BTreeMap<i32, Vec<OpId>>,
}

impl OperationCache {
    pub fn new() -> Self {
        OperationCache {
            rows: HashMap::new(),
            by_level: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, op: Operation) {
        self.by_level.entry(op.level).or_default().push(op.id);
        self.rows.insert(op.id, op);
    }

    pub fn get(&self, id: OpId) -> Result<&Operation> {
        self.rows
            .get(&id)
            .ok_or_else(|| Error::inconsistent(format!("operation {} not cached", id)))
    }

    pub fn get_mut(&mut self, id: OpId) -> Result<&mut Operation> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| Error::inconsistent(format!("operation {} not cached", id)))
    }

    /// Ids of a level in insertion order.
    pub fn at_level(&self, level: i32) -> &[OpId] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove a single reverted row.
    pub fn remove(&mut self, id: OpId) -> Result<Operation> {
        let op = self
            .rows
            .remove(&id)
            .ok_or_else(|| Error::inconsistent(format!("operation {} not cached", id)))?;
        if let Some(ids) = self.by_level.get_mut(&op.level) {
            ids.retain(|i| *i != id);
            if ids.is_empty() {
                self.by_level.remove(&op.level);
            }
        }
        Ok(op)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for OperationCache {
    fn default() -> Self {
        OperationCache::new()
    }
}
