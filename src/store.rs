//! Bulk-write instructions staged for the storage collaborator.
//!
//! The engine never talks to a database itself: every commit mutates
//! cached entities and stages a `WriteOp` naming the touched row. The
//! whole batch for a block is drained at `after_commit` (or after a
//! revert) and handed to the collaborator, which reads the row content
//! back from the cache. One block is the unit of atomicity.

use crate::ids::{AccountId, BigMapId, OpId, ProtoCode, TicketId, TokenId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Row-level upsert of a stateful table.
    UpsertAccount(AccountId),
    UpsertProtocol(ProtoCode),
    UpsertCycle(i32),
    UpsertBakerCycle { cycle: i32, baker: AccountId },
    UpsertStatistics { level: i32 },
    UpsertVotingPeriod { index: i32 },
    UpsertProposal { epoch: i32, hash: String },
    UpsertBigMap(BigMapId),
    UpsertBigMapKey { bigmap: BigMapId, key_hash: String },
    UpsertTicketBalance { ticket: TicketId, account: AccountId },
    UpsertTokenBalance { token: TokenId, account: AccountId },

    InsertBlock { level: i32 },
    InsertOperation(OpId),

    /// Bulk inserts for high-volume tables.
    BulkInsertRights { cycle: i32 },
    BulkInsertSnapshotBalances { level: i32 },
    BulkInsertDelegatorCycles { cycle: i32 },

    UpdateRight { level: i32, baker: AccountId },

    /// Deletions staged by reverts.
    DeleteBlock { level: i32 },
    DeleteOperation(OpId),
    DeleteAccount(AccountId),
    DeleteCycle(i32),
    DeleteRights { cycle: i32 },
    DeleteSnapshotBalances { level: i32 },
    DeleteBakerCycles { cycle: i32 },
    DeleteStatistics { level: i32 },
    DeleteVotingPeriod { index: i32 },
    DeleteProtocol(ProtoCode),
}

/// Per-block journal of staged writes.
#[derive(Debug, Default)]
pub struct Journal {
    staged: Vec<WriteOp>,
}

impl Journal {
    pub fn new() -> Self {
        Journal { staged: Vec::new() }
    }

    pub fn push(&mut self, op: WriteOp) {
        self.staged.push(op);
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Drain the staged batch for flushing. Called once per block from
    /// `after_commit`, and once per reverted block.
    pub fn drain(&mut self) -> Vec<WriteOp> {
        std::mem::take(&mut self.staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_journal() {
        let mut journal = Journal::new();
        journal.push(WriteOp::InsertBlock { level: 1 });
        journal.push(WriteOp::UpsertAccount(AccountId(3)));
        let batch = journal.drain();
        assert_eq!(batch.len(), 2);
        assert!(journal.is_empty());
    }
}
