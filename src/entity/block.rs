use crate::ids::{AccountId, ProtoCode};
use crate::value::Mutez;

/// Bitmask of operation kinds present in a block, kept on the block row
/// so consumers can skip per-kind tables when scanning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct OperationsMask(pub u64);

impl OperationsMask {
    pub fn none() -> Self {
        OperationsMask(0)
    }

    pub fn set(&mut self, bit: u32) {
        self.0 |= 1 << bit;
    }

    pub fn contains(&self, bit: u32) -> bool {
        self.0 & (1 << bit) != 0
    }
}

/// Cycle/protocol boundary events attached to a block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BlockEvents(pub u32);

impl BlockEvents {
    pub const CYCLE_BEGIN: u32 = 1;
    pub const CYCLE_END: u32 = 1 << 1;
    pub const PROTOCOL_BEGIN: u32 = 1 << 2;
    pub const PROTOCOL_END: u32 = 1 << 3;
    pub const BALANCE_SNAPSHOT: u32 = 1 << 4;
    pub const VOTING_PERIOD_BEGIN: u32 = 1 << 5;
    pub const VOTING_PERIOD_END: u32 = 1 << 6;
    pub const DEACTIVATIONS: u32 = 1 << 7;

    pub fn none() -> Self {
        BlockEvents(0)
    }

    pub fn with(mut self, flag: u32) -> Self {
        self.0 |= flag;
        self
    }

    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// One row per indexed level. Created exactly once per level; removed
/// only by the revert of that exact level, which is always the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub level: i32,
    pub hash: String,
    pub cycle: i32,
    pub proto: ProtoCode,
    pub protocol_hash: String,
    pub timestamp: i64,

    /// Block producer (payload round winner). `None` only for genesis.
    pub baker: Option<AccountId>,
    /// Round-0 right holder; differs from the baker on re-proposals.
    pub proposer: Option<AccountId>,
    pub round: i32,

    pub operations: OperationsMask,
    pub events: BlockEvents,

    pub fees: Mutez,
    pub reward: Mutez,
    pub bonus: Mutez,
}

impl Block {
    pub fn genesis(hash: String, protocol_hash: String, timestamp: i64) -> Self {
        Block {
            level: 0,
            hash,
            cycle: 0,
            proto: ProtoCode(0),
            protocol_hash,
            timestamp,
            baker: None,
            proposer: None,
            round: 0,
            operations: OperationsMask::none(),
            events: BlockEvents::none().with(BlockEvents::PROTOCOL_BEGIN),
            fees: Mutez::zero(),
            reward: Mutez::zero(),
            bonus: Mutez::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_compose() {
        let ev = BlockEvents::none()
            .with(BlockEvents::CYCLE_BEGIN)
            .with(BlockEvents::BALANCE_SNAPSHOT);
        assert!(ev.contains(BlockEvents::CYCLE_BEGIN));
        assert!(ev.contains(BlockEvents::BALANCE_SNAPSHOT));
        assert!(!ev.contains(BlockEvents::PROTOCOL_END));
    }
}
