use crate::value::Mutez;

/// Running supply totals, snapshotted per block before any commit of
/// that block runs. The balance-conservation check is phrased against
/// these: the sum of account deltas in a block equals
/// `minted - burned` for that block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub level: i32,
    pub total_minted: Mutez,
    pub total_burned: Mutez,
    pub total_activated: Mutez,
    pub total_frozen: Mutez,
}

impl Statistics {
    pub fn zero() -> Self {
        Statistics {
            level: 0,
            total_minted: Mutez::zero(),
            total_burned: Mutez::zero(),
            total_activated: Mutez::zero(),
            total_frozen: Mutez::zero(),
        }
    }

    pub fn at_level(&self, level: i32) -> Self {
        let mut next = self.clone();
        next.level = level;
        next
    }
}
