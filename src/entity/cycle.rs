use crate::value::Mutez;

/// One row per baking cycle.
///
/// Created `preserved_cycles` ahead of becoming active, from a snapshot
/// taken earlier; its totals are derived from that snapshot, never from
/// live balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub index: i32,
    pub first_level: i32,
    pub last_level: i32,
    /// Historical level the stake snapshot was taken at. Bootstrap
    /// cycles have none: they sample the genesis distribution.
    pub snapshot_level: Option<i32>,
    pub total_baking_power: Mutez,
    pub total_bakers: i32,
    /// Seed driving the rights sampler for this cycle.
    pub seed: [u8; 32],
}

impl Cycle {
    pub fn contains(&self, level: i32) -> bool {
        level >= self.first_level && level <= self.last_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_containment() {
        let cycle = Cycle {
            index: 2,
            first_level: 257,
            last_level: 384,
            snapshot_level: Some(100),
            total_baking_power: Mutez(1000),
            total_bakers: 3,
            seed: [0; 32],
        };
        assert!(cycle.contains(257));
        assert!(cycle.contains(384));
        assert!(!cycle.contains(385));
    }
}
