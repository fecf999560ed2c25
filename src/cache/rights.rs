use std::collections::BTreeMap;

use crate::entity::{BakingRight, RightKind, RightStatus};
use crate::error::{Error, Result};
use crate::ids::AccountId;

/// Pre-generated rights for the cycle window around the head, indexed
/// by level.
pub struct RightsCache {
    by_level: BTreeMap<i32, Vec<BakingRight>>,
}

impl RightsCache {
    pub fn new() -> Self {
        RightsCache {
            by_level: BTreeMap::new(),
        }
    }

    /// Bulk-load a freshly sampled cycle of rights.
    pub fn add_cycle(&mut self, rights: Vec<BakingRight>) {
        for right in rights {
            self.by_level.entry(right.level).or_default().push(right);
        }
    }

    pub fn at_level(&self, level: i32) -> &[BakingRight] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transition one `Future` right of (level, baker, kind) to a
    /// terminal status, returning the slot/round payload of the right.
    /// `round` narrows the match for baking rights, where one baker can
    /// hold several priorities at a level.
    ///
    /// A right that is not in `Future` state indicates the level was
    /// processed twice, which is a bug.
    pub fn realize(
        &mut self,
        level: i32,
        baker: AccountId,
        kind: RightKind,
        round: Option<u32>,
        status: RightStatus,
    ) -> Result<&BakingRight> {
        let rights = self
            .by_level
            .get_mut(&level)
            .ok_or_else(|| Error::inconsistent(format!("no rights cached for level {}", level)))?;
        let right = rights
            .iter_mut()
            .find(|r| r.baker == baker && r.kind == kind && (round.is_none() || r.round == round))
            .ok_or_else(|| {
                Error::inconsistent(format!(
                    "no {:?} right for baker {} at level {}",
                    kind, baker, level
                ))
            })?;
        if right.status != RightStatus::Future {
            return Err(Error::inconsistent(format!(
                "right for baker {} at level {} already {:?}",
                baker, level, right.status
            )));
        }
        right.status = status;
        Ok(right)
    }

    /// Undo a status transition during revert.
    pub fn unrealize(
        &mut self,
        level: i32,
        baker: AccountId,
        kind: RightKind,
        round: Option<u32>,
    ) -> Result<()> {
        let rights = self
            .by_level
            .get_mut(&level)
            .ok_or_else(|| Error::inconsistent(format!("no rights cached for level {}", level)))?;
        let right = rights
            .iter_mut()
            .find(|r| r.baker == baker && r.kind == kind && (round.is_none() || r.round == round))
            .ok_or_else(|| {
                Error::inconsistent(format!(
                    "no {:?} right for baker {} at level {}",
                    kind, baker, level
                ))
            })?;
        if right.status == RightStatus::Future {
            return Err(Error::inconsistent(format!(
                "right for baker {} at level {} was never realized",
                baker, level
            )));
        }
        right.status = RightStatus::Future;
        Ok(())
    }

    /// Drop the rights of one cycle (revert of cycle creation). Every
    /// right of a cycle lives inside the cycle's own level window, so
    /// deleting the window and deleting by cycle tag are the same
    /// operation.
    pub fn remove_cycle(&mut self, first_level: i32, last_level: i32) {
        self.by_level
            .retain(|level, _| *level < first_level || *level > last_level);
    }

    pub fn iter_cycle(&self, cycle: i32) -> impl Iterator<Item = &BakingRight> {
        self.by_level
            .values()
            .flatten()
            .filter(move |r| r.cycle == cycle)
    }
}

impl Default for RightsCache {
    fn default() -> Self {
        RightsCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realize_is_single_shot() {
        let mut cache = RightsCache::new();
        cache.add_cycle(vec![BakingRight::baking(0, 5, AccountId(1), 0)]);
        cache
            .realize(5, AccountId(1), RightKind::Baking, Some(0), RightStatus::Realized)
            .unwrap();
        let err = cache
            .realize(5, AccountId(1), RightKind::Baking, Some(0), RightStatus::Realized)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unrealize_restores_future() {
        let mut cache = RightsCache::new();
        cache.add_cycle(vec![BakingRight::attestation(0, 5, AccountId(1), 3)]);
        cache
            .realize(5, AccountId(1), RightKind::Attestation, None, RightStatus::Missed)
            .unwrap();
        cache
            .unrealize(5, AccountId(1), RightKind::Attestation, None)
            .unwrap();
        assert_eq!(cache.at_level(5)[0].status, RightStatus::Future);
    }

    #[test]
    fn remove_cycle_clears_exactly_the_window() {
        let mut cache = RightsCache::new();
        cache.add_cycle(vec![BakingRight::baking(0, 8, AccountId(1), 0)]);
        cache.add_cycle(vec![
            BakingRight::attestation(1, 9, AccountId(2), 4),
            BakingRight::baking(1, 9, AccountId(2), 0),
            BakingRight::baking(1, 16, AccountId(2), 0),
        ]);
        cache.remove_cycle(9, 16);
        assert!(cache.at_level(9).is_empty());
        assert!(cache.at_level(16).is_empty());
        assert_eq!(cache.at_level(8).len(), 1);
    }
}
