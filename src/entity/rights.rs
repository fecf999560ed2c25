use crate::ids::AccountId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RightKind {
    Baking,
    Attestation,
    Dal,
}

/// Lifecycle of a right: pre-generated as `Future`, transitions exactly
/// once to a terminal status when its level is actually processed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RightStatus {
    Future,
    Realized,
    Missed,
    /// The baker's frozen deposit did not cover the stake backing this
    /// right at the time the level was processed.
    Uncovered,
}

/// Pre-generated assignment of who may bake or attest a level.
///
/// Attestation rights for the last level of a cycle are computed against
/// the *next* cycle's snapshot and stored shifted to `level + 1` tagged
/// with the next cycle; consumers iterating rights at cycle edges must
/// account for the one-level lag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakingRight {
    pub cycle: i32,
    pub level: i32,
    pub baker: AccountId,
    pub kind: RightKind,
    pub status: RightStatus,
    /// Baking rights: priority round (0 is the primary proposer).
    pub round: Option<u32>,
    /// Attestation rights: number of committee slots held.
    pub slots: Option<u32>,
}

impl BakingRight {
    pub fn baking(cycle: i32, level: i32, baker: AccountId, round: u32) -> Self {
        BakingRight {
            cycle,
            level,
            baker,
            kind: RightKind::Baking,
            status: RightStatus::Future,
            round: Some(round),
            slots: None,
        }
    }

    pub fn attestation(cycle: i32, level: i32, baker: AccountId, slots: u32) -> Self {
        BakingRight {
            cycle,
            level,
            baker,
            kind: RightKind::Attestation,
            status: RightStatus::Future,
            round: None,
            slots: Some(slots),
        }
    }
}
