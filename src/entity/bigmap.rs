use crate::ids::{AccountId, BigMapId, OpId};

/// Action carried by a single big map diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BigMapAction {
    Allocate,
    AddKey,
    UpdateKey,
    RemoveKey,
    Remove,
}

/// A big map owned by a contract. Soft-deleted on `Remove` via the
/// `active` flag so the revert path can resurrect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigMap {
    pub id: BigMapId,
    /// On-chain pointer assigned by the node.
    pub ptr: i64,
    pub contract: AccountId,
    /// Storage path of the big map within the contract.
    pub path: String,
    pub active: bool,
    pub first_level: i32,
    pub last_level: i32,
    pub total_keys: i32,
    pub active_keys: i32,
    pub updates: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigMapKey {
    pub bigmap: BigMapId,
    pub key_hash: String,
    pub key: String,
    pub value: String,
    pub active: bool,
    pub first_level: i32,
    pub last_level: i32,
    pub updates: i32,
}

/// Append-only log of big map mutations; each row records the previous
/// value so its effect can be undone exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigMapUpdate {
    pub id: u64,
    pub bigmap: BigMapId,
    pub level: i32,
    pub op: OpId,
    pub action: BigMapAction,
    pub key_hash: Option<String>,
    pub value: Option<String>,
    /// State before this update, for revert: previous value of the key
    /// (`None` when the key did not exist) and whether it was active.
    pub prev_value: Option<String>,
    pub prev_active: bool,
}
