use std::collections::HashMap;

use crate::address::Address;
use crate::entity::{Account, AccountKind};
use crate::error::{Error, Result};
use crate::ids::{AccountId, IdSequence};

/// Accounts by id, with an address index.
///
/// Account ids are allocated here and only ever released by the revert
/// of the commit that created the account.
pub struct AccountCache {
    rows: HashMap<AccountId, Account>,
    by_address: HashMap<Address, AccountId>,
    ids: IdSequence,
}

impl AccountCache {
    pub fn new() -> Self {
        AccountCache {
            rows: HashMap::new(),
            by_address: HashMap::new(),
            ids: IdSequence::starting_at(0),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, id: AccountId) -> Result<&Account> {
        self.rows
            .get(&id)
            .ok_or_else(|| Error::inconsistent(format!("account {} not cached", id)))
    }

    pub fn get_mut(&mut self, id: AccountId) -> Result<&mut Account> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| Error::inconsistent(format!("account {} not cached", id)))
    }

    pub fn find(&self, address: &Address) -> Option<&Account> {
        self.by_address.get(address).and_then(|id| self.rows.get(id))
    }

    pub fn id_of(&self, address: &Address) -> Result<AccountId> {
        self.by_address
            .get(address)
            .copied()
            .ok_or_else(|| Error::inconsistent(format!("account {} not cached", address)))
    }

    /// Look up an account by address, creating it if unseen.
    ///
    /// Returns the id and whether the row was created (the caller
    /// records the allocation on the operation row so its revert can
    /// remove the account again).
    pub fn get_or_create(&mut self, address: &Address, level: i32) -> (AccountId, bool) {
        if let Some(id) = self.by_address.get(address) {
            return (*id, false);
        }
        let kind = if address.is_contract() {
            AccountKind::Contract
        } else if address.is_smart_rollup() {
            AccountKind::SmartRollup
        } else if address.is_rollup() {
            AccountKind::Rollup
        } else {
            AccountKind::User
        };
        (self.create(address.clone(), kind, level), true)
    }

    /// Like `get_or_create`, but a fresh row is created as `Ghost`: the
    /// address has only been seen as a token or ticket holder, never
    /// on-chain itself.
    pub fn get_or_create_ghost(&mut self, address: &Address, level: i32) -> (AccountId, bool) {
        if let Some(id) = self.by_address.get(address) {
            return (*id, false);
        }
        (self.create(address.clone(), AccountKind::Ghost, level), true)
    }

    pub fn create(&mut self, address: Address, kind: AccountKind, level: i32) -> AccountId {
        let id = AccountId(self.ids.next() as u32);
        self.by_address.insert(address.clone(), id);
        self.rows.insert(id, Account::new(id, address, kind, level));
        id
    }

    /// Remove an account created by the operation being reverted and
    /// release its id. Only legal for the most recently created account,
    /// which is what a strictly ordered revert guarantees.
    pub fn rollback_creation(&mut self, id: AccountId) -> Result<()> {
        let account = self
            .rows
            .remove(&id)
            .ok_or_else(|| Error::inconsistent(format!("account {} not cached", id)))?;
        if id.0 as u64 + 1 != self.ids.peek() {
            return Err(Error::inconsistent(format!(
                "account {} is not the latest allocation, cannot release",
                id
            )));
        }
        self.by_address.remove(&account.address);
        self.ids.release(1);
        Ok(())
    }

    pub fn next_id(&self) -> u64 {
        self.ids.peek()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.rows.values()
    }

    /// Active delegates, the input of the snapshot engine.
    pub fn delegates(&self) -> impl Iterator<Item = &Account> {
        self.rows
            .values()
            .filter(|a| a.kind == AccountKind::Delegate)
    }
}

impl Default for AccountCache {
    fn default() -> Self {
        AccountCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_resolve() {
        let mut cache = AccountCache::new();
        let addr = Address::new("tz1abc");
        let (id, created) = cache.get_or_create(&addr, 5);
        assert!(created);
        let (id2, created2) = cache.get_or_create(&addr, 6);
        assert_eq!(id, id2);
        assert!(!created2);
        assert_eq!(cache.get(id).unwrap().first_level, 5);
    }

    #[test]
    fn kind_inferred_from_prefix() {
        let mut cache = AccountCache::new();
        let (kt, _) = cache.get_or_create(&Address::new("KT1contract"), 1);
        let (sr, _) = cache.get_or_create(&Address::new("sr1rollup"), 1);
        assert_eq!(cache.get(kt).unwrap().kind, AccountKind::Contract);
        assert_eq!(cache.get(sr).unwrap().kind, AccountKind::SmartRollup);
    }

    #[test]
    fn rollback_releases_the_id() {
        let mut cache = AccountCache::new();
        let (id, _) = cache.get_or_create(&Address::new("tz1abc"), 1);
        cache.rollback_creation(id).unwrap();
        let (id2, _) = cache.get_or_create(&Address::new("tz1def"), 1);
        assert_eq!(id, id2);
    }

    #[test]
    fn rollback_out_of_order_is_inconsistent() {
        let mut cache = AccountCache::new();
        let (first, _) = cache.get_or_create(&Address::new("tz1abc"), 1);
        let _ = cache.get_or_create(&Address::new("tz1def"), 1);
        assert!(cache.rollback_creation(first).is_err());
    }
}
