use crate::address::Address;
use crate::ids::AccountId;
use crate::value::Mutez;

/// What an account currently is.
///
/// The kind is a plain field: a self-delegation turns a `User` into a
/// `Delegate` by flipping this field, every row referencing the account
/// by id stays valid. `Ghost` accounts exist only as token/ticket
/// holders that have never appeared on-chain themselves.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccountKind {
    User,
    Delegate,
    Contract,
    Rollup,
    SmartRollup,
    Ghost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub address: Address,
    pub kind: AccountKind,

    /// Spendable balance. Invariant: never negative (enforced by `Mutez`).
    pub balance: Mutez,
    /// Security deposit frozen on delegates.
    pub frozen_deposit: Mutez,
    /// Manager counter of the last applied operation.
    pub counter: i64,
    pub revealed: bool,

    pub delegate: Option<AccountId>,
    pub delegation_level: Option<i32>,

    /// Delegate-only aggregate: own balance plus all delegated balances.
    pub staking_balance: Mutez,
    pub delegated_balance: Mutez,
    pub delegators_count: i32,

    /// Delegate-only: level of (re)registration as a delegate and the
    /// level at which the delegate gets (or got) deactivated.
    pub activation_level: Option<i32>,
    pub deactivation_level: Option<i32>,

    /// Delegate parameters set via `set_delegate_parameters`.
    pub staking_limit: i64,
    pub staking_edge: i64,

    /// Account that originated this contract/rollup, when any.
    pub creator: Option<AccountId>,

    pub first_level: i32,
    pub last_level: i32,
}

impl Account {
    pub fn new(id: AccountId, address: Address, kind: AccountKind, level: i32) -> Self {
        Account {
            id,
            address,
            kind,
            balance: Mutez::zero(),
            frozen_deposit: Mutez::zero(),
            counter: 0,
            revealed: false,
            delegate: None,
            delegation_level: None,
            staking_balance: Mutez::zero(),
            delegated_balance: Mutez::zero(),
            delegators_count: 0,
            activation_level: None,
            deactivation_level: None,
            staking_limit: 0,
            staking_edge: 0,
            creator: None,
            first_level: level,
            last_level: level,
        }
    }

    pub fn is_delegate(&self) -> bool {
        self.kind == AccountKind::Delegate
    }

    /// Stake that counts towards rights, as of the account's current state.
    pub fn staking_power(&self) -> Mutez {
        debug_assert!(self.is_delegate());
        self.staking_balance
    }

    /// An active delegate is one whose deactivation horizon has not been
    /// reached yet.
    pub fn is_active_delegate(&self, cycle: i32, blocks_per_cycle: i32) -> bool {
        match (self.kind, self.deactivation_level) {
            (AccountKind::Delegate, Some(deactivation)) => {
                (deactivation - 1) / blocks_per_cycle > cycle
            }
            (AccountKind::Delegate, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegate(deactivation: Option<i32>) -> Account {
        let mut acc = Account::new(
            AccountId(1),
            Address::new("tz1deleg"),
            AccountKind::Delegate,
            1,
        );
        acc.deactivation_level = deactivation;
        acc
    }

    #[test]
    fn delegate_activity_horizon() {
        // blocks_per_cycle = 100, deactivation at level 501 => active through cycle 4
        let acc = delegate(Some(501));
        assert!(acc.is_active_delegate(4, 100));
        assert!(!acc.is_active_delegate(5, 100));
    }

    #[test]
    fn user_is_never_an_active_delegate() {
        let acc = Account::new(AccountId(2), Address::new("tz1user"), AccountKind::User, 1);
        assert!(!acc.is_active_delegate(0, 100));
    }
}
