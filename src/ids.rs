use std::fmt;

macro_rules! dense_id {
    ($(#[$doc:meta])* $name:ident, $repr:ty) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $repr);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(v: $repr) -> Self {
                $name(v)
            }
        }
    };
}

dense_id!(
    /// Dense identifier of an account row. Accounts are referenced by id
    /// everywhere; the address is only an index into the cache.
    AccountId,
    u32
);
dense_id!(
    /// Globally unique, strictly monotonic operation id.
    OpId,
    u64
);
dense_id!(BigMapId, u32);
dense_id!(TicketId, u32);
dense_id!(TokenId, u32);
dense_id!(
    /// Protocol version code (0 for genesis bootstrap).
    ProtoCode,
    u32
);

/// Monotonic id allocator.
///
/// Forward processing only ever increments the counter; `release` rolls
/// it back and is only legal from the revert of the commit that made the
/// matching allocations. Ids are never reused otherwise within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    pub fn starting_at(next: u64) -> Self {
        IdSequence { next }
    }

    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Roll the counter back by `count` allocations.
    ///
    /// Panics if the counter would go below zero: that can only happen if
    /// a revert releases ids it never allocated, which is a bug.
    pub fn release(&mut self, count: u64) {
        assert!(
            self.next >= count,
            "id counter rollback of {} below zero (next={})",
            count,
            self.next
        );
        self.next -= count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let mut seq = IdSequence::starting_at(10);
        assert_eq!(seq.next(), 10);
        assert_eq!(seq.next(), 11);
        assert_eq!(seq.peek(), 12);
    }

    #[test]
    fn release_restores_counter() {
        let mut seq = IdSequence::starting_at(0);
        seq.next();
        seq.next();
        seq.release(2);
        assert_eq!(seq.next(), 0);
    }

    #[test]
    #[should_panic]
    fn release_below_zero_panics() {
        let mut seq = IdSequence::starting_at(1);
        seq.release(2);
    }
}
