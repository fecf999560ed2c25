use std::{fmt, iter::Sum, ops};

/// Non negative amount of mutez (micro-tez).
///
/// All balance arithmetic in the engine goes through the checked
/// operators so that an overflow or a balance going negative is a
/// reportable error instead of silent wraparound.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mutez(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueError {
    NegativeAmount,
    Overflow,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueError::NegativeAmount => write!(f, "value cannot go below zero"),
            ValueError::Overflow => write!(f, "value overflowed its capacity"),
        }
    }
}

impl std::error::Error for ValueError {}

impl Mutez {
    pub fn zero() -> Self {
        Mutez(0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Mutez) -> Result<Mutez, ValueError> {
        self.0
            .checked_add(other.0)
            .map(Mutez)
            .ok_or(ValueError::Overflow)
    }

    pub fn checked_sub(self, other: Mutez) -> Result<Mutez, ValueError> {
        self.0
            .checked_sub(other.0)
            .map(Mutez)
            .ok_or(ValueError::NegativeAmount)
    }

    /// Saturating subtraction, for paths where draining more than the
    /// available amount legitimately empties the balance (frozen deposit
    /// slashing).
    pub fn saturating_sub(self, other: Mutez) -> Mutez {
        Mutez(self.0.saturating_sub(other.0))
    }

    pub fn sum<I: Iterator<Item = Mutez>>(values: I) -> Result<Mutez, ValueError> {
        values.fold(Ok(Mutez::zero()), |acc, v| acc.and_then(|a| a + v))
    }

    /// Split the value in `n` equal parts plus the remainder that cannot
    /// be distributed evenly. `n == 0` yields zero parts and the whole
    /// value as remainder.
    pub fn split_in(self, n: u32) -> SplitValueIn {
        if n == 0 {
            return SplitValueIn {
                parts: Mutez::zero(),
                remaining: self,
            };
        }
        SplitValueIn {
            parts: Mutez(self.0 / n as u64),
            remaining: Mutez(self.0 % n as u64),
        }
    }

    pub fn scale(self, n: u32) -> Result<Mutez, ValueError> {
        self.0
            .checked_mul(n as u64)
            .map(Mutez)
            .ok_or(ValueError::Overflow)
    }
}

/// Result of splitting a value in equal parts
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SplitValueIn {
    pub parts: Mutez,
    pub remaining: Mutez,
}

impl ops::Add for Mutez {
    type Output = Result<Mutez, ValueError>;

    fn add(self, other: Mutez) -> Self::Output {
        self.checked_add(other)
    }
}

impl ops::Sub for Mutez {
    type Output = Result<Mutez, ValueError>;

    fn sub(self, other: Mutez) -> Self::Output {
        self.checked_sub(other)
    }
}

impl AsRef<u64> for Mutez {
    fn as_ref(&self) -> &u64 {
        &self.0
    }
}

impl From<u64> for Mutez {
    fn from(v: u64) -> Self {
        Mutez(v)
    }
}

impl fmt::Display for Mutez {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed delta applied to a balance; commits record the forward delta
/// and revert by applying its negation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Delta(pub i64);

impl Delta {
    pub fn negate(self) -> Delta {
        Delta(-self.0)
    }

    pub fn apply_to(self, value: Mutez) -> Result<Mutez, ValueError> {
        if self.0 >= 0 {
            value + Mutez(self.0 as u64)
        } else {
            value - Mutez(self.0.unsigned_abs())
        }
    }
}

impl Sum for Delta {
    fn sum<I: Iterator<Item = Delta>>(iter: I) -> Delta {
        Delta(iter.map(|d| d.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen, TestResult};
    use quickcheck_macros::quickcheck;

    impl Arbitrary for Mutez {
        fn arbitrary(g: &mut Gen) -> Self {
            Mutez(u64::arbitrary(g) / 2)
        }
    }

    #[test]
    fn add_overflow() {
        assert_eq!(Mutez(u64::MAX) + Mutez(1), Err(ValueError::Overflow));
    }

    #[test]
    fn sub_negative() {
        assert_eq!(Mutez(3) - Mutez(5), Err(ValueError::NegativeAmount));
    }

    #[quickcheck]
    fn add_sub_roundtrip(a: Mutez, b: Mutez) -> TestResult {
        match a + b {
            Ok(sum) => TestResult::from_bool((sum - b).unwrap() == a),
            Err(_) => TestResult::discard(),
        }
    }

    #[quickcheck]
    fn split_conserves_value(v: Mutez, n: u32) -> TestResult {
        let n = n % 1000;
        let split = v.split_in(n);
        let reassembled = match split.parts.scale(n) {
            Ok(parts) => (parts + split.remaining).unwrap(),
            Err(_) => return TestResult::discard(),
        };
        TestResult::from_bool(reassembled == v)
    }

    #[quickcheck]
    fn delta_negation_is_inverse(a: Mutez, b: Mutez) -> TestResult {
        let delta = Delta(b.0 as i64 / 2);
        match delta.apply_to(a) {
            Ok(after) => TestResult::from_bool(delta.negate().apply_to(after).unwrap() == a),
            Err(_) => TestResult::discard(),
        }
    }
}
