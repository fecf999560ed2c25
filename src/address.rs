use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Textual account address (tz1/tz2/tz3 for users and delegates, KT1 for
/// originated contracts, txr1/sr1 for rollups).
///
/// The engine treats addresses as opaque; the only structural contract is
/// the byte-lexicographic ordering, which the sampler uses to tie-break
/// equal stakes. That ordering determines reward allocation and must not
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Address(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Originated contract addresses carry the KT1 prefix.
    pub fn is_contract(&self) -> bool {
        self.0.starts_with("KT1")
    }

    pub fn is_smart_rollup(&self) -> bool {
        self.0.starts_with("sr1")
    }

    pub fn is_rollup(&self) -> bool {
        self.0.starts_with("txr1")
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_byte_lexicographic() {
        let a = Address::new("tz1aaa");
        let b = Address::new("tz1aab");
        let c = Address::new("tz1Zzz");
        // 'Z' < 'a' in byte order, capital letters sort first
        assert!(c < a);
        assert!(a < b);
    }

    #[test]
    fn contract_prefix() {
        assert!(Address::new("KT1Hkg5qeNhfwpKW4fXvq7HGZB9z2EnmCCA9").is_contract());
        assert!(!Address::new("tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb").is_contract());
        assert!(Address::new("sr1RYurGZtN8KNSpkMcCt9CgWeUaNkzsAfXf").is_smart_rollup());
    }
}
