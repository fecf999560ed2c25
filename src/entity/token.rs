use crate::ids::{AccountId, OpId, TokenId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenStandard {
    Fa12,
    Fa2,
}

/// A token type tracked from contract execution results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: TokenId,
    pub contract: AccountId,
    /// FA2 token id within the contract; FA1.2 contracts use "0".
    pub token_id: String,
    pub standard: TokenStandard,
    pub first_level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub token: TokenId,
    pub account: AccountId,
    pub balance: i64,
    pub first_level: i32,
    pub last_level: i32,
}

/// Append-only transfer log; `from`/`to` of `None` mean mint/burn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub id: u64,
    pub token: TokenId,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: i64,
    pub level: i32,
    pub op: OpId,
}
