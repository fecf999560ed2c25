use crate::ids::{AccountId, OpId, TicketId};

/// A ticket type: (ticketer, content) pair interned once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    pub ticketer: AccountId,
    /// Hash of the ticket content+type, used as the interning key.
    pub content_hash: String,
    pub first_level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketBalance {
    pub ticket: TicketId,
    pub account: AccountId,
    pub amount: i64,
    pub first_level: i32,
    pub last_level: i32,
}

/// Append-only transfer log; `from`/`to` of `None` mean mint/burn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketTransfer {
    pub id: u64,
    pub ticket: TicketId,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: i64,
    pub level: i32,
    pub op: OpId,
}
