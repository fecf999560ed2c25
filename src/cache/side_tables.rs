use std::collections::HashMap;

use crate::address::Address;
use crate::entity::{
    BigMap, BigMapKey, BigMapUpdate, Ticket, TicketBalance, TicketTransfer, Token, TokenBalance,
    TokenStandard, TokenTransfer,
};
use crate::error::{Error, Result};
use crate::ids::{AccountId, BigMapId, IdSequence, TicketId, TokenId};

/// Derived side tables populated from contract execution results.
///
/// All rows are append-only with `active`/`last_level` soft-delete
/// markers; physical removal happens only on revert.
pub struct SideTables {
    pub bigmaps: HashMap<BigMapId, BigMap>,
    bigmaps_by_ptr: HashMap<i64, BigMapId>,
    pub bigmap_keys: HashMap<(BigMapId, String), BigMapKey>,
    pub bigmap_updates: Vec<BigMapUpdate>,

    pub tickets: HashMap<TicketId, Ticket>,
    tickets_by_content: HashMap<(AccountId, String), TicketId>,
    pub ticket_balances: HashMap<(TicketId, AccountId), TicketBalance>,
    pub ticket_transfers: Vec<TicketTransfer>,

    pub tokens: HashMap<TokenId, Token>,
    tokens_by_key: HashMap<(AccountId, String), TokenId>,
    pub token_balances: HashMap<(TokenId, AccountId), TokenBalance>,
    pub token_transfers: Vec<TokenTransfer>,

    bigmap_ids: IdSequence,
    bigmap_update_ids: IdSequence,
    ticket_ids: IdSequence,
    ticket_transfer_ids: IdSequence,
    token_ids: IdSequence,
    token_transfer_ids: IdSequence,
}

impl SideTables {
    pub fn new() -> Self {
        SideTables {
            bigmaps: HashMap::new(),
            bigmaps_by_ptr: HashMap::new(),
            bigmap_keys: HashMap::new(),
            bigmap_updates: Vec::new(),
            tickets: HashMap::new(),
            tickets_by_content: HashMap::new(),
            ticket_balances: HashMap::new(),
            ticket_transfers: Vec::new(),
            tokens: HashMap::new(),
            tokens_by_key: HashMap::new(),
            token_balances: HashMap::new(),
            token_transfers: Vec::new(),
            bigmap_ids: IdSequence::starting_at(0),
            bigmap_update_ids: IdSequence::starting_at(0),
            ticket_ids: IdSequence::starting_at(0),
            ticket_transfer_ids: IdSequence::starting_at(0),
            token_ids: IdSequence::starting_at(0),
            token_transfer_ids: IdSequence::starting_at(0),
        }
    }

    // --- big maps ---

    pub fn bigmap_by_ptr(&self, ptr: i64) -> Result<BigMapId> {
        self.bigmaps_by_ptr
            .get(&ptr)
            .copied()
            .ok_or_else(|| Error::inconsistent(format!("big map ptr {} not cached", ptr)))
    }

    pub fn allocate_bigmap(
        &mut self,
        ptr: i64,
        contract: AccountId,
        path: String,
        level: i32,
    ) -> BigMapId {
        let id = BigMapId(self.bigmap_ids.next() as u32);
        self.bigmaps_by_ptr.insert(ptr, id);
        self.bigmaps.insert(
            id,
            BigMap {
                id,
                ptr,
                contract,
                path,
                active: true,
                first_level: level,
                last_level: level,
                total_keys: 0,
                active_keys: 0,
                updates: 0,
            },
        );
        id
    }

    pub fn rollback_bigmap(&mut self, id: BigMapId) -> Result<()> {
        let bigmap = self
            .bigmaps
            .remove(&id)
            .ok_or_else(|| Error::inconsistent(format!("big map {} not cached", id)))?;
        if id.0 as u64 + 1 != self.bigmap_ids.peek() {
            return Err(Error::inconsistent(format!(
                "big map {} is not the latest allocation, cannot release",
                id
            )));
        }
        self.bigmaps_by_ptr.remove(&bigmap.ptr);
        self.bigmap_keys.retain(|(b, _), _| *b != id);
        self.bigmap_ids.release(1);
        Ok(())
    }

    pub fn bigmap_mut(&mut self, id: BigMapId) -> Result<&mut BigMap> {
        self.bigmaps
            .get_mut(&id)
            .ok_or_else(|| Error::inconsistent(format!("big map {} not cached", id)))
    }

    pub fn next_bigmap_update_id(&mut self) -> u64 {
        self.bigmap_update_ids.next()
    }

    pub fn release_bigmap_updates(&mut self, count: u64) {
        self.bigmap_update_ids.release(count);
    }

    // --- tickets ---

    pub fn intern_ticket(&mut self, ticketer: AccountId, content_hash: &str, level: i32) -> (TicketId, bool) {
        if let Some(id) = self
            .tickets_by_content
            .get(&(ticketer, content_hash.to_string()))
        {
            return (*id, false);
        }
        let id = TicketId(self.ticket_ids.next() as u32);
        self.tickets_by_content
            .insert((ticketer, content_hash.to_string()), id);
        self.tickets.insert(
            id,
            Ticket {
                id,
                ticketer,
                content_hash: content_hash.to_string(),
                first_level: level,
            },
        );
        (id, true)
    }

    pub fn rollback_ticket(&mut self, id: TicketId) -> Result<()> {
        let ticket = self
            .tickets
            .remove(&id)
            .ok_or_else(|| Error::inconsistent(format!("ticket {} not cached", id)))?;
        if id.0 as u64 + 1 != self.ticket_ids.peek() {
            return Err(Error::inconsistent(format!(
                "ticket {} is not the latest allocation, cannot release",
                id
            )));
        }
        self.tickets_by_content
            .remove(&(ticket.ticketer, ticket.content_hash));
        self.ticket_ids.release(1);
        Ok(())
    }

    pub fn next_ticket_transfer_id(&mut self) -> u64 {
        self.ticket_transfer_ids.next()
    }

    pub fn release_ticket_transfers(&mut self, count: u64) {
        self.ticket_transfer_ids.release(count);
    }

    pub fn ticket_balance_mut(
        &mut self,
        ticket: TicketId,
        account: AccountId,
        level: i32,
    ) -> &mut TicketBalance {
        self.ticket_balances
            .entry((ticket, account))
            .or_insert_with(|| TicketBalance {
                ticket,
                account,
                amount: 0,
                first_level: level,
                last_level: level,
            })
    }

    // --- tokens ---

    pub fn intern_token(
        &mut self,
        contract: AccountId,
        token_id: &str,
        standard: TokenStandard,
        level: i32,
    ) -> (TokenId, bool) {
        if let Some(id) = self.tokens_by_key.get(&(contract, token_id.to_string())) {
            return (*id, false);
        }
        let id = TokenId(self.token_ids.next() as u32);
        self.tokens_by_key.insert((contract, token_id.to_string()), id);
        self.tokens.insert(
            id,
            Token {
                id,
                contract,
                token_id: token_id.to_string(),
                standard,
                first_level: level,
            },
        );
        (id, true)
    }

    pub fn rollback_token(&mut self, id: TokenId) -> Result<()> {
        let token = self
            .tokens
            .remove(&id)
            .ok_or_else(|| Error::inconsistent(format!("token {} not cached", id)))?;
        if id.0 as u64 + 1 != self.token_ids.peek() {
            return Err(Error::inconsistent(format!(
                "token {} is not the latest allocation, cannot release",
                id
            )));
        }
        self.tokens_by_key.remove(&(token.contract, token.token_id));
        self.token_ids.release(1);
        Ok(())
    }

    pub fn next_token_transfer_id(&mut self) -> u64 {
        self.token_transfer_ids.next()
    }

    pub fn release_token_transfers(&mut self, count: u64) {
        self.token_transfer_ids.release(count);
    }

    pub fn token_balance_mut(
        &mut self,
        token: TokenId,
        account: AccountId,
        level: i32,
    ) -> &mut TokenBalance {
        self.token_balances
            .entry((token, account))
            .or_insert_with(|| TokenBalance {
                token,
                account,
                balance: 0,
                first_level: level,
                last_level: level,
            })
    }

    pub fn parse_standard(s: &str) -> TokenStandard {
        match s {
            "fa2" => TokenStandard::Fa2,
            _ => TokenStandard::Fa12,
        }
    }
}

impl Default for SideTables {
    fn default() -> Self {
        SideTables::new()
    }
}
