//! Parsed shape of a block as delivered by the node RPC.
//!
//! The wire format itself is an external contract: this module only
//! defines what the engine consumes, parsed defensively. Operation
//! contents are a `kind`-tagged enum, so the set of supported kinds is
//! closed at compile time; a kind the enum does not know is surfaced as
//! a fatal `UnsupportedKind` before typed deserialization, never skipped.

use crate::address::Address;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// Operation kinds the engine implements. Used by the pre-parse scan so
/// an unknown kind is reported with its name and level instead of as an
/// opaque serde error.
const KNOWN_KINDS: &[&str] = &[
    "endorsement",
    "preendorsement",
    "proposals",
    "ballot",
    "activate_account",
    "double_baking_evidence",
    "double_endorsement_evidence",
    "double_preendorsement_evidence",
    "seed_nonce_revelation",
    "vdf_revelation",
    "drain_delegate",
    "reveal",
    "transaction",
    "delegation",
    "origination",
    "transfer_ticket",
    "smart_rollup_originate",
    "smart_rollup_add_messages",
    "smart_rollup_cement",
    "smart_rollup_publish",
    "smart_rollup_refute",
    "smart_rollup_recover_bond",
    "smart_rollup_execute_outbox_message",
    "dal_publish_commitment",
    "event",
];

/// Kinds allowed inside `internal_operation_results`.
const KNOWN_INTERNAL_KINDS: &[&str] = &["transaction", "delegation", "origination", "event"];

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub hash: String,
    pub header: RawHeader,
    pub metadata: RawMetadata,
    /// The node's four-way partition: consensus, voting, anonymous,
    /// manager.
    pub operations: [Vec<RawOperationGroup>; 4],
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHeader {
    pub level: i32,
    /// Protocol version counter from the block header; drives the
    /// activator registry.
    #[serde(default)]
    pub proto: u32,
    pub predecessor: String,
    pub timestamp: i64,
    #[serde(default)]
    pub payload_round: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMetadata {
    pub protocol: String,
    pub next_protocol: String,
    #[serde(default)]
    pub proposer: Option<Address>,
    #[serde(default)]
    pub baker: Option<Address>,
    #[serde(default)]
    pub deactivated: Vec<Address>,
    #[serde(default)]
    pub implicit_operations_results: Vec<RawImplicitResult>,
    /// Balance credits applied by a protocol migration (invoices).
    #[serde(default)]
    pub balance_updates: Vec<RawBalanceUpdate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBalanceUpdate {
    pub account: Address,
    pub change: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawImplicitResult {
    /// Liquidity baking subsidy minted to the CPMM contract.
    Transaction { destination: Address, amount: u64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOperationGroup {
    pub hash: String,
    pub contents: Vec<RawContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawContent {
    Endorsement {
        level: i32,
        metadata: RawConsensusMeta,
    },
    Preendorsement {
        level: i32,
        metadata: RawConsensusMeta,
    },
    Proposals {
        source: Address,
        period: i32,
        proposals: Vec<String>,
    },
    Ballot {
        source: Address,
        period: i32,
        proposal: String,
        ballot: RawBallot,
    },
    ActivateAccount {
        pkh: Address,
        #[serde(default)]
        secret: String,
        metadata: RawActivationMeta,
    },
    DoubleBakingEvidence {
        accused_level: i32,
        metadata: RawEvidenceMeta,
    },
    DoubleEndorsementEvidence {
        accused_level: i32,
        metadata: RawEvidenceMeta,
    },
    DoublePreendorsementEvidence {
        accused_level: i32,
        metadata: RawEvidenceMeta,
    },
    SeedNonceRevelation {
        level: i32,
        nonce: String,
    },
    VdfRevelation {
        solution: String,
    },
    DrainDelegate {
        delegate: Address,
        destination: Address,
    },
    Reveal {
        #[serde(flatten)]
        manager: RawManagerInfo,
        public_key: String,
        metadata: RawManagerMeta,
    },
    Transaction {
        #[serde(flatten)]
        manager: RawManagerInfo,
        destination: Address,
        amount: u64,
        #[serde(default)]
        parameters: Option<RawParameters>,
        metadata: RawManagerMeta,
    },
    Delegation {
        #[serde(flatten)]
        manager: RawManagerInfo,
        #[serde(default)]
        delegate: Option<Address>,
        metadata: RawManagerMeta,
    },
    Origination {
        #[serde(flatten)]
        manager: RawManagerInfo,
        balance: u64,
        #[serde(default)]
        delegate: Option<Address>,
        metadata: RawManagerMeta,
    },
    TransferTicket {
        #[serde(flatten)]
        manager: RawManagerInfo,
        destination: Address,
        ticketer: Address,
        ticket_amount: i64,
        #[serde(default)]
        ticket_content_hash: String,
        metadata: RawManagerMeta,
    },
    SmartRollupOriginate {
        #[serde(flatten)]
        manager: RawManagerInfo,
        metadata: RawManagerMeta,
    },
    SmartRollupAddMessages {
        #[serde(flatten)]
        manager: RawManagerInfo,
        message: Vec<String>,
        metadata: RawManagerMeta,
    },
    SmartRollupCement {
        #[serde(flatten)]
        manager: RawManagerInfo,
        rollup: Address,
        metadata: RawManagerMeta,
    },
    SmartRollupPublish {
        #[serde(flatten)]
        manager: RawManagerInfo,
        rollup: Address,
        commitment: String,
        metadata: RawManagerMeta,
    },
    SmartRollupRefute {
        #[serde(flatten)]
        manager: RawManagerInfo,
        rollup: Address,
        opponent: Address,
        metadata: RawManagerMeta,
    },
    SmartRollupRecoverBond {
        #[serde(flatten)]
        manager: RawManagerInfo,
        rollup: Address,
        staker: Address,
        metadata: RawManagerMeta,
    },
    SmartRollupExecuteOutboxMessage {
        #[serde(flatten)]
        manager: RawManagerInfo,
        rollup: Address,
        #[serde(default)]
        commitment: String,
        metadata: RawManagerMeta,
    },
    DalPublishCommitment {
        #[serde(flatten)]
        manager: RawManagerInfo,
        slot_index: i32,
        commitment: String,
        metadata: RawManagerMeta,
    },
    /// Contract event; carries no balance effect, tracked only through
    /// token transfers attached to the result.
    Event {
        #[serde(default)]
        source: Option<Address>,
        metadata: RawManagerMeta,
    },
}

impl RawContent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RawContent::Endorsement { .. } => "endorsement",
            RawContent::Preendorsement { .. } => "preendorsement",
            RawContent::Proposals { .. } => "proposals",
            RawContent::Ballot { .. } => "ballot",
            RawContent::ActivateAccount { .. } => "activate_account",
            RawContent::DoubleBakingEvidence { .. } => "double_baking_evidence",
            RawContent::DoubleEndorsementEvidence { .. } => "double_endorsement_evidence",
            RawContent::DoublePreendorsementEvidence { .. } => "double_preendorsement_evidence",
            RawContent::SeedNonceRevelation { .. } => "seed_nonce_revelation",
            RawContent::VdfRevelation { .. } => "vdf_revelation",
            RawContent::DrainDelegate { .. } => "drain_delegate",
            RawContent::Reveal { .. } => "reveal",
            RawContent::Transaction { .. } => "transaction",
            RawContent::Delegation { .. } => "delegation",
            RawContent::Origination { .. } => "origination",
            RawContent::TransferTicket { .. } => "transfer_ticket",
            RawContent::SmartRollupOriginate { .. } => "smart_rollup_originate",
            RawContent::SmartRollupAddMessages { .. } => "smart_rollup_add_messages",
            RawContent::SmartRollupCement { .. } => "smart_rollup_cement",
            RawContent::SmartRollupPublish { .. } => "smart_rollup_publish",
            RawContent::SmartRollupRefute { .. } => "smart_rollup_refute",
            RawContent::SmartRollupRecoverBond { .. } => "smart_rollup_recover_bond",
            RawContent::SmartRollupExecuteOutboxMessage { .. } => {
                "smart_rollup_execute_outbox_message"
            }
            RawContent::DalPublishCommitment { .. } => "dal_publish_commitment",
            RawContent::Event { .. } => "event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawBallot {
    Yay,
    Nay,
    Pass,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConsensusMeta {
    pub delegate: Address,
    #[serde(default)]
    pub slots: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawActivationMeta {
    pub balance: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEvidenceMeta {
    pub offender: Address,
}

/// Call parameters of a transaction; `value` stays opaque except for the
/// pseudo-entrypoints the engine redirects (staking, delegate
/// parameters), whose fields are extracted on demand.
#[derive(Debug, Clone, Deserialize)]
pub struct RawParameters {
    pub entrypoint: String,
    #[serde(default)]
    pub value: Value,
}

impl RawParameters {
    /// Integer field of the parameter value, for the delegate-parameter
    /// pseudo-entrypoint.
    pub fn int_field(&self, name: &str) -> i64 {
        self.value
            .get(name)
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    /// The parameter value interpreted as a plain nat (the unstake
    /// amount).
    pub fn nat_value(&self) -> u64 {
        match &self.value {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Fields common to all fee-paying manager operations.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManagerInfo {
    pub source: Address,
    pub fee: u64,
    pub counter: i64,
    #[serde(default)]
    pub gas_limit: u64,
    #[serde(default)]
    pub storage_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawManagerMeta {
    pub operation_result: RawOperationResult,
    #[serde(default)]
    pub internal_operation_results: Vec<RawInternalResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStatus {
    Applied,
    Failed,
    Backtracked,
    Skipped,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOperationResult {
    pub status: RawStatus,
    /// Burn paid for newly used storage, already priced in mutez.
    #[serde(default)]
    pub storage_fee: u64,
    /// Burn paid for allocating the destination, already priced.
    #[serde(default)]
    pub allocation_fee: u64,
    #[serde(default)]
    pub originated_contracts: Vec<Address>,
    #[serde(default)]
    pub originated_rollup: Option<Address>,
    #[serde(default)]
    pub big_map_diffs: Vec<RawBigMapDiff>,
    #[serde(default)]
    pub ticket_updates: Vec<RawTicketUpdate>,
    #[serde(default)]
    pub token_transfers: Vec<RawTokenTransfer>,
    /// Published/cemented commitment hash for rollup operations.
    #[serde(default)]
    pub commitment: Option<String>,
    /// Frozen bond taken or released by rollup operations.
    #[serde(default)]
    pub bond: u64,
    /// Refutation game outcome, when the refute resolved the game.
    #[serde(default)]
    pub game_status: Option<String>,
}

/// Internal operations triggered by contract execution. The acting
/// account comes from `source`; the initiator is threaded in by the
/// dispatcher from the enclosing manager operation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInternalResult {
    pub source: Address,
    pub nonce: i32,
    #[serde(flatten)]
    pub content: RawInternalContent,
    pub result: RawOperationResult,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawInternalContent {
    Transaction {
        destination: Address,
        amount: u64,
        #[serde(default)]
        entrypoint: Option<String>,
    },
    Delegation {
        #[serde(default)]
        delegate: Option<Address>,
    },
    Origination {
        balance: u64,
        #[serde(default)]
        delegate: Option<Address>,
    },
    Event {},
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBigMapDiff {
    pub action: String,
    #[serde(default)]
    pub big_map: i64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub key_hash: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTicketUpdate {
    pub ticketer: Address,
    pub content_hash: String,
    pub account: Address,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenTransfer {
    pub contract: Address,
    pub token_id: String,
    pub standard: String,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    pub amount: i64,
}

impl RawBlock {
    /// Parse a block from the node response.
    ///
    /// Unknown operation kinds are detected before typed
    /// deserialization so they surface as the fatal `UnsupportedKind`
    /// with the offending level; any other shape mismatch is a
    /// (possibly transient) parse rejection.
    pub fn parse(json: &str) -> Result<RawBlock> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<RawBlock> {
        let level = req_i64(&value, "/header/level")? as i32;
        scan_kinds(&value, level)?;
        serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()))
    }

    pub fn level(&self) -> i32 {
        self.header.level
    }
}

/// Fail fast on any operation content whose `kind` the engine does not
/// implement, including the internal results nested in manager
/// operation metadata.
fn scan_kinds(block: &Value, level: i32) -> Result<()> {
    let groups = block
        .get("operations")
        .and_then(Value::as_array)
        .ok_or(Error::MissingField("operations"))?;
    for pass in groups {
        let pass = pass.as_array().ok_or(Error::MissingField("operations[]"))?;
        for group in pass {
            let contents = group
                .get("contents")
                .and_then(Value::as_array)
                .ok_or(Error::MissingField("contents"))?;
            for content in contents {
                let kind = req_str(content, "/kind")?;
                if !KNOWN_KINDS.contains(&kind) {
                    return Err(Error::UnsupportedKind {
                        level,
                        kind: kind.to_string(),
                    });
                }
                let internals = content
                    .pointer("/metadata/internal_operation_results")
                    .and_then(Value::as_array);
                for internal in internals.into_iter().flatten() {
                    let kind = req_str(internal, "/kind")?;
                    if !KNOWN_INTERNAL_KINDS.contains(&kind) {
                        return Err(Error::UnsupportedKind {
                            level,
                            kind: kind.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn req<'a>(value: &'a Value, pointer: &'static str) -> Result<&'a Value> {
    value.pointer(pointer).ok_or(Error::MissingField(pointer))
}

fn req_str<'a>(value: &'a Value, pointer: &'static str) -> Result<&'a str> {
    req(value, pointer)?
        .as_str()
        .ok_or(Error::MissingField(pointer))
}

fn req_i64(value: &Value, pointer: &'static str) -> Result<i64> {
    req(value, pointer)?
        .as_i64()
        .ok_or(Error::MissingField(pointer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_block(contents: Value) -> Value {
        json!({
            "hash": "BKsampleblockhash",
            "header": { "level": 42, "predecessor": "BKparent", "timestamp": 1000 },
            "metadata": {
                "protocol": "PtAlpha1",
                "next_protocol": "PtAlpha1",
                "baker": "tz1baker"
            },
            "operations": [[], [], [], [{ "hash": "opHash", "contents": contents }]]
        })
    }

    #[test]
    fn parses_a_transaction() {
        let block = minimal_block(json!([{
            "kind": "transaction",
            "source": "tz1sender",
            "fee": 1000, "counter": 5,
            "destination": "tz1target",
            "amount": 500,
            "metadata": { "operation_result": { "status": "applied" } }
        }]));
        let parsed = RawBlock::from_value(block).unwrap();
        assert_eq!(parsed.level(), 42);
        match &parsed.operations[3][0].contents[0] {
            RawContent::Transaction { amount, .. } => assert_eq!(*amount, 500),
            other => panic!("unexpected content {:?}", other.kind_name()),
        }
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let block = minimal_block(json!([{ "kind": "hyperspace_jump" }]));
        let err = RawBlock::from_value(block).unwrap_err();
        assert!(err.is_fatal());
        match err {
            Error::UnsupportedKind { level, kind } => {
                assert_eq!(level, 42);
                assert_eq!(kind, "hyperspace_jump");
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn unknown_internal_kind_is_fatal() {
        let block = minimal_block(json!([{
            "kind": "transaction",
            "source": "tz1sender",
            "fee": 1000, "counter": 5,
            "destination": "KT1contract",
            "amount": 0,
            "metadata": {
                "operation_result": { "status": "applied" },
                "internal_operation_results": [{
                    "kind": "wormhole_exit",
                    "source": "KT1contract",
                    "nonce": 0,
                    "result": { "status": "applied" }
                }]
            }
        }]));
        let err = RawBlock::from_value(block).unwrap_err();
        assert!(err.is_fatal());
        match err {
            Error::UnsupportedKind { kind, .. } => assert_eq!(kind, "wormhole_exit"),
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn missing_header_level_is_rejection() {
        let err = RawBlock::from_value(json!({ "header": {} })).unwrap_err();
        assert!(!err.is_fatal());
    }
}
