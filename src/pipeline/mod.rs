//! The block-processing pipeline.
//!
//! `ProtocolHandler` owns the cache and exposes the staged hooks of the
//! engine: `commit` and `after_commit` going forward, `before_revert`
//! and `revert` going back, with `bootstrap`, `process` and
//! `revert_head` as orchestration conveniences. Each hook returns the
//! drained journal of staged writes, so a storage collaborator can
//! flush the commit batch before the derived state of the new head
//! (balance snapshot, future cycle) is built.
//!
//! Forward order inside `commit`: protocol resolution, the four
//! operation groups, the queued side-table aggregators, then the
//! deferred per-block passes (rewards, right realization, cycle-end
//! settlements, governance transition, statistics). The revert hooks
//! walk the same stations in exact reverse.

pub mod context;
pub mod cycles;
pub mod validator;
pub mod voting;

use tracing::{debug, info};

use crate::activator::{Activators, GenesisConfig};
use crate::cache::Cache;
use crate::commits;
use crate::entity::{
    Block, BlockEvents, DoubleKind, OperationDetails, OperationsMask, OpStatus, Protocol,
    RevelationKind,
};
use crate::error::{Error, Result};
use crate::ids::{AccountId, OpId, ProtoCode};
use crate::rawblock::{RawBlock, RawContent};
use crate::snapshot;
use crate::store::WriteOp;
use crate::value::Mutez;
use context::{BlockContext, RevertContext};

pub struct ProtocolHandler {
    cache: Cache,
    activators: Activators,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        ProtocolHandler {
            cache: Cache::new(),
            activators: Activators::standard(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn head_level(&self) -> i32 {
        self.cache.head_level()
    }

    /// Seed an empty cache from the genesis configuration.
    pub fn bootstrap(&mut self, config: &GenesisConfig) -> Result<Vec<WriteOp>> {
        crate::activator::bootstrap(&mut self.cache, &self.activators, config)?;
        info!(
            accounts = self.cache.accounts.len(),
            cycles = self.cache.cycles.len(),
            "bootstrapped genesis state"
        );
        Ok(self.cache.journal.drain())
    }

    /// Commit one block and run its post-commit work in one call, for
    /// callers that do not stage their flushes.
    pub fn process(&mut self, block: &RawBlock) -> Result<Vec<WriteOp>> {
        let mut writes = self.commit(block)?;
        writes.extend(self.after_commit()?);
        Ok(writes)
    }

    /// Commit one block on top of the current head.
    ///
    /// Derived state keyed off the new head (the balance snapshot, the
    /// future cycle) is deferred to `after_commit` so the caller can
    /// flush this batch first. On error the cache may hold partial
    /// state; the caller restarts from storage rather than continuing
    /// on this instance.
    pub fn commit(&mut self, block: &RawBlock) -> Result<Vec<WriteOp>> {
        validator::validate(&self.cache, block)?;
        let level = block.level();
        debug!(level, hash = %block.hash, "processing block");

        let current = self.cache.current_protocol()?.clone();
        let activation = block.metadata.protocol != current.hash;
        let proto = if activation {
            self.activate_protocol(block, &current)?
        } else {
            current
        };
        let flags = self.activators.resolve(proto.code.0).flags();

        let baker_addr = block
            .metadata
            .baker
            .as_ref()
            .ok_or_else(|| Error::validation(level, "block metadata carries no baker"))?;
        let baker = self.cache.accounts.id_of(baker_addr)?;
        let proposer = match &block.metadata.proposer {
            Some(addr) => self.cache.accounts.id_of(addr)?,
            None => baker,
        };

        let cycle = proto.cycle_of(level);
        let row = Block {
            level,
            hash: block.hash.clone(),
            cycle,
            proto: proto.code,
            protocol_hash: block.metadata.protocol.clone(),
            timestamp: block.header.timestamp,
            baker: Some(baker),
            proposer: Some(proposer),
            round: block.header.payload_round,
            operations: OperationsMask::none(),
            events: BlockEvents::none(),
            fees: Mutez::zero(),
            reward: Mutez::zero(),
            bonus: Mutez::zero(),
        };

        let mut ctx = BlockContext {
            cache: &mut self.cache,
            proto: proto.clone(),
            flags,
            block: row,
            baker,
            proposer,
            minted: Mutez::zero(),
            burned: Mutez::zero(),
            activated: Mutez::zero(),
            frozen_delta: 0,
            bigmap_diffs: Vec::new(),
            ticket_updates: Vec::new(),
            token_transfers: Vec::new(),
            dictator_fired: false,
        };

        if activation {
            ctx.block.events.set(BlockEvents::PROTOCOL_BEGIN);
            let strategy = self.activators.resolve(block.header.proto);
            strategy.migrate(&mut ctx)?;
            apply_migration_updates(&mut ctx, block)?;
        }
        if block.metadata.next_protocol != block.metadata.protocol {
            ctx.block.events.set(BlockEvents::PROTOCOL_END);
        }

        // the bootstrap window is pre-loaded, so a begun cycle only
        // marks the load once its future counterpart is missing; the
        // load itself runs in after_commit
        let future_cycle = cycle + proto.constants.preserved_cycles;
        if proto.is_cycle_begin(level) && !ctx.cache.cycles.contains_key(&future_cycle) {
            ctx.block.events.set(BlockEvents::CYCLE_BEGIN);
        }

        apply_groups(&mut ctx, block)?;

        commits::bigmaps::apply(&mut ctx)?;
        commits::tickets::apply(&mut ctx)?;
        commits::tokens::apply(&mut ctx)?;

        commits::baking::apply_implicit(&mut ctx, &block.metadata.implicit_operations_results)?;
        commits::baking::apply_block_rewards(&mut ctx)?;
        commits::baking::realize_rights(&mut ctx)?;

        if proto.is_cycle_end(level) {
            ctx.block.events.set(BlockEvents::CYCLE_END);
            commits::baking::settle_attestation_rewards(&mut ctx)?;
            commits::baking::apply_deactivations(&mut ctx, &block.metadata.deactivated)?;
            if flags.autostaking {
                autostake_all(&mut ctx)?;
            }
        }

        if voting::period_ends(&ctx)? {
            voting::end_of_period(&mut ctx)?;
        }

        if proto.is_snapshot_level(level) {
            ctx.block.events.set(BlockEvents::BALANCE_SNAPSHOT);
        }

        let mut stats = ctx.cache.current_statistics().at_level(level);
        stats.total_minted = (stats.total_minted + ctx.minted)?;
        stats.total_burned = (stats.total_burned + ctx.burned)?;
        stats.total_activated = (stats.total_activated + ctx.activated)?;
        stats.total_frozen = shift_frozen(stats.total_frozen, ctx.frozen_delta)?;
        ctx.cache.statistics.insert(level, stats);
        ctx.cache.journal.push(WriteOp::UpsertStatistics { level });

        let row = ctx.block;
        self.cache.journal.push(WriteOp::InsertBlock { level });
        self.cache.blocks.insert(level, row);

        debug!(level, writes = self.cache.journal.len(), "block committed");
        Ok(self.cache.journal.drain())
    }

    /// Post-commit work for the current head: materialize the cycle
    /// flagged by a cycle-begin block and record the balance snapshot
    /// of a snapshot block.
    pub fn after_commit(&mut self) -> Result<Vec<WriteOp>> {
        let head = self
            .cache
            .head()
            .cloned()
            .ok_or_else(|| Error::inconsistent("no head block committed"))?;
        if head.events.contains(BlockEvents::CYCLE_BEGIN) {
            let proto = self.cache.protocol(head.proto)?.clone();
            let flags = self.activators.resolve(head.proto.0).flags();
            let fc = snapshot::create_future_cycle(&self.cache, &proto, head.cycle)?;
            cycles::load_future_cycle(&mut self.cache, &proto, &flags, fc)?;
        }
        if head.events.contains(BlockEvents::BALANCE_SNAPSHOT) {
            snapshot::take_balance_snapshot(&mut self.cache, head.level);
        }
        Ok(self.cache.journal.drain())
    }

    /// Roll the head block back in one call, restoring the exact
    /// pre-block state.
    pub fn revert_head(&mut self) -> Result<Vec<WriteOp>> {
        let mut writes = self.before_revert()?;
        writes.extend(self.revert()?);
        Ok(writes)
    }

    /// Inverse of `after_commit` for the current head: drop its balance
    /// snapshot and unload the cycle it materialized. Must run before
    /// `revert`.
    pub fn before_revert(&mut self) -> Result<Vec<WriteOp>> {
        let head = self
            .cache
            .head()
            .cloned()
            .ok_or_else(|| Error::inconsistent("no head block to revert"))?;
        if head.level == 0 {
            return Err(Error::inconsistent("cannot revert the genesis block"));
        }
        if head.events.contains(BlockEvents::BALANCE_SNAPSHOT) {
            snapshot::drop_balance_snapshot(&mut self.cache, head.level);
        }
        if head.events.contains(BlockEvents::CYCLE_BEGIN) {
            let proto = self.cache.protocol(head.proto)?.clone();
            cycles::unload_cycle(&mut self.cache, head.cycle + proto.constants.preserved_cycles)?;
        }
        Ok(self.cache.journal.drain())
    }

    /// Undo the head block's commit. Expects `before_revert` to have
    /// already removed the head's derived state.
    pub fn revert(&mut self) -> Result<Vec<WriteOp>> {
        let head = self
            .cache
            .head()
            .cloned()
            .ok_or_else(|| Error::inconsistent("no head block to revert"))?;
        if head.level == 0 {
            return Err(Error::inconsistent("cannot revert the genesis block"));
        }
        let level = head.level;
        info!(level, hash = %head.hash, "reverting head block");

        let proto = self.cache.protocol(head.proto)?.clone();
        let flags = self.activators.resolve(head.proto.0).flags();

        let mut rctx = RevertContext {
            cache: &mut self.cache,
            proto: proto.clone(),
            flags,
            block: head.clone(),
        };

        if head.events.contains(BlockEvents::VOTING_PERIOD_END) {
            voting::revert_end_of_period(&mut rctx)?;
        }

        commits::baking::revert_rights(&mut rctx)?;
        commits::baking::revert_block_rewards(&mut rctx)?;

        commits::tokens::revert(&mut rctx)?;
        commits::tickets::revert(&mut rctx)?;
        commits::bigmaps::revert(&mut rctx)?;

        let ids: Vec<OpId> = rctx.cache.operations.at_level(level).to_vec();
        for id in ids.iter().rev() {
            let op = rctx.cache.operations.get(*id)?.clone();
            commits::revert_operation(&mut rctx, &op)?;
            rctx.cache.operations.remove(*id)?;
            rctx.cache.journal.push(WriteOp::DeleteOperation(*id));
        }
        rctx.cache.op_ids.release(ids.len() as u64);

        if head.events.contains(BlockEvents::PROTOCOL_BEGIN) {
            revert_activation(&self.activators, &mut rctx, head.proto)?;
        }

        self.cache.statistics.remove(&level);
        self.cache.journal.push(WriteOp::DeleteStatistics { level });
        self.cache.blocks.remove(&level);
        self.cache.journal.push(WriteOp::DeleteBlock { level });

        prune_created_accounts(&mut self.cache, level)?;

        debug!(level, writes = self.cache.journal.len(), "head reverted");
        Ok(self.cache.journal.drain())
    }

    /// Open a new protocol row at the activation block, closing the
    /// previous one at the predecessor level.
    fn activate_protocol(&mut self, block: &RawBlock, current: &Protocol) -> Result<Protocol> {
        let level = block.level();
        let code = ProtoCode(block.header.proto);
        if self.cache.protocols.contains_key(&code) {
            return Err(Error::inconsistent(format!(
                "protocol {} already active, cannot re-activate as {}",
                code, block.metadata.protocol
            )));
        }
        let strategy = self.activators.resolve(block.header.proto);
        let first_cycle = current.cycle_of(level);
        let proto = Protocol {
            code,
            hash: block.metadata.protocol.clone(),
            first_level: level,
            last_level: None,
            first_cycle,
            first_cycle_level: current.first_level_of_cycle(first_cycle),
            constants: strategy.constants(&current.constants),
        };
        info!(
            level,
            from = %current.hash,
            to = %proto.hash,
            code = proto.code.0,
            "protocol activation"
        );

        let prev = self
            .cache
            .protocols
            .get_mut(&current.code)
            .ok_or_else(|| Error::inconsistent("current protocol missing from cache"))?;
        prev.last_level = Some(level - 1);
        self.cache.journal.push(WriteOp::UpsertProtocol(current.code));

        self.cache.journal.push(WriteOp::UpsertProtocol(proto.code));
        self.cache.protocols.insert(proto.code, proto.clone());
        Ok(proto)
    }

}

impl Default for ProtocolHandler {
    fn default() -> Self {
        ProtocolHandler::new()
    }
}

/// Undo a protocol activation: run the strategy's migration inverse,
/// drop the protocol row and reopen the predecessor.
fn revert_activation(
    activators: &Activators,
    rctx: &mut RevertContext,
    code: ProtoCode,
) -> Result<()> {
    let prev = rctx
        .cache
        .protocols
        .range(..code)
        .next_back()
        .map(|(_, p)| p.clone())
        .ok_or_else(|| Error::inconsistent("reverting activation of the first protocol"))?;
    let strategy = activators.resolve(code.0);
    let prev_flags = activators.resolve(prev.code.0).flags();
    strategy.revert_migration(rctx, &prev, &prev_flags)?;

    rctx.cache.protocols.remove(&code);
    rctx.cache.journal.push(WriteOp::DeleteProtocol(code));
    let reopened = rctx
        .cache
        .protocols
        .get_mut(&prev.code)
        .ok_or_else(|| Error::inconsistent("predecessor protocol missing from cache"))?;
    reopened.last_level = None;
    rctx.cache.journal.push(WriteOp::UpsertProtocol(prev.code));
    Ok(())
}

/// Apply the four operation groups in the node's canonical order.
fn apply_groups(ctx: &mut BlockContext, block: &RawBlock) -> Result<()> {
    for group in &block.operations[0] {
        for content in &group.contents {
            match content {
                RawContent::Endorsement { metadata, .. } => {
                    commits::consensus::apply_endorsement(ctx, &group.hash, metadata)?
                }
                RawContent::Preendorsement { metadata, .. } => {
                    commits::consensus::apply_preendorsement(ctx, &group.hash, metadata)?
                }
                other => {
                    return Err(Error::inconsistent(format!(
                        "operation kind `{}` in the consensus group",
                        other.kind_name()
                    )))
                }
            }
        }
    }

    // a dictator proposal settles the epoch immediately; the rest of
    // the voting group is void and skipped
    'voting: for group in &block.operations[1] {
        for content in &group.contents {
            match content {
                RawContent::Proposals {
                    source, proposals, ..
                } => {
                    if commits::governance::apply_proposals(ctx, &group.hash, source, proposals)? {
                        ctx.dictator_fired = true;
                        break 'voting;
                    }
                }
                RawContent::Ballot {
                    source,
                    proposal,
                    ballot,
                    ..
                } => commits::governance::apply_ballot(ctx, &group.hash, source, proposal, *ballot)?,
                other => {
                    return Err(Error::inconsistent(format!(
                        "operation kind `{}` in the voting group",
                        other.kind_name()
                    )))
                }
            }
        }
    }

    for group in &block.operations[2] {
        for content in &group.contents {
            match content {
                RawContent::ActivateAccount { pkh, metadata, .. } => {
                    commits::anonymous::apply_activation(
                        ctx,
                        &group.hash,
                        pkh,
                        Mutez(metadata.balance),
                    )?
                }
                RawContent::DoubleBakingEvidence {
                    accused_level,
                    metadata,
                } => commits::anonymous::apply_double_signing(
                    ctx,
                    &group.hash,
                    DoubleKind::Baking,
                    *accused_level,
                    &metadata.offender,
                )?,
                RawContent::DoubleEndorsementEvidence {
                    accused_level,
                    metadata,
                } => commits::anonymous::apply_double_signing(
                    ctx,
                    &group.hash,
                    DoubleKind::Attesting,
                    *accused_level,
                    &metadata.offender,
                )?,
                RawContent::DoublePreendorsementEvidence {
                    accused_level,
                    metadata,
                } => commits::anonymous::apply_double_signing(
                    ctx,
                    &group.hash,
                    DoubleKind::Preattesting,
                    *accused_level,
                    &metadata.offender,
                )?,
                RawContent::SeedNonceRevelation { level, .. } => {
                    commits::anonymous::apply_revelation(
                        ctx,
                        &group.hash,
                        RevelationKind::SeedNonce,
                        *level,
                    )?
                }
                RawContent::VdfRevelation { .. } => {
                    let level = ctx.level();
                    commits::anonymous::apply_revelation(
                        ctx,
                        &group.hash,
                        RevelationKind::Vdf,
                        level,
                    )?
                }
                RawContent::DrainDelegate {
                    delegate,
                    destination,
                } => commits::anonymous::apply_drain(ctx, &group.hash, delegate, destination)?,
                other => {
                    return Err(Error::inconsistent(format!(
                        "operation kind `{}` in the anonymous group",
                        other.kind_name()
                    )))
                }
            }
        }
    }

    for group in &block.operations[3] {
        for content in &group.contents {
            commits::manager::apply_content(ctx, &group.hash, content)?;
        }
    }
    Ok(())
}

/// Balance invoices attached to a migration block's metadata. Only
/// credits occur on the indexed chains; a debit would need inverse
/// bookkeeping no migration has required.
fn apply_migration_updates(ctx: &mut BlockContext, block: &RawBlock) -> Result<()> {
    let hash = ctx.block.hash.clone();
    for update in &block.metadata.balance_updates {
        if update.change <= 0 {
            return Err(Error::inconsistent(format!(
                "migration debits {} from {}",
                -update.change, update.account
            )));
        }
        let level = ctx.level();
        let (account, _) = ctx.cache.accounts.get_or_create(&update.account, level);
        let amount = Mutez(update.change as u64);
        ctx.mint(account, amount)?;
        ctx.record(
            &hash,
            None,
            Mutez::zero(),
            None,
            OpStatus::Applied,
            OperationDetails::Migration {
                account,
                balance_change: amount,
            },
        );
    }
    Ok(())
}

/// Cycle-end automatic deposit adjustment, in id order for determinism.
fn autostake_all(ctx: &mut BlockContext) -> Result<()> {
    let cycle = ctx.cycle();
    let blocks_per_cycle = ctx.proto.constants.blocks_per_cycle;
    let mut delegates: Vec<AccountId> = ctx
        .cache
        .accounts
        .delegates()
        .filter(|a| a.is_active_delegate(cycle, blocks_per_cycle))
        .map(|a| a.id)
        .collect();
    delegates.sort_unstable();
    for delegate in delegates {
        commits::staking::autostake(ctx, delegate)?;
    }
    Ok(())
}

fn shift_frozen(total: Mutez, delta: i64) -> Result<Mutez> {
    if delta >= 0 {
        Ok((total + Mutez(delta as u64))?)
    } else {
        Ok((total - Mutez((-delta) as u64))?)
    }
}

/// Remove accounts allocated by the reverted block, newest first so the
/// id sequence unwinds cleanly.
fn prune_created_accounts(cache: &mut Cache, level: i32) -> Result<()> {
    let mut created: Vec<AccountId> = cache
        .accounts
        .iter()
        .filter(|a| a.first_level == level)
        .map(|a| a.id)
        .collect();
    created.sort_unstable_by(|a, b| b.cmp(a));
    for id in created {
        cache.accounts.rollback_creation(id)?;
        cache.journal.push(WriteOp::DeleteAccount(id));
    }
    Ok(())
}
