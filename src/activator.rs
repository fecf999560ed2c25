//! Protocol version strategies and chain bootstrap.
//!
//! Each supported protocol family is a strategy: the behavioral flags
//! it hands the pipeline, how it derives its constant set from the
//! previous protocol's, and the migration it runs on activation. The
//! registry resolves the strategy for a header's `proto` counter by
//! taking the newest strategy at or below it, so a version without its
//! own entry inherits the closest older behavior.

use crate::cache::Cache;
use crate::entity::{AccountKind, Protocol, ProtoConstants};
use crate::error::{Error, Result};
use crate::ids::ProtoCode;
use crate::pipeline::context::{credit, BlockContext, ProtoFlags, RevertContext};
use crate::pipeline::cycles;
use crate::rewards::{
    expected_attestation_rewards, expected_block_rewards, AttestationRewardMode,
};
use crate::sampler::evolve_seed;
use crate::snapshot::{build_cycle, genesis_distribution};
use crate::store::WriteOp;
use crate::value::Mutez;
use crate::address::Address;

pub trait ProtoActivator {
    /// Smallest header `proto` counter this strategy covers.
    fn proto(&self) -> u32;

    fn flags(&self) -> ProtoFlags;

    /// Constant set of a freshly activated protocol, derived from the
    /// previous protocol's.
    fn constants(&self, prev: &ProtoConstants) -> ProtoConstants {
        prev.clone()
    }

    /// One-shot state migration on activation.
    fn migrate(&self, _ctx: &mut BlockContext) -> Result<()> {
        Ok(())
    }

    fn revert_migration(
        &self,
        _rctx: &mut RevertContext,
        _prev: &Protocol,
        _prev_flags: &ProtoFlags,
    ) -> Result<()> {
        Ok(())
    }
}

/// The Athens-era baseline: per-operation endorsement rewards with the
/// round discount, no bonus, no deposit automation.
struct Proto1;

impl ProtoActivator for Proto1 {
    fn proto(&self) -> u32 {
        0
    }

    fn flags(&self) -> ProtoFlags {
        ProtoFlags {
            reward_mode: AttestationRewardMode::PerOperation,
            max_reward_basis: false,
            fixed_rewards: false,
            autostaking: false,
        }
    }
}

/// Granada: halved block times, doubled cycles, liquidity baking.
struct Proto10;

impl ProtoActivator for Proto10 {
    fn proto(&self) -> u32 {
        10
    }

    fn flags(&self) -> ProtoFlags {
        Proto1.flags()
    }

    fn constants(&self, prev: &ProtoConstants) -> ProtoConstants {
        let mut c = prev.clone();
        c.blocks_per_cycle *= 2;
        c.snapshots_per_cycle *= 2;
        c.blocks_per_voting_period *= 2;
        c.time_between_blocks /= 2;
        c.block_reward = Mutez(c.block_reward.0 / 2);
        c.attestation_reward_per_slot = Mutez(c.attestation_reward_per_slot.0 / 2);
        c
    }
}

/// Ithaca: fixed block rewards with an inclusion bonus, attestation
/// rewards settled once per cycle, percentage-based frozen deposits.
struct Proto12;

impl ProtoActivator for Proto12 {
    fn proto(&self) -> u32 {
        12
    }

    fn flags(&self) -> ProtoFlags {
        ProtoFlags {
            reward_mode: AttestationRewardMode::CycleEnd,
            max_reward_basis: true,
            fixed_rewards: true,
            autostaking: false,
        }
    }

    fn migrate(&self, ctx: &mut BlockContext) -> Result<()> {
        reprice_future_rewards(
            ctx.cache,
            ctx.block.cycle,
            &ctx.proto.constants,
            self.flags().max_reward_basis,
        )
    }

    fn revert_migration(
        &self,
        rctx: &mut RevertContext,
        prev: &Protocol,
        prev_flags: &ProtoFlags,
    ) -> Result<()> {
        reprice_future_rewards(
            rctx.cache,
            rctx.block.cycle,
            &prev.constants,
            prev_flags.max_reward_basis,
        )
    }
}

/// Oxford: the staking pseudo-operations plus automatic deposit
/// adjustment at cycle end.
struct Proto18;

impl ProtoActivator for Proto18 {
    fn proto(&self) -> u32 {
        18
    }

    fn flags(&self) -> ProtoFlags {
        ProtoFlags {
            autostaking: true,
            ..Proto12.flags()
        }
    }
}

/// Re-price the not-yet-realized reward expectations of the current and
/// all future cycles under a new reward scheme. Realized figures stay
/// untouched.
fn reprice_future_rewards(
    cache: &mut Cache,
    from_cycle: i32,
    constants: &ProtoConstants,
    max_basis: bool,
) -> Result<()> {
    let keys: Vec<(i32, crate::ids::AccountId)> = cache
        .baker_cycles
        .keys()
        .filter(|(cycle, _)| *cycle >= from_cycle)
        .copied()
        .collect();
    for (cycle, baker) in keys {
        let bc = cache.baker_cycle_mut(cycle, baker);
        bc.future_block_rewards = expected_block_rewards(constants, bc.future_blocks, max_basis);
        bc.future_attestation_rewards =
            expected_attestation_rewards(constants, bc.future_attestations);
    }
    Ok(())
}

/// Ordered strategy registry.
pub struct Activators {
    strategies: Vec<Box<dyn ProtoActivator + Send + Sync>>,
}

impl Activators {
    pub fn standard() -> Self {
        Activators {
            strategies: vec![
                Box::new(Proto1),
                Box::new(Proto10),
                Box::new(Proto12),
                Box::new(Proto18),
            ],
        }
    }

    /// Newest strategy at or below the header's proto counter.
    pub fn resolve(&self, proto: u32) -> &dyn ProtoActivator {
        self.strategies
            .iter()
            .rev()
            .find(|s| s.proto() <= proto)
            .map(|s| s.as_ref())
            .expect("registry always carries the baseline strategy")
    }
}

impl Default for Activators {
    fn default() -> Self {
        Activators::standard()
    }
}

/// One account of the genesis distribution.
pub struct GenesisAccount {
    pub address: Address,
    pub balance: Mutez,
    /// Registered baker at genesis.
    pub baker: bool,
    /// Delegation link of a non-baker account.
    pub delegate: Option<Address>,
}

/// Everything needed to bootstrap an empty cache to a processable
/// state: the genesis block identity, the initial constant set, the
/// stake distribution and the seed of cycle 0.
pub struct GenesisConfig {
    pub hash: String,
    pub protocol_hash: String,
    pub timestamp: i64,
    pub constants: ProtoConstants,
    pub accounts: Vec<GenesisAccount>,
    pub seed: [u8; 32],
}

/// Bootstrap the cache: genesis accounts and block, the version-0
/// protocol row, the first voting period and the first
/// `preserved_cycles + 1` cycles sampled from the genesis distribution.
pub fn bootstrap(cache: &mut Cache, activators: &Activators, config: &GenesisConfig) -> Result<()> {
    if cache.head().is_some() {
        return Err(Error::inconsistent("bootstrap over a non-empty cache"));
    }

    let proto = Protocol {
        code: ProtoCode(0),
        hash: config.protocol_hash.clone(),
        first_level: 0,
        last_level: None,
        first_cycle: 0,
        first_cycle_level: 1,
        constants: config.constants.clone(),
    };

    // bakers first so delegation links resolve
    let mut minted = Mutez::zero();
    for acct in config.accounts.iter().filter(|a| a.baker) {
        let id = cache
            .accounts
            .create(acct.address.clone(), AccountKind::Delegate, 0);
        {
            let row = cache.accounts.get_mut(id)?;
            row.activation_level = Some(0);
        }
        credit(cache, id, acct.balance)?;
        minted = (minted + acct.balance)?;
        cache.journal.push(WriteOp::UpsertAccount(id));
    }
    for acct in config.accounts.iter().filter(|a| !a.baker) {
        let id = cache
            .accounts
            .create(acct.address.clone(), AccountKind::User, 0);
        if let Some(delegate_addr) = &acct.delegate {
            let delegate = cache.accounts.id_of(delegate_addr)?;
            {
                let row = cache.accounts.get_mut(id)?;
                row.delegate = Some(delegate);
                row.delegation_level = Some(0);
            }
            let row = cache.accounts.get_mut(delegate)?;
            row.delegators_count += 1;
            cache.journal.push(WriteOp::UpsertAccount(delegate));
        }
        credit(cache, id, acct.balance)?;
        minted = (minted + acct.balance)?;
        cache.journal.push(WriteOp::UpsertAccount(id));
    }

    let block = crate::entity::Block::genesis(
        config.hash.clone(),
        config.protocol_hash.clone(),
        config.timestamp,
    );
    cache.journal.push(WriteOp::InsertBlock { level: 0 });
    cache.blocks.insert(0, block);

    let mut stats = crate::entity::Statistics::zero();
    stats.total_minted = minted;
    cache.journal.push(WriteOp::UpsertStatistics { level: 0 });
    cache.statistics.insert(0, stats);

    cache
        .voting
        .start_first_period(proto.first_cycle_level, proto.constants.blocks_per_voting_period);
    cache.journal.push(WriteOp::UpsertVotingPeriod { index: 0 });

    cache.journal.push(WriteOp::UpsertProtocol(proto.code));
    cache.protocols.insert(proto.code, proto.clone());

    let flags = activators.resolve(0).flags();
    let rows = genesis_distribution(cache);
    let mut seed = config.seed;
    for index in 0..=proto.constants.preserved_cycles {
        if index > 0 {
            seed = evolve_seed(&seed, index);
        }
        let fc = build_cycle(cache, &proto, index, None, seed, &rows)?;
        cycles::load_future_cycle(cache, &proto, &flags, fc)?;
    }
    Ok(())
}
