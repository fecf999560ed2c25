//! Deterministic block-processing engine of a Tezos-family indexer.
//!
//! The engine consumes parsed blocks, projects them into relational
//! entity rows held in an in-memory cache, and stages bulk writes for a
//! storage collaborator. Every commit has an exact inverse, so the head
//! block can always be rolled back to a bit-identical prior state.

pub mod address;
pub mod error;
pub mod ids;
pub mod value;

pub mod entity;
pub mod rawblock;

pub mod cache;
pub mod store;

pub mod rewards;
pub mod sampler;
pub mod snapshot;

pub mod activator;
pub mod commits;
pub mod pipeline;

pub use activator::{Activators, GenesisAccount, GenesisConfig};
pub use cache::Cache;
pub use error::{Error, Result, Severity};
pub use pipeline::ProtocolHandler;
pub use rawblock::RawBlock;
pub use store::WriteOp;
pub use value::Mutez;
