//! Pre-commit validation of an incoming block against the cached head.
//!
//! Chain-linkage failures are uncertain rejections: the fetched block
//! may simply be stale after a reorg and can be retried against a fresh
//! head. A timestamp violation on a correctly linked block cannot be
//! fixed by refetching and rejects with certainty.

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::rawblock::RawBlock;

pub fn validate(cache: &Cache, block: &RawBlock) -> Result<()> {
    let head = cache
        .head()
        .ok_or_else(|| Error::inconsistent("no head block; bootstrap has not run"))?;
    let level = block.level();

    if level != head.level + 1 {
        return Err(Error::maybe_stale(
            level,
            format!("expected level {}, head is {}", head.level + 1, head.level),
        ));
    }
    if block.header.predecessor != head.hash {
        return Err(Error::maybe_stale(
            level,
            format!(
                "predecessor {} does not match head {}",
                block.header.predecessor, head.hash
            ),
        ));
    }
    if block.header.timestamp <= head.timestamp {
        return Err(Error::validation(
            level,
            format!(
                "timestamp {} not after head timestamp {}",
                block.header.timestamp, head.timestamp
            ),
        ));
    }

    let current = cache.current_protocol()?;
    if block.header.proto < current.code.0 {
        return Err(Error::ProtocolDowngrade {
            from: current.code.0,
            to: block.header.proto,
        });
    }
    if block.metadata.baker.is_none() {
        return Err(Error::validation(level, "block metadata carries no baker"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Block;
    use crate::error::Severity;
    use serde_json::json;

    fn block_at(level: i32, predecessor: &str, timestamp: i64) -> RawBlock {
        RawBlock::from_value(json!({
            "hash": format!("BK{}", level),
            "header": {
                "level": level,
                "proto": 1,
                "predecessor": predecessor,
                "timestamp": timestamp
            },
            "metadata": {
                "protocol": "PtAlpha1",
                "next_protocol": "PtAlpha1",
                "baker": "tz1baker"
            },
            "operations": [[], [], [], []]
        }))
        .unwrap()
    }

    fn cache_with_head() -> Cache {
        let mut cache = Cache::new();
        let mut head = Block::genesis("BK0".into(), "PtAlpha1".into(), 1000);
        head.proto = crate::ids::ProtoCode(1);
        cache.blocks.insert(0, head);
        cache.protocols.insert(
            crate::ids::ProtoCode(1),
            crate::entity::Protocol {
                code: crate::ids::ProtoCode(1),
                hash: "PtAlpha1".into(),
                first_level: 1,
                last_level: None,
                first_cycle: 0,
                first_cycle_level: 1,
                constants: crate::entity::protocol::tests::constants(),
            },
        );
        cache
    }

    #[test]
    fn wrong_level_is_retryable() {
        let cache = cache_with_head();
        let err = validate(&cache, &block_at(5, "BK0", 2000)).unwrap_err();
        assert_eq!(err.severity(), Severity::Rejected { certain: false });
    }

    #[test]
    fn wrong_predecessor_is_retryable() {
        let cache = cache_with_head();
        let err = validate(&cache, &block_at(1, "BKother", 2000)).unwrap_err();
        assert_eq!(err.severity(), Severity::Rejected { certain: false });
    }

    #[test]
    fn stale_timestamp_rejects_with_certainty() {
        let cache = cache_with_head();
        let err = validate(&cache, &block_at(1, "BK0", 1000)).unwrap_err();
        assert_eq!(err.severity(), Severity::Rejected { certain: true });
    }

    #[test]
    fn linked_block_passes() {
        let cache = cache_with_head();
        assert!(validate(&cache, &block_at(1, "BK0", 2000)).is_ok());
    }
}
