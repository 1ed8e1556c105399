//! Helpers for the extended chain's block range.

use alloy::eips::BlockNumberOrTag;

/// Resolve a requested block against the chain head and the first block
/// executed with the bridging pipeline.
///
/// Returns `(resolved, head)`. Latest, pending, safe and finalized resolve to
/// the head. Numbers above the head are clipped to the head and numbers below
/// `genesis` are raised to `genesis`.
pub fn clip_to_genesis(requested: BlockNumberOrTag, head: u64, genesis: u64) -> (u64, u64) {
    let number = match requested {
        BlockNumberOrTag::Number(number) => number.min(head),
        BlockNumberOrTag::Earliest => 0,
        BlockNumberOrTag::Latest
        | BlockNumberOrTag::Pending
        | BlockNumberOrTag::Safe
        | BlockNumberOrTag::Finalized => head,
    };
    (number.max(genesis), head)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clipping() {
        assert_eq!(clip_to_genesis(BlockNumberOrTag::Latest, 100, 10), (100, 100));
        assert_eq!(clip_to_genesis(BlockNumberOrTag::Pending, 100, 10), (100, 100));
        assert_eq!(clip_to_genesis(BlockNumberOrTag::Number(50), 100, 10), (50, 100));
        assert_eq!(clip_to_genesis(BlockNumberOrTag::Number(500), 100, 10), (100, 100));
        assert_eq!(clip_to_genesis(BlockNumberOrTag::Number(3), 100, 10), (10, 100));
        assert_eq!(clip_to_genesis(BlockNumberOrTag::Earliest, 100, 10), (10, 100));
    }
}
