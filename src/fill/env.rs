use crate::gas::RefundPolicy;
use alloy::primitives::{Address, ChainId, B256, U256};
use std::collections::BTreeMap;

/// Number of ancestors visible to the block-hash opcode.
pub const BLOCK_HASH_HISTORY: u64 = 256;

/// Chain-wide configuration of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainCfg {
    /// The chain id transactions must carry.
    pub chain_id: ChainId,
    /// The refund cap.
    pub refund_policy: RefundPolicy,
    /// Skip the fee cap against base fee check, and charge no base fee.
    pub disable_base_fee: bool,
}

impl Default for ChainCfg {
    fn default() -> Self {
        Self { chain_id: 1, refund_policy: RefundPolicy::London, disable_base_fee: false }
    }
}

/// The L1 block an L2 block was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct L1Origin {
    /// The L1 block number.
    pub number: u64,
    /// Recent L1 block hashes by number.
    pub hashes: BTreeMap<u64, B256>,
}

impl L1Origin {
    /// Hash of an L1 ancestor, with block-hash opcode visibility rules.
    pub fn block_hash(&self, number: u64) -> B256 {
        lookup_hash(&self.hashes, self.number, number)
    }
}

/// The block the pipeline executes in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockContext {
    /// The block number.
    pub number: u64,
    /// The block timestamp.
    pub timestamp: u64,
    /// Recipient of priority fees.
    pub beneficiary: Address,
    /// The base fee per gas.
    pub base_fee: u64,
    /// The block gas limit.
    pub gas_limit: u64,
    /// Recent block hashes by number.
    pub block_hashes: BTreeMap<u64, B256>,
    /// The L1 origin, if this chain is derived from one.
    pub l1_origin: Option<L1Origin>,
}

impl BlockContext {
    /// Hash of an ancestor, with block-hash opcode visibility rules: only the
    /// [`BLOCK_HASH_HISTORY`] blocks before this one are visible, anything
    /// else is zero.
    pub fn block_hash(&self, number: u64) -> B256 {
        lookup_hash(&self.block_hashes, self.number, number)
    }
}

fn lookup_hash(hashes: &BTreeMap<u64, B256>, current: u64, number: u64) -> B256 {
    if number >= current || current - number > BLOCK_HASH_HISTORY {
        return B256::ZERO;
    }
    hashes.get(&number).copied().unwrap_or_default()
}

/// The transaction-scoped environment visible to the VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxContext {
    /// The transaction sender.
    pub origin: Address,
    /// The effective gas price.
    pub gas_price: U256,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_visibility() {
        let mut block = BlockContext { number: 300, ..Default::default() };
        for n in 0..300 {
            block.block_hashes.insert(n, B256::with_last_byte(n as u8));
        }
        assert_eq!(block.block_hash(299), B256::with_last_byte(299u64 as u8));
        assert_eq!(block.block_hash(44), B256::with_last_byte(44));
        assert_eq!(block.block_hash(43), B256::ZERO);
        assert_eq!(block.block_hash(300), B256::ZERO);
        assert_eq!(block.block_hash(1_000), B256::ZERO);
    }
}
