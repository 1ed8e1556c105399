use crate::tx::{TxType, TxVariant};
use alloy::{
    consensus::Receipt as ConsensusReceipt,
    primitives::{Address, Log, B256},
};
use revm::context::result::{ExecutionResult, Output};

/// The receipt of an included transaction.
///
/// Wraps the consensus receipt with the fields the pipeline and the hook
/// populate. [`TxProcessingHook::fill_receipt_info`] runs after every
/// standard field is set.
///
/// [`TxProcessingHook::fill_receipt_info`]: crate::TxProcessingHook::fill_receipt_info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The envelope type of the transaction.
    pub tx_type: TxType,
    /// The transaction hash.
    pub tx_hash: B256,
    /// Status, cumulative gas and logs.
    pub inner: ConsensusReceipt<Log>,
    /// Gas charged to this transaction, after refunds.
    pub gas_used: u64,
    /// Price paid per gas.
    pub effective_gas_price: u128,
    /// Address of the created contract, if any.
    pub contract_address: Option<Address>,
    /// Gas reserved for L1 data posting.
    pub gas_used_for_l1: u64,
    /// The L1 block number the transaction executed against.
    pub l1_block_number: Option<u64>,
    /// The L1 request settled by this transaction.
    pub request_id: Option<B256>,
}

impl Receipt {
    /// Create a receipt from an execution result.
    pub fn from_result(
        tx: &TxVariant,
        tx_hash: B256,
        result: &ExecutionResult,
        effective_gas_price: u128,
        prior_gas_used: u64,
    ) -> Self {
        let gas_used = result.gas_used();
        let contract_address = match result {
            ExecutionResult::Success { output: Output::Create(_, address), .. } => *address,
            _ => None,
        };
        Self {
            tx_type: tx.tx_type(),
            tx_hash,
            inner: ConsensusReceipt {
                status: result.is_success().into(),
                cumulative_gas_used: prior_gas_used.saturating_add(gas_used),
                logs: result.logs().to_vec(),
            },
            gas_used,
            effective_gas_price,
            contract_address,
            gas_used_for_l1: 0,
            l1_block_number: None,
            request_id: tx.request_id(),
        }
    }

    /// True if the transaction succeeded.
    pub fn is_success(&self) -> bool {
        self.inner.status.coerce_status()
    }

    /// Cumulative gas used in the block up to and including this
    /// transaction.
    pub const fn cumulative_gas_used(&self) -> u64 {
        self.inner.cumulative_gas_used
    }

    /// Logs emitted by the transaction.
    pub fn logs(&self) -> &[Log] {
        &self.inner.logs
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tx::UnsignedBridgeTx;
    use alloy::primitives::{Bytes, LogData};
    use revm::context::result::SuccessReason;

    #[test]
    fn from_success() {
        let tx = TxVariant::UnsignedBridge(UnsignedBridgeTx::default());
        let created = Address::repeat_byte(5);
        let log = Log { address: created, data: LogData::new_unchecked(vec![], Bytes::new()) };
        let result = ExecutionResult::Success {
            reason: SuccessReason::Return,
            gas_used: 30_000,
            gas_refunded: 0,
            logs: vec![log],
            output: Output::Create(Bytes::new(), Some(created)),
        };
        let receipt = Receipt::from_result(&tx, tx.hash(), &result, 7, 21_000);
        assert!(receipt.is_success());
        assert_eq!(receipt.cumulative_gas_used(), 51_000);
        assert_eq!(receipt.gas_used, 30_000);
        assert_eq!(receipt.contract_address, Some(created));
        assert_eq!(receipt.logs().len(), 1);
        assert_eq!(receipt.tx_type, TxType::UnsignedBridge);
    }

    #[test]
    fn from_revert() {
        let tx = TxVariant::UnsignedBridge(UnsignedBridgeTx::default());
        let result = ExecutionResult::Revert { gas_used: 25_000, output: Bytes::new() };
        let receipt = Receipt::from_result(&tx, tx.hash(), &result, 7, 0);
        assert!(!receipt.is_success());
        assert_eq!(receipt.cumulative_gas_used(), 25_000);
        assert_eq!(receipt.contract_address, None);
    }
}
