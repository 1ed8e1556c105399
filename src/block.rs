use crate::{
    exec::TxOutcome, program::RecordedProgram, receipt::Receipt, tx::TxVariant, RejectionError,
};
use alloy::primitives::{Address, B256, I256};
use std::collections::BTreeMap;

/// A candidate transaction excluded from a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTx {
    /// Hash of the excluded transaction.
    pub tx_hash: B256,
    /// Why it was excluded.
    pub reason: RejectionError,
}

/// Transactions scheduled by the hook during a block, to be appended to the
/// candidates of the next block.
///
/// The queue is consumed exactly once, by [`Self::into_candidates`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "scheduled transactions are lost unless included in the next block"]
pub struct ScheduledTxs(Vec<TxVariant>);

impl ScheduledTxs {
    /// True if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of scheduled transactions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The scheduled transactions, in schedule order.
    pub fn as_slice(&self) -> &[TxVariant] {
        &self.0
    }

    /// The candidate list of the next block: `pool`, followed by the
    /// scheduled transactions in schedule order.
    pub fn into_candidates(self, pool: impl IntoIterator<Item = TxVariant>) -> Vec<TxVariant> {
        let mut candidates: Vec<_> = pool.into_iter().collect();
        candidates.extend(self.0);
        candidates
    }
}

impl From<Vec<TxVariant>> for ScheduledTxs {
    fn from(txs: Vec<TxVariant>) -> Self {
        Self(txs)
    }
}

impl Extend<TxVariant> for ScheduledTxs {
    fn extend<I: IntoIterator<Item = TxVariant>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

/// Information externalized during block execution.
#[derive(Debug, Clone, Default)]
pub struct BlockOutput {
    /// The receipts of the included transactions, in order.
    receipts: Vec<Receipt>,
    /// The cumulative gas used in the block.
    cumulative_gas_used: u64,
    /// The senders of the included transactions, in order.
    senders: Vec<Address>,
    /// Candidates excluded from the block.
    rejected: Vec<RejectedTx>,
    /// Transactions scheduled for the next block.
    scheduled: ScheduledTxs,
    /// Alternate programs invoked during the block.
    programs: BTreeMap<(u32, Address), RecordedProgram>,
    /// Balance created or destroyed by the hook during the block.
    unexpected_balance_delta: I256,
}

impl BlockOutput {
    /// Create a new block output with memory allocated to hold `capacity`
    /// transaction outcomes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            receipts: Vec::with_capacity(capacity),
            senders: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Returns the receipts of the included transactions.
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Returns the cumulative gas used in the block.
    pub const fn cumulative_gas_used(&self) -> u64 {
        self.cumulative_gas_used
    }

    /// Returns the senders of the included transactions.
    pub fn senders(&self) -> &[Address] {
        &self.senders
    }

    /// Returns the excluded candidates.
    pub fn rejected(&self) -> &[RejectedTx] {
        &self.rejected
    }

    /// Returns the transactions scheduled for the next block.
    pub fn scheduled(&self) -> &[TxVariant] {
        self.scheduled.as_slice()
    }

    /// Returns the alternate programs invoked during the block, keyed by
    /// `(version, address)`.
    pub const fn programs(&self) -> &BTreeMap<(u32, Address), RecordedProgram> {
        &self.programs
    }

    /// Returns the net balance created (positive) or destroyed (negative) by
    /// the hook across the included transactions, such as minted deposits.
    pub const fn unexpected_balance_delta(&self) -> I256 {
        self.unexpected_balance_delta
    }

    /// Take the scheduled transactions, leaving none behind.
    pub fn take_scheduled(&mut self) -> ScheduledTxs {
        core::mem::take(&mut self.scheduled)
    }

    /// Consume the output, returning the scheduled transactions.
    pub fn into_scheduled(self) -> ScheduledTxs {
        self.scheduled
    }

    /// Record an included transaction.
    pub(crate) fn push_outcome(&mut self, outcome: TxOutcome) {
        self.cumulative_gas_used = outcome.receipt.cumulative_gas_used();
        self.senders.push(outcome.sender);
        self.receipts.push(outcome.receipt);
        self.scheduled.extend(outcome.scheduled);
        for (key, program) in outcome.programs {
            self.programs.entry(key).or_insert(program);
        }
        self.unexpected_balance_delta =
            self.unexpected_balance_delta.saturating_add(outcome.unexpected_balance_delta);
    }

    /// Record an excluded candidate.
    pub(crate) fn push_rejected(&mut self, rejected: RejectedTx) {
        self.rejected.push(rejected);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tx::DepositTx;

    fn deposit(id: u8) -> TxVariant {
        DepositTx { chain_id: 1, l1_request_id: B256::repeat_byte(id), ..Default::default() }
            .into()
    }

    #[test]
    fn scheduled_follow_pool() {
        let mut scheduled = ScheduledTxs::default();
        scheduled.extend([deposit(1), deposit(2)]);
        assert_eq!(scheduled.len(), 2);

        let candidates = scheduled.into_candidates([deposit(3)]);
        assert_eq!(candidates, vec![deposit(3), deposit(1), deposit(2)]);
    }

    #[test]
    fn take_scheduled_drains() {
        let mut output = BlockOutput::with_capacity(1);
        output.scheduled.extend([deposit(1)]);
        assert_eq!(output.take_scheduled().len(), 1);
        assert!(output.scheduled().is_empty());
        assert!(output.take_scheduled().is_empty());
    }
}
