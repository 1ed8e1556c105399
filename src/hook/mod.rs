//! The transaction processing hook.
//!
//! A host chain customizes the pipeline by installing one
//! [`TxProcessingHook`] on a [`BlockExecutor`]. Every method has an inert
//! default, and [`NoopHook`] overrides none of them: a pipeline running
//! [`NoopHook`] behaves exactly like an unextended one.
//!
//! Per transaction the pipeline calls, in order:
//! 1. [`start_tx`] before gas metering. May short-circuit execution.
//! 2. [`charge_gas`] after intrinsic gas is deducted. May only lower the
//!    remaining gas.
//! 3. [`push_caller`] and [`pop_caller`] around every message call.
//! 4. [`force_refund_gas`] and [`nonrefundable_gas`] during settlement.
//! 5. [`end_tx`] once the transaction is settled.
//! 6. [`fill_receipt_info`] once the receipt is built.
//! 7. [`scheduled_txs`] to collect follow-up transactions for the next block.
//! 8. [`unexpected_balance_delta`] to account for balance the hook created or
//!    destroyed.
//!
//! Per block, once the outcome is known, the pipeline calls either
//! [`block_committed`] after the block's state reaches the backing database,
//! or [`block_aborted`] if the block failed and nothing was committed.
//!
//! [`l1_block_number`], [`l1_block_hash`] and [`gas_price_op`] are queried by
//! the VM host whenever the corresponding opcode runs.
//!
//! [`BlockExecutor`]: crate::BlockExecutor
//! [`start_tx`]: TxProcessingHook::start_tx
//! [`charge_gas`]: TxProcessingHook::charge_gas
//! [`push_caller`]: TxProcessingHook::push_caller
//! [`pop_caller`]: TxProcessingHook::pop_caller
//! [`force_refund_gas`]: TxProcessingHook::force_refund_gas
//! [`nonrefundable_gas`]: TxProcessingHook::nonrefundable_gas
//! [`end_tx`]: TxProcessingHook::end_tx
//! [`fill_receipt_info`]: TxProcessingHook::fill_receipt_info
//! [`scheduled_txs`]: TxProcessingHook::scheduled_txs
//! [`unexpected_balance_delta`]: TxProcessingHook::unexpected_balance_delta
//! [`block_committed`]: TxProcessingHook::block_committed
//! [`block_aborted`]: TxProcessingHook::block_aborted
//! [`l1_block_number`]: TxProcessingHook::l1_block_number
//! [`l1_block_hash`]: TxProcessingHook::l1_block_hash
//! [`gas_price_op`]: TxProcessingHook::gas_price_op

mod bridge;
pub use bridge::{BridgeHook, BridgeHookConfig, ATTEMPTS_SLOT_TAG, PROCESSED_SLOT_TAG};

use crate::{
    fill::{BlockContext, TxContext},
    receipt::Receipt,
    state::StateAccess,
    tx::TxVariant,
    ExecError, HookError, RejectionError, StateError,
};
use alloy::primitives::{Address, Bytes, B256, I256, U256};

/// The decision of [`TxProcessingHook::start_tx`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartTx {
    /// Run the transaction through the VM.
    #[default]
    Continue,
    /// Settle the transaction immediately, without running the VM.
    ShortCircuit {
        /// Gas charged for the transaction.
        gas_used: u64,
        /// Return data of the transaction.
        output: Bytes,
    },
}

impl StartTx {
    /// True if the VM is skipped.
    pub const fn is_short_circuit(&self) -> bool {
        matches!(self, Self::ShortCircuit { .. })
    }
}

/// Hook into the transaction processing pipeline.
///
/// Implementations must be deterministic: every validating node runs the same
/// hook over the same inputs, and any divergence forks consensus. State that
/// must persist across transactions belongs in consensus state, reached
/// through the [`StateAccess`] handed to [`Self::start_tx`] and
/// [`Self::end_tx`].
pub trait TxProcessingHook {
    /// Called before gas metering begins.
    ///
    /// Writes made through `state` are discarded if the transaction is later
    /// rejected. A [`RejectionError`] rejects the transaction. Other errors
    /// abort the block.
    fn start_tx(
        &mut self,
        _tx: &TxVariant,
        _state: &mut dyn StateAccess,
    ) -> Result<StartTx, ExecError> {
        Ok(StartTx::Continue)
    }

    /// Adjust the gas remaining after intrinsic gas is deducted. The
    /// remaining gas may only decrease.
    fn charge_gas(
        &mut self,
        _tx: &TxVariant,
        _gas_remaining: &mut u64,
    ) -> Result<(), RejectionError> {
        Ok(())
    }

    /// Called when a message call is entered, with the caller of that call.
    fn push_caller(&mut self, _caller: Address) {}

    /// Called when a message call exits.
    fn pop_caller(&mut self) {}

    /// Gas refunded on top of the protocol refund.
    fn force_refund_gas(&self) -> u64 {
        0
    }

    /// Gas that is never refunded.
    fn nonrefundable_gas(&self) -> u64 {
        0
    }

    /// Called once the transaction is settled.
    fn end_tx(
        &mut self,
        _tx: &TxVariant,
        _total_gas_used: u64,
        _success: bool,
        _state: &mut dyn StateAccess,
    ) -> Result<(), StateError> {
        Ok(())
    }

    /// Follow-up transactions to include at the start of the next block.
    /// Drained on every call.
    fn scheduled_txs(&mut self) -> Vec<TxVariant> {
        Vec::new()
    }

    /// Net balance the hook created (positive) or destroyed (negative) during
    /// the current transaction, outside of value transfers and gas payment.
    fn unexpected_balance_delta(&self) -> I256 {
        I256::ZERO
    }

    /// Called after the block's state is committed to the backing database.
    /// Effects outside consensus state, such as side-store writes, should be
    /// held back until then.
    fn block_committed(&mut self) {}

    /// Called when a block fails and none of its state is committed.
    fn block_aborted(&mut self) {}

    /// The block number reported by the block-number opcode.
    fn l1_block_number(&self, block: &BlockContext) -> Result<u64, HookError> {
        Ok(block.number)
    }

    /// The hash reported by the block-hash opcode.
    fn l1_block_hash(&self, block: &BlockContext, number: u64) -> B256 {
        block.block_hash(number)
    }

    /// The price reported by the gas-price opcode.
    fn gas_price_op(&self, tx: &TxContext, _block: &BlockContext) -> U256 {
        tx.gas_price
    }

    /// Enrich the receipt after the standard fields are populated.
    fn fill_receipt_info(&self, _receipt: &mut Receipt) {}
}

/// A hook that changes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopHook;

impl TxProcessingHook for NoopHook {}

impl<H: TxProcessingHook + ?Sized> TxProcessingHook for Box<H> {
    fn start_tx(
        &mut self,
        tx: &TxVariant,
        state: &mut dyn StateAccess,
    ) -> Result<StartTx, ExecError> {
        H::start_tx(self, tx, state)
    }

    fn charge_gas(&mut self, tx: &TxVariant, gas_remaining: &mut u64) -> Result<(), RejectionError> {
        H::charge_gas(self, tx, gas_remaining)
    }

    fn push_caller(&mut self, caller: Address) {
        H::push_caller(self, caller)
    }

    fn pop_caller(&mut self) {
        H::pop_caller(self)
    }

    fn force_refund_gas(&self) -> u64 {
        H::force_refund_gas(self)
    }

    fn nonrefundable_gas(&self) -> u64 {
        H::nonrefundable_gas(self)
    }

    fn end_tx(
        &mut self,
        tx: &TxVariant,
        total_gas_used: u64,
        success: bool,
        state: &mut dyn StateAccess,
    ) -> Result<(), StateError> {
        H::end_tx(self, tx, total_gas_used, success, state)
    }

    fn scheduled_txs(&mut self) -> Vec<TxVariant> {
        H::scheduled_txs(self)
    }

    fn unexpected_balance_delta(&self) -> I256 {
        H::unexpected_balance_delta(self)
    }

    fn block_committed(&mut self) {
        H::block_committed(self)
    }

    fn block_aborted(&mut self) {
        H::block_aborted(self)
    }

    fn l1_block_number(&self, block: &BlockContext) -> Result<u64, HookError> {
        H::l1_block_number(self, block)
    }

    fn l1_block_hash(&self, block: &BlockContext, number: u64) -> B256 {
        H::l1_block_hash(self, block, number)
    }

    fn gas_price_op(&self, tx: &TxContext, block: &BlockContext) -> U256 {
        H::gas_price_op(self, tx, block)
    }

    fn fill_receipt_info(&self, receipt: &mut Receipt) {
        H::fill_receipt_info(self, receipt)
    }
}
