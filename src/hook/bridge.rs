use super::{StartTx, TxProcessingHook};
use crate::{
    fill::{BlockContext, TxContext},
    receipt::Receipt,
    side_store::{KeyValueStore, SideStoreProvider},
    state::StateAccess,
    tx::{TxVariant, DEPOSIT_SENDER},
    ExecError, HookError, RejectionError, StateError,
};
use alloy::primitives::{keccak256, Address, Bytes, B256, I256, U256};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Storage slot tag of the processed marker of an L1 request.
pub const PROCESSED_SLOT_TAG: u8 = 0;

/// Storage slot tag of the retry counter of an L1 request.
pub const ATTEMPTS_SLOT_TAG: u8 = 1;

/// Key prefix of the request index in the side store.
const REQUEST_INDEX_PREFIX: &[u8] = b"bridge/request/";

/// Configuration of the [`BridgeHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeHookConfig {
    /// Gas reserved per calldata byte of a signed transaction, paying for
    /// posting the transaction to L1.
    pub posting_gas_per_byte: u64,
    /// Maximum number of times a failed contract-triggered request is
    /// retried.
    pub max_retries: u64,
    /// The account whose storage holds request bookkeeping.
    pub system_account: Address,
}

impl Default for BridgeHookConfig {
    fn default() -> Self {
        Self { posting_gas_per_byte: 16, max_retries: 3, system_account: DEPOSIT_SENDER }
    }
}

/// Reference hook for a chain bridged to an L1.
///
/// - Deposits are minted in [`TxProcessingHook::start_tx`] and settle without
///   running the VM.
/// - Deposits and contract-triggered requests are processed at most once per
///   request id. Duplicates are rejected by the hook.
/// - A failed contract-triggered request is scheduled for retry in the next
///   block, up to [`BridgeHookConfig::max_retries`] times.
/// - Signed transactions reserve L1 posting gas.
/// - The block-number and block-hash opcodes see the L1 origin.
/// - The gas-price opcode sees the base fee.
///
/// Request bookkeeping lives in the storage of
/// [`BridgeHookConfig::system_account`]. A side store, if bound, receives a
/// `request id -> tx hash` index that consensus never reads. Index entries
/// are buffered until the block commits, and dropped if it aborts.
#[derive(Debug, Default)]
pub struct BridgeHook {
    config: BridgeHookConfig,
    side_store: Option<Arc<dyn KeyValueStore>>,

    posting_gas: u64,
    minted: I256,
    callers: Vec<Address>,
    scheduled: Vec<TxVariant>,
    pending_index: Vec<(B256, B256)>,
}

/// Storage slot of a request's bookkeeping field.
fn request_slot(request_id: B256, tag: u8) -> U256 {
    let mut buf = [0u8; 33];
    buf[..32].copy_from_slice(request_id.as_slice());
    buf[32] = tag;
    U256::from_be_bytes(keccak256(buf).0)
}

impl BridgeHook {
    /// Instantiate a hook with the given configuration.
    pub fn new(config: BridgeHookConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Use the side store bound to `provider`, if any.
    pub fn with_side_store_from<P: SideStoreProvider + ?Sized>(mut self, provider: &P) -> Self {
        match provider.side_store() {
            Ok(store) => self.side_store = Some(store),
            Err(error) => debug!(%error, "no side store, request index disabled"),
        }
        self
    }

    /// Get the configuration.
    pub const fn config(&self) -> &BridgeHookConfig {
        &self.config
    }

    /// The caller of the innermost running message call.
    pub fn current_caller(&self) -> Option<Address> {
        self.callers.last().copied()
    }

    /// True if the request has been processed.
    pub fn is_processed(
        &self,
        state: &dyn StateAccess,
        request_id: B256,
    ) -> Result<bool, StateError> {
        let slot = request_slot(request_id, PROCESSED_SLOT_TAG);
        Ok(!state.storage(self.config.system_account, slot)?.is_zero())
    }

    /// Number of retries already scheduled for the request.
    pub fn attempts(&self, state: &dyn StateAccess, request_id: B256) -> Result<u64, StateError> {
        let slot = request_slot(request_id, ATTEMPTS_SLOT_TAG);
        Ok(state.storage(self.config.system_account, slot)?.saturating_to())
    }

    /// Look up the hash of the transaction that settled a request in the
    /// side store.
    pub fn indexed_tx(&self, request_id: B256) -> Option<B256> {
        let store = self.side_store.as_ref()?;
        let key = [REQUEST_INDEX_PREFIX, request_id.as_slice()].concat();
        match store.get(&key) {
            Ok(Some(value)) if value.len() == 32 => Some(B256::from_slice(&value)),
            Ok(_) => None,
            Err(error) => {
                warn!(%error, %request_id, "request index read failed");
                None
            }
        }
    }

    fn mark_processed(
        &self,
        state: &mut dyn StateAccess,
        request_id: B256,
        processed: bool,
    ) -> Result<(), StateError> {
        let slot = request_slot(request_id, PROCESSED_SLOT_TAG);
        state.set_storage(self.config.system_account, slot, U256::from(processed as u8))
    }

    fn claim_request(
        &self,
        state: &mut dyn StateAccess,
        request_id: B256,
    ) -> Result<(), ExecError> {
        if self.is_processed(state, request_id)? {
            return Err(RejectionError::hook(format!("request {request_id} already processed"))
                .into());
        }
        self.mark_processed(state, request_id, true)?;
        Ok(())
    }

    fn index_request(&mut self, request_id: B256, tx_hash: B256) {
        if self.side_store.is_some() {
            self.pending_index.push((request_id, tx_hash));
        }
    }
}

impl TxProcessingHook for BridgeHook {
    fn start_tx(
        &mut self,
        tx: &TxVariant,
        state: &mut dyn StateAccess,
    ) -> Result<StartTx, ExecError> {
        self.posting_gas = 0;
        self.minted = I256::ZERO;
        self.callers.clear();

        match tx {
            TxVariant::Deposit(deposit) => {
                self.claim_request(state, deposit.l1_request_id)?;
                state.add_balance(deposit.to, deposit.value)?;
                self.minted = I256::try_from(deposit.value).unwrap_or(I256::MAX);
                debug!(to = %deposit.to, value = %deposit.value, "minted deposit");
                Ok(StartTx::ShortCircuit { gas_used: 0, output: Bytes::new() })
            }
            TxVariant::ContractTriggered(triggered) => {
                self.claim_request(state, triggered.request_id)?;
                Ok(StartTx::Continue)
            }
            TxVariant::Legacy(_)
            | TxVariant::Eip2930(_)
            | TxVariant::Eip1559(_)
            | TxVariant::UnsignedBridge(_) => Ok(StartTx::Continue),
        }
    }

    fn charge_gas(&mut self, tx: &TxVariant, gas_remaining: &mut u64) -> Result<(), RejectionError> {
        if tx.is_fake() {
            return Ok(());
        }
        let posting =
            self.config.posting_gas_per_byte.saturating_mul(tx.input().len() as u64);
        if *gas_remaining < posting {
            return Err(RejectionError::hook(format!(
                "insufficient gas for L1 posting: {} remaining, {posting} required",
                *gas_remaining
            )));
        }
        *gas_remaining -= posting;
        self.posting_gas = posting;
        Ok(())
    }

    fn push_caller(&mut self, caller: Address) {
        self.callers.push(caller);
    }

    fn pop_caller(&mut self) {
        self.callers.pop();
    }

    fn nonrefundable_gas(&self) -> u64 {
        self.posting_gas
    }

    fn end_tx(
        &mut self,
        tx: &TxVariant,
        total_gas_used: u64,
        success: bool,
        state: &mut dyn StateAccess,
    ) -> Result<(), StateError> {
        let Some(request_id) = tx.request_id() else { return Ok(()) };

        if let TxVariant::ContractTriggered(triggered) = tx {
            if !success {
                let attempts = self.attempts(state, request_id)?;
                if attempts < self.config.max_retries {
                    let slot = request_slot(request_id, ATTEMPTS_SLOT_TAG);
                    state.set_storage(
                        self.config.system_account,
                        slot,
                        U256::from(attempts + 1),
                    )?;
                    self.mark_processed(state, request_id, false)?;
                    self.scheduled.push(TxVariant::ContractTriggered(triggered.clone()));
                    debug!(%request_id, attempt = attempts + 1, "scheduled retry");
                    return Ok(());
                }
                debug!(%request_id, attempts, "retries exhausted");
            }
        }

        trace!(%request_id, total_gas_used, success, "request settled");
        self.index_request(request_id, tx.hash());
        Ok(())
    }

    fn scheduled_txs(&mut self) -> Vec<TxVariant> {
        core::mem::take(&mut self.scheduled)
    }

    fn unexpected_balance_delta(&self) -> I256 {
        self.minted
    }

    fn block_committed(&mut self) {
        let pending = core::mem::take(&mut self.pending_index);
        let Some(store) = &self.side_store else { return };
        for (request_id, tx_hash) in pending {
            let key = [REQUEST_INDEX_PREFIX, request_id.as_slice()].concat();
            if let Err(error) = store.put(&key, tx_hash.as_slice()) {
                warn!(%error, %request_id, "request index write failed");
            }
        }
    }

    fn block_aborted(&mut self) {
        if !self.pending_index.is_empty() {
            debug!(dropped = self.pending_index.len(), "dropping request index entries");
        }
        self.pending_index.clear();
        self.scheduled.clear();
    }

    fn l1_block_number(&self, block: &BlockContext) -> Result<u64, HookError> {
        block.l1_origin.as_ref().map(|o| o.number).ok_or(HookError::MissingL1Origin(block.number))
    }

    fn l1_block_hash(&self, block: &BlockContext, number: u64) -> B256 {
        block.l1_origin.as_ref().map(|o| o.block_hash(number)).unwrap_or_default()
    }

    fn gas_price_op(&self, _tx: &TxContext, block: &BlockContext) -> U256 {
        U256::from(block.base_fee)
    }

    fn fill_receipt_info(&self, receipt: &mut Receipt) {
        receipt.gas_used_for_l1 = self.posting_gas;
    }
}
