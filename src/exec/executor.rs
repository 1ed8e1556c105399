use super::{CallOutcome, CallStatus, EnterOutcome, ExecutionContext, Host, Message, MessageVm};
use crate::{
    block::{BlockOutput, RejectedTx},
    fill::{Block, BlockContext, Cfg, ChainCfg, TxContext},
    gas::{intrinsic_gas, reconcile, GasInputs},
    hook::{StartTx, TxProcessingHook},
    program::{CodeClassifier, PrefixClassifier, ProgramRecorder, RecordedProgram},
    receipt::Receipt,
    state::{StateAccess, StateBackend, StateOverlay},
    tx::TxVariant,
    ExecError, InternalError, RejectionError,
};
use alloy::primitives::{Address, Bytes, TxKind, B256, I256, U256};
use revm::context::result::{ExecutionResult, Output, SuccessReason};
use std::collections::BTreeMap;
use tracing::{debug, debug_span};

/// The settled outcome of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// The transaction sender.
    pub sender: Address,
    /// Status, gas used, refund, logs and output.
    pub result: ExecutionResult,
    /// The receipt.
    pub receipt: Receipt,
    /// Transactions the hook scheduled for the next block.
    pub scheduled: Vec<TxVariant>,
    /// True if the hook settled the transaction without running the VM.
    pub short_circuited: bool,
    /// Alternate programs invoked by the transaction, keyed by
    /// `(version, address)`.
    pub programs: BTreeMap<(u32, Address), RecordedProgram>,
    /// Balance the hook created or destroyed, see
    /// [`TxProcessingHook::unexpected_balance_delta`].
    pub unexpected_balance_delta: I256,
}

impl TxOutcome {
    /// True if the transaction succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Gas charged, after refunds.
    pub fn gas_used(&self) -> u64 {
        self.result.gas_used()
    }

    /// Gas refunded to the sender on top of unused gas.
    pub fn refund(&self) -> u64 {
        match &self.result {
            ExecutionResult::Success { gas_refunded, .. } => *gas_refunded,
            _ => 0,
        }
    }

    /// Return data.
    pub fn output(&self) -> Option<&Bytes> {
        self.result.output()
    }
}

/// Everything the pipeline needs except state.
#[derive(Debug)]
struct TxProcessor<H, V> {
    hook: H,
    vm: V,
    cfg: ChainCfg,
    classifier: Box<dyn CodeClassifier>,
    program_version: u32,
}

impl<H: TxProcessingHook, V: MessageVm> TxProcessor<H, V> {
    /// Run one transaction against `state`. On error, the caller must discard
    /// every write made to `state`.
    fn process(
        &mut self,
        block: &BlockContext,
        gas_available: u64,
        prior_gas_used: u64,
        state: &mut dyn StateAccess,
        tx: TxVariant,
    ) -> Result<TxOutcome, ExecError> {
        let tx_hash = tx.hash();
        let span = debug_span!("transact", %tx_hash, tx_type = ?tx.tx_type());
        let _enter = span.enter();

        let sender = match tx.recover_sender() {
            Ok(sender) => sender,
            Err(reason) => reject!(reason),
        };
        if let Some(chain_id) = tx.chain_id() {
            reject_if!(
                chain_id != self.cfg.chain_id,
                RejectionError::ChainIdMismatch { expected: self.cfg.chain_id, got: chain_id }
            );
        }

        let base_fee = if self.cfg.disable_base_fee { 0 } else { block.base_fee };

        match self.hook.start_tx(&tx, state) {
            Ok(StartTx::Continue) => {}
            Ok(StartTx::ShortCircuit { gas_used, output }) => {
                reject_if!(
                    gas_used > gas_available,
                    RejectionError::BlockGasLimitReached {
                        available: gas_available,
                        requested: gas_used,
                    }
                );
                debug!(gas_used, "short circuit");
                let result = ExecutionResult::Success {
                    reason: SuccessReason::Return,
                    gas_used,
                    gas_refunded: 0,
                    logs: Vec::new(),
                    output: Output::Call(output),
                };
                let price = tx.effective_gas_price(base_fee);
                return self.finish(
                    block,
                    prior_gas_used,
                    state,
                    tx,
                    tx_hash,
                    sender,
                    price,
                    result,
                    BTreeMap::new(),
                    true,
                );
            }
            Err(ExecError::Rejected(reason)) => reject!(reason),
            Err(err) => return Err(err),
        }

        // uniform validation
        let gas_limit = tx.gas_limit();
        reject_if!(
            gas_limit > gas_available,
            RejectionError::BlockGasLimitReached { available: gas_available, requested: gas_limit }
        );
        let fee_cap = tx.max_fee_per_gas();
        reject_if!(
            tx.max_priority_fee_per_gas() > fee_cap,
            RejectionError::TipAboveFeeCap { tip: tx.max_priority_fee_per_gas(), fee_cap }
        );
        reject_if!(
            !self.cfg.disable_base_fee && fee_cap < block.base_fee as u128,
            RejectionError::FeeCapBelowBaseFee { fee_cap, base_fee: block.base_fee as u128 }
        );
        let account_nonce = state.nonce(sender)?;
        if !tx.is_fake() {
            reject_if!(
                account_nonce != tx.nonce(),
                RejectionError::NonceMismatch { sender, expected: account_nonce, got: tx.nonce() }
            );
        }
        // the sender must cover the fee cap, but pays the effective price
        let price = tx.effective_gas_price(base_fee);
        let gas_cost = U256::from(gas_limit).saturating_mul(U256::from(price));
        let required =
            U256::from(gas_limit).saturating_mul(U256::from(fee_cap)).saturating_add(tx.value());
        let balance = state.balance(sender)?;
        reject_if!(
            balance < required,
            RejectionError::InsufficientFunds { sender, balance, required }
        );

        // buy gas
        state.set_balance(sender, balance - gas_cost)?;
        state.increment_nonce(sender)?;

        let intrinsic = intrinsic_gas(&tx);
        reject_if!(
            gas_limit < intrinsic,
            RejectionError::IntrinsicGasTooLow { gas_limit, intrinsic }
        );
        let mut gas_remaining = gas_limit - intrinsic;
        let before = gas_remaining;
        if let Err(reason) = self.hook.charge_gas(&tx, &mut gas_remaining) {
            reject!(reason);
        }
        if gas_remaining > before {
            return Err(InternalError::GasIncreased { before, after: gas_remaining }.into());
        }

        // run
        let target = match tx.kind() {
            TxKind::Call(to) => to,
            TxKind::Create => sender.create(account_nonce),
        };
        let msg = Message {
            caller: sender,
            target,
            is_create: tx.is_create(),
            value: tx.value(),
            input: tx.input().clone(),
            gas_limit: gas_remaining,
        };
        let tx_env = TxContext { origin: sender, gas_price: U256::from(price) };
        let mut programs = ProgramRecorder::new(self.program_version);
        let call = {
            let mut host = ExecutionContext::new(
                &mut *state,
                &mut self.hook,
                block,
                tx_env,
                self.classifier.as_ref(),
                &mut programs,
            );
            let call = match host.enter_call(&msg)? {
                EnterOutcome::Entered(frame) => {
                    let call = self.vm.execute(&mut host, &frame, &msg)?;
                    host.exit_call(frame, &call)?;
                    call
                }
                EnterOutcome::Refused(reason) => CallOutcome::halt(reason),
            };
            host.call_depth().ensure_balanced()?;
            call
        };
        if call.gas_remaining > msg.gas_limit {
            return Err(
                InternalError::GasOverflow { given: msg.gas_limit, returned: call.gas_remaining }
                    .into(),
            );
        }

        // settle
        let settlement = reconcile(GasInputs {
            gas_limit,
            gas_remaining: call.gas_remaining,
            protocol_refund: if call.is_success() { call.refund } else { 0 },
            force_refund: self.hook.force_refund_gas(),
            nonrefundable: self.hook.nonrefundable_gas(),
            policy: self.cfg.refund_policy,
        });
        let returned = U256::from(settlement.returned(gas_limit)).saturating_mul(U256::from(price));
        state.add_balance(sender, returned)?;
        let tip = price.saturating_sub(base_fee as u128);
        let reward = U256::from(settlement.gas_used).saturating_mul(U256::from(tip));
        state.add_balance(block.beneficiary, reward)?;

        let gas_used = settlement.gas_used;
        let result = match call.status {
            CallStatus::Success(reason) => ExecutionResult::Success {
                reason,
                gas_used,
                gas_refunded: settlement.refund,
                logs: call.logs,
                output: if msg.is_create {
                    Output::Create(call.output, Some(target))
                } else {
                    Output::Call(call.output)
                },
            },
            CallStatus::Revert => ExecutionResult::Revert { gas_used, output: call.output },
            CallStatus::Halt(reason) => ExecutionResult::Halt { reason, gas_used },
        };
        self.finish(
            block,
            prior_gas_used,
            state,
            tx,
            tx_hash,
            sender,
            price,
            result,
            programs.take(),
            false,
        )
    }

    /// End the transaction, build the receipt and collect scheduled
    /// transactions.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        block: &BlockContext,
        prior_gas_used: u64,
        state: &mut dyn StateAccess,
        tx: TxVariant,
        tx_hash: B256,
        sender: Address,
        price: u128,
        result: ExecutionResult,
        programs: BTreeMap<(u32, Address), RecordedProgram>,
        short_circuited: bool,
    ) -> Result<TxOutcome, ExecError> {
        let success = result.is_success();
        self.hook.end_tx(&tx, result.gas_used(), success, state)?;

        let mut receipt = Receipt::from_result(&tx, tx_hash, &result, price, prior_gas_used);
        receipt.l1_block_number = self.hook.l1_block_number(block).ok();
        self.hook.fill_receipt_info(&mut receipt);

        let scheduled = self.hook.scheduled_txs();
        let unexpected_balance_delta = self.hook.unexpected_balance_delta();
        debug!(success, gas_used = result.gas_used(), scheduled = scheduled.len(), "settled");

        Ok(TxOutcome {
            sender,
            result,
            receipt,
            scheduled,
            short_circuited,
            programs,
            unexpected_balance_delta,
        })
    }
}

/// Executes transactions and blocks against a backing database.
///
/// Owns the backing database, exactly one [`TxProcessingHook`] and the
/// [`MessageVm`]. The hook is fixed for the executor's lifetime. Use
/// [`Self::with_hook`] to rebind the executor to another hook.
#[derive(Debug)]
pub struct BlockExecutor<Db, H, V> {
    db: Db,
    processor: TxProcessor<H, V>,
}

impl<Db, H, V> BlockExecutor<Db, H, V> {
    /// Instantiate an executor with the default [`ChainCfg`] and the
    /// [`PrefixClassifier`].
    pub fn new(db: Db, hook: H, vm: V) -> Self {
        Self {
            db,
            processor: TxProcessor {
                hook,
                vm,
                cfg: ChainCfg::default(),
                classifier: Box::new(PrefixClassifier),
                program_version: 0,
            },
        }
    }

    /// Rebind the executor to a different hook.
    pub fn with_hook<H2>(self, hook: H2) -> BlockExecutor<Db, H2, V> {
        let TxProcessor { vm, cfg, classifier, program_version, .. } = self.processor;
        BlockExecutor {
            db: self.db,
            processor: TxProcessor { hook, vm, cfg, classifier, program_version },
        }
    }

    /// Replace the code classifier.
    pub fn with_classifier(mut self, classifier: impl CodeClassifier + 'static) -> Self {
        self.processor.classifier = Box::new(classifier);
        self
    }

    /// Set the program version under which invoked programs are recorded.
    pub fn with_program_version(mut self, version: u32) -> Self {
        self.processor.program_version = version;
        self
    }

    /// Fill the chain configuration.
    pub fn fill_cfg<C: Cfg>(mut self, filler: &C) -> Self {
        filler.fill_cfg_env(&mut self.processor.cfg);
        self
    }

    /// Get the chain configuration.
    pub const fn cfg(&self) -> &ChainCfg {
        &self.processor.cfg
    }

    /// Get a reference to the backing database.
    pub const fn db(&self) -> &Db {
        &self.db
    }

    /// Get a mutable reference to the backing database.
    pub fn db_mut(&mut self) -> &mut Db {
        &mut self.db
    }

    /// Get a reference to the hook.
    pub const fn hook(&self) -> &H {
        &self.processor.hook
    }

    /// Get a mutable reference to the hook.
    pub fn hook_mut(&mut self) -> &mut H {
        &mut self.processor.hook
    }

    /// Get a reference to the VM.
    pub const fn vm(&self) -> &V {
        &self.processor.vm
    }

    /// Deconstruct the executor into its database, hook and VM.
    pub fn into_parts(self) -> (Db, H, V) {
        (self.db, self.processor.hook, self.processor.vm)
    }
}

impl<Db, H, V> BlockExecutor<Db, H, V>
where
    Db: StateBackend,
    Db::Error: Send + Sync + 'static,
    H: TxProcessingHook,
    V: MessageVm,
{
    /// Execute a single transaction in its own block and commit it.
    ///
    /// A rejected transaction leaves the database untouched. Scheduled
    /// transactions and invoked programs are returned in the outcome.
    pub fn transact<B: Block>(&mut self, block: &B, tx: TxVariant) -> Result<TxOutcome, ExecError> {
        let block = block.block_context();
        let processed = {
            let mut state = StateOverlay::new(&self.db);
            self.processor
                .process(&block, block.gas_limit, 0, &mut state, tx)
                .map(|outcome| (outcome, state.into_cache()))
        };
        match processed {
            Ok((outcome, cache)) => {
                self.db.apply(cache);
                self.processor.hook.block_committed();
                Ok(outcome)
            }
            Err(err) => {
                self.processor.hook.block_aborted();
                Err(err)
            }
        }
    }

    /// Execute a block of candidate transactions in order.
    ///
    /// Rejected candidates are excluded and reported in the output with
    /// their reason. Any other error aborts the block, and nothing is
    /// committed. On success every included transaction is committed to the
    /// backing database at once.
    pub fn execute_block<B, I>(&mut self, block: &B, candidates: I) -> Result<BlockOutput, ExecError>
    where
        B: Block,
        I: IntoIterator<Item = TxVariant>,
    {
        let candidates = candidates.into_iter();
        let capacity = block.tx_count_hint().unwrap_or_else(|| candidates.size_hint().0);
        let mut output = BlockOutput::with_capacity(capacity);
        let block = block.block_context();

        let span = debug_span!("execute_block", number = block.number);
        let _enter = span.enter();

        let cache = {
            let mut block_state = StateOverlay::new(&self.db);
            for tx in candidates {
                let tx_hash = tx.hash();
                let prior = output.cumulative_gas_used();
                let gas_available = block.gas_limit.saturating_sub(prior);

                let mut tx_state = StateOverlay::new(&block_state);
                match self.processor.process(&block, gas_available, prior, &mut tx_state, tx) {
                    Ok(outcome) => {
                        let cache = tx_state.into_cache();
                        block_state.apply(cache);
                        output.push_outcome(outcome);
                    }
                    Err(ExecError::Rejected(reason)) => {
                        debug!(%tx_hash, %reason, "excluded from block");
                        output.push_rejected(RejectedTx { tx_hash, reason });
                    }
                    Err(err) => {
                        debug!(%tx_hash, %err, "aborting block");
                        self.processor.hook.block_aborted();
                        return Err(err);
                    }
                }
            }
            block_state.into_cache()
        };

        self.db.apply(cache);
        self.processor.hook.block_committed();
        Ok(output)
    }
}
