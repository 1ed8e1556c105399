use super::{CallOutcome, EnterOutcome, Frame, Host, Message};
use crate::{
    depth::CallDepth,
    fill::{BlockContext, TxContext},
    hook::TxProcessingHook,
    program::{CodeClassifier, ProgramRecorder},
    state::StateAccess,
    ExecError, HookError, InternalError,
};
use alloy::primitives::{Bytes, B256, U256};
use revm::{context::result::HaltReason, state::Bytecode};
use tracing::trace;

/// The [`Host`] of one transaction.
///
/// Tracks call depth, reports call entry and exit to the hook, and routes the
/// block-number, block-hash and gas-price opcodes through the hook.
pub struct ExecutionContext<'a> {
    state: &'a mut dyn StateAccess,
    hook: &'a mut dyn TxProcessingHook,
    block: &'a BlockContext,
    tx: TxContext,
    classifier: &'a dyn CodeClassifier,
    programs: &'a mut ProgramRecorder,
    depth: CallDepth,
}

impl core::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("block", &self.block.number)
            .field("tx", &self.tx)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'a> ExecutionContext<'a> {
    /// Instantiate a host for one transaction.
    pub fn new(
        state: &'a mut dyn StateAccess,
        hook: &'a mut dyn TxProcessingHook,
        block: &'a BlockContext,
        tx: TxContext,
        classifier: &'a dyn CodeClassifier,
        programs: &'a mut ProgramRecorder,
    ) -> Self {
        Self { state, hook, block, tx, classifier, programs, depth: CallDepth::new() }
    }

    /// The call depth tracker.
    pub const fn call_depth(&self) -> &CallDepth {
        &self.depth
    }
}

impl Host for ExecutionContext<'_> {
    fn block(&self) -> &BlockContext {
        self.block
    }

    fn tx(&self) -> &TxContext {
        &self.tx
    }

    fn depth(&self) -> usize {
        self.depth.depth()
    }

    fn state(&mut self) -> &mut dyn StateAccess {
        &mut *self.state
    }

    fn block_number(&self) -> Result<u64, HookError> {
        self.hook.l1_block_number(self.block)
    }

    fn block_hash(&self, number: u64) -> B256 {
        self.hook.l1_block_hash(self.block, number)
    }

    fn gas_price(&self) -> U256 {
        self.hook.gas_price_op(&self.tx, self.block)
    }

    fn enter_call(&mut self, msg: &Message) -> Result<EnterOutcome, ExecError> {
        if !self.depth.can_enter() {
            trace!(depth = self.depth.depth(), "call too deep");
            return Ok(EnterOutcome::Refused(HaltReason::CallTooDeep));
        }

        let checkpoint = self.state.checkpoint();
        if !self.state.transfer(msg.caller, msg.target, msg.value)? {
            return Ok(EnterOutcome::Refused(HaltReason::OutOfFunds));
        }

        let (code, is_alternate_program) = if msg.is_create {
            (msg.input.clone(), false)
        } else {
            let code = self.state.code(msg.target)?.original_bytes();
            let payload = self.classifier.program_payload(&code);
            if let Some(payload) = payload {
                let code_hash = self.state.code_hash(msg.target)?;
                self.programs.record(msg.target, code_hash, payload);
            }
            let is_program = payload.is_some();
            (code, is_program)
        };

        self.depth.increment();
        self.hook.push_caller(msg.caller);
        trace!(
            depth = self.depth.depth(),
            caller = %msg.caller,
            target = %msg.target,
            is_create = msg.is_create,
            "enter call"
        );

        Ok(EnterOutcome::Entered(Frame {
            checkpoint,
            depth: self.depth.depth(),
            target: msg.target,
            is_create: msg.is_create,
            code,
            is_alternate_program,
        }))
    }

    fn exit_call(&mut self, frame: Frame, outcome: &CallOutcome) -> Result<(), ExecError> {
        let current = self.depth.depth();
        if frame.depth != current {
            return Err(InternalError::UnmatchedCallExit { frame: frame.depth, current }.into());
        }
        self.depth.decrement()?;
        self.hook.pop_caller();
        trace!(depth = self.depth.depth(), status = ?outcome.status, "exit call");

        if !outcome.is_success() {
            self.state.revert_to(frame.checkpoint);
            return Ok(());
        }
        if frame.is_create && !outcome.output.is_empty() {
            let code = Bytecode::new_legacy(Bytes::clone(&outcome.output));
            self.state.set_code(frame.target, code)?;
        }
        Ok(())
    }
}
