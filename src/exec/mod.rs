//! The transaction pipeline and its VM seam.
//!
//! Bytecode interpretation is not done here. A [`MessageVm`] runs message
//! calls against a [`Host`], which owns everything the pipeline has to
//! observe: call depth, caller tracking, value transfer, checkpoints and the
//! virtualized block context.

mod context;
pub use context::ExecutionContext;

mod executor;
pub use executor::{BlockExecutor, TxOutcome};

use crate::{
    fill::{BlockContext, TxContext},
    state::{Checkpoint, StateAccess},
    ExecError, HookError,
};
use alloy::primitives::{Address, Bytes, Log, B256, U256};
use revm::context::result::{HaltReason, SuccessReason};

/// A message call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// The caller.
    pub caller: Address,
    /// The callee, or the address of the contract being created.
    pub target: Address,
    /// True if the message creates `target`.
    pub is_create: bool,
    /// Wei transferred from `caller` to `target`.
    pub value: U256,
    /// Call data, or init code for creations.
    pub input: Bytes,
    /// Gas available to the call.
    pub gas_limit: u64,
}

/// How a message call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// The call succeeded.
    Success(SuccessReason),
    /// The call reverted. Unused gas is returned.
    Revert,
    /// The call halted exceptionally. All gas is consumed.
    Halt(HaltReason),
}

/// The outcome of a message call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// How the call ended.
    pub status: CallStatus,
    /// Gas left.
    pub gas_remaining: u64,
    /// The protocol refund counter.
    pub refund: u64,
    /// Return data, or deployed code for creations.
    pub output: Bytes,
    /// Logs emitted by the call. Empty unless the call succeeded.
    pub logs: Vec<Log>,
    /// The created contract, for successful creations.
    pub created: Option<Address>,
}

impl CallOutcome {
    /// A successful outcome returning `output`.
    pub const fn success(gas_remaining: u64, output: Bytes) -> Self {
        Self {
            status: CallStatus::Success(SuccessReason::Return),
            gas_remaining,
            refund: 0,
            output,
            logs: Vec::new(),
            created: None,
        }
    }

    /// A reverted outcome returning `output`.
    pub const fn revert(gas_remaining: u64, output: Bytes) -> Self {
        Self {
            status: CallStatus::Revert,
            gas_remaining,
            refund: 0,
            output,
            logs: Vec::new(),
            created: None,
        }
    }

    /// A halted outcome. Halting consumes all gas.
    pub const fn halt(reason: HaltReason) -> Self {
        Self {
            status: CallStatus::Halt(reason),
            gas_remaining: 0,
            refund: 0,
            output: Bytes::new(),
            logs: Vec::new(),
            created: None,
        }
    }

    /// True if the call succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.status, CallStatus::Success(_))
    }
}

/// An entered message call. Must be handed back to [`Host::exit_call`].
#[derive(Debug)]
#[must_use = "a frame must be exited"]
pub struct Frame {
    checkpoint: Checkpoint,
    depth: usize,
    target: Address,
    is_create: bool,
    /// The code to run: the callee's code, or init code for creations.
    pub code: Bytes,
    /// True if `code` is an alternate-format program.
    pub is_alternate_program: bool,
}

impl Frame {
    /// The call depth inside this frame.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// The callee, or the address being created.
    pub const fn target(&self) -> Address {
        self.target
    }

    /// True if the frame creates a contract.
    pub const fn is_create(&self) -> bool {
        self.is_create
    }
}

/// The result of [`Host::enter_call`].
#[derive(Debug)]
pub enum EnterOutcome {
    /// The call was entered.
    Entered(Frame),
    /// The call was refused. The VM must treat the call as halted for this
    /// reason. Nothing was entered, so nothing must be exited.
    Refused(HaltReason),
}

/// The environment a [`MessageVm`] executes against.
pub trait Host {
    /// The block being executed.
    fn block(&self) -> &BlockContext;

    /// The transaction being executed.
    fn tx(&self) -> &TxContext;

    /// Current message-call depth. One while the top-level call runs.
    fn depth(&self) -> usize;

    /// Account state.
    fn state(&mut self) -> &mut dyn StateAccess;

    /// The value of the block-number opcode. An error halts the current
    /// frame.
    fn block_number(&self) -> Result<u64, HookError>;

    /// The value of the block-hash opcode.
    fn block_hash(&self, number: u64) -> B256;

    /// The value of the gas-price opcode.
    fn gas_price(&self) -> U256;

    /// Enter a message call: check the depth limit, take a checkpoint,
    /// transfer value and load the code to run.
    fn enter_call(&mut self, msg: &Message) -> Result<EnterOutcome, ExecError>;

    /// Exit a message call. A failed call reverts every write made since the
    /// frame was entered. A successful creation deploys the returned code.
    ///
    /// Frames must be exited innermost first. Exiting any other frame is an
    /// [`InternalError::UnmatchedCallExit`].
    ///
    /// [`InternalError::UnmatchedCallExit`]: crate::InternalError::UnmatchedCallExit
    fn exit_call(&mut self, frame: Frame, outcome: &CallOutcome) -> Result<(), ExecError>;
}

/// A bytecode interpreter.
///
/// The pipeline enters and exits the top-level call itself. Implementations
/// must route every nested call through [`Host::enter_call`] and
/// [`Host::exit_call`], strictly nested, and must propagate errors returned
/// by the host.
pub trait MessageVm {
    /// Execute a message in an entered frame.
    fn execute(
        &mut self,
        host: &mut dyn Host,
        frame: &Frame,
        msg: &Message,
    ) -> Result<CallOutcome, ExecError>;
}
