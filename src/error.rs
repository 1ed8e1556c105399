use alloy::primitives::{Address, U256};

/// Reasons a transaction is excluded from a block.
///
/// A rejected transaction leaves no trace in state. The `Display` output of
/// this type is the reason string surfaced to the block producer.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RejectionError {
    /// The installed hook refused the transaction.
    #[error("rejected by hook: {0}")]
    Hook(String),

    /// The signature did not recover to a valid sender.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The transaction was built for another chain.
    #[error("chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch {
        /// The chain id of the executing chain.
        expected: u64,
        /// The chain id carried by the transaction.
        got: u64,
    },

    /// The transaction nonce does not match the sender's account nonce.
    #[error("nonce mismatch for {sender}: account has {expected}, tx has {got}")]
    NonceMismatch {
        /// The transaction sender.
        sender: Address,
        /// The nonce of the sender's account.
        expected: u64,
        /// The nonce carried by the transaction.
        got: u64,
    },

    /// The sender cannot prepay gas and value.
    #[error("insufficient funds for {sender}: have {balance}, need {required}")]
    InsufficientFunds {
        /// The transaction sender.
        sender: Address,
        /// The sender's balance.
        balance: U256,
        /// `gas_limit * max_fee_per_gas + value`.
        required: U256,
    },

    /// The gas limit does not cover intrinsic gas.
    #[error("intrinsic gas too low: limit {gas_limit}, intrinsic {intrinsic}")]
    IntrinsicGasTooLow {
        /// The transaction gas limit.
        gas_limit: u64,
        /// The intrinsic gas of the transaction.
        intrinsic: u64,
    },

    /// The priority fee exceeds the fee cap.
    #[error("max priority fee per gas {tip} higher than max fee per gas {fee_cap}")]
    TipAboveFeeCap {
        /// The maximum priority fee per gas of the transaction.
        tip: u128,
        /// The maximum fee per gas of the transaction.
        fee_cap: u128,
    },

    /// The fee cap is lower than the block base fee.
    #[error("fee cap {fee_cap} below base fee {base_fee}")]
    FeeCapBelowBaseFee {
        /// The maximum fee per gas of the transaction.
        fee_cap: u128,
        /// The block base fee.
        base_fee: u128,
    },

    /// Including the transaction would exceed the block gas limit.
    #[error("block gas limit reached: {available} available, {requested} requested")]
    BlockGasLimitReached {
        /// Gas left in the block.
        available: u64,
        /// The transaction gas limit.
        requested: u64,
    },
}

impl RejectionError {
    /// Instantiate a hook rejection with the given reason.
    pub fn hook(reason: impl Into<String>) -> Self {
        Self::Hook(reason.into())
    }
}

/// Internal-consistency failures.
///
/// These indicate a bug in the VM, the hook or the pipeline and would fork
/// consensus if tolerated. Processing of the current block halts.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum InternalError {
    /// A call exit was reported with no matching call entry.
    #[error("call depth underflow")]
    CallDepthUnderflow,

    /// A call was exited while a deeper call was still running.
    #[error("call exited out of order: frame at depth {frame}, current depth {current}")]
    UnmatchedCallExit {
        /// Depth of the exited frame.
        frame: usize,
        /// Depth when the exit was reported.
        current: usize,
    },

    /// The transaction completed with unexited calls.
    #[error("unbalanced call depth at completion: {0}")]
    UnbalancedCallDepth(usize),

    /// The gas charging hook increased the remaining gas.
    #[error("gas charging hook increased remaining gas from {before} to {after}")]
    GasIncreased {
        /// Remaining gas before the hook ran.
        before: u64,
        /// Remaining gas after the hook ran.
        after: u64,
    },

    /// The VM reported more remaining gas than it was given.
    #[error("vm returned {returned} gas but was given {given}")]
    GasOverflow {
        /// Gas handed to the VM.
        given: u64,
        /// Gas the VM claims is left.
        returned: u64,
    },
}

/// The side-channel store is not available.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundError {
    /// No store has been bound to this handle.
    #[error("side store not bound")]
    Unbound,

    /// This kind of handle cannot carry a side store.
    #[error("side store unsupported for {0}")]
    Unsupported(&'static str),
}

/// An error from the backing state database.
#[derive(Debug, thiserror::Error)]
#[error("state database error: {0}")]
pub struct StateError(#[source] pub Box<dyn core::error::Error + Send + Sync + 'static>);

impl StateError {
    /// Wrap a database error.
    pub fn new<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }
}

/// A hook query that could not be answered.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The block context carries no L1 origin.
    #[error("block {0} has no L1 origin")]
    MissingL1Origin(u64),

    /// Any other hook-defined failure.
    #[error("{0}")]
    Other(String),
}

/// Errors returned by the transaction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The transaction was rejected and excluded from the block.
    #[error(transparent)]
    Rejected(#[from] RejectionError),

    /// An internal-consistency failure.
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// The backing database failed.
    #[error(transparent)]
    State(#[from] StateError),
}

impl ExecError {
    /// True if the error must halt processing of the current block.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Get the rejection, if the transaction was merely rejected.
    pub const fn as_rejection(&self) -> Option<&RejectionError> {
        match self {
            Self::Rejected(e) => Some(e),
            _ => None,
        }
    }
}
