//! Bridgevm - L1-to-L2 bridging transactions and a pluggable transaction
//! processing hook for EVM-compatible chains.
//!
//! Bridgevm extends the standard transaction pipeline in two ways:
//!
//! - **Synthetic transactions.** Alongside the signed legacy, [EIP-2930] and
//!   [EIP-1559] transactions, [`TxVariant`] carries three _fake_ variants
//!   constructed by the trusted block-building path: [`UnsignedBridgeTx`],
//!   [`ContractTriggeredTx`] and [`DepositTx`]. Fake variants skip signature
//!   recovery and nonce enforcement. Every other validation applies to them
//!   uniformly.
//! - **A processing hook.** A [`TxProcessingHook`] installed on a
//!   [`BlockExecutor`] observes and adjusts each transaction at fixed points:
//!   it may short-circuit execution, charge extra gas, track callers, adjust
//!   refunds, virtualize the block-number, block-hash and gas-price opcodes,
//!   enrich receipts and schedule follow-up transactions for the next block.
//!   With [`NoopHook`] the pipeline behaves exactly as an unextended one.
//!
//! Bridgevm is NOT a bytecode interpreter. Message calls are run by a
//! [`MessageVm`], which talks to the pipeline through the [`Host`] trait.
//! The host owns call depth, caller tracking, value transfer and checkpoints,
//! so every VM gets the same hook semantics for free.
//!
//! ## Quickstart
//!
//! - Build a [`BlockExecutor`] from a database, a hook and a VM.
//! - Fill the chain configuration by calling [`BlockExecutor::fill_cfg`] with
//!   a [`Cfg`].
//! - Run a block by calling [`BlockExecutor::execute_block`] with a [`Block`]
//!   and the candidate transactions.
//! - Read receipts, rejections and invoked programs from the [`BlockOutput`].
//! - Pass [`BlockOutput::into_scheduled`] into the next block's candidates
//!   with [`ScheduledTxs::into_candidates`].
//!
//! ```
//! use bridgevm::{
//!     exec::{CallOutcome, Frame, Host, Message, MessageVm},
//!     BlockContext, BlockExecutor, BridgeHook, ExecError, TxVariant,
//! };
//! use bridgevm::tx::DepositTx;
//! use revm::database::{CacheDB, EmptyDB};
//! use alloy::primitives::{Address, B256, U256};
//!
//! /// A VM that returns immediately.
//! struct Stop;
//!
//! impl MessageVm for Stop {
//!     fn execute(
//!         &mut self,
//!         _host: &mut dyn Host,
//!         _frame: &Frame,
//!         msg: &Message,
//!     ) -> Result<CallOutcome, ExecError> {
//!         Ok(CallOutcome::success(msg.gas_limit, Default::default()))
//!     }
//! }
//!
//! # fn main() -> Result<(), ExecError> {
//! let mut exec = BlockExecutor::new(CacheDB::new(EmptyDB::default()), BridgeHook::default(), Stop);
//!
//! let deposit: TxVariant = DepositTx {
//!     chain_id: 1,
//!     l1_request_id: B256::repeat_byte(1),
//!     to: Address::repeat_byte(2),
//!     value: U256::from(100),
//! }
//! .into();
//!
//! let output = exec.execute_block(&BlockContext::default(), [deposit])?;
//! assert_eq!(output.receipts().len(), 1);
//! assert_eq!(output.cumulative_gas_used(), 0);
//!
//! let scheduled = output.into_scheduled();
//! let next = exec.execute_block(&BlockContext::default(), scheduled.into_candidates([]))?;
//! assert!(next.receipts().is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Rejection and errors
//!
//! Transaction processing ends in one of three ways:
//!
//! - The transaction is included. Its state changes are committed and a
//!   receipt is produced, whether or not execution succeeded.
//! - The transaction is rejected with a [`RejectionError`]. It is excluded
//!   from the block and leaves no trace in state. Block execution continues.
//! - Processing fails with an [`InternalError`] or a [`StateError`]. These
//!   indicate a bug or a broken database and halt the block. Nothing from the
//!   block is committed.
//!
//! [`ExecError::is_fatal`] distinguishes the last two.
//!
//! ## Side store
//!
//! Hooks may keep non-consensus data in a side-channel [`KeyValueStore`],
//! bound after construction to a [`ChainDb`] and reached through the
//! [`SideStoreProvider`] trait. See the [`side_store`] module.
//!
//! [EIP-2930]: https://eips.ethereum.org/EIPS/eip-2930
//! [EIP-1559]: https://eips.ethereum.org/EIPS/eip-1559
//! [`UnsignedBridgeTx`]: tx::UnsignedBridgeTx
//! [`ContractTriggeredTx`]: tx::ContractTriggeredTx
//! [`DepositTx`]: tx::DepositTx
//! [`MessageVm`]: exec::MessageVm
//! [`Host`]: exec::Host
//! [`KeyValueStore`]: side_store::KeyValueStore
//! [`ChainDb`]: side_store::ChainDb
//! [`SideStoreProvider`]: side_store::SideStoreProvider

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/alloy-rs/core/main/assets/alloy.jpg",
    html_favicon_url = "https://raw.githubusercontent.com/alloy-rs/core/main/assets/favicon.ico"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
mod macros;

mod block;
pub use block::{BlockOutput, RejectedTx, ScheduledTxs};

pub mod chain;

pub mod depth;

mod error;
pub use error::{ExecError, HookError, InternalError, NotFoundError, RejectionError, StateError};

pub mod exec;
pub use exec::{BlockExecutor, TxOutcome};

mod fill;
pub use fill::{
    Block, BlockContext, Cfg, ChainCfg, DisableBaseFee, L1Origin, NoopBlock, NoopCfg, TxContext,
    BLOCK_HASH_HISTORY,
};

pub mod gas;

pub mod hook;
pub use hook::{BridgeHook, BridgeHookConfig, NoopHook, StartTx, TxProcessingHook};

pub mod program;

mod receipt;
pub use receipt::Receipt;

pub mod side_store;

pub mod state;

pub mod tx;
pub use tx::{TxType, TxVariant, DEPOSIT_SENDER};

pub use alloy;
pub use revm;

/// Utilities for testing bridgevm or testing with bridgevm.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
