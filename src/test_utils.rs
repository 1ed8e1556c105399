//! Fixtures for exercising the pipeline without a bytecode interpreter.

use crate::{
    exec::{CallOutcome, EnterOutcome, Frame, Host, Message, MessageVm},
    hook::{StartTx, TxProcessingHook},
    receipt::Receipt,
    state::StateAccess,
    tx::{TxType, TxVariant},
    ExecError, RejectionError, StateError,
};
use alloy::{
    consensus::Receipt as ConsensusReceipt,
    primitives::{Address, Bytes, B256, U256},
};
use revm::{
    context::result::{HaltReason, OutOfGasError},
    database::{CacheDB, EmptyDB},
    state::{AccountInfo, Bytecode},
};

/// A funded test account.
pub const ALICE: Address = Address::repeat_byte(0xa1);

/// Account written to by [`RejectingHook`].
pub const MARKER: Address = Address::repeat_byte(0x99);

/// An in-memory database with the given balances.
pub fn funded_db(balances: &[(Address, U256)]) -> CacheDB<EmptyDB> {
    let mut db = CacheDB::new(EmptyDB::default());
    for (address, balance) in balances {
        db.insert_account_info(*address, AccountInfo { balance: *balance, ..Default::default() });
    }
    db
}

/// Deploy `code` at `address`, keeping the account's balance and nonce.
pub fn set_code(db: &mut CacheDB<EmptyDB>, address: Address, code: Bytecode) {
    let mut info = db.cache.accounts.get(&address).map(|a| a.info.clone()).unwrap_or_default();
    info.code_hash = code.hash_slow();
    info.code = Some(code);
    db.insert_account_info(address, info);
}

/// A receipt with every field zeroed.
pub fn empty_receipt() -> Receipt {
    Receipt {
        tx_type: TxType::Legacy,
        tx_hash: B256::ZERO,
        inner: ConsensusReceipt::default(),
        gas_used: 0,
        effective_gas_price: 0,
        contract_address: None,
        gas_used_for_l1: 0,
        l1_block_number: None,
        request_id: None,
    }
}

/// One step of a [`ScriptedVm`] script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Consume gas, halting out of gas if not enough is left.
    Consume(u64),
    /// Add to the refund counter.
    Refund(u64),
    /// Write a storage slot of the running frame's account.
    SStore(U256, U256),
    /// Call an account with all remaining gas, running the nested script.
    Call(Address, Vec<Op>),
    /// Enter a call and never exit it.
    UnbalancedEnter(Address),
    /// Enter a call to the first account, then from it a call to the second,
    /// and exit the outer call first.
    CrossedExit(Address, Address),
    /// Record the call depth.
    RecordDepth,
    /// Return the block-number opcode value. Halts if it is unavailable.
    ReturnBlockNumber,
    /// Return the gas-price opcode value.
    ReturnGasPrice,
    /// Revert, returning unused gas.
    Revert,
    /// Halt exceptionally.
    Halt(HaltReason),
}

/// A [`MessageVm`] that runs the same script for every top-level message,
/// ignoring the code of the called account.
#[derive(Debug, Clone, Default)]
pub struct ScriptedVm {
    script: Vec<Op>,
    invocations: usize,
    alternate_frames: usize,
    depths: Vec<usize>,
}

impl ScriptedVm {
    /// Instantiate a VM running `script`. An empty script succeeds without
    /// consuming gas.
    pub fn new(script: impl IntoIterator<Item = Op>) -> Self {
        Self { script: script.into_iter().collect(), ..Default::default() }
    }

    /// Number of frames executed, nested ones included.
    pub const fn invocations(&self) -> usize {
        self.invocations
    }

    /// Number of frames that ran an alternate program.
    pub const fn alternate_frames(&self) -> usize {
        self.alternate_frames
    }

    /// Depths recorded by [`Op::RecordDepth`].
    pub fn depths(&self) -> &[usize] {
        &self.depths
    }

    fn run(
        &mut self,
        host: &mut dyn Host,
        frame: &Frame,
        msg: &Message,
        script: &[Op],
    ) -> Result<CallOutcome, ExecError> {
        self.invocations += 1;
        if frame.is_alternate_program {
            self.alternate_frames += 1;
        }

        let mut gas = msg.gas_limit;
        let mut refund = 0u64;
        let mut output = Bytes::new();

        for op in script {
            match op {
                Op::Consume(amount) => {
                    if *amount > gas {
                        return Ok(CallOutcome::halt(HaltReason::OutOfGas(OutOfGasError::Basic)));
                    }
                    gas -= amount;
                }
                Op::Refund(amount) => refund += amount,
                Op::SStore(slot, value) => {
                    host.state().set_storage(frame.target(), *slot, *value)?;
                }
                Op::Call(to, nested) => {
                    let nested_msg = Message {
                        caller: frame.target(),
                        target: *to,
                        gas_limit: gas,
                        ..Default::default()
                    };
                    gas = match host.enter_call(&nested_msg)? {
                        EnterOutcome::Entered(nested_frame) => {
                            let outcome = self.run(host, &nested_frame, &nested_msg, nested)?;
                            host.exit_call(nested_frame, &outcome)?;
                            outcome.gas_remaining
                        }
                        EnterOutcome::Refused(_) => 0,
                    };
                }
                Op::UnbalancedEnter(to) => {
                    let nested_msg =
                        Message { caller: frame.target(), target: *to, ..Default::default() };
                    if let EnterOutcome::Entered(leaked) = host.enter_call(&nested_msg)? {
                        drop(leaked);
                    }
                }
                Op::CrossedExit(outer, inner) => {
                    let outer_msg =
                        Message { caller: frame.target(), target: *outer, ..Default::default() };
                    let inner_msg = Message { caller: *outer, target: *inner, ..Default::default() };
                    let EnterOutcome::Entered(outer_frame) = host.enter_call(&outer_msg)? else {
                        continue;
                    };
                    let done = CallOutcome::success(0, Bytes::new());
                    let inner_frame = match host.enter_call(&inner_msg)? {
                        EnterOutcome::Entered(inner_frame) => Some(inner_frame),
                        EnterOutcome::Refused(_) => None,
                    };
                    host.exit_call(outer_frame, &done)?;
                    if let Some(inner_frame) = inner_frame {
                        host.exit_call(inner_frame, &done)?;
                    }
                }
                Op::RecordDepth => self.depths.push(host.depth()),
                Op::ReturnBlockNumber => match host.block_number() {
                    Ok(number) => output = U256::from(number).to_be_bytes_vec().into(),
                    Err(_) => return Ok(CallOutcome::halt(HaltReason::NotActivated)),
                },
                Op::ReturnGasPrice => output = host.gas_price().to_be_bytes_vec().into(),
                Op::Revert => return Ok(CallOutcome::revert(gas, output)),
                Op::Halt(reason) => return Ok(CallOutcome::halt(*reason)),
            }
        }

        let mut outcome = CallOutcome::success(gas, output);
        outcome.refund = refund;
        Ok(outcome)
    }
}

impl MessageVm for ScriptedVm {
    fn execute(
        &mut self,
        host: &mut dyn Host,
        frame: &Frame,
        msg: &Message,
    ) -> Result<CallOutcome, ExecError> {
        let script = self.script.clone();
        self.run(host, frame, msg, &script)
    }
}

/// A hook that records the name of every lifecycle call and changes nothing.
#[derive(Debug, Clone, Default)]
pub struct RecordingHook {
    /// Names of the lifecycle methods called, in order.
    pub calls: Vec<String>,
}

impl TxProcessingHook for RecordingHook {
    fn start_tx(
        &mut self,
        _tx: &TxVariant,
        _state: &mut dyn StateAccess,
    ) -> Result<StartTx, ExecError> {
        self.calls.push("start_tx".into());
        Ok(StartTx::Continue)
    }

    fn charge_gas(&mut self, _tx: &TxVariant, _gas: &mut u64) -> Result<(), RejectionError> {
        self.calls.push("charge_gas".into());
        Ok(())
    }

    fn push_caller(&mut self, _caller: Address) {
        self.calls.push("push_caller".into());
    }

    fn pop_caller(&mut self) {
        self.calls.push("pop_caller".into());
    }

    fn end_tx(
        &mut self,
        _tx: &TxVariant,
        _total_gas_used: u64,
        _success: bool,
        _state: &mut dyn StateAccess,
    ) -> Result<(), StateError> {
        self.calls.push("end_tx".into());
        Ok(())
    }
}

/// A hook that writes a marker to [`MARKER`] in `start_tx`, then rejects at
/// the configured point.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingHook {
    /// Reject in `start_tx`.
    pub reject_start: bool,
    /// Reject in `charge_gas`.
    pub reject_gas: bool,
}

impl TxProcessingHook for RejectingHook {
    fn start_tx(
        &mut self,
        _tx: &TxVariant,
        state: &mut dyn StateAccess,
    ) -> Result<StartTx, ExecError> {
        if self.reject_start {
            return Err(RejectionError::hook("rejected at start").into());
        }
        state.set_storage(MARKER, U256::from(1), U256::from(1))?;
        Ok(StartTx::Continue)
    }

    fn charge_gas(&mut self, _tx: &TxVariant, _gas: &mut u64) -> Result<(), RejectionError> {
        if self.reject_gas {
            return Err(RejectionError::hook("rejected at gas"));
        }
        Ok(())
    }
}

/// A hook that illegally raises the remaining gas.
#[derive(Debug, Clone, Copy, Default)]
pub struct GasBumpHook;

impl TxProcessingHook for GasBumpHook {
    fn charge_gas(&mut self, _tx: &TxVariant, gas: &mut u64) -> Result<(), RejectionError> {
        *gas += 1;
        Ok(())
    }
}

/// A hook whose `end_tx` fails with a state error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEndHook;

impl TxProcessingHook for FailingEndHook {
    fn end_tx(
        &mut self,
        _tx: &TxVariant,
        _total_gas_used: u64,
        _success: bool,
        _state: &mut dyn StateAccess,
    ) -> Result<(), StateError> {
        Err(StateError::new(std::io::Error::other("end_tx failed")))
    }
}

#[cfg(test)]
pub(crate) use signing::*;

#[cfg(test)]
mod signing {
    use crate::tx::TxVariant;
    use alloy::{
        consensus::{SignableTransaction, TxEip1559, TxLegacy},
        primitives::{b256, Address, Bytes, TxKind, U256},
        signers::{local::PrivateKeySigner, SignerSync},
    };

    /// The key signing test transactions.
    pub(crate) fn test_signer() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&b256!(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        ))
        .unwrap()
    }

    /// A signed EIP-155 legacy transaction on chain 1, calling `0x22..22`.
    pub(crate) fn signed_legacy(
        nonce: u64,
        gas_limit: u64,
        gas_price: u128,
        input: Bytes,
    ) -> TxVariant {
        let tx = TxLegacy {
            chain_id: Some(1),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            value: U256::ZERO,
            input,
        };
        let sig = test_signer().sign_hash_sync(&tx.signature_hash()).unwrap();
        tx.into_signed(sig).into()
    }

    /// A signed EIP-1559 transaction on chain 1, calling `0x22..22` with no
    /// value.
    pub(crate) fn signed_1559(
        nonce: u64,
        gas_limit: u64,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    ) -> TxVariant {
        let tx = TxEip1559 {
            chain_id: 1,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            ..Default::default()
        };
        let sig = test_signer().sign_hash_sync(&tx.signature_hash()).unwrap();
        tx.into_signed(sig).into()
    }
}
