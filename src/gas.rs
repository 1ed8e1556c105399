//! Gas and refund reconciliation.
//!
//! Settlement combines the protocol refund counter with the adjustments the
//! hook requests. All arithmetic saturates: no combination of inputs can wrap
//! or produce a negative refund.

use crate::tx::TxVariant;

/// Base cost of every transaction.
pub const TX_BASE_GAS: u64 = 21_000;
/// Extra cost of a contract-creating transaction.
pub const TX_CREATE_GAS: u64 = 32_000;
/// Cost per zero byte of calldata.
pub const TX_DATA_ZERO_GAS: u64 = 4;
/// Cost per non-zero byte of calldata.
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;
/// Cost per address in an access list.
pub const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Cost per storage key in an access list.
pub const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// Cap on the protocol refund, expressed as the divisor of gas used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefundPolicy {
    /// Refunds capped at one fifth of gas used ([EIP-3529]).
    ///
    /// [EIP-3529]: https://eips.ethereum.org/EIPS/eip-3529
    #[default]
    London,
    /// Refunds capped at half of gas used.
    Frontier,
}

impl RefundPolicy {
    /// The divisor applied to gas used.
    pub const fn quotient(&self) -> u64 {
        match self {
            Self::London => 5,
            Self::Frontier => 2,
        }
    }
}

/// Gas charged before execution begins.
pub fn intrinsic_gas(tx: &TxVariant) -> u64 {
    let mut gas = TX_BASE_GAS;
    if tx.is_create() {
        gas = gas.saturating_add(TX_CREATE_GAS);
    }

    let data = tx.input();
    let zeros = data.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = data.len() as u64 - zeros;
    gas = gas
        .saturating_add(zeros.saturating_mul(TX_DATA_ZERO_GAS))
        .saturating_add(non_zeros.saturating_mul(TX_DATA_NON_ZERO_GAS));

    for item in tx.access_list().iter() {
        gas = gas
            .saturating_add(ACCESS_LIST_ADDRESS_GAS)
            .saturating_add(
                (item.storage_keys.len() as u64).saturating_mul(ACCESS_LIST_STORAGE_KEY_GAS),
            );
    }
    gas
}

/// Inputs to [`reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasInputs {
    /// The transaction gas limit.
    pub gas_limit: u64,
    /// Gas left when execution finished.
    pub gas_remaining: u64,
    /// The refund counter accumulated by the VM.
    pub protocol_refund: u64,
    /// Extra refund requested by the hook.
    pub force_refund: u64,
    /// Gas the hook marks as never refundable.
    pub nonrefundable: u64,
    /// The refund cap.
    pub policy: RefundPolicy,
}

/// The result of [`reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasSettlement {
    /// Gas consumed before refunds.
    pub gas_used_before_refund: u64,
    /// Gas returned to the sender. Never exceeds
    /// [`Self::gas_used_before_refund`].
    pub refund: u64,
    /// Gas finally charged.
    pub gas_used: u64,
}

impl GasSettlement {
    /// Gas returned to the sender's balance: unused gas plus the refund.
    pub const fn returned(&self, gas_limit: u64) -> u64 {
        gas_limit.saturating_sub(self.gas_used)
    }
}

/// Settle gas for a completed transaction.
pub const fn reconcile(inputs: GasInputs) -> GasSettlement {
    let used = inputs.gas_limit.saturating_sub(inputs.gas_remaining);

    let cap = used / inputs.policy.quotient();
    let capped = if inputs.protocol_refund < cap { inputs.protocol_refund } else { cap };

    let refund = capped.saturating_add(inputs.force_refund).saturating_sub(inputs.nonrefundable);
    let refund = if refund > used { used } else { refund };

    GasSettlement { gas_used_before_refund: used, refund, gas_used: used - refund }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tx::{DepositTx, UnsignedBridgeTx};
    use alloy::primitives::{bytes, Address, TxKind};

    fn inputs(gas_remaining: u64, protocol_refund: u64) -> GasInputs {
        GasInputs { gas_limit: 100_000, gas_remaining, protocol_refund, ..Default::default() }
    }

    #[test]
    fn protocol_refund_is_capped() {
        let s = reconcile(inputs(50_000, 40_000));
        assert_eq!(s.gas_used_before_refund, 50_000);
        assert_eq!(s.refund, 10_000);
        assert_eq!(s.gas_used, 40_000);

        let s = reconcile(GasInputs { policy: RefundPolicy::Frontier, ..inputs(50_000, 40_000) });
        assert_eq!(s.refund, 25_000);
    }

    #[test]
    fn force_refund_is_bounded_by_usage() {
        let s = reconcile(GasInputs { force_refund: u64::MAX, ..inputs(50_000, 0) });
        assert_eq!(s.refund, 50_000);
        assert_eq!(s.gas_used, 0);
    }

    #[test]
    fn nonrefundable_floors_at_zero() {
        let s = reconcile(GasInputs { nonrefundable: u64::MAX, ..inputs(50_000, 40_000) });
        assert_eq!(s.refund, 0);
        assert_eq!(s.gas_used, 50_000);
    }

    #[test]
    fn refund_bounds_hold() {
        let values = [0, 1, 7, 21_000, 99_999, 100_000, u64::MAX / 2, u64::MAX];
        for gas_remaining in values {
            for protocol_refund in values {
                for force_refund in values {
                    for nonrefundable in values {
                        let i = GasInputs {
                            force_refund,
                            nonrefundable,
                            ..inputs(gas_remaining, protocol_refund)
                        };
                        let s = reconcile(i);
                        assert!(s.refund <= s.gas_used_before_refund);
                        assert_eq!(s.gas_used + s.refund, s.gas_used_before_refund);
                    }
                }
            }
        }
    }

    #[test]
    fn remaining_above_limit() {
        let s = reconcile(inputs(200_000, 5));
        assert_eq!(s, GasSettlement::default());
    }

    #[test]
    fn intrinsic() {
        let call = TxVariant::UnsignedBridge(UnsignedBridgeTx {
            to: TxKind::Call(Address::ZERO),
            input: bytes!("00ff00ff01"),
            ..Default::default()
        });
        assert_eq!(intrinsic_gas(&call), 21_000 + 2 * 4 + 3 * 16);

        let create = TxVariant::UnsignedBridge(UnsignedBridgeTx {
            to: TxKind::Create,
            ..Default::default()
        });
        assert_eq!(intrinsic_gas(&create), 53_000);

        let deposit = TxVariant::Deposit(DepositTx::default());
        assert_eq!(intrinsic_gas(&deposit), 21_000);
    }
}
