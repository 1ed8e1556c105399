//! The transaction variant family.
//!
//! [`TxVariant`] is a closed sum over ordinary signed transactions and three
//! synthetic ("fake") bridging transactions. Every accessor matches
//! exhaustively, so adding a variant forces every accessor to be revisited.
//!
//! Fake variants are constructed by the trusted block-building path. They
//! skip signature recovery and nonce-sequence enforcement, and nothing else.

mod bridge;
pub use bridge::{ContractTriggeredTx, DepositTx, UnsignedBridgeTx};

mod signature;
pub use signature::{SignatureValues, SignatureValuesError};

use crate::RejectionError;
use alloy::{
    consensus::{SignableTransaction, Signed, TxEip1559, TxEip2930, TxLegacy},
    eips::eip2930::AccessList,
    primitives::{address, keccak256, Address, Bytes, ChainId, TxKind, B256, U256},
    rlp::{BufMut, Decodable, Encodable},
};

/// The sender reported by [`DepositTx`]. Deposits are minted by the system,
/// not sent by an account.
pub const DEPOSIT_SENDER: Address = address!("0x00000000000000000000000000000000000a4b05");

/// The type byte of a transaction envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TxType {
    /// Legacy transaction.
    Legacy = 0x00,
    /// [EIP-2930] access-list transaction.
    ///
    /// [EIP-2930]: https://eips.ethereum.org/EIPS/eip-2930
    Eip2930 = 0x01,
    /// [EIP-1559] dynamic-fee transaction.
    ///
    /// [EIP-1559]: https://eips.ethereum.org/EIPS/eip-1559
    Eip1559 = 0x02,
    /// [`DepositTx`].
    Deposit = 0x64,
    /// [`UnsignedBridgeTx`].
    UnsignedBridge = 0x65,
    /// [`ContractTriggeredTx`].
    ContractTriggered = 0x66,
}

impl From<TxType> for u8 {
    fn from(ty: TxType) -> Self {
        ty as Self
    }
}

impl TryFrom<u8> for TxType {
    type Error = TxDecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::Legacy,
            0x01 => Self::Eip2930,
            0x02 => Self::Eip1559,
            0x64 => Self::Deposit,
            0x65 => Self::UnsignedBridge,
            0x66 => Self::ContractTriggered,
            other => return Err(TxDecodeError::UnknownType(other)),
        })
    }
}

/// Errors decoding a synthetic transaction envelope.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TxDecodeError {
    /// The buffer was empty.
    #[error("empty transaction envelope")]
    Empty,
    /// The type byte is not known.
    #[error("unknown transaction type {0:#04x}")]
    UnknownType(u8),
    /// The type is known, but is not a synthetic type.
    #[error("transaction type {0:?} is not a synthetic type")]
    NotSynthetic(TxType),
    /// The RLP body was malformed.
    #[error(transparent)]
    Rlp(#[from] alloy::rlp::Error),
}

/// A transaction, signed or synthetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxVariant {
    /// Legacy transaction.
    Legacy(Signed<TxLegacy>),
    /// [EIP-2930] access-list transaction.
    ///
    /// [EIP-2930]: https://eips.ethereum.org/EIPS/eip-2930
    Eip2930(Signed<TxEip2930>),
    /// [EIP-1559] dynamic-fee transaction.
    ///
    /// [EIP-1559]: https://eips.ethereum.org/EIPS/eip-1559
    Eip1559(Signed<TxEip1559>),
    /// Value deposit from L1.
    Deposit(DepositTx),
    /// Unsigned transaction with an explicit sender.
    UnsignedBridge(UnsignedBridgeTx),
    /// Transaction triggered by an L1 contract.
    ContractTriggered(ContractTriggeredTx),
}

impl From<Signed<TxLegacy>> for TxVariant {
    fn from(tx: Signed<TxLegacy>) -> Self {
        Self::Legacy(tx)
    }
}

impl From<Signed<TxEip2930>> for TxVariant {
    fn from(tx: Signed<TxEip2930>) -> Self {
        Self::Eip2930(tx)
    }
}

impl From<Signed<TxEip1559>> for TxVariant {
    fn from(tx: Signed<TxEip1559>) -> Self {
        Self::Eip1559(tx)
    }
}

impl From<DepositTx> for TxVariant {
    fn from(tx: DepositTx) -> Self {
        Self::Deposit(tx)
    }
}

impl From<UnsignedBridgeTx> for TxVariant {
    fn from(tx: UnsignedBridgeTx) -> Self {
        Self::UnsignedBridge(tx)
    }
}

impl From<ContractTriggeredTx> for TxVariant {
    fn from(tx: ContractTriggeredTx) -> Self {
        Self::ContractTriggered(tx)
    }
}

static EMPTY_ACCESS_LIST: AccessList = AccessList(Vec::new());

impl TxVariant {
    /// The envelope type.
    pub const fn tx_type(&self) -> TxType {
        match self {
            Self::Legacy(_) => TxType::Legacy,
            Self::Eip2930(_) => TxType::Eip2930,
            Self::Eip1559(_) => TxType::Eip1559,
            Self::Deposit(_) => TxType::Deposit,
            Self::UnsignedBridge(_) => TxType::UnsignedBridge,
            Self::ContractTriggered(_) => TxType::ContractTriggered,
        }
    }

    /// True for synthetic variants built by the block-building path.
    pub const fn is_fake(&self) -> bool {
        match self {
            Self::Legacy(_) | Self::Eip2930(_) | Self::Eip1559(_) => false,
            Self::Deposit(_) | Self::UnsignedBridge(_) | Self::ContractTriggered(_) => true,
        }
    }

    /// The chain id, if the transaction commits to one. Pre-[EIP-155] legacy
    /// transactions do not.
    ///
    /// [EIP-155]: https://eips.ethereum.org/EIPS/eip-155
    pub const fn chain_id(&self) -> Option<ChainId> {
        match self {
            Self::Legacy(tx) => tx.tx().chain_id,
            Self::Eip2930(tx) => Some(tx.tx().chain_id),
            Self::Eip1559(tx) => Some(tx.tx().chain_id),
            Self::Deposit(tx) => Some(tx.chain_id),
            Self::UnsignedBridge(tx) => Some(tx.chain_id),
            Self::ContractTriggered(tx) => Some(tx.chain_id),
        }
    }

    /// The nonce. Contract-triggered transactions and deposits always report
    /// zero.
    pub const fn nonce(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.tx().nonce,
            Self::Eip2930(tx) => tx.tx().nonce,
            Self::Eip1559(tx) => tx.tx().nonce,
            Self::UnsignedBridge(tx) => tx.nonce,
            Self::Deposit(_) | Self::ContractTriggered(_) => 0,
        }
    }

    /// The gas limit. Deposits are not metered and report zero.
    pub const fn gas_limit(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.tx().gas_limit,
            Self::Eip2930(tx) => tx.tx().gas_limit,
            Self::Eip1559(tx) => tx.tx().gas_limit,
            Self::UnsignedBridge(tx) => tx.gas_limit,
            Self::ContractTriggered(tx) => tx.gas_limit,
            Self::Deposit(_) => 0,
        }
    }

    /// The gas price, or the fee cap for dynamic-fee transactions.
    pub const fn gas_price(&self) -> u128 {
        self.max_fee_per_gas()
    }

    /// The maximum fee per gas the sender will pay.
    pub const fn max_fee_per_gas(&self) -> u128 {
        match self {
            Self::Legacy(tx) => tx.tx().gas_price,
            Self::Eip2930(tx) => tx.tx().gas_price,
            Self::Eip1559(tx) => tx.tx().max_fee_per_gas,
            Self::UnsignedBridge(tx) => tx.gas_price,
            Self::ContractTriggered(tx) => tx.gas_price,
            Self::Deposit(_) => 0,
        }
    }

    /// The maximum priority fee per gas. Equal to the gas price for
    /// transactions without a separate tip.
    pub const fn max_priority_fee_per_gas(&self) -> u128 {
        match self {
            Self::Eip1559(tx) => tx.tx().max_priority_fee_per_gas,
            _ => self.max_fee_per_gas(),
        }
    }

    /// The price per gas actually paid under the given base fee.
    pub fn effective_gas_price(&self, base_fee: u64) -> u128 {
        match self {
            Self::Eip1559(tx) => {
                let tx = tx.tx();
                tx.max_fee_per_gas
                    .min((base_fee as u128).saturating_add(tx.max_priority_fee_per_gas))
            }
            _ => self.max_fee_per_gas(),
        }
    }

    /// The call target, or [`TxKind::Create`].
    pub const fn kind(&self) -> TxKind {
        match self {
            Self::Legacy(tx) => tx.tx().to,
            Self::Eip2930(tx) => tx.tx().to,
            Self::Eip1559(tx) => tx.tx().to,
            Self::UnsignedBridge(tx) => tx.to,
            Self::ContractTriggered(tx) => tx.to,
            Self::Deposit(tx) => TxKind::Call(tx.to),
        }
    }

    /// The call target, `None` for contract creation.
    pub const fn to(&self) -> Option<Address> {
        match self.kind() {
            TxKind::Call(to) => Some(to),
            TxKind::Create => None,
        }
    }

    /// True if the transaction creates a contract.
    pub const fn is_create(&self) -> bool {
        matches!(self.kind(), TxKind::Create)
    }

    /// Wei transferred by the transaction.
    pub const fn value(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.tx().value,
            Self::Eip2930(tx) => tx.tx().value,
            Self::Eip1559(tx) => tx.tx().value,
            Self::UnsignedBridge(tx) => tx.value,
            Self::ContractTriggered(tx) => tx.value,
            Self::Deposit(tx) => tx.value,
        }
    }

    /// Call data or init code. Deposits carry none.
    pub fn input(&self) -> &Bytes {
        static EMPTY: Bytes = Bytes::new();
        match self {
            Self::Legacy(tx) => &tx.tx().input,
            Self::Eip2930(tx) => &tx.tx().input,
            Self::Eip1559(tx) => &tx.tx().input,
            Self::UnsignedBridge(tx) => &tx.input,
            Self::ContractTriggered(tx) => &tx.input,
            Self::Deposit(_) => &EMPTY,
        }
    }

    /// The [EIP-2930] access list. Empty for variants without one.
    ///
    /// [EIP-2930]: https://eips.ethereum.org/EIPS/eip-2930
    pub fn access_list(&self) -> &AccessList {
        match self {
            Self::Eip2930(tx) => &tx.tx().access_list,
            Self::Eip1559(tx) => &tx.tx().access_list,
            Self::Legacy(_)
            | Self::Deposit(_)
            | Self::UnsignedBridge(_)
            | Self::ContractTriggered(_) => &EMPTY_ACCESS_LIST,
        }
    }

    /// The L1 request this transaction settles, if any.
    pub const fn request_id(&self) -> Option<B256> {
        match self {
            Self::ContractTriggered(tx) => Some(tx.request_id),
            Self::Deposit(tx) => Some(tx.l1_request_id),
            Self::Legacy(_) | Self::Eip2930(_) | Self::Eip1559(_) | Self::UnsignedBridge(_) => {
                None
            }
        }
    }

    /// The sender of a synthetic transaction. `None` for signed variants,
    /// whose sender must be recovered.
    pub const fn explicit_sender(&self) -> Option<Address> {
        match self {
            Self::UnsignedBridge(tx) => Some(tx.from),
            Self::ContractTriggered(tx) => Some(tx.from),
            Self::Deposit(_) => Some(DEPOSIT_SENDER),
            Self::Legacy(_) | Self::Eip2930(_) | Self::Eip1559(_) => None,
        }
    }

    /// Resolve the sender. Signed variants recover it from the signature;
    /// synthetic variants report their explicit sender.
    pub fn recover_sender(&self) -> Result<Address, RejectionError> {
        match self {
            Self::Legacy(tx) => recover(tx),
            Self::Eip2930(tx) => recover(tx),
            Self::Eip1559(tx) => recover(tx),
            Self::Deposit(_) => Ok(DEPOSIT_SENDER),
            Self::UnsignedBridge(tx) => Ok(tx.from),
            Self::ContractTriggered(tx) => Ok(tx.from),
        }
    }

    /// The raw signature triple. Synthetic variants report
    /// [`SignatureValues::ZERO`].
    pub fn raw_signature_values(&self) -> SignatureValues {
        match self {
            Self::Legacy(tx) => SignatureValues::legacy(tx.signature(), tx.tx().chain_id),
            Self::Eip2930(tx) => SignatureValues::typed(tx.signature()),
            Self::Eip1559(tx) => SignatureValues::typed(tx.signature()),
            Self::Deposit(_) | Self::UnsignedBridge(_) | Self::ContractTriggered(_) => {
                SignatureValues::ZERO
            }
        }
    }

    /// Replace the signature. Discarded for synthetic variants, which have no
    /// signature to replace.
    ///
    /// For legacy transactions the chain id is taken from `v` as in
    /// [EIP-155], and `chain_id` is ignored. For typed transactions `v` is the
    /// y-parity and `chain_id` replaces the transaction's chain id.
    ///
    /// [EIP-155]: https://eips.ethereum.org/EIPS/eip-155
    pub fn set_signature_values(
        &mut self,
        chain_id: ChainId,
        values: SignatureValues,
    ) -> Result<(), SignatureValuesError> {
        match self {
            Self::Legacy(signed) => {
                let (parity, eip155_chain_id) = values.legacy_parity()?;
                let mut tx = signed.tx().clone();
                tx.chain_id = eip155_chain_id;
                *signed = tx.into_signed(values.to_signature(parity));
            }
            Self::Eip2930(signed) => {
                let parity = values.typed_parity()?;
                let mut tx = signed.tx().clone();
                tx.chain_id = chain_id;
                *signed = tx.into_signed(values.to_signature(parity));
            }
            Self::Eip1559(signed) => {
                let parity = values.typed_parity()?;
                let mut tx = signed.tx().clone();
                tx.chain_id = chain_id;
                *signed = tx.into_signed(values.to_signature(parity));
            }
            Self::Deposit(_) | Self::UnsignedBridge(_) | Self::ContractTriggered(_) => {
                tracing::trace!(
                    tx_type = ?self.tx_type(),
                    discarded = !values.is_zero(),
                    "ignoring signature on synthetic transaction"
                );
            }
        }
        Ok(())
    }

    /// The transaction hash.
    pub fn hash(&self) -> B256 {
        match self {
            Self::Legacy(tx) => *tx.hash(),
            Self::Eip2930(tx) => *tx.hash(),
            Self::Eip1559(tx) => *tx.hash(),
            Self::Deposit(_) | Self::UnsignedBridge(_) | Self::ContractTriggered(_) => {
                let mut buf = Vec::new();
                self.encode_synthetic_2718(&mut buf);
                keccak256(buf)
            }
        }
    }

    /// Encode a synthetic variant as an [EIP-2718] envelope:
    /// `type || rlp(fields)`. Does nothing for signed variants, which are
    /// encoded by their own consensus types.
    ///
    /// [EIP-2718]: https://eips.ethereum.org/EIPS/eip-2718
    pub fn encode_synthetic_2718(&self, out: &mut dyn BufMut) {
        match self {
            Self::Deposit(tx) => {
                out.put_u8(TxType::Deposit.into());
                tx.encode(out);
            }
            Self::UnsignedBridge(tx) => {
                out.put_u8(TxType::UnsignedBridge.into());
                tx.encode(out);
            }
            Self::ContractTriggered(tx) => {
                out.put_u8(TxType::ContractTriggered.into());
                tx.encode(out);
            }
            Self::Legacy(_) | Self::Eip2930(_) | Self::Eip1559(_) => {}
        }
    }

    /// Decode a synthetic [EIP-2718] envelope.
    ///
    /// [EIP-2718]: https://eips.ethereum.org/EIPS/eip-2718
    pub fn decode_synthetic_2718(buf: &[u8]) -> Result<Self, TxDecodeError> {
        let (&ty, mut body) = buf.split_first().ok_or(TxDecodeError::Empty)?;
        let tx = match TxType::try_from(ty)? {
            TxType::Deposit => Self::Deposit(DepositTx::decode(&mut body)?),
            TxType::UnsignedBridge => Self::UnsignedBridge(UnsignedBridgeTx::decode(&mut body)?),
            TxType::ContractTriggered => {
                Self::ContractTriggered(ContractTriggeredTx::decode(&mut body)?)
            }
            other @ (TxType::Legacy | TxType::Eip2930 | TxType::Eip1559) => {
                return Err(TxDecodeError::NotSynthetic(other))
            }
        };
        if !body.is_empty() {
            return Err(alloy::rlp::Error::UnexpectedLength.into());
        }
        Ok(tx)
    }
}

fn recover<T>(signed: &Signed<T>) -> Result<Address, RejectionError>
where
    T: SignableTransaction<alloy::primitives::Signature>,
{
    signed
        .signature()
        .recover_address_from_prehash(&signed.signature_hash())
        .map_err(|e| RejectionError::InvalidSignature(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy::{
        primitives::{b256, bytes},
        signers::{local::PrivateKeySigner, SignerSync},
    };

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&b256!(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        ))
        .unwrap()
    }

    fn signed_1559() -> Signed<TxEip1559> {
        let tx = TxEip1559 {
            chain_id: 1,
            nonce: 3,
            gas_limit: 50_000,
            max_fee_per_gas: 20,
            max_priority_fee_per_gas: 2,
            to: TxKind::Call(Address::repeat_byte(0xbb)),
            value: U256::from(5),
            access_list: Default::default(),
            input: bytes!("c0ffee"),
        };
        let sig = signer().sign_hash_sync(&tx.signature_hash()).unwrap();
        tx.into_signed(sig)
    }

    fn fakes() -> Vec<TxVariant> {
        vec![
            DepositTx {
                chain_id: 1,
                l1_request_id: B256::repeat_byte(1),
                to: Address::repeat_byte(0xaa),
                value: U256::from(100),
            }
            .into(),
            UnsignedBridgeTx {
                chain_id: 1,
                from: Address::repeat_byte(0x11),
                nonce: 9,
                gas_price: 7,
                gas_limit: 100_000,
                to: TxKind::Create,
                value: U256::from(1),
                input: bytes!("6000"),
            }
            .into(),
            ContractTriggeredTx {
                chain_id: 1,
                request_id: B256::repeat_byte(2),
                from: Address::repeat_byte(0x22),
                gas_price: 7,
                gas_limit: 100_000,
                to: TxKind::Call(Address::repeat_byte(0x33)),
                value: U256::ZERO,
                input: bytes!("01020304"),
            }
            .into(),
        ]
    }

    #[test]
    fn fake_signature_values_are_sentinel() {
        for mut tx in fakes() {
            assert!(tx.is_fake());
            assert_eq!(tx.raw_signature_values(), SignatureValues::ZERO);

            let before = tx.clone();
            let values = SignatureValues::new(U256::from(27), U256::from(1), U256::from(2));
            tx.set_signature_values(1, values).unwrap();
            assert_eq!(tx.raw_signature_values(), SignatureValues::ZERO);
            assert_eq!(tx, before);
        }
    }

    #[test]
    fn copy_is_independent() {
        for tx in fakes() {
            let mut original = tx.clone();
            let copy = original.clone();
            match &mut original {
                TxVariant::UnsignedBridge(inner) => inner.input = bytes!("ff"),
                TxVariant::ContractTriggered(inner) => inner.input = bytes!("ff"),
                TxVariant::Deposit(inner) => inner.value = U256::MAX,
                _ => unreachable!(),
            }
            assert_eq!(copy, tx);
            assert_ne!(copy, original);
        }
    }

    #[test]
    fn fixed_accessors() {
        let txs = fakes();

        let deposit = &txs[0];
        assert_eq!(deposit.gas_limit(), 0);
        assert_eq!(deposit.gas_price(), 0);
        assert_eq!(deposit.nonce(), 0);
        assert_eq!(deposit.to(), Some(Address::repeat_byte(0xaa)));
        assert_eq!(deposit.recover_sender().unwrap(), DEPOSIT_SENDER);

        let unsigned = &txs[1];
        assert_eq!(unsigned.nonce(), 9);
        assert!(unsigned.is_create());
        assert_eq!(unsigned.recover_sender().unwrap(), Address::repeat_byte(0x11));

        let triggered = &txs[2];
        assert_eq!(triggered.nonce(), 0);
        assert_eq!(triggered.request_id(), Some(B256::repeat_byte(2)));
    }

    #[test]
    fn synthetic_envelope() {
        for tx in fakes() {
            let mut buf = Vec::new();
            tx.encode_synthetic_2718(&mut buf);
            assert_eq!(buf[0], u8::from(tx.tx_type()));
            assert_eq!(TxVariant::decode_synthetic_2718(&buf).unwrap(), tx);
            assert_eq!(tx.hash(), keccak256(&buf));
        }

        assert_eq!(TxVariant::decode_synthetic_2718(&[]), Err(TxDecodeError::Empty));
        assert_eq!(
            TxVariant::decode_synthetic_2718(&[0x02, 0xc0]),
            Err(TxDecodeError::NotSynthetic(TxType::Eip1559))
        );
    }

    #[test]
    fn signed_recovery_and_values() {
        let signed = signed_1559();
        let mut tx = TxVariant::from(signed);
        assert!(!tx.is_fake());
        assert_eq!(tx.recover_sender().unwrap(), signer().address());
        assert_eq!(tx.effective_gas_price(10), 12);
        assert_eq!(tx.effective_gas_price(19), 20);

        let values = tx.raw_signature_values();
        assert!(!values.is_zero());

        // rewriting the same signature is a no-op
        let before = tx.clone();
        tx.set_signature_values(1, values).unwrap();
        assert_eq!(tx, before);

        // a different s no longer recovers to the signer
        let tampered = SignatureValues { s: values.s - U256::from(1), ..values };
        tx.set_signature_values(1, tampered).unwrap();
        assert_ne!(tx.recover_sender().ok(), Some(signer().address()));
    }
}
