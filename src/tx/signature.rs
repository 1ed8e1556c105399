use alloy::primitives::{ChainId, Signature, U256};

/// The raw `(v, r, s)` triple of a transaction signature.
///
/// For legacy transactions `v` follows [EIP-155] when a chain id is present,
/// and is `27 + parity` otherwise. For typed transactions `v` is the bare
/// y-parity.
///
/// [EIP-155]: https://eips.ethereum.org/EIPS/eip-155
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SignatureValues {
    /// The recovery value.
    pub v: U256,
    /// The `r` value.
    pub r: U256,
    /// The `s` value.
    pub s: U256,
}

/// A `v` value that does not encode a y-parity.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid signature v value: {0}")]
pub struct SignatureValuesError(pub U256);

impl SignatureValues {
    /// The zero triple reported by synthetic transactions.
    pub const ZERO: Self = Self { v: U256::ZERO, r: U256::ZERO, s: U256::ZERO };

    /// Instantiate a new triple.
    pub const fn new(v: U256, r: U256, s: U256) -> Self {
        Self { v, r, s }
    }

    /// True if all three values are zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Triple for a legacy transaction, with an optional [EIP-155] chain id.
    ///
    /// [EIP-155]: https://eips.ethereum.org/EIPS/eip-155
    pub fn legacy(signature: &Signature, chain_id: Option<ChainId>) -> Self {
        let parity = signature.v() as u64;
        let v = match chain_id {
            Some(id) => U256::from(id) * U256::from(2) + U256::from(35 + parity),
            None => U256::from(27 + parity),
        };
        Self { v, r: signature.r(), s: signature.s() }
    }

    /// Triple for a typed transaction.
    pub fn typed(signature: &Signature) -> Self {
        Self { v: U256::from(signature.v() as u8), r: signature.r(), s: signature.s() }
    }

    /// Decode a legacy `v` into the y-parity and the [EIP-155] chain id.
    ///
    /// [EIP-155]: https://eips.ethereum.org/EIPS/eip-155
    pub fn legacy_parity(&self) -> Result<(bool, Option<ChainId>), SignatureValuesError> {
        let v: u64 = self.v.try_into().map_err(|_| SignatureValuesError(self.v))?;
        match v {
            27 | 28 => Ok((v == 28, None)),
            v if v >= 35 => Ok(((v - 35) % 2 == 1, Some((v - 35) / 2))),
            _ => Err(SignatureValuesError(self.v)),
        }
    }

    /// Decode a typed-transaction `v` into the y-parity.
    pub fn typed_parity(&self) -> Result<bool, SignatureValuesError> {
        if self.v.is_zero() {
            Ok(false)
        } else if self.v == U256::from(1) {
            Ok(true)
        } else {
            Err(SignatureValuesError(self.v))
        }
    }

    /// Build a [`Signature`] from `r`, `s` and the given parity.
    pub fn to_signature(&self, parity: bool) -> Signature {
        Signature::new(self.r, self.s, parity)
    }
}
