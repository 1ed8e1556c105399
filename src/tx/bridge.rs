use alloy::{
    primitives::{Address, Bytes, ChainId, TxKind, B256, U256},
    rlp::{BufMut, Decodable, Encodable, Header},
};

/// An unsigned transaction built by the trusted block-building path, e.g. a
/// forced inclusion from L1.
///
/// The sender is carried explicitly and is never checked against a
/// signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UnsignedBridgeTx {
    /// The chain id of the target chain.
    pub chain_id: ChainId,
    /// The sender of the transaction.
    pub from: Address,
    /// The nonce of the sender account.
    pub nonce: u64,
    /// Wei per gas.
    pub gas_price: u128,
    /// The gas limit.
    pub gas_limit: u64,
    /// The call target, or [`TxKind::Create`].
    pub to: TxKind,
    /// Wei transferred with the call.
    pub value: U256,
    /// Call data or init code.
    pub input: Bytes,
}

/// A transaction triggered by a contract on L1.
///
/// Carries no nonce of its own. Replays are identified by `request_id`, which
/// is the concern of whoever deduplicates requests, not of nonce ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ContractTriggeredTx {
    /// The chain id of the target chain.
    pub chain_id: ChainId,
    /// Correlates this transaction with the originating L1 request.
    pub request_id: B256,
    /// The sender of the transaction.
    pub from: Address,
    /// Wei per gas.
    pub gas_price: u128,
    /// The gas limit.
    pub gas_limit: u64,
    /// The call target, or [`TxKind::Create`].
    pub to: TxKind,
    /// Wei transferred with the call.
    pub value: U256,
    /// Call data or init code.
    pub input: Bytes,
}

/// A value deposit from L1. Not metered, never runs code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DepositTx {
    /// The chain id of the target chain.
    pub chain_id: ChainId,
    /// Correlates this deposit with the originating L1 request.
    pub l1_request_id: B256,
    /// The credited account.
    pub to: Address,
    /// Wei minted to `to`.
    pub value: U256,
}

impl UnsignedBridgeTx {
    fn fields_len(&self) -> usize {
        self.chain_id.length()
            + self.from.length()
            + self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.input.length()
    }
}

impl Encodable for UnsignedBridgeTx {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.fields_len() }.encode(out);
        self.chain_id.encode(out);
        self.from.encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.input.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_len();
        Header { list: true, payload_length }.length() + payload_length
    }
}

impl Decodable for UnsignedBridgeTx {
    fn decode(buf: &mut &[u8]) -> alloy::rlp::Result<Self> {
        decode_list(buf, |buf| {
            Ok(Self {
                chain_id: Decodable::decode(buf)?,
                from: Decodable::decode(buf)?,
                nonce: Decodable::decode(buf)?,
                gas_price: Decodable::decode(buf)?,
                gas_limit: Decodable::decode(buf)?,
                to: Decodable::decode(buf)?,
                value: Decodable::decode(buf)?,
                input: Decodable::decode(buf)?,
            })
        })
    }
}

impl ContractTriggeredTx {
    fn fields_len(&self) -> usize {
        self.chain_id.length()
            + self.request_id.length()
            + self.from.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.input.length()
    }
}

impl Encodable for ContractTriggeredTx {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.fields_len() }.encode(out);
        self.chain_id.encode(out);
        self.request_id.encode(out);
        self.from.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.input.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_len();
        Header { list: true, payload_length }.length() + payload_length
    }
}

impl Decodable for ContractTriggeredTx {
    fn decode(buf: &mut &[u8]) -> alloy::rlp::Result<Self> {
        decode_list(buf, |buf| {
            Ok(Self {
                chain_id: Decodable::decode(buf)?,
                request_id: Decodable::decode(buf)?,
                from: Decodable::decode(buf)?,
                gas_price: Decodable::decode(buf)?,
                gas_limit: Decodable::decode(buf)?,
                to: Decodable::decode(buf)?,
                value: Decodable::decode(buf)?,
                input: Decodable::decode(buf)?,
            })
        })
    }
}

impl DepositTx {
    fn fields_len(&self) -> usize {
        self.chain_id.length() + self.l1_request_id.length() + self.to.length() + self.value.length()
    }
}

impl Encodable for DepositTx {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.fields_len() }.encode(out);
        self.chain_id.encode(out);
        self.l1_request_id.encode(out);
        self.to.encode(out);
        self.value.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_len();
        Header { list: true, payload_length }.length() + payload_length
    }
}

impl Decodable for DepositTx {
    fn decode(buf: &mut &[u8]) -> alloy::rlp::Result<Self> {
        decode_list(buf, |buf| {
            Ok(Self {
                chain_id: Decodable::decode(buf)?,
                l1_request_id: Decodable::decode(buf)?,
                to: Decodable::decode(buf)?,
                value: Decodable::decode(buf)?,
            })
        })
    }
}

/// Decode an RLP list header, then the fields, and check that the fields
/// consumed exactly the declared payload.
fn decode_list<T>(
    buf: &mut &[u8],
    f: impl FnOnce(&mut &[u8]) -> alloy::rlp::Result<T>,
) -> alloy::rlp::Result<T> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy::rlp::Error::UnexpectedString);
    }
    let started_len = buf.len();
    let this = f(buf)?;
    let consumed = started_len - buf.len();
    if consumed != header.payload_length {
        return Err(alloy::rlp::Error::ListLengthMismatch {
            expected: header.payload_length,
            got: consumed,
        });
    }
    Ok(this)
}
