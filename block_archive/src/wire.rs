//! The wire codec: RLP encoding and decoding of single blocks.
//!
//! A block travels as an RLP list `[header, transactions, ommers]`. When
//! receipts accompany the block they form a second top-level list appended
//! directly after the block list, never nested inside it.
//!
//! The header wire order matches the execution-client encoding: the
//! era-dependent difficulty value and the base fee travel as minimal
//! big-endian integers, and the base fee item is omitted entirely when the
//! model value is the all-zero "absent" sentinel, giving a 15-item list for
//! pre-fee-market headers and a 16-item list otherwise.
//!
//! Transactions are carried as opaque envelopes: a legacy transaction is
//! spliced in verbatim as the raw list it already is, a typed transaction
//! becomes a byte string holding the type byte and payload. Payloads are
//! never interpreted.

use ethereum_types::{H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use thiserror::Error;

use crate::model::{Block, BlockHeader, Log, Receipt, TxOutcome};

/// Shorthand for wire codec results.
pub type WireResult<T> = Result<T, WireError>;

/// An error raised while encoding or decoding the wire form of one block.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum WireError {
    /// The bytes violate the RLP grammar or an expected list shape.
    #[error(transparent)]
    Rlp(#[from] DecoderError),

    /// A transaction blob that is neither a legacy list nor a typed
    /// envelope. Carries the 0-based transaction index within the block.
    #[error("invalid transaction {0}")]
    Transaction(usize),
}

/// Encodes one block, appending the sibling receipts list when
/// `with_receipts` is set. Fails if a stored transaction blob is not a
/// valid envelope.
pub fn encode_block(block: &Block, with_receipts: bool) -> WireResult<Vec<u8>> {
    let mut out = encode_block_item(block)?;
    if with_receipts {
        out.extend_from_slice(&rlp::encode_list(&block.receipts));
    }
    Ok(out)
}

/// Decodes one block from its complete top-level item(s): the block list
/// and, when receipts travel with it, the sibling receipts list.
pub fn decode_block(block_item: &[u8], receipts_item: Option<&[u8]>) -> WireResult<Block> {
    let rlp = Rlp::new(block_item);
    check_single_item(&rlp, block_item)?;
    if rlp.item_count()? != 3 {
        return Err(DecoderError::RlpIncorrectListLen.into());
    }
    let header = rlp.val_at(0)?;

    let txs = rlp.at(1)?;
    let mut transactions = Vec::with_capacity(txs.item_count()?);
    for (i, item) in txs.iter().enumerate() {
        transactions.push(decode_transaction(&item, i)?);
    }

    let ommers = rlp.list_at(2)?;

    let receipts = match receipts_item {
        Some(buf) => {
            let receipts_rlp = Rlp::new(buf);
            check_single_item(&receipts_rlp, buf)?;
            if !receipts_rlp.is_list() {
                return Err(DecoderError::RlpExpectedToBeList.into());
            }
            receipts_rlp.as_list()?
        }
        None => Vec::new(),
    };

    Ok(Block {
        header,
        transactions,
        ommers,
        receipts,
    })
}

fn encode_block_item(block: &Block) -> WireResult<Vec<u8>> {
    let mut s = RlpStream::new_list(3);
    s.append(&block.header);
    s.begin_list(block.transactions.len());
    for (i, tx) in block.transactions.iter().enumerate() {
        append_transaction(&mut s, tx, i)?;
    }
    s.append_list(&block.ommers);
    Ok(s.out().to_vec())
}

fn append_transaction(s: &mut RlpStream, tx: &[u8], index: usize) -> WireResult<()> {
    match envelope_kind(tx) {
        Some(Envelope::Legacy) => {
            s.append_raw(tx, 1);
        }
        Some(Envelope::Typed) => {
            s.append(&tx);
        }
        None => return Err(WireError::Transaction(index)),
    }
    Ok(())
}

fn decode_transaction(item: &Rlp, index: usize) -> WireResult<Vec<u8>> {
    if item.is_list() {
        // A legacy transaction is its own encoding; keep it verbatim.
        return Ok(item.as_raw().to_vec());
    }
    let data = item.data()?;
    match envelope_kind(data) {
        Some(Envelope::Typed) => Ok(data.to_vec()),
        _ => Err(WireError::Transaction(index)),
    }
}

enum Envelope {
    Legacy,
    Typed,
}

/// Envelope check only: a legacy blob must be exactly one well-formed RLP
/// list, a typed blob a type byte at or below 0x7f followed by at least one
/// payload byte.
fn envelope_kind(tx: &[u8]) -> Option<Envelope> {
    match tx.first() {
        Some(&b) if b >= 0xc0 => {
            let info = Rlp::new(tx).payload_info().ok()?;
            (info.header_len + info.value_len == tx.len()).then_some(Envelope::Legacy)
        }
        Some(&b) if b <= 0x7f && tx.len() >= 2 => Some(Envelope::Typed),
        _ => None,
    }
}

/// Rejects trailing bytes after the item at the head of `buf`.
fn check_single_item(rlp: &Rlp, buf: &[u8]) -> Result<(), DecoderError> {
    let info = rlp.payload_info()?;
    if info.header_len + info.value_len != buf.len() {
        return Err(DecoderError::RlpInconsistentLengthAndData);
    }
    Ok(())
}

fn h256_to_u256(h: &H256) -> U256 {
    U256::from_big_endian(h.as_bytes())
}

fn u256_to_h256(v: U256) -> H256 {
    let mut buf = [0u8; 32];
    v.to_big_endian(&mut buf);
    H256(buf)
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        let base_fee = h256_to_u256(&self.base_fee_per_gas);
        s.begin_list(if base_fee.is_zero() { 15 } else { 16 });
        s.append(&self.parent_hash);
        s.append(&self.ommers_hash);
        s.append(&self.fee_recipient);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.logs_bloom);
        s.append(&h256_to_u256(&self.difficulty));
        s.append(&self.block_number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data);
        s.append(&self.mix_digest);
        s.append(&self.nonce);
        if !base_fee.is_zero() {
            s.append(&base_fee);
        }
    }
}

impl Decodable for BlockHeader {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let items = rlp.item_count()?;
        if items != 15 && items != 16 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let base_fee_per_gas = if items == 16 {
            u256_to_h256(rlp.val_at(15)?)
        } else {
            H256::zero()
        };
        Ok(Self {
            parent_hash: rlp.val_at(0)?,
            ommers_hash: rlp.val_at(1)?,
            fee_recipient: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            logs_bloom: rlp.val_at(6)?,
            difficulty: u256_to_h256(rlp.val_at(7)?),
            block_number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: rlp.val_at(12)?,
            base_fee_per_gas,
            mix_digest: rlp.val_at(13)?,
            nonce: rlp.val_at(14)?,
        })
    }
}

impl Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        match self.outcome {
            TxOutcome::PostState(root) => {
                s.append(&root);
            }
            TxOutcome::Status(true) => {
                s.append(&1u8);
            }
            TxOutcome::Status(false) => {
                s.append_empty_data();
            }
        }
        s.append(&self.cumulative_gas_used);
        s.append_list(&self.logs);
    }
}

impl Decodable for Receipt {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let first = rlp.at(0)?.data()?;
        let outcome = match first {
            [] => TxOutcome::Status(false),
            [0x01] => TxOutcome::Status(true),
            _ if first.len() == 32 => TxOutcome::PostState(H256::from_slice(first)),
            _ => return Err(DecoderError::Custom("invalid receipt status")),
        };
        Ok(Self {
            outcome,
            cumulative_gas_used: rlp.val_at(1)?,
            logs: rlp.list_at(2)?,
        })
    }
}

impl Encodable for Log {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.address);
        s.append_list(&self.topics);
        s.append(&self.data);
    }
}

impl Decodable for Log {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            address: rlp.val_at(0)?,
            topics: rlp.list_at(1)?,
            data: rlp.val_at(2)?,
        })
    }
}
