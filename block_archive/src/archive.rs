//! The archive codec: fixed-offset container encoding of archive bodies.
//!
//! Every multi-byte integer is little-endian. A container is laid out as a
//! fixed-size part followed by the variable-size parts of its fields in
//! declaration order; each variable-size field occupies four bytes in the
//! fixed part holding the offset of its data, measured from the start of
//! the container. A list of variable-size elements starts with a table of
//! one four-byte offset per element, so the first offset doubles as the
//! element count times four.
//!
//! Decoding is strict: offsets must be exactly the values encoding would
//! have produced where the layout pins them, monotone and in-range
//! elsewhere, and every length bound of [`crate::bounds`] is enforced.
//! Encoding never produces an invalid archive; [`encode_body`] re-checks
//! the bounds so a hand-built model cannot either.

use ethereum_types::{Bloom, H160, H256, H64};
use thiserror::Error;

use crate::bounds::{
    self, BoundsError, MAX_BLOCKS, MAX_EXTRA_DATA, MAX_LOGS, MAX_LOG_DATA, MAX_OMMERS,
    MAX_RECEIPTS, MAX_TOPICS, MAX_TRANSACTIONS, MAX_TRANSACTION_SIZE,
};
use crate::model::{ArchiveBody, ArchiveHeader, Block, BlockHeader, Log, Receipt, TxOutcome};

/// Version written into the header of every produced archive. Readers
/// surface the version but accept any value.
pub const FORMAT_VERSION: u64 = 0;

/// Encoded size of an [`ArchiveHeader`].
pub const HEADER_SIZE: usize = 20;

const OFFSET_SIZE: usize = 4;
const BLOCK_HEADER_FIXED: usize = 576;
const LOG_FIXED: usize = 28;
const RECEIPT_FIXED: usize = 24;
const BLOCK_FIXED: usize = 16;
const BODY_FIXED: usize = 4;

const TOPIC_SIZE: usize = 32;
const POST_STATE_SIZE: usize = 32;

/// Byte offset of the extra-data offset slot within a block header.
const EXTRA_DATA_SLOT: usize = 500;

/// Shorthand for archive codec results.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// An error raised while encoding or decoding the archive format.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ArchiveError {
    /// Input ended before the named container's fixed-size part.
    #[error("{0}: buffer too short")]
    Truncated(&'static str),

    /// An offset slot holding a value that is misaligned, out of range, or
    /// out of order for the named container.
    #[error("{0}: invalid offset")]
    Offset(&'static str),

    /// A topics region whose size is not a multiple of the 32-byte topic
    /// width.
    #[error("log topics region of {0} bytes is not a whole number of topics")]
    Topics(usize),

    /// A post-state region that is neither empty nor a 32-byte root.
    #[error("post-state is {0} bytes, want 0 or 32")]
    PostState(usize),

    /// A length or count above the format maximum.
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// An archive body carrying no blocks.
    #[error("archive body has no blocks")]
    EmptyBody,
}

/// Encodes an archive header into its 20-byte form.
pub fn encode_header(header: &ArchiveHeader) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..8].copy_from_slice(&header.version.to_le_bytes());
    buf[8..16].copy_from_slice(&header.head_block_number.to_le_bytes());
    buf[16..20].copy_from_slice(&header.block_count.to_le_bytes());
    buf
}

/// Decodes an archive header from exactly [`HEADER_SIZE`] bytes.
pub fn decode_header(buf: &[u8]) -> ArchiveResult<ArchiveHeader> {
    if buf.len() != HEADER_SIZE {
        return Err(ArchiveError::Truncated("archive header"));
    }
    Ok(ArchiveHeader {
        version: read_u64(buf, 0),
        head_block_number: read_u64(buf, 8),
        block_count: read_u32(buf, 16),
    })
}

/// Encodes an archive body. Fails on an empty body, on any violated length
/// bound, and on a body too large for 32-bit offsets.
pub fn encode_body(body: &ArchiveBody) -> ArchiveResult<Vec<u8>> {
    if body.blocks.is_empty() {
        return Err(ArchiveError::EmptyBody);
    }
    bounds::check_body(body)?;
    let total = BODY_FIXED + var_list_size(body.blocks.iter().map(block_size));
    if total > u32::MAX as usize {
        return Err(BoundsError {
            field: "archive body",
            len: total,
            max: u32::MAX as usize,
        }
        .into());
    }
    let mut out = Vec::with_capacity(total);
    put_u32(&mut out, BODY_FIXED as u32);
    put_var_list(&mut out, &body.blocks, block_size, put_block);
    Ok(out)
}

/// Decodes an archive body from the bytes following the archive header.
pub fn decode_body(buf: &[u8]) -> ArchiveResult<ArchiveBody> {
    if buf.len() < BODY_FIXED {
        return Err(ArchiveError::Truncated("archive body"));
    }
    if read_u32(buf, 0) as usize != BODY_FIXED {
        return Err(ArchiveError::Offset("archive body"));
    }
    let blocks = take_var_list(&buf[BODY_FIXED..], MAX_BLOCKS, "blocks", take_block)?;
    if blocks.is_empty() {
        return Err(ArchiveError::EmptyBody);
    }
    Ok(ArchiveBody { blocks })
}

fn header_size(h: &BlockHeader) -> usize {
    BLOCK_HEADER_FIXED + h.extra_data.len()
}

fn log_size(l: &Log) -> usize {
    LOG_FIXED + TOPIC_SIZE * l.topics.len() + l.data.len()
}

fn receipt_size(r: &Receipt) -> usize {
    RECEIPT_FIXED + post_state_bytes(r).len() + var_list_size(r.logs.iter().map(log_size))
}

fn block_size(b: &Block) -> usize {
    BLOCK_FIXED
        + header_size(&b.header)
        + var_list_size(b.transactions.iter().map(Vec::len))
        + var_list_size(b.ommers.iter().map(header_size))
        + var_list_size(b.receipts.iter().map(receipt_size))
}

fn var_list_size(element_sizes: impl Iterator<Item = usize>) -> usize {
    element_sizes.map(|s| OFFSET_SIZE + s).sum()
}

fn post_state_bytes(r: &Receipt) -> &[u8] {
    match &r.outcome {
        TxOutcome::PostState(root) => root.as_bytes(),
        TxOutcome::Status(_) => &[],
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_var_list<T>(
    out: &mut Vec<u8>,
    items: &[T],
    size_of: impl Fn(&T) -> usize,
    put: impl Fn(&mut Vec<u8>, &T),
) {
    let mut offset = OFFSET_SIZE * items.len();
    for item in items {
        put_u32(out, offset as u32);
        offset += size_of(item);
    }
    for item in items {
        put(out, item);
    }
}

fn put_block(out: &mut Vec<u8>, b: &Block) {
    let transactions_offset = BLOCK_FIXED + header_size(&b.header);
    let ommers_offset =
        transactions_offset + var_list_size(b.transactions.iter().map(Vec::len));
    let receipts_offset = ommers_offset + var_list_size(b.ommers.iter().map(header_size));
    put_u32(out, BLOCK_FIXED as u32);
    put_u32(out, transactions_offset as u32);
    put_u32(out, ommers_offset as u32);
    put_u32(out, receipts_offset as u32);
    put_block_header(out, &b.header);
    put_var_list(out, &b.transactions, Vec::len, |out, tx| {
        out.extend_from_slice(tx)
    });
    put_var_list(out, &b.ommers, header_size, put_block_header);
    put_var_list(out, &b.receipts, receipt_size, put_receipt);
}

fn put_block_header(out: &mut Vec<u8>, h: &BlockHeader) {
    out.extend_from_slice(h.parent_hash.as_bytes());
    out.extend_from_slice(h.ommers_hash.as_bytes());
    out.extend_from_slice(h.fee_recipient.as_bytes());
    out.extend_from_slice(h.state_root.as_bytes());
    out.extend_from_slice(h.transactions_root.as_bytes());
    out.extend_from_slice(h.receipts_root.as_bytes());
    out.extend_from_slice(h.logs_bloom.as_bytes());
    out.extend_from_slice(h.difficulty.as_bytes());
    put_u64(out, h.block_number);
    put_u64(out, h.gas_limit);
    put_u64(out, h.gas_used);
    put_u64(out, h.timestamp);
    put_u32(out, BLOCK_HEADER_FIXED as u32);
    out.extend_from_slice(h.base_fee_per_gas.as_bytes());
    out.extend_from_slice(h.mix_digest.as_bytes());
    out.extend_from_slice(h.nonce.as_bytes());
    out.extend_from_slice(&h.extra_data);
}

fn put_receipt(out: &mut Vec<u8>, r: &Receipt) {
    let post_state = post_state_bytes(r);
    let status = match r.outcome {
        TxOutcome::Status(success) => u64::from(success),
        TxOutcome::PostState(_) => 0,
    };
    put_u32(out, RECEIPT_FIXED as u32);
    put_u64(out, status);
    put_u64(out, r.cumulative_gas_used);
    put_u32(out, (RECEIPT_FIXED + post_state.len()) as u32);
    out.extend_from_slice(post_state);
    put_var_list(out, &r.logs, log_size, put_log);
}

fn put_log(out: &mut Vec<u8>, l: &Log) {
    out.extend_from_slice(l.address.as_bytes());
    put_u32(out, LOG_FIXED as u32);
    put_u32(out, (LOG_FIXED + TOPIC_SIZE * l.topics.len()) as u32);
    for topic in &l.topics {
        out.extend_from_slice(topic.as_bytes());
    }
    out.extend_from_slice(&l.data);
}

/// Reads a little-endian u64 at `at`. The caller has bounds-checked `buf`.
fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

/// Splits a variable-element list region into its elements via the offset
/// table at its head and decodes each one.
fn take_var_list<T>(
    buf: &[u8],
    max: usize,
    field: &'static str,
    take: impl Fn(&[u8]) -> ArchiveResult<T>,
) -> ArchiveResult<Vec<T>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    if buf.len() < OFFSET_SIZE {
        return Err(ArchiveError::Offset(field));
    }
    let first = read_u32(buf, 0) as usize;
    if first == 0 || first % OFFSET_SIZE != 0 || first > buf.len() {
        return Err(ArchiveError::Offset(field));
    }
    let count = first / OFFSET_SIZE;
    if count > max {
        return Err(BoundsError {
            field,
            len: count,
            max,
        }
        .into());
    }
    let mut items = Vec::with_capacity(count);
    let mut start = first;
    for i in 1..=count {
        let end = if i < count {
            read_u32(buf, i * OFFSET_SIZE) as usize
        } else {
            buf.len()
        };
        if end < start || end > buf.len() {
            return Err(ArchiveError::Offset(field));
        }
        items.push(take(&buf[start..end])?);
        start = end;
    }
    Ok(items)
}

fn take_block(buf: &[u8]) -> ArchiveResult<Block> {
    if buf.len() < BLOCK_FIXED {
        return Err(ArchiveError::Truncated("block"));
    }
    let header_offset = read_u32(buf, 0) as usize;
    let transactions_offset = read_u32(buf, 4) as usize;
    let ommers_offset = read_u32(buf, 8) as usize;
    let receipts_offset = read_u32(buf, 12) as usize;
    if header_offset != BLOCK_FIXED
        || transactions_offset < header_offset
        || ommers_offset < transactions_offset
        || receipts_offset < ommers_offset
        || receipts_offset > buf.len()
    {
        return Err(ArchiveError::Offset("block"));
    }
    let header = take_block_header(&buf[header_offset..transactions_offset])?;
    let transactions = take_var_list(
        &buf[transactions_offset..ommers_offset],
        MAX_TRANSACTIONS,
        "transactions",
        take_transaction,
    )?;
    let ommers = take_var_list(
        &buf[ommers_offset..receipts_offset],
        MAX_OMMERS,
        "ommers",
        take_block_header,
    )?;
    let receipts = take_var_list(&buf[receipts_offset..], MAX_RECEIPTS, "receipts", take_receipt)?;
    Ok(Block {
        header,
        transactions,
        ommers,
        receipts,
    })
}

fn take_transaction(buf: &[u8]) -> ArchiveResult<Vec<u8>> {
    if buf.len() > MAX_TRANSACTION_SIZE {
        return Err(BoundsError {
            field: "transaction",
            len: buf.len(),
            max: MAX_TRANSACTION_SIZE,
        }
        .into());
    }
    Ok(buf.to_vec())
}

fn take_block_header(buf: &[u8]) -> ArchiveResult<BlockHeader> {
    if buf.len() < BLOCK_HEADER_FIXED {
        return Err(ArchiveError::Truncated("block header"));
    }
    if read_u32(buf, EXTRA_DATA_SLOT) as usize != BLOCK_HEADER_FIXED {
        return Err(ArchiveError::Offset("block header"));
    }
    let extra_data = buf[BLOCK_HEADER_FIXED..].to_vec();
    if extra_data.len() > MAX_EXTRA_DATA {
        return Err(BoundsError {
            field: "extra_data",
            len: extra_data.len(),
            max: MAX_EXTRA_DATA,
        }
        .into());
    }
    Ok(BlockHeader {
        parent_hash: H256::from_slice(&buf[0..32]),
        ommers_hash: H256::from_slice(&buf[32..64]),
        fee_recipient: H160::from_slice(&buf[64..84]),
        state_root: H256::from_slice(&buf[84..116]),
        transactions_root: H256::from_slice(&buf[116..148]),
        receipts_root: H256::from_slice(&buf[148..180]),
        logs_bloom: Bloom::from_slice(&buf[180..436]),
        difficulty: H256::from_slice(&buf[436..468]),
        block_number: read_u64(buf, 468),
        gas_limit: read_u64(buf, 476),
        gas_used: read_u64(buf, 484),
        timestamp: read_u64(buf, 492),
        extra_data,
        base_fee_per_gas: H256::from_slice(&buf[504..536]),
        mix_digest: H256::from_slice(&buf[536..568]),
        nonce: H64::from_slice(&buf[568..576]),
    })
}

fn take_receipt(buf: &[u8]) -> ArchiveResult<Receipt> {
    if buf.len() < RECEIPT_FIXED {
        return Err(ArchiveError::Truncated("receipt"));
    }
    let post_state_offset = read_u32(buf, 0) as usize;
    let status = read_u64(buf, 4);
    let cumulative_gas_used = read_u64(buf, 12);
    let logs_offset = read_u32(buf, 20) as usize;
    if post_state_offset != RECEIPT_FIXED
        || logs_offset < post_state_offset
        || logs_offset > buf.len()
    {
        return Err(ArchiveError::Offset("receipt"));
    }
    let post_state = &buf[post_state_offset..logs_offset];
    let outcome = match post_state.len() {
        0 => TxOutcome::Status(status != 0),
        POST_STATE_SIZE => TxOutcome::PostState(H256::from_slice(post_state)),
        n => return Err(ArchiveError::PostState(n)),
    };
    let logs = take_var_list(&buf[logs_offset..], MAX_LOGS, "logs", take_log)?;
    Ok(Receipt {
        outcome,
        cumulative_gas_used,
        logs,
    })
}

fn take_log(buf: &[u8]) -> ArchiveResult<Log> {
    if buf.len() < LOG_FIXED {
        return Err(ArchiveError::Truncated("log"));
    }
    let topics_offset = read_u32(buf, 20) as usize;
    let data_offset = read_u32(buf, 24) as usize;
    if topics_offset != LOG_FIXED || data_offset < topics_offset || data_offset > buf.len() {
        return Err(ArchiveError::Offset("log"));
    }
    let topics_region = &buf[topics_offset..data_offset];
    if topics_region.len() % TOPIC_SIZE != 0 {
        return Err(ArchiveError::Topics(topics_region.len()));
    }
    if topics_region.len() / TOPIC_SIZE > MAX_TOPICS {
        return Err(BoundsError {
            field: "topics",
            len: topics_region.len() / TOPIC_SIZE,
            max: MAX_TOPICS,
        }
        .into());
    }
    let data = buf[data_offset..].to_vec();
    if data.len() > MAX_LOG_DATA {
        return Err(BoundsError {
            field: "log data",
            len: data.len(),
            max: MAX_LOG_DATA,
        }
        .into());
    }
    Ok(Log {
        address: H160::from_slice(&buf[0..20]),
        topics: topics_region
            .chunks_exact(TOPIC_SIZE)
            .map(H256::from_slice)
            .collect(),
        data,
    })
}
