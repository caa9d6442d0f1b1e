//! Format limits and bounds validation.
//!
//! The archive format is closed over these constants: they size the offset
//! tables and fix the merkleization tree depths, so changing any of them
//! changes every hash tree root. They are enforced at archive encode,
//! archive decode, and before hashing; the wire codec deliberately does not
//! enforce them, so an out-of-bounds wire input fails at the archive
//! boundary.

use thiserror::Error;

use crate::model::{ArchiveBody, Block, BlockHeader, Log, Receipt};

/// Maximum length of a header's extra data, in bytes.
pub const MAX_EXTRA_DATA: usize = 32;

/// Maximum number of topics per log entry.
pub const MAX_TOPICS: usize = 4;

/// Maximum length of a log entry's data, in bytes.
pub const MAX_LOG_DATA: usize = 1 << 24;

/// Maximum number of logs per receipt.
pub const MAX_LOGS: usize = 1 << 20;

/// Maximum number of transactions per block.
pub const MAX_TRANSACTIONS: usize = 1 << 20;

/// Maximum encoded size of a single transaction, in bytes.
pub const MAX_TRANSACTION_SIZE: usize = 1 << 30;

/// Maximum number of ommer headers per block.
pub const MAX_OMMERS: usize = 16;

/// Maximum number of receipts per block.
pub const MAX_RECEIPTS: usize = 1 << 20;

/// Maximum number of blocks per archive.
pub const MAX_BLOCKS: usize = 1_000_000;

/// Shorthand for results of bounds validation.
pub type BoundsResult = Result<(), BoundsError>;

/// A field or list exceeding its declared maximum.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("{field} length {len} exceeds maximum {max}")]
pub struct BoundsError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Actual length found.
    pub len: usize,
    /// The declared maximum.
    pub max: usize,
}

fn check(field: &'static str, len: usize, max: usize) -> BoundsResult {
    if len > max {
        return Err(BoundsError { field, len, max });
    }
    Ok(())
}

/// Validates one header against the format limits.
pub fn check_header(header: &BlockHeader) -> BoundsResult {
    check("extra_data", header.extra_data.len(), MAX_EXTRA_DATA)
}

/// Validates one log entry against the format limits.
pub fn check_log(log: &Log) -> BoundsResult {
    check("topics", log.topics.len(), MAX_TOPICS)?;
    check("log data", log.data.len(), MAX_LOG_DATA)
}

/// Validates one receipt against the format limits.
pub fn check_receipt(receipt: &Receipt) -> BoundsResult {
    check("logs", receipt.logs.len(), MAX_LOGS)?;
    receipt.logs.iter().try_for_each(check_log)
}

/// Validates one block, including its header, ommers, and receipts.
pub fn check_block(block: &Block) -> BoundsResult {
    check_header(&block.header)?;
    check("transactions", block.transactions.len(), MAX_TRANSACTIONS)?;
    for tx in &block.transactions {
        check("transaction", tx.len(), MAX_TRANSACTION_SIZE)?;
    }
    check("ommers", block.ommers.len(), MAX_OMMERS)?;
    block.ommers.iter().try_for_each(check_header)?;
    check("receipts", block.receipts.len(), MAX_RECEIPTS)?;
    block.receipts.iter().try_for_each(check_receipt)
}

/// Validates a whole archive body. Reports the first violation found, in
/// field declaration order.
pub fn check_body(body: &ArchiveBody) -> BoundsResult {
    check("blocks", body.blocks.len(), MAX_BLOCKS)?;
    body.blocks.iter().try_for_each(check_block)
}
