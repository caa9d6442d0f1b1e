//! The in-memory model shared by both codecs.
//!
//! Values are built once per conversion unit (one wire block or one archive
//! body), passed between the codec stages read-only, and dropped after they
//! have been serialized or hashed.

use ethereum_types::{Bloom, H160, H256, H64};

/// An execution-block header, used both for the block itself and for its
/// ommers.
///
/// The `difficulty` slot is era-dependent: proof-of-work difficulty before
/// the merge, the beacon-chain randomness value after it. It is kept as an
/// opaque 32-byte value; consumers that need the semantic meaning must apply
/// an external era threshold.
///
/// `base_fee_per_gas` uses the all-zero value as the "field absent" sentinel
/// for pre-fee-market blocks. A genuine base fee of zero is therefore
/// indistinguishable from an absent one after a round-trip; this matches the
/// on-disk format and is asserted by tests rather than "fixed".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the parent block.
    pub parent_hash: H256,
    /// Hash of the ommer list.
    pub ommers_hash: H256,
    /// Beneficiary address (coinbase).
    pub fee_recipient: H160,
    /// State trie root.
    pub state_root: H256,
    /// Transaction trie root.
    pub transactions_root: H256,
    /// Receipt trie root.
    pub receipts_root: H256,
    /// Bloom filter over the block's log entries.
    pub logs_bloom: Bloom,
    /// Era-dependent difficulty or randomness value, big-endian.
    pub difficulty: H256,
    /// Block number.
    pub block_number: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas used by the whole block.
    pub gas_used: u64,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Arbitrary extra bytes, at most [`MAX_EXTRA_DATA`](crate::bounds::MAX_EXTRA_DATA).
    pub extra_data: Vec<u8>,
    /// Base fee per gas as a 32-byte big-endian integer; all-zero means
    /// "absent".
    pub base_fee_per_gas: H256,
    /// Proof-of-work mix digest.
    pub mix_digest: H256,
    /// Proof-of-work nonce.
    pub nonce: H64,
}

/// The outcome slot of a [`Receipt`].
///
/// Exactly one of the two representations is meaningful per receipt: old
/// receipts carry the intermediate state root, post-fork receipts a boolean
/// status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    /// 32-byte post-transaction state root (legacy receipts).
    PostState(H256),
    /// Execution status, `true` for success.
    Status(bool),
}

/// The outcome of one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Post-state root or status, mutually exclusive.
    pub outcome: TxOutcome,
    /// Cumulative gas used in the block up to and including this
    /// transaction.
    pub cumulative_gas_used: u64,
    /// Log entries emitted by this transaction.
    pub logs: Vec<Log>,
}

/// A single log entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Log {
    /// Address of the emitting contract.
    pub address: H160,
    /// Indexed topics, at most [`MAX_TOPICS`](crate::bounds::MAX_TOPICS).
    pub topics: Vec<H256>,
    /// Opaque payload.
    pub data: Vec<u8>,
}

/// One execution block, optionally travelling with its receipts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions as opaque, self-describing binary blobs: a legacy
    /// transaction is its raw RLP list encoding, a typed transaction is the
    /// type byte followed by its payload. Never decoded beyond the
    /// envelope.
    pub transactions: Vec<Vec<u8>>,
    /// Ommer (uncle) headers.
    pub ommers: Vec<BlockHeader>,
    /// Receipts, present only when receipts travel with the block.
    pub receipts: Vec<Receipt>,
}

/// The fixed-size header preceding every archive body on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Format version, currently [`FORMAT_VERSION`](crate::archive::FORMAT_VERSION).
    pub version: u64,
    /// Number of the first block in the body.
    pub head_block_number: u64,
    /// Number of blocks in the body.
    pub block_count: u32,
}

/// An ordered, non-empty run of blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveBody {
    /// The blocks, contiguous by block number.
    pub blocks: Vec<Block>,
}

impl ArchiveBody {
    /// Number of the first block, or `None` for an (invalid) empty body.
    pub fn head_block_number(&self) -> Option<u64> {
        self.blocks.first().map(|b| b.header.block_number)
    }
}
