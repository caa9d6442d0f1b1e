//! SHA-256 hash tree roots over archive bodies.
//!
//! The commitment follows simple-serialize merkleization: values are packed
//! into 32-byte chunks, every tree is padded with zero subtrees to the
//! capacity implied by the format limits in [`crate::bounds`], and every
//! list root is mixed with its actual length so that element count is part
//! of the commitment. Because the tree shape is fixed by the limits rather
//! than the data, two bodies agree on their root exactly when they agree on
//! every field.
//!
//! Padding subtrees are precomputed once: level zero is the zero chunk and
//! each level above hashes two copies of the one below, so padding costs one
//! lookup no matter how empty a list is.

use ethereum_types::H256;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::bounds::{
    self, BoundsError, MAX_BLOCKS, MAX_EXTRA_DATA, MAX_LOGS, MAX_LOG_DATA, MAX_OMMERS,
    MAX_RECEIPTS, MAX_TOPICS, MAX_TRANSACTIONS, MAX_TRANSACTION_SIZE,
};
use crate::model::{ArchiveBody, Block, BlockHeader, Log, Receipt, TxOutcome};

const BYTES_PER_CHUNK: usize = 32;

/// Deepest padded tree any field can need: transaction data at
/// [`MAX_TRANSACTION_SIZE`] bytes packs into 2^25 chunks.
const MAX_DEPTH: usize = 32;

static ZERO_SUBTREES: Lazy<[[u8; 32]; MAX_DEPTH]> = Lazy::new(|| {
    let mut roots = [[0u8; 32]; MAX_DEPTH];
    for depth in 1..MAX_DEPTH {
        roots[depth] = hash_pair(&roots[depth - 1], &roots[depth - 1]);
    }
    roots
});

/// Computes the hash tree root of an archive body.
///
/// The bounds of [`crate::bounds`] are re-checked first: an out-of-bounds
/// body has no defined root, so hashing refuses rather than committing to
/// an unrepresentable value.
pub fn hash_tree_root(body: &ArchiveBody) -> Result<H256, BoundsError> {
    bounds::check_body(body)?;
    let blocks: Vec<[u8; 32]> = body.blocks.iter().map(block_root).collect();
    // The body is a single-field container, so its root is the root of the
    // block list itself.
    let root = mix_in_length(
        merkleize(&blocks, MAX_BLOCKS as u64),
        body.blocks.len() as u64,
    );
    Ok(H256(root))
}

fn block_root(block: &Block) -> [u8; 32] {
    let transactions: Vec<[u8; 32]> = block
        .transactions
        .iter()
        .map(|tx| bytes_list_root(tx, MAX_TRANSACTION_SIZE))
        .collect();
    let ommers: Vec<[u8; 32]> = block.ommers.iter().map(header_root).collect();
    let receipts: Vec<[u8; 32]> = block.receipts.iter().map(receipt_root).collect();
    let fields = [
        header_root(&block.header),
        mix_in_length(
            merkleize(&transactions, MAX_TRANSACTIONS as u64),
            transactions.len() as u64,
        ),
        mix_in_length(merkleize(&ommers, MAX_OMMERS as u64), ommers.len() as u64),
        mix_in_length(
            merkleize(&receipts, MAX_RECEIPTS as u64),
            receipts.len() as u64,
        ),
    ];
    merkleize(&fields, fields.len() as u64)
}

fn header_root(header: &BlockHeader) -> [u8; 32] {
    let fields = [
        header.parent_hash.0,
        header.ommers_hash.0,
        bytes_vector_root(header.fee_recipient.as_bytes()),
        header.state_root.0,
        header.transactions_root.0,
        header.receipts_root.0,
        bytes_vector_root(header.logs_bloom.as_bytes()),
        header.difficulty.0,
        u64_root(header.block_number),
        u64_root(header.gas_limit),
        u64_root(header.gas_used),
        u64_root(header.timestamp),
        bytes_list_root(&header.extra_data, MAX_EXTRA_DATA),
        header.base_fee_per_gas.0,
        header.mix_digest.0,
        bytes_vector_root(header.nonce.as_bytes()),
    ];
    merkleize(&fields, fields.len() as u64)
}

fn receipt_root(receipt: &Receipt) -> [u8; 32] {
    let (post_state, status): (&[u8], u64) = match &receipt.outcome {
        TxOutcome::PostState(root) => (root.as_bytes(), 0),
        TxOutcome::Status(success) => (&[], u64::from(*success)),
    };
    let logs: Vec<[u8; 32]> = receipt.logs.iter().map(log_root).collect();
    let fields = [
        bytes_list_root(post_state, BYTES_PER_CHUNK),
        u64_root(status),
        u64_root(receipt.cumulative_gas_used),
        mix_in_length(merkleize(&logs, MAX_LOGS as u64), logs.len() as u64),
    ];
    merkleize(&fields, fields.len() as u64)
}

fn log_root(log: &Log) -> [u8; 32] {
    let topics: Vec<[u8; 32]> = log.topics.iter().map(|t| t.0).collect();
    let fields = [
        bytes_vector_root(log.address.as_bytes()),
        mix_in_length(merkleize(&topics, MAX_TOPICS as u64), topics.len() as u64),
        bytes_list_root(&log.data, MAX_LOG_DATA),
    ];
    merkleize(&fields, fields.len() as u64)
}

/// Root of a fixed-width byte vector: its chunks, unpadded tree, no length
/// mix-in.
fn bytes_vector_root(data: &[u8]) -> [u8; 32] {
    merkleize(&pack_bytes(data), chunk_count(data.len()))
}

/// Root of a variable byte list with a `max`-byte capacity: chunks padded
/// to the capacity's tree, then mixed with the byte length.
fn bytes_list_root(data: &[u8], max: usize) -> [u8; 32] {
    mix_in_length(
        merkleize(&pack_bytes(data), chunk_count(max)),
        data.len() as u64,
    )
}

fn u64_root(value: u64) -> [u8; 32] {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

fn pack_bytes(data: &[u8]) -> Vec<[u8; 32]> {
    let mut chunks = Vec::with_capacity(data.len().div_ceil(BYTES_PER_CHUNK));
    for piece in data.chunks(BYTES_PER_CHUNK) {
        let mut chunk = [0u8; 32];
        chunk[..piece.len()].copy_from_slice(piece);
        chunks.push(chunk);
    }
    chunks
}

fn chunk_count(byte_len: usize) -> u64 {
    byte_len.div_ceil(BYTES_PER_CHUNK) as u64
}

/// Merkleizes `leaves` into a tree sized for `limit` leaves, padding the
/// right-hand side with zero subtrees.
fn merkleize(leaves: &[[u8; 32]], limit: u64) -> [u8; 32] {
    subtree_root(leaves, depth_for(limit))
}

fn subtree_root(leaves: &[[u8; 32]], depth: u32) -> [u8; 32] {
    debug_assert!((depth as usize) < MAX_DEPTH);
    debug_assert!(depth > 0 || leaves.len() <= 1);
    if leaves.is_empty() {
        return ZERO_SUBTREES[depth as usize];
    }
    if depth == 0 {
        return leaves[0];
    }
    let split = 1usize << (depth - 1);
    if leaves.len() <= split {
        return hash_pair(
            &subtree_root(leaves, depth - 1),
            &ZERO_SUBTREES[depth as usize - 1],
        );
    }
    hash_pair(
        &subtree_root(&leaves[..split], depth - 1),
        &subtree_root(&leaves[split..], depth - 1),
    )
}

/// Tree depth holding `limit` leaves: the base-two logarithm of the next
/// power of two.
fn depth_for(limit: u64) -> u32 {
    match limit {
        0 | 1 => 0,
        n => 64 - (n - 1).leading_zeros(),
    }
}

fn mix_in_length(root: [u8; 32], length: u64) -> [u8; 32] {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&length.to_le_bytes());
    hash_pair(&root, &chunk)
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
