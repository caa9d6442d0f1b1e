//! Shared fixtures for unit tests.
//!
//! Everything here is deterministic in its arguments, so two calls with the
//! same inputs build identical values and equality assertions stay
//! meaningful across codec round trips.

use ethereum_types::{Bloom, H160, H256, H64};
use rlp::RlpStream;

use crate::model::{ArchiveBody, Block, BlockHeader, Log, Receipt, TxOutcome};
use crate::wire;

/// A header whose fields are all derived from `number`. Even-numbered
/// headers have no base fee, odd-numbered ones do, so both wire forms show
/// up in any test spanning a few blocks.
pub(crate) fn sample_header(number: u64) -> BlockHeader {
    let base_fee_per_gas = if number % 2 == 1 {
        H256::from_low_u64_be(number.wrapping_mul(7))
    } else {
        H256::zero()
    };
    let mut logs_bloom = Bloom::zero();
    logs_bloom.0[(number % 256) as usize] = 0xFF;
    BlockHeader {
        parent_hash: H256::from_low_u64_be(number.wrapping_mul(0x0101)),
        ommers_hash: H256::repeat_byte(0x1D),
        fee_recipient: H160::from_low_u64_be(0xBEEF),
        state_root: H256::from_low_u64_be(number ^ 0x5555),
        transactions_root: H256::from_low_u64_be(number ^ 0x6666),
        receipts_root: H256::from_low_u64_be(number ^ 0x7777),
        logs_bloom,
        difficulty: H256::from_low_u64_be(number.wrapping_add(2_000_000)),
        block_number: number,
        gas_limit: 30_000_000,
        gas_used: 21_000 * (number % 500),
        timestamp: 1_600_000_000 + 12 * (number % 1_000_000),
        extra_data: vec![0x42, number as u8],
        base_fee_per_gas,
        mix_digest: H256::from_low_u64_be(!number),
        nonce: H64::from_low_u64_be(number ^ 0x4242),
    }
}

pub(crate) fn sample_log() -> Log {
    Log {
        address: H160::repeat_byte(0x11),
        topics: vec![H256::repeat_byte(0xAA), H256::repeat_byte(0xBB)],
        data: vec![0x01, 0x02, 0x03, 0x04],
    }
}

fn numbered_log(seed: u64) -> Log {
    Log {
        address: H160::from_low_u64_be(seed),
        topics: vec![H256::from_low_u64_be(seed ^ 0xFFFF)],
        data: seed.to_be_bytes().to_vec(),
    }
}

/// One receipt per transaction index, cycling through the three outcome
/// shapes. Index zero always succeeds and always carries logs.
pub(crate) fn sample_receipt(index: usize) -> Receipt {
    let outcome = match index % 3 {
        0 => TxOutcome::Status(true),
        1 => TxOutcome::Status(false),
        _ => TxOutcome::PostState(H256::from_low_u64_be(0x5151 + index as u64)),
    };
    let logs = match index % 3 {
        0 => vec![sample_log(), numbered_log(index as u64)],
        1 => vec![],
        _ => vec![numbered_log(index as u64 + 7)],
    };
    Receipt {
        outcome,
        cumulative_gas_used: 21_000 * (index as u64 + 1),
        logs,
    }
}

/// A valid transaction envelope: legacy for even indices, typed for odd.
pub(crate) fn sample_transaction(number: u64, index: usize) -> Vec<u8> {
    if index % 2 == 0 {
        let mut s = RlpStream::new_list(3);
        s.append(&(index as u64));
        s.append(&number);
        s.append(&[0xCA, 0xFE].as_slice());
        s.out().to_vec()
    } else {
        vec![0x02, 0xF8, number as u8, index as u8, 0xCA, 0xFE]
    }
}

/// A block numbered `number` with `tx_count` transactions and matching
/// receipts. Even block numbers above zero carry one ommer.
pub(crate) fn sample_block(number: u64, tx_count: usize) -> Block {
    let transactions = (0..tx_count)
        .map(|i| sample_transaction(number, i))
        .collect();
    let receipts = (0..tx_count).map(sample_receipt).collect();
    let ommers = if number > 0 && number % 2 == 0 {
        vec![sample_header(number - 1)]
    } else {
        vec![]
    };
    Block {
        header: sample_header(number),
        transactions,
        ommers,
        receipts,
    }
}

/// `count` contiguous blocks numbered from `head`, two transactions each.
pub(crate) fn sample_body(head: u64, count: usize) -> ArchiveBody {
    ArchiveBody {
        blocks: (0..count as u64).map(|i| sample_block(head + i, 2)).collect(),
    }
}

/// The wire-format concatenation of `blocks`.
pub(crate) fn wire_stream(blocks: &[Block], with_receipts: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        let encoded = wire::encode_block(block, with_receipts)
            .unwrap_or_else(|e| panic!("fixture block must encode: {e}"));
        out.extend_from_slice(&encoded);
    }
    out
}
