//! End-to-end conversion runs over the public API: wire stream to chunked
//! archives, archives back to a wire stream, with contiguity and
//! header/body checks at every step a converter would make them.

use std::io::Cursor;

use anyhow::Result;
use block_archive::archive;
use block_archive::chunker::ChunkedWireReader;
use block_archive::convert::{check_archive, ContiguityChecker};
use block_archive::merkle;
use block_archive::model::{
    ArchiveBody, ArchiveHeader, Block, BlockHeader, Log, Receipt, TxOutcome,
};
use ethereum_types::{Bloom, H160, H256, H64};
use rlp::RlpStream;

fn header(number: u64) -> BlockHeader {
    BlockHeader {
        parent_hash: H256::from_low_u64_be(number.wrapping_sub(1)),
        ommers_hash: H256::repeat_byte(0x1D),
        fee_recipient: H160::from_low_u64_be(0xC0FFEE),
        state_root: H256::from_low_u64_be(number ^ 0x0A0A),
        transactions_root: H256::from_low_u64_be(number ^ 0x0B0B),
        receipts_root: H256::from_low_u64_be(number ^ 0x0C0C),
        logs_bloom: Bloom::zero(),
        difficulty: H256::from_low_u64_be(17_000_000 + number),
        block_number: number,
        gas_limit: 30_000_000,
        gas_used: 42_000,
        timestamp: 1_438_269_988 + 12 * number,
        extra_data: b"geth".to_vec(),
        base_fee_per_gas: if number % 2 == 0 {
            H256::zero()
        } else {
            H256::from_low_u64_be(1_000_000_000)
        },
        mix_digest: H256::from_low_u64_be(number << 8),
        nonce: H64::from_low_u64_be(number),
    }
}

fn legacy_transaction(number: u64) -> Vec<u8> {
    let mut s = RlpStream::new_list(2);
    s.append(&number);
    s.append(&b"payload".as_slice());
    s.out().to_vec()
}

fn block(number: u64) -> Block {
    Block {
        header: header(number),
        transactions: vec![legacy_transaction(number), vec![0x02, 0xFE, number as u8]],
        ommers: vec![],
        receipts: vec![
            Receipt {
                outcome: TxOutcome::Status(true),
                cumulative_gas_used: 21_000,
                logs: vec![Log {
                    address: H160::from_low_u64_be(number),
                    topics: vec![H256::from_low_u64_be(number)],
                    data: vec![0xDD; 8],
                }],
            },
            Receipt {
                outcome: TxOutcome::Status(false),
                cumulative_gas_used: 42_000,
                logs: vec![],
            },
        ],
    }
}

fn wire_stream(blocks: &[Block]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for b in blocks {
        out.extend_from_slice(&block_archive::wire::encode_block(b, true)?);
    }
    Ok(out)
}

fn archive_file(body: &ArchiveBody) -> Result<(ArchiveHeader, Vec<u8>)> {
    let head = body.head_block_number().expect("bodies are non-empty");
    let header = ArchiveHeader {
        version: archive::FORMAT_VERSION,
        head_block_number: head,
        block_count: body.blocks.len() as u32,
    };
    let mut file = archive::encode_header(&header).to_vec();
    file.extend_from_slice(&archive::encode_body(body)?);
    Ok((header, file))
}

#[test]
fn wire_to_archives_and_back_is_lossless() -> Result<()> {
    let blocks: Vec<Block> = (500..512).map(block).collect();
    let stream = wire_stream(&blocks)?;

    // Chunk into several archives of roughly a third of the input each.
    let target = stream.len() as u64 / 3;
    let mut reader = ChunkedWireReader::new(Cursor::new(stream.clone()), true, target);
    let mut checker = ContiguityChecker::new();
    let mut files = Vec::new();
    while let Some(body) = reader.next_archive()? {
        checker.check(&body)?;
        files.push(archive_file(&body)?);
    }
    assert!(files.len() > 1);

    // Read the files back the way a converter would, producing wire bytes.
    let mut checker = ContiguityChecker::new();
    let mut rebuilt = Vec::new();
    let mut numbers = Vec::new();
    for (_, file) in &files {
        let header = archive::decode_header(&file[..archive::HEADER_SIZE])?;
        let body = archive::decode_body(&file[archive::HEADER_SIZE..])?;
        check_archive(&header, &body)?;
        checker.check(&body)?;
        for b in &body.blocks {
            numbers.push(b.header.block_number);
            rebuilt.extend_from_slice(&block_archive::wire::encode_block(b, true)?);
        }
    }

    assert_eq!(numbers, (500..512).collect::<Vec<u64>>());
    assert_eq!(rebuilt, wire_stream(&blocks)?);
    Ok(())
}

#[test]
fn each_archive_crosses_the_target_by_at_most_one_block() -> Result<()> {
    let blocks: Vec<Block> = (0..10).map(block).collect();
    let stream = wire_stream(&blocks)?;
    let target = stream.len() as u64 / 4;

    let mut reader = ChunkedWireReader::new(Cursor::new(stream), true, target);
    let mut bodies = Vec::new();
    while let Some(body) = reader.next_archive()? {
        bodies.push(body);
    }

    for (i, body) in bodies.iter().enumerate() {
        let encoded = wire_stream(&body.blocks)?;
        let last = wire_stream(&body.blocks[body.blocks.len() - 1..])?;
        // Without its last block the body would be under target, so the
        // chunker stopped at the first opportunity.
        assert!((encoded.len() - last.len()) < target as usize);
        if i + 1 < bodies.len() {
            assert!(encoded.len() >= target as usize);
        }
    }
    Ok(())
}

#[test]
fn hash_tree_roots_survive_an_archive_round_trip() -> Result<()> {
    let body = ArchiveBody {
        blocks: (42..46).map(block).collect(),
    };
    let before = merkle::hash_tree_root(&body)?;

    let (_, file) = archive_file(&body)?;
    let decoded = archive::decode_body(&file[archive::HEADER_SIZE..])?;
    assert_eq!(merkle::hash_tree_root(&decoded)?, before);

    let other = ArchiveBody {
        blocks: (43..47).map(block).collect(),
    };
    assert_ne!(merkle::hash_tree_root(&other)?, before);
    Ok(())
}

#[test]
fn header_body_disagreement_is_caught_before_hashing() -> Result<()> {
    let body = ArchiveBody {
        blocks: (7..12).map(block).collect(),
    };
    let (mut header, _) = archive_file(&body)?;
    header.block_count = 4;
    assert!(check_archive(&header, &body).is_err());
    Ok(())
}

#[test]
fn a_receiptless_stream_round_trips_too() -> Result<()> {
    let blocks: Vec<Block> = (30..33)
        .map(|n| {
            let mut b = block(n);
            b.receipts.clear();
            b
        })
        .collect();
    let mut stream = Vec::new();
    for b in &blocks {
        stream.extend_from_slice(&block_archive::wire::encode_block(b, false)?);
    }

    let mut reader = ChunkedWireReader::new(Cursor::new(stream.clone()), false, 0);
    let body = reader.next_archive()?.expect("stream holds blocks");
    assert_eq!(body.blocks, blocks);

    let mut rebuilt = Vec::new();
    for b in &body.blocks {
        rebuilt.extend_from_slice(&block_archive::wire::encode_block(b, false)?);
    }
    assert_eq!(rebuilt, stream);
    Ok(())
}
