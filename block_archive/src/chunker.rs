//! Segmentation of a wire-format stream into size-bounded archive bodies.
//!
//! The input is a concatenation of top-level RLP items: one per block, or
//! two per block when receipts travel interleaved. The reader hand-parses
//! only the outermost length prefix of each item, pulls the item in whole,
//! and hands the bytes to the wire codec; it never re-buffers the stream.
//!
//! Segmentation counts raw input bytes against a target size. A block is
//! always read before the counter is checked, so every produced body holds
//! at least one block and a body crosses the target by at most one block.
//! A target of zero disables segmentation and yields a single body.

use std::io::{self, Read};

use thiserror::Error;
use tracing::info;

use crate::model::{ArchiveBody, Block};
use crate::wire::{self, WireError};

/// Largest accepted top-level item, as a declared payload size in bytes.
/// Anything bigger is treated as stream corruption rather than a block.
pub const MAX_ITEM_SIZE: u64 = 268_435_456;

/// Shorthand for chunked-reader results.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// An error raised while reading wire-format blocks from a stream.
///
/// All variants except [`ChunkError::Io`] carry the 0-based index of the
/// failing block within the current segment.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A block whose bytes arrived intact but failed to decode.
    #[error("decoding block {index}: {source}")]
    Decode {
        /// Index of the block within the current segment.
        index: usize,
        /// The wire codec failure.
        source: WireError,
    },

    /// Input ended in the middle of a block.
    #[error("block {index}: unexpected end of input")]
    Truncated {
        /// Index of the block within the current segment.
        index: usize,
    },

    /// A top-level length prefix that is not canonical RLP.
    #[error("block {index}: invalid length prefix")]
    Prefix {
        /// Index of the block within the current segment.
        index: usize,
    },

    /// A top-level item whose declared payload exceeds [`MAX_ITEM_SIZE`].
    #[error("block {index}: {size}-byte item exceeds the maximum item size")]
    TooLarge {
        /// Index of the block within the current segment.
        index: usize,
        /// The declared payload size.
        size: u64,
    },

    /// The underlying reader failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads consecutive wire-format blocks from a byte stream and groups them
/// into archive bodies of roughly `target_size` input bytes each.
#[derive(Debug)]
pub struct ChunkedWireReader<R> {
    input: R,
    with_receipts: bool,
    target_size: u64,
    bytes_read: u64,
    exhausted: bool,
}

impl<R: Read> ChunkedWireReader<R> {
    /// Wraps `input`. `with_receipts` selects the two-items-per-block
    /// stream layout; a `target_size` of zero disables segmentation.
    pub fn new(input: R, with_receipts: bool, target_size: u64) -> Self {
        Self {
            input,
            with_receipts,
            target_size,
            bytes_read: 0,
            exhausted: false,
        }
    }

    /// Produces the next body, or `None` once the stream is cleanly
    /// exhausted. Any error is fatal: the reader's position within the
    /// stream is no longer reliable afterwards.
    pub fn next_archive(&mut self) -> ChunkResult<Option<ArchiveBody>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut blocks = Vec::new();
        for index in 0.. {
            if self.target_size > 0 && self.bytes_read >= self.target_size {
                info!(bytes = self.bytes_read, "read one archive");
                break;
            }
            match self.read_block(index)? {
                Some(block) => blocks.push(block),
                None => {
                    self.exhausted = true;
                    info!(bytes = self.bytes_read, "read final archive");
                    break;
                }
            }
        }
        self.bytes_read = 0;
        if blocks.is_empty() {
            return Ok(None);
        }
        Ok(Some(ArchiveBody { blocks }))
    }

    fn read_block(&mut self, index: usize) -> ChunkResult<Option<Block>> {
        let block_item = match self.read_item(index)? {
            Some(item) => item,
            None => return Ok(None),
        };
        let receipts_item = if self.with_receipts {
            match self.read_item(index)? {
                Some(item) => Some(item),
                None => return Err(ChunkError::Truncated { index }),
            }
        } else {
            None
        };
        let block = wire::decode_block(&block_item, receipts_item.as_deref())
            .map_err(|source| ChunkError::Decode { index, source })?;
        Ok(Some(block))
    }

    /// Reads one complete top-level RLP item, prefix included. `None` on a
    /// clean end of input before the first byte.
    fn read_item(&mut self, index: usize) -> ChunkResult<Option<Vec<u8>>> {
        let first = match self.read_first_byte()? {
            Some(byte) => byte,
            None => return Ok(None),
        };
        let mut item = vec![first];
        let payload_len = match first {
            0x00..=0x7f => 0,
            0x80..=0xb7 => u64::from(first - 0x80),
            0xb8..=0xbf => self.read_long_length(&mut item, first - 0xb7, index)?,
            0xc0..=0xf7 => u64::from(first - 0xc0),
            0xf8..=0xff => self.read_long_length(&mut item, first - 0xf7, index)?,
        };
        if payload_len > MAX_ITEM_SIZE {
            return Err(ChunkError::TooLarge {
                index,
                size: payload_len,
            });
        }
        let prefix_len = item.len();
        item.resize(prefix_len + payload_len as usize, 0);
        self.read_counted(&mut item[prefix_len..], index)?;
        Ok(Some(item))
    }

    /// Reads the big-endian payload length of a long string or list and
    /// rejects non-canonical encodings: a leading zero byte, or a value
    /// short enough for the single-byte prefix form.
    fn read_long_length(
        &mut self,
        item: &mut Vec<u8>,
        length_of_length: u8,
        index: usize,
    ) -> ChunkResult<u64> {
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..length_of_length as usize];
        self.read_counted(bytes, index)?;
        item.extend_from_slice(bytes);
        if bytes[0] == 0 {
            return Err(ChunkError::Prefix { index });
        }
        let mut value = 0u64;
        for byte in bytes.iter() {
            value = (value << 8) | u64::from(*byte);
        }
        if value < 56 {
            return Err(ChunkError::Prefix { index });
        }
        Ok(value)
    }

    fn read_counted(&mut self, buf: &mut [u8], index: usize) -> ChunkResult<()> {
        match self.input.read_exact(buf) {
            Ok(()) => {
                self.bytes_read += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(ChunkError::Truncated { index })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_first_byte(&mut self) -> ChunkResult<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.bytes_read += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::testing_utils::{sample_block, wire_stream};

    fn reader(
        bytes: Vec<u8>,
        with_receipts: bool,
        target: u64,
    ) -> ChunkedWireReader<Cursor<Vec<u8>>> {
        ChunkedWireReader::new(Cursor::new(bytes), with_receipts, target)
    }

    fn drain(reader: &mut ChunkedWireReader<Cursor<Vec<u8>>>) -> Vec<ArchiveBody> {
        let mut bodies = Vec::new();
        while let Some(body) = reader.next_archive().unwrap() {
            bodies.push(body);
        }
        bodies
    }

    #[test]
    fn zero_target_yields_one_body() {
        let blocks: Vec<_> = (10..20).map(|n| sample_block(n, 2)).collect();
        let mut reader = reader(wire_stream(&blocks, false), false, 0);
        let bodies = drain(&mut reader);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].blocks.len(), 10);
        assert!(reader.next_archive().unwrap().is_none());
    }

    #[test]
    fn receipts_travel_interleaved() {
        let blocks: Vec<_> = (4..8).map(|n| sample_block(n, 3)).collect();
        let mut reader = reader(wire_stream(&blocks, true), true, 0);
        let bodies = drain(&mut reader);
        assert_eq!(bodies[0].blocks, blocks);
        assert!(!bodies[0].blocks[0].receipts.is_empty());
    }

    #[test]
    fn target_size_partitions_without_loss() {
        let blocks: Vec<_> = (100..110).map(|n| sample_block(n, 1)).collect();
        let stream = wire_stream(&blocks, false);
        let per_block = stream.len() as u64 / 10;
        let mut reader = reader(stream, false, per_block * 3);
        let bodies = drain(&mut reader);

        assert!(bodies.len() > 1);
        assert!(bodies.iter().all(|b| !b.blocks.is_empty()));
        let recombined: Vec<_> = bodies.into_iter().flat_map(|b| b.blocks).collect();
        assert_eq!(recombined, blocks);
    }

    #[test]
    fn a_tiny_target_still_fills_each_body_with_one_block() {
        let blocks: Vec<_> = (0..4).map(|n| sample_block(n, 1)).collect();
        let mut reader = reader(wire_stream(&blocks, false), false, 1);
        let bodies = drain(&mut reader);
        assert_eq!(bodies.len(), 4);
        assert!(bodies.iter().all(|b| b.blocks.len() == 1));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let mut reader = reader(Vec::new(), false, 0);
        assert!(reader.next_archive().unwrap().is_none());
        assert!(reader.next_archive().unwrap().is_none());
    }

    #[test]
    fn truncation_mid_block_is_an_error() {
        let blocks = vec![sample_block(1, 1), sample_block(2, 1)];
        let mut stream = wire_stream(&blocks, false);
        stream.truncate(stream.len() - 7);
        let mut reader = reader(stream, false, 0);
        let err = reader.next_archive().unwrap_err();
        assert!(matches!(err, ChunkError::Truncated { index: 1 }));
    }

    #[test]
    fn missing_receipts_item_is_an_error() {
        let blocks = vec![sample_block(1, 1)];
        // Encode without receipts but read expecting them.
        let mut reader = reader(wire_stream(&blocks, false), true, 0);
        let err = reader.next_archive().unwrap_err();
        assert!(matches!(err, ChunkError::Truncated { index: 0 }));
    }

    #[test]
    fn non_canonical_length_prefix_is_rejected() {
        // Long-string form declaring a 1-byte length of zero.
        let mut long_string = reader(vec![0xb8, 0x00], false, 0);
        assert!(matches!(
            long_string.next_archive().unwrap_err(),
            ChunkError::Prefix { index: 0 }
        ));

        // Long-list form with a leading zero length byte.
        let mut long_list = reader(vec![0xf9, 0x00, 0x48], false, 0);
        assert!(matches!(
            long_list.next_archive().unwrap_err(),
            ChunkError::Prefix { index: 0 }
        ));
    }

    #[test]
    fn oversized_items_are_rejected_before_allocation() {
        // Declares a 512 MiB list payload.
        let mut reader = reader(vec![0xfb, 0x20, 0x00, 0x00, 0x00], false, 0);
        assert!(matches!(
            reader.next_archive().unwrap_err(),
            ChunkError::TooLarge { index: 0, size } if size == 0x2000_0000
        ));
    }

    #[test]
    fn garbage_items_fail_decoding_with_the_block_index() {
        let blocks = vec![sample_block(1, 0)];
        let mut stream = wire_stream(&blocks, false);
        // A lone byte is a complete RLP item but not a block.
        stream.push(0x01);
        let mut reader = reader(stream, false, 0);
        let err = reader.next_archive().unwrap_err();
        assert!(matches!(err, ChunkError::Decode { index: 1, .. }));
    }

    #[test]
    fn segment_block_indices_restart_per_body() {
        // Three blocks, target forces one per body, third is garbage: its
        // error index is relative to its own segment.
        let blocks = vec![sample_block(1, 1), sample_block(2, 1)];
        let mut stream = wire_stream(&blocks, false);
        stream.push(0x01);
        let mut reader = reader(stream, false, 1);
        assert!(reader.next_archive().unwrap().is_some());
        assert!(reader.next_archive().unwrap().is_some());
        let err = reader.next_archive().unwrap_err();
        assert!(matches!(err, ChunkError::Decode { index: 0, .. }));
    }
}
