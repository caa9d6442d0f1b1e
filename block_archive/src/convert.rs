//! Run-level validation: block-number contiguity and header/body agreement.
//!
//! A conversion run handles an ordered sequence of archive bodies, whether
//! freshly chunked from a wire stream or read back from disk. The blocks of
//! the whole run must form one unbroken ascending number sequence; the
//! checker here carries the expectation across body boundaries so gaps,
//! overlaps, and reordering between files are caught the same way as gaps
//! inside one body.

use thiserror::Error;

use crate::model::{ArchiveBody, ArchiveHeader};

/// Shorthand for contiguity-check results.
pub type ContiguityResult = Result<(), ContiguityError>;

/// Blocks that do not form one unbroken ascending run.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("non-consecutive blocks (got {got}, expected {expected})")]
pub struct ContiguityError {
    /// The block number found.
    pub got: u64,
    /// The number required at this position.
    pub expected: u64,
}

/// An archive header disagreeing with the body it was read alongside.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ConsistencyError {
    /// The header's head block number is not the body's first block.
    #[error("header has first block {header}, but body has first block {body}")]
    HeadMismatch {
        /// Head block number declared by the header.
        header: u64,
        /// First block number found in the body.
        body: u64,
    },

    /// The header's block count is not the body's block count.
    #[error("header has block count {header}, but body has {body} blocks")]
    CountMismatch {
        /// Block count declared by the header.
        header: u32,
        /// Number of blocks found in the body.
        body: usize,
    },
}

/// Verifies that an archive header describes the body it was read with.
pub fn check_archive(header: &ArchiveHeader, body: &ArchiveBody) -> Result<(), ConsistencyError> {
    if let Some(head) = body.head_block_number() {
        if head != header.head_block_number {
            return Err(ConsistencyError::HeadMismatch {
                header: header.head_block_number,
                body: head,
            });
        }
    }
    if body.blocks.len() != header.block_count as usize {
        return Err(ConsistencyError::CountMismatch {
            header: header.block_count,
            body: body.blocks.len(),
        });
    }
    Ok(())
}

/// Tracks the expected next block number across the bodies of one run.
///
/// The first body may start at any number, including zero; every later
/// body must pick up exactly where the previous one ended.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContiguityChecker {
    expected: Option<u64>,
}

impl ContiguityChecker {
    /// A checker that accepts any first block number.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks every block of `body` in order and advances the expectation
    /// past the body's last block. On an error the expectation is left
    /// unchanged.
    pub fn check(&mut self, body: &ArchiveBody) -> ContiguityResult {
        let mut next = self.expected;
        for block in &body.blocks {
            let number = block.header.block_number;
            if let Some(expected) = next {
                if number != expected {
                    return Err(ContiguityError {
                        got: number,
                        expected,
                    });
                }
            }
            next = Some(number.saturating_add(1));
        }
        self.expected = next;
        Ok(())
    }
}
