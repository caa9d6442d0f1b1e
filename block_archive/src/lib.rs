//! Conversion between two encodings of execution-block history.
//!
//! The *wire format* is the RLP framing execution clients exchange and
//! export: a stream of blocks, each a list of header, transactions, and
//! ommers, optionally followed by a sibling receipts list. The *archive
//! format* is a fixed-offset container encoding of the same data: an
//! ordered run of blocks behind a small file header, with every field at a
//! computable position and a SHA-256 hash tree root as its commitment.
//!
//! The two encodings carry exactly the same information, so conversion is
//! lossless in both directions; [`wire`] and [`archive`] are the codecs,
//! [`model`] the shared in-memory form. [`chunker`] splits an unbounded
//! wire stream into size-bounded archive bodies, [`convert`] enforces
//! block-number contiguity and header/body agreement across a run of
//! archives, [`merkle`] computes the commitment, and [`bounds`] holds the
//! format limits everything else is validated against.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod archive;
pub mod bounds;
pub mod chunker;
pub mod convert;
pub mod merkle;
pub mod model;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing_utils;
