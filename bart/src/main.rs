//! `bart`, the block archive tool.
//!
//! Converts execution-block history from the RLP wire encoding into
//! archive files and back, prints archive hash tree roots, and prints
//! archive block ranges. Conversion streams block by block; whole archives
//! are the only unit ever buffered in memory.
//!
//! Example usage:
//! ```sh
//! RUST_LOG=debug bart -i rlprc -o ssz -f era.ssz --target-size 2000000000 export.rlp
//! bart -o rlp era-0.ssz era-1.ssz > export.rlp
//! bart --hash era-0.ssz
//! ```

mod cli;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use block_archive::archive;
use block_archive::chunker::ChunkedWireReader;
use block_archive::convert::{self, ContiguityChecker};
use block_archive::merkle;
use block_archive::model::{ArchiveBody, ArchiveHeader};
use block_archive::wire;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Format};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    cli.validate()?;

    if cli.input.is_wire() {
        let input = open_concat(&cli.files)?;
        wire_to_archives(&cli, input)
    } else if cli.hash {
        print_hash(&cli.files[0])
    } else if cli.info {
        print_info(&cli.files[0])
    } else {
        archives_to_wire(&cli)
    }
}

fn init_tracing() {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                ),
        )
        .init();
}

/// Reads one wire stream and writes one archive file per produced body.
/// An input without a single block is an error, not an empty run.
fn wire_to_archives(cli: &Cli, input: impl Read) -> Result<()> {
    let mut reader = ChunkedWireReader::new(input, cli.input == Format::Rlprc, cli.target_size);
    let mut checker = ContiguityChecker::new();
    let mut sequence = 0usize;
    while let Some(body) = reader.next_archive().context("reading wire input")? {
        checker.check(&body)?;
        let header = ArchiveHeader {
            version: archive::FORMAT_VERSION,
            head_block_number: body
                .head_block_number()
                .context("archive body has no blocks")?,
            block_count: body.blocks.len() as u32,
        };
        let path = cli.file.as_ref().map(|base| {
            if cli.target_size == 0 {
                base.clone()
            } else {
                numbered_file_name(base, sequence)
            }
        });
        write_archive(path.as_deref(), &header, &body)?;
        sequence += 1;
    }
    if sequence == 0 {
        bail!("wire input contains no blocks");
    }
    Ok(())
}

/// Reads archive files in order and writes their blocks back out as one
/// wire stream.
fn archives_to_wire(cli: &Cli) -> Result<()> {
    let with_receipts = cli.output == Format::Rlprc;
    let mut checker = ContiguityChecker::new();
    let mut out = open_output(cli.file.as_deref())?;
    match cli.file.as_deref() {
        Some(p) => info!(name = %p.display(), "writing wire file"),
        None => info!("writing wire stream to stdout"),
    }
    for path in &cli.files {
        let (header, body) = read_archive(path)?;
        convert::check_archive(&header, &body).context("invalid archive")?;
        checker.check(&body)?;
        for (index, block) in body.blocks.iter().enumerate() {
            let bytes = wire::encode_block(block, with_receipts)
                .with_context(|| format!("encoding block {index} of {}", path.display()))?;
            out.write_all(&bytes).context("writing wire output")?;
        }
    }
    Ok(())
}

fn print_hash(path: &Path) -> Result<()> {
    let (header, body) = read_archive(path)?;
    convert::check_archive(&header, &body).context("invalid archive")?;
    ContiguityChecker::new().check(&body)?;
    let root = merkle::hash_tree_root(&body).context("hashing archive")?;
    println!("hash_tree_root: {}", hex::encode(root));
    Ok(())
}

fn print_info(path: &Path) -> Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let header = read_archive_header(&mut file)?;
    if header.block_count == 0 {
        bail!("archive header declares zero blocks");
    }
    println!("Format version {}", header.version);
    println!(
        "First block: {}, last block: {}",
        header.head_block_number,
        header
            .head_block_number
            .saturating_add(u64::from(header.block_count) - 1)
    );
    Ok(())
}

fn read_archive(path: &Path) -> Result<(ArchiveHeader, ArchiveBody)> {
    let mut file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    info!(name = %path.display(), "reading archive file");
    let header = read_archive_header(&mut file)?;
    let mut body_bytes = Vec::new();
    file.read_to_end(&mut body_bytes)
        .with_context(|| format!("reading {}", path.display()))?;
    let body = archive::decode_body(&body_bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok((header, body))
}

fn read_archive_header(file: &mut File) -> Result<ArchiveHeader> {
    let mut bytes = [0u8; archive::HEADER_SIZE];
    file.read_exact(&mut bytes).context("reading archive header")?;
    Ok(archive::decode_header(&bytes)?)
}

fn write_archive(path: Option<&Path>, header: &ArchiveHeader, body: &ArchiveBody) -> Result<()> {
    let bytes = archive::encode_body(body).context("encoding archive body")?;
    let mut out = open_output(path)?;
    out.write_all(&archive::encode_header(header))
        .context("writing archive header")?;
    out.write_all(&bytes).context("writing archive body")?;
    match path {
        Some(p) => info!(name = %p.display(), blocks = body.blocks.len(), "wrote archive file"),
        None => info!(blocks = body.blocks.len(), "wrote archive to stdout"),
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(
            File::create(p).with_context(|| format!("could not create {}", p.display()))?,
        ),
        None => Box::new(io::stdout()),
    })
}

/// Chains the input files into one reader, in the order given.
fn open_concat(paths: &[PathBuf]) -> Result<Box<dyn Read>> {
    let mut input: Box<dyn Read> = Box::new(io::empty());
    for path in paths {
        let file =
            File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        input = Box::new(input.chain(file));
    }
    Ok(input)
}

/// Inserts a sequence number before the extension: `era.ssz` becomes
/// `era-3.ssz`, an extensionless `era` becomes `era-3`.
fn numbered_file_name(base: &Path, sequence: usize) -> PathBuf {
    let mut name = base
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_default();
    name.push(format!("-{sequence}"));
    if let Some(extension) = base.extension() {
        name.push(".");
        name.push(extension);
    }
    base.with_file_name(name)
}
