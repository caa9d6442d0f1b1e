use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum, ValueHint};

/// Smallest accepted non-zero `--target-size`, in bytes.
pub(crate) const MIN_TARGET_SIZE: u64 = 1_000_000;

/// Converts execution-block history between the RLP wire encoding and
/// merkleizable archive files, and inspects archive files.
///
/// Wire input is read as one stream across all input files; archive input
/// is read file by file. The blocks of a run must be consecutive by number,
/// within and across files.
#[derive(Parser)]
#[command(version)]
pub(crate) struct Cli {
    /// Format of the input data.
    #[arg(short, long, value_enum, default_value = "ssz")]
    pub(crate) input: Format,

    /// Format of the output data.
    #[arg(short, long, value_enum, default_value = "ssz")]
    pub(crate) output: Format,

    /// Write output to this file instead of stdout. With --target-size,
    /// each file name gains a sequence number before its extension.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub(crate) file: Option<PathBuf>,

    /// Approximate input bytes per output archive; a wire input is cut
    /// into numbered archive files of roughly this size. Zero keeps
    /// everything in one output.
    #[arg(long, default_value_t = 0)]
    pub(crate) target_size: u64,

    /// Print the first archive's hash tree root instead of converting.
    #[arg(long)]
    pub(crate) hash: bool,

    /// Print the first archive's block range instead of converting.
    #[arg(long)]
    pub(crate) info: bool,

    /// Input files, concatenated in the order given.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    pub(crate) files: Vec<PathBuf>,
}

/// The encodings `bart` reads and writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum Format {
    /// Standard RLP block encoding.
    Rlp,
    /// RLP block encoding with interleaved receipt lists.
    Rlprc,
    /// Archive encoding with a header and a hash tree root.
    Ssz,
}

impl Format {
    pub(crate) fn is_wire(self) -> bool {
        matches!(self, Format::Rlp | Format::Rlprc)
    }
}

impl Cli {
    /// Flag validation that must pass before any file is opened.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if !self.hash && !self.info && self.input == self.output {
            bail!("must provide different input and output formats");
        }
        if (self.hash || self.info) && self.input != Format::Ssz {
            bail!("--hash and --info can only be used with ssz input");
        }
        if self.input.is_wire() && self.output != Format::Ssz {
            bail!("a wire-format input can only be converted to ssz");
        }
        if self.target_size != 0 && self.target_size < MIN_TARGET_SIZE {
            bail!("--target-size below the minimum of {MIN_TARGET_SIZE} bytes");
        }
        if self.target_size != 0 && self.file.is_none() {
            bail!("--target-size needs an output file to number");
        }
        Ok(())
    }
}
