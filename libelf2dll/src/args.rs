//! Command-line surface: two positional paths plus conversion flags.

use crate::Options;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "elf2dll",
    version,
    about = "Converts relocatable MIPS ELF objects into position-independent DLL modules"
)]
pub struct Args {
    /// Input relocatable object file.
    pub input: PathBuf,

    /// Output module file.
    pub output: PathBuf,

    /// Record the uninitialized-data size in the exports table so repackers
    /// don't need a separate size file.
    #[arg(long)]
    pub bss_size_hint: bool,
}

impl Args {
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    pub(crate) fn options(&self) -> Options {
        Options {
            bss_size_hint: self.bss_size_hint,
        }
    }
}
