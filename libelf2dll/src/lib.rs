use crate::error::Result;
use anyhow::Context as _;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod args;
pub(crate) mod bytes;
pub(crate) mod diagnostics;
pub(crate) mod dll;
pub(crate) mod dll_writer;
pub(crate) mod elf;
pub mod error;
pub(crate) mod got;
pub(crate) mod input_data;
pub(crate) mod layout;
pub(crate) mod mips;
pub(crate) mod sections;

pub use args::Args;

/// Conversion options, independent of where the input and output live.
#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
    /// Write the uninitialized-data size hint into the exports table.
    pub bss_size_hint: bool,
}

/// Runs a whole conversion: maps the input object, builds the module image in
/// memory, and writes it out. The output file is only created once the build
/// has fully succeeded.
pub fn run(args: &Args) -> Result {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let input = input_data::InputFile::open(&args.input)?;
    let file = elf::File::parse(input.data()).with_context(|| {
        format!(
            "`{}` is not a valid relocatable MIPS object",
            input.filename.display()
        )
    })?;
    let module = dll_writer::build(&file, args.options())?;
    std::fs::write(&args.output, &module)
        .with_context(|| format!("failed to write `{}`", args.output.display()))?;
    tracing::info!(size = module.len(), "wrote {}", args.output.display());
    Ok(())
}

/// Converts an in-memory relocatable object into a module image.
pub fn build_dll(elf_data: &[u8], options: Options) -> Result<Vec<u8>> {
    let file = elf::File::parse(elf_data)?;
    dll_writer::build(&file, options)
}
