//! Maps the input object into memory. The mapping is read-only for the whole
//! build; every other structure borrows from it.

use crate::error::Result;
use anyhow::Context;
use memmap2::Mmap;
use std::path::Path;
use std::path::PathBuf;

pub(crate) struct InputFile {
    pub(crate) filename: PathBuf,
    bytes: Mmap,
}

impl InputFile {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open `{}`", path.display()))?;
        let bytes = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to map `{}`", path.display()))?;
        Ok(InputFile {
            filename: path.to_owned(),
            bytes,
        })
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.bytes
    }
}
