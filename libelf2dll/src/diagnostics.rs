use crate::mips;
use std::fmt::Display;

/// A problem found while converting one relocation list. These don't abort
/// the stage that found them; each stage keeps going so that a single run
/// reports everything that's wrong with the input object.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Diagnostic {
    MissingExportRelocations,
    MissingCodeRelocations,
    UnresolvedSymbol {
        section: &'static str,
        offset: u32,
        name: String,
    },
    UnsupportedRelocation {
        index: usize,
        r_type: u32,
        section: &'static str,
        offset: u32,
        name: String,
    },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MissingExportRelocations => {
                write!(f, "object has no export relocation list (.rel.exports)")
            }
            Diagnostic::MissingCodeRelocations => {
                write!(
                    f,
                    "object has a code section but no code relocation list (.rel.text)"
                )
            }
            Diagnostic::UnresolvedSymbol {
                section,
                offset,
                name,
            } => {
                write!(
                    f,
                    "unresolved symbol \"{name}\" referenced from {section} at offset 0x{offset:x}"
                )
            }
            Diagnostic::UnsupportedRelocation {
                index,
                r_type,
                section,
                offset,
                name,
            } => {
                write!(
                    f,
                    "unsupported relocation {index} of kind {r_type} ({}) in {section} at \
                     offset 0x{offset:x} for symbol \"{name}\"",
                    mips::rel_type_to_string(*r_type)
                )
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            write!(f, "\n  {entry}")?;
        }
        Ok(())
    }
}
