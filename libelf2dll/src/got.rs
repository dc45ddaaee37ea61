//! Builds the deduplicated indirection table and rewrites every referencing
//! instruction to index it.

use crate::bytes;
use crate::diagnostics::Diagnostic;
use crate::diagnostics::Diagnostics;
use crate::dll;
use crate::elf::File;
use crate::elf::SymbolView;
use crate::error::Result;
use crate::layout::Layout;
use crate::mips;
use crate::sections::SectionIds;
use anyhow::Context as _;
use object::BigEndian;
use object::read::elf::Rel as _;

/// Identifies an entry before final region offsets exist. Two relocations
/// share a slot exactly when they resolve to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum GotKey {
    Absolute(u32),
    SectionRelative { shndx: u16, value: u32 },
}

impl GotKey {
    /// None for symbols that can never be indirection targets: undefined and
    /// small-common.
    fn classify(symbol: &SymbolView) -> Option<GotKey> {
        if mips::is_unresolved_shndx(symbol.shndx) {
            None
        } else if symbol.shndx == object::elf::SHN_ABS {
            Some(GotKey::Absolute(symbol.value))
        } else {
            Some(GotKey::SectionRelative {
                shndx: symbol.shndx,
                value: symbol.value,
            })
        }
    }
}

/// A key occupies one of the four fixed slots when it names the start of a
/// canonical region; such keys never become dynamic entries.
fn fixed_slot(ids: &SectionIds, key: GotKey) -> Option<u32> {
    let GotKey::SectionRelative { shndx, value: 0 } = key else {
        return None;
    };
    [ids.text, ids.rodata, ids.data, ids.bss]
        .iter()
        .position(|id| SectionIds::matches(*id, shndx))
        .map(|slot| slot as u32)
}

/// Sizing pass: the exact number of entries the build pass will emit,
/// including the fixed four. Pure; the result is recorded in `Counts` and
/// never recomputed.
pub(crate) fn entry_count(file: &File, ids: &SectionIds) -> Result<u32> {
    let Some(rel_text) = ids.rel_text else {
        return Ok(0);
    };
    let mut keys = Vec::new();
    for rel in file.relocations(rel_text)? {
        let r_type = rel.r_type(BigEndian);
        if r_type != object::elf::R_MIPS_GOT16 && r_type != object::elf::R_MIPS_CALL16 {
            continue;
        }
        let Some(key) = GotKey::classify(&file.symbol(rel)?) else {
            continue;
        };
        if fixed_slot(ids, key).is_none() {
            keys.push(key);
        }
    }
    keys.sort_unstable();
    keys.dedup();
    Ok(dll::GOT_FIXED_ENTRIES + keys.len() as u32)
}

/// Build pass: serialize the fixed entries and every distinct dynamic entry,
/// and OR each referencing instruction's low half with its slot's byte
/// offset. Unresolved targets and unhandled kinds are recorded and the scan
/// keeps going.
pub(crate) fn build(
    file: &File,
    ids: &SectionIds,
    layout: &Layout,
    out: &mut [u8],
    diagnostics: &mut Diagnostics,
) -> Result {
    let Some(rel_text) = ids.rel_text else {
        return Ok(());
    };

    let table = layout.table;
    for (slot, base) in [
        layout.region_base(layout.text),
        layout.region_base(layout.rodata),
        layout.region_base(layout.data),
        layout.bss_base(),
    ]
    .into_iter()
    .enumerate()
    {
        bytes::write_u32(out, table.offset + slot as u32 * dll::WORD_SIZE, base)?;
    }

    let mut entries: Vec<GotKey> = Vec::new();
    for (index, rel) in file.relocations(rel_text)?.iter().enumerate() {
        let r_type = rel.r_type(BigEndian);
        let offset = rel.r_offset(BigEndian);
        let symbol = file.symbol(rel)?;
        match r_type {
            // Always paired with a GOT16/CALL16 that owns the table entry.
            object::elf::R_MIPS_LO16 => {}

            // Call-optimisation hint.
            object::elf::R_MIPS_JALR => {}

            // GP initialisation stubs are rewritten separately.
            object::elf::R_MIPS_HI16 if symbol.name == mips::GP_DISP_SYMBOL_NAME => {}

            object::elf::R_MIPS_GOT16 | object::elf::R_MIPS_CALL16 => {
                let Some(key) = GotKey::classify(&symbol) else {
                    diagnostics.push(Diagnostic::UnresolvedSymbol {
                        section: ".text",
                        offset,
                        name: String::from_utf8_lossy(symbol.name).into_owned(),
                    });
                    continue;
                };

                let slot = match fixed_slot(ids, key) {
                    Some(slot) => slot,
                    None => match entries.iter().position(|existing| *existing == key) {
                        Some(position) => dll::GOT_FIXED_ENTRIES + position as u32,
                        None => {
                            let slot = dll::GOT_FIXED_ENTRIES + entries.len() as u32;
                            entries.push(key);
                            bytes::write_u32(
                                out,
                                table.offset + slot * dll::WORD_SIZE,
                                resolve_entry(layout, ids, key),
                            )?;
                            slot
                        }
                    },
                };

                let at = layout
                    .text
                    .locate(offset, dll::WORD_SIZE)
                    .with_context(|| format!("indirection relocation {index} in .text"))?;
                let insn = bytes::read_u32(out, at)?;
                bytes::write_u32(out, at, insn | (slot * dll::WORD_SIZE))?;
            }

            _ => {
                diagnostics.push(Diagnostic::UnsupportedRelocation {
                    index,
                    r_type,
                    section: ".text",
                    offset,
                    name: String::from_utf8_lossy(symbol.name).into_owned(),
                });
            }
        }
    }

    debug_assert_eq!(
        dll::GOT_FIXED_ENTRIES + entries.len() as u32,
        layout.counts.got
    );
    Ok(())
}

fn resolve_entry(layout: &Layout, ids: &SectionIds, key: GotKey) -> u32 {
    match key {
        GotKey::Absolute(value) => value,
        GotKey::SectionRelative { shndx, value } => {
            value.wrapping_add(layout.section_base(ids, shndx))
        }
    }
}
