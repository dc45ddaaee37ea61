//! Drives a whole conversion: sizing, layout, section copy, and every table
//! and patch pass, in dependency order. Diagnostics accumulate across stages
//! so one run reports everything; the buffer is only returned when no stage
//! failed.

use crate::Options;
use crate::bytes;
use crate::diagnostics::Diagnostic;
use crate::diagnostics::Diagnostics;
use crate::dll;
use crate::elf::File;
use crate::error::Result;
use crate::got;
use crate::layout::Counts;
use crate::layout::Layout;
use crate::layout::SectionSizes;
use crate::mips;
use crate::sections::SectionIds;
use anyhow::Context as _;
use anyhow::bail;
use object::BigEndian;
use object::read::elf::Rel as _;

#[tracing::instrument(skip_all, name = "Build module")]
pub(crate) fn build(file: &File, options: Options) -> Result<Vec<u8>> {
    let ids = SectionIds::resolve(file)?;
    let counts = compute_counts(file, &ids)?;
    let layout = Layout::compute(&SectionSizes::read(file, &ids), counts);
    tracing::debug!(
        total_size = layout.total_size,
        got = counts.got,
        gp = counts.gp,
        data = counts.data,
        "planned module layout"
    );

    let mut out = vec![0u8; layout.total_size as usize];
    let mut diagnostics = Diagnostics::default();

    copy_sections(file, &ids, &layout, &mut out)?;
    write_header(&layout, &mut out)?;
    build_exports(file, &ids, &layout, &mut out, &mut diagnostics)?;
    patch_gp_stubs(file, &ids, &layout, &mut out, &mut diagnostics)?;
    build_table(file, &ids, &layout, &mut out, &mut diagnostics)?;
    patch_rodata(file, &ids, &layout, &mut out, &mut diagnostics)?;
    if options.bss_size_hint {
        write_bss_size_hint(&layout, &mut out)?;
    }

    if !diagnostics.is_empty() {
        bail!(
            "cannot convert object, {} error(s):{diagnostics}",
            diagnostics.len()
        );
    }
    Ok(out)
}

/// The sizing pass. Every count is derived straight from the relocation
/// lists; the build passes below emit exactly these many entries.
fn compute_counts(file: &File, ids: &SectionIds) -> Result<Counts> {
    Ok(Counts {
        exports: match ids.rel_exports {
            Some(index) => file.relocations(index)?.len().saturating_sub(2) as u32,
            None => 0,
        },
        got: got::entry_count(file, ids)?,
        gp: gp_stub_count(file, ids)?,
        data: match ids.rel_data {
            Some(index) => file.relocations(index)?.len() as u32,
            None => 0,
        },
    })
}

fn gp_stub_count(file: &File, ids: &SectionIds) -> Result<u32> {
    let Some(rel_text) = ids.rel_text else {
        return Ok(0);
    };
    let mut count = 0;
    for rel in file.relocations(rel_text)? {
        if rel.r_type(BigEndian) == object::elf::R_MIPS_HI16
            && file.symbol(rel)?.name == mips::GP_DISP_SYMBOL_NAME
        {
            count += 1;
        }
    }
    Ok(count)
}

fn copy_sections(file: &File, ids: &SectionIds, layout: &Layout, out: &mut [u8]) -> Result {
    for (id, region) in [
        (ids.text, layout.text),
        (ids.rodata, layout.rodata),
        (ids.data, layout.data),
    ] {
        let Some(index) = id else { continue };
        if !region.present() {
            continue;
        }
        let data = file.section_data(index)?;
        out[region.offset as usize..][..data.len()].copy_from_slice(data);
    }
    Ok(())
}

fn write_header(layout: &Layout, out: &mut [u8]) -> Result {
    bytes::write_u32(out, dll::HEADER_SIZE_FIELD, layout.header_size)?;
    bytes::write_u32(
        out,
        dll::DATA_OFFSET_FIELD,
        if layout.data.present() {
            layout.data.offset
        } else {
            dll::NONE
        },
    )?;
    bytes::write_u32(
        out,
        dll::TABLE_OFFSET_FIELD,
        if layout.table.present() {
            layout.table.offset
        } else {
            dll::NONE
        },
    )?;
    bytes::write_u16(out, dll::EXPORT_COUNT_FIELD, layout.counts.exports as u16)?;
    Ok(())
}

/// Serializes the export address table: constructor and destructor, a zero
/// terminator, the remaining exports, another terminator. Addresses are the
/// raw symbol values.
fn build_exports(
    file: &File,
    ids: &SectionIds,
    layout: &Layout,
    out: &mut [u8],
    diagnostics: &mut Diagnostics,
) -> Result {
    let Some(rel_exports) = ids.rel_exports else {
        diagnostics.push(Diagnostic::MissingExportRelocations);
        return Ok(());
    };
    let relocations = file.relocations(rel_exports)?;
    let split = relocations.len().min(2);

    let mut cursor = layout.exports.offset;
    for group in [&relocations[..split], &relocations[split..]] {
        for rel in group {
            bytes::write_u32(out, cursor, file.symbol(rel)?.value)?;
            cursor += dll::WORD_SIZE;
        }
        bytes::write_u32(out, cursor, 0)?;
        cursor += dll::WORD_SIZE;
    }
    Ok(())
}

/// Rewrites each GP initialisation stub to the fixed lui/ori/nop template.
/// The immediates stay zero; the loader fills them in from the GP table.
fn patch_gp_stubs(
    file: &File,
    ids: &SectionIds,
    layout: &Layout,
    out: &mut [u8],
    diagnostics: &mut Diagnostics,
) -> Result {
    if !layout.text.present() {
        return Ok(());
    }
    let Some(rel_text) = ids.rel_text else {
        diagnostics.push(Diagnostic::MissingCodeRelocations);
        return Ok(());
    };
    for rel in file.relocations(rel_text)? {
        if rel.r_type(BigEndian) != object::elf::R_MIPS_HI16
            || file.symbol(rel)?.name != mips::GP_DISP_SYMBOL_NAME
        {
            continue;
        }
        let offset = rel.r_offset(BigEndian);
        let at = layout
            .text
            .locate(offset, mips::GP_STUB_WORDS * dll::WORD_SIZE)
            .with_context(|| format!("GP stub at 0x{offset:x} in .text"))?;
        bytes::write_u32(out, at, mips::LUI_GP)?;
        bytes::write_u32(out, at + dll::WORD_SIZE, mips::ORI_GP)?;
        bytes::write_u32(out, at + 2 * dll::WORD_SIZE, mips::NOP)?;
    }
    Ok(())
}

/// Lays the table region out as GOT entries, GP entries and data entries,
/// each group followed by its sentinel, then runs the three builders.
fn build_table(
    file: &File,
    ids: &SectionIds,
    layout: &Layout,
    out: &mut [u8],
    diagnostics: &mut Diagnostics,
) -> Result {
    if !layout.table.present() {
        return Ok(());
    }
    let counts = &layout.counts;

    let got_end = layout.table.offset + counts.got * dll::WORD_SIZE;
    let gp_offset = got_end + dll::WORD_SIZE;
    let gp_end = gp_offset + counts.gp * dll::WORD_SIZE;
    let data_offset = gp_end + dll::WORD_SIZE;
    let data_end = data_offset + counts.data * dll::WORD_SIZE;

    bytes::write_u32(out, got_end, dll::GOT_END)?;
    bytes::write_u32(out, gp_end, dll::GP_END)?;
    bytes::write_u32(out, data_end, dll::DATA_END)?;

    got::build(file, ids, layout, out, diagnostics)?;
    build_gp_table(file, ids, out, gp_offset)?;
    build_data_table(file, ids, layout, out, data_offset, diagnostics)?;
    Ok(())
}

/// Records the code offset of every GP stub, in relocation-list order.
fn build_gp_table(file: &File, ids: &SectionIds, out: &mut [u8], table_offset: u32) -> Result {
    let Some(rel_text) = ids.rel_text else {
        return Ok(());
    };
    let mut cursor = table_offset;
    for rel in file.relocations(rel_text)? {
        if rel.r_type(BigEndian) == object::elf::R_MIPS_HI16
            && file.symbol(rel)?.name == mips::GP_DISP_SYMBOL_NAME
        {
            bytes::write_u32(out, cursor, rel.r_offset(BigEndian))?;
            cursor += dll::WORD_SIZE;
        }
    }
    Ok(())
}

/// Resolves every load-time-relocatable pointer in the initialized-data
/// region in place and records its offset in the data table.
fn build_data_table(
    file: &File,
    ids: &SectionIds,
    layout: &Layout,
    out: &mut [u8],
    table_offset: u32,
    diagnostics: &mut Diagnostics,
) -> Result {
    let Some(rel_data) = ids.rel_data else {
        return Ok(());
    };
    let mut cursor = table_offset;
    for (index, rel) in file.relocations(rel_data)?.iter().enumerate() {
        let offset = rel.r_offset(BigEndian);
        let symbol = file.symbol(rel)?;
        match rel.r_type(BigEndian) {
            object::elf::R_MIPS_32 => {
                if mips::is_unresolved_shndx(symbol.shndx) {
                    diagnostics.push(Diagnostic::UnresolvedSymbol {
                        section: ".data",
                        offset,
                        name: String::from_utf8_lossy(symbol.name).into_owned(),
                    });
                    continue;
                }
                let at = layout
                    .data
                    .locate(offset, dll::WORD_SIZE)
                    .with_context(|| format!("data relocation {index} in .data"))?;
                // The word already in the copied section carries the baked-in
                // addend; the relocated value adds to it.
                let value = symbol
                    .value
                    .wrapping_add(layout.section_base(ids, symbol.shndx))
                    .wrapping_sub(layout.region_base(layout.data))
                    .wrapping_add(bytes::read_u32(out, at)?);
                bytes::write_u32(out, at, value)?;
                bytes::write_u32(out, cursor, offset)?;
                cursor += dll::WORD_SIZE;
            }
            r_type => {
                diagnostics.push(Diagnostic::UnsupportedRelocation {
                    index,
                    r_type,
                    section: ".data",
                    offset,
                    name: String::from_utf8_lossy(symbol.name).into_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Rewrites GP-relative literal pool entries from section-relative addresses
/// into signed deltas from the GP base. Runs last; it needs the table
/// region's final position.
fn patch_rodata(
    file: &File,
    ids: &SectionIds,
    layout: &Layout,
    out: &mut [u8],
    diagnostics: &mut Diagnostics,
) -> Result {
    let Some(rel_rodata) = ids.rel_rodata else {
        return Ok(());
    };
    let relocations = file.relocations(rel_rodata)?;
    if relocations.is_empty() {
        return Ok(());
    }
    let Some(gp_base) = layout.gp_base else {
        bail!("GP-relative relocations present but no region establishes a GP base");
    };
    for (index, rel) in relocations.iter().enumerate() {
        let offset = rel.r_offset(BigEndian);
        let symbol = file.symbol(rel)?;
        match rel.r_type(BigEndian) {
            object::elf::R_MIPS_GPREL32 => {
                let at = layout
                    .rodata
                    .locate(offset, dll::WORD_SIZE)
                    .with_context(|| format!("GP-relative relocation {index} in .rodata"))?;
                let address = bytes::read_u32(out, at)?
                    .wrapping_add(layout.section_base(ids, symbol.shndx));
                // Two's-complement delta; negative when the address precedes
                // the GP base.
                bytes::write_u32(out, at, address.wrapping_sub(gp_base))?;
            }
            r_type => {
                diagnostics.push(Diagnostic::UnsupportedRelocation {
                    index,
                    r_type,
                    section: ".rodata",
                    offset,
                    name: String::from_utf8_lossy(symbol.name).into_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Optional extension: stashes the uninitialized-data logical size in the
/// terminator slot after constructor/destructor so repackers can pick it up
/// without a side file. 0 means unspecified, all-ones means exactly zero,
/// anything else is the literal size.
fn write_bss_size_hint(layout: &Layout, out: &mut [u8]) -> Result {
    let hint = if layout.bss_size == 0 {
        dll::NONE
    } else {
        layout.bss_size
    };
    bytes::write_u32(out, layout.exports.offset + 2 * dll::WORD_SIZE, hint)
}
