//! Conventional section names resolved to indices once, up front. Everything
//! after this operates on indices; no stage looks sections up by name again.

use crate::elf::File;
use crate::error::Result;
use object::SectionIndex;

#[derive(Debug, Default)]
pub(crate) struct SectionIds {
    pub(crate) text: Option<SectionIndex>,
    pub(crate) rodata: Option<SectionIndex>,
    pub(crate) data: Option<SectionIndex>,
    pub(crate) bss: Option<SectionIndex>,
    pub(crate) rel_text: Option<SectionIndex>,
    pub(crate) rel_rodata: Option<SectionIndex>,
    pub(crate) rel_data: Option<SectionIndex>,
    pub(crate) rel_exports: Option<SectionIndex>,
}

impl SectionIds {
    pub(crate) fn resolve(file: &File) -> Result<Self> {
        let mut ids = SectionIds::default();
        for (index, section) in file.sections.enumerate() {
            let slot = match file.section_name(section)? {
                b".text" => &mut ids.text,
                b".rodata" => &mut ids.rodata,
                b".data" => &mut ids.data,
                b".bss" => &mut ids.bss,
                b".rel.text" => &mut ids.rel_text,
                b".rel.rodata" => &mut ids.rel_rodata,
                b".rel.data" => &mut ids.rel_data,
                b".rel.exports" => &mut ids.rel_exports,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        Ok(ids)
    }

    /// True when `shndx` refers to the section behind `id`.
    pub(crate) fn matches(id: Option<SectionIndex>, shndx: u16) -> bool {
        id.is_some_and(|index| index.0 == usize::from(shndx))
    }
}
