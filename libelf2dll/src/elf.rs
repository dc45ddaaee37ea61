use crate::error::Result;
use anyhow::bail;
use anyhow::ensure;
use object::BigEndian;
use object::SectionIndex;
use object::SymbolIndex;
use object::read::elf::FileHeader as _;
use object::read::elf::Rel as _;
use object::read::elf::SectionHeader as _;
use object::read::elf::Sym as _;

pub(crate) type FileHeader = object::elf::FileHeader32<BigEndian>;
pub(crate) type SectionHeader = object::elf::SectionHeader32<BigEndian>;
pub(crate) type Rel = object::elf::Rel32<BigEndian>;

type SectionTable<'data> = object::read::elf::SectionTable<'data, FileHeader>;
type SymbolTable<'data> = object::read::elf::SymbolTable<'data, FileHeader>;

/// A borrowed view of the input object. All section data, symbols and
/// relocation lists stay inside the mapped input; nothing is copied until the
/// output buffer is populated.
pub(crate) struct File<'data> {
    pub(crate) data: &'data [u8],
    pub(crate) sections: SectionTable<'data>,
    symbols: SymbolTable<'data>,
}

/// The parts of a symbol the conversion needs.
pub(crate) struct SymbolView<'data> {
    pub(crate) name: &'data [u8],
    pub(crate) value: u32,
    pub(crate) shndx: u16,
}

impl<'data> File<'data> {
    pub(crate) fn parse(data: &'data [u8]) -> Result<Self> {
        let header = FileHeader::parse(data)?;
        let endian = header.endian()?;
        ensure!(
            header.e_ident.class == object::elf::ELFCLASS32,
            "not a 32-bit ELF object"
        );
        ensure!(
            header.e_ident.data == object::elf::ELFDATA2MSB,
            "not a big-endian ELF object"
        );
        ensure!(
            header.e_machine(endian) == object::elf::EM_MIPS,
            "not a MIPS object"
        );
        ensure!(
            header.e_type(endian) == object::elf::ET_REL,
            "not a relocatable object"
        );
        let sections = header.sections(endian, data)?;

        let mut symbols = SymbolTable::default();
        for (section_index, section) in sections.enumerate() {
            if section.sh_type(endian) == object::elf::SHT_SYMTAB {
                symbols = SymbolTable::parse(endian, data, &sections, section_index, section)?;
            }
        }

        Ok(File {
            data,
            sections,
            symbols,
        })
    }

    pub(crate) fn section_name(&self, section: &'data SectionHeader) -> Result<&'data [u8]> {
        Ok(self.sections.section_name(BigEndian, section)?)
    }

    /// Size of a section, or 0 when the section is absent.
    pub(crate) fn section_size(&self, index: Option<SectionIndex>) -> u32 {
        index
            .and_then(|index| self.sections.section(index).ok())
            .map_or(0, |section| section.sh_size(BigEndian))
    }

    pub(crate) fn section_data(&self, index: SectionIndex) -> Result<&'data [u8]> {
        let section = self.sections.section(index)?;
        Ok(section.data(BigEndian, self.data)?)
    }

    /// The entries of a relocation-list section.
    pub(crate) fn relocations(&self, index: SectionIndex) -> Result<&'data [Rel]> {
        let section = self.sections.section(index)?;
        let Some((relocations, _link)) = section.rel(BigEndian, self.data)? else {
            bail!(
                "section `{}` is not a relocation list",
                String::from_utf8_lossy(self.section_name(section)?)
            );
        };
        Ok(relocations)
    }

    pub(crate) fn symbol(&self, rel: &Rel) -> Result<SymbolView<'data>> {
        let symbol = self
            .symbols
            .symbol(SymbolIndex(rel.r_sym(BigEndian) as usize))?;
        let name = self.symbols.symbol_name(BigEndian, symbol)?;
        Ok(SymbolView {
            name,
            value: symbol.st_value(BigEndian),
            shndx: symbol.st_shndx(BigEndian),
        })
    }
}
