//! MIPS-specific pieces: the relocation kinds the converter understands, the
//! symbol classes that can never be indirection targets, and the instruction
//! templates baked into GP stubs.

use std::borrow::Cow;

/// Symbol whose high-16 relocations mark a GP initialisation stub.
pub(crate) const GP_DISP_SYMBOL_NAME: &[u8] = b"_gp_disp";

/// `lui $gp, 0` — immediate filled in by the loader from the GP table.
pub(crate) const LUI_GP: u32 = 0x3C1C0000;

/// `ori $gp, $gp, 0` — immediate filled in by the loader from the GP table.
pub(crate) const ORI_GP: u32 = 0x379C0000;

pub(crate) const NOP: u32 = 0x00000000;

/// Words overwritten per GP stub: lui, ori, nop.
pub(crate) const GP_STUB_WORDS: u32 = 3;

/// Returns true for section indices that mean the symbol has no resolvable
/// address: undefined, or small-common data not yet assigned to a section.
pub(crate) fn is_unresolved_shndx(shndx: u16) -> bool {
    shndx == object::elf::SHN_UNDEF || shndx == object::elf::SHN_MIPS_SCOMMON
}

macro_rules! const_name_by_value {
    ($needle: expr, $( $const:ident ),*) => {
        match $needle {
            $(object::elf::$const => Some(stringify!($const)),)*
            _ => None
        }
    };
}

#[must_use]
pub(crate) fn rel_type_to_string(r_type: u32) -> Cow<'static, str> {
    if let Some(name) = const_name_by_value![
        r_type,
        R_MIPS_NONE,
        R_MIPS_16,
        R_MIPS_32,
        R_MIPS_REL32,
        R_MIPS_26,
        R_MIPS_HI16,
        R_MIPS_LO16,
        R_MIPS_GPREL16,
        R_MIPS_LITERAL,
        R_MIPS_GOT16,
        R_MIPS_PC16,
        R_MIPS_CALL16,
        R_MIPS_GPREL32,
        R_MIPS_JALR
    ] {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("unknown MIPS relocation type {r_type}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rel_type_names() {
        assert_eq!(rel_type_to_string(object::elf::R_MIPS_GOT16), "R_MIPS_GOT16");
        assert_eq!(rel_type_to_string(99), "unknown MIPS relocation type 99");
    }

    #[test]
    fn test_unresolved_shndx() {
        assert!(is_unresolved_shndx(0));
        assert!(is_unresolved_shndx(0xFF03));
        assert!(!is_unresolved_shndx(1));
        assert!(!is_unresolved_shndx(object::elf::SHN_ABS));
    }
}
