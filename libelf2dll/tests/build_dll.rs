//! End-to-end conversion tests over synthesized relocatable MIPS objects.

use libelf2dll::Options;
use libelf2dll::build_dll;
use object::Architecture;
use object::BinaryFormat;
use object::Endianness;
use object::FileFlags;
use object::RelocationFlags;
use object::SectionKind;
use object::SymbolFlags;
use object::SymbolKind;
use object::SymbolScope;
use object::elf;
use object::write::Object;
use object::write::Relocation;
use object::write::SectionId;
use object::write::Symbol;
use object::write::SymbolId;
use object::write::SymbolSection;

const GOT_END: u32 = 0xFFFFFFFE;
const GP_END: u32 = 0xFFFFFFFD;
const DATA_END: u32 = 0xFFFFFFFF;
const NONE: u32 = 0xFFFFFFFF;

const fn info(st_bind: u8, st_type: u8) -> u8 {
    (st_bind << 4) | (st_type & 0x0F)
}

fn new_object() -> Object<'static> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Mips, Endianness::Big);
    obj.flags = FileFlags::Elf {
        os_abi: elf::ELFOSABI_NONE,
        abi_version: 0,
        e_flags: elf::EF_MIPS_ABI_O32 | elf::EF_MIPS_ARCH_3,
    };
    obj
}

fn add_section(obj: &mut Object, name: &str, kind: SectionKind, data: &[u8]) -> SectionId {
    let id = obj.add_section(Vec::new(), name.as_bytes().to_vec(), kind);
    obj.set_section_data(id, data.to_vec(), 4);
    id
}

fn add_global(
    obj: &mut Object,
    name: &str,
    section: SectionId,
    value: u64,
    st_type: u8,
) -> SymbolId {
    obj.add_symbol(Symbol {
        name: name.as_bytes().to_vec(),
        value,
        size: 0,
        kind: SymbolKind::Data,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(section),
        flags: SymbolFlags::Elf {
            st_info: info(elf::STB_GLOBAL, st_type),
            st_other: elf::STV_DEFAULT,
        },
    })
}

fn add_undefined(obj: &mut Object, name: &str) -> SymbolId {
    obj.add_symbol(Symbol {
        name: name.as_bytes().to_vec(),
        value: 0,
        size: 0,
        kind: SymbolKind::Unknown,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Undefined,
        flags: SymbolFlags::Elf {
            st_info: info(elf::STB_GLOBAL, elf::STT_NOTYPE),
            st_other: elf::STV_DEFAULT,
        },
    })
}

fn add_rel(obj: &mut Object, section: SectionId, offset: u64, symbol: SymbolId, r_type: u32) {
    obj.add_relocation(
        section,
        Relocation {
            offset,
            symbol,
            addend: 0,
            flags: RelocationFlags::Elf { r_type },
        },
    )
    .unwrap();
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

fn be32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn be16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes(bytes[offset..offset + 2].try_into().unwrap())
}

/// Decodes the table region the way the loader does: scanning for the three
/// sentinels.
fn scan_table(bytes: &[u8], table_offset: usize) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    let mut cursor = table_offset;
    let mut groups = Vec::new();
    for sentinel in [GOT_END, GP_END, DATA_END] {
        let mut entries = Vec::new();
        loop {
            let word = be32(bytes, cursor);
            cursor += 4;
            if word == sentinel {
                break;
            }
            entries.push(word);
        }
        groups.push(entries);
    }
    let mut groups = groups.into_iter();
    (
        groups.next().unwrap(),
        groups.next().unwrap(),
        groups.next().unwrap(),
    )
}

/// An object exercising every table at once: a GP stub, deduplicated
/// indirection entries, a data pointer and GP-relative literals.
fn full_object() -> Vec<u8> {
    let mut obj = new_object();

    let text = add_section(
        &mut obj,
        ".text",
        SectionKind::Text,
        &words(&[
            0x3C1C0000, // lui   $gp, 0
            0x279C0000, // addiu $gp, $gp, 0
            0x0399E021, // addu  $gp, $gp, $t9
            0x03E00008, // jr    $ra
            0x8F990000, // lw    $t9, 0($gp)
            0x8F990000, // lw    $t9, 0($gp)
            0x8F990000, // lw    $t9, 0($gp)
            0x03200008, // jr    $t9
        ]),
    );
    let rodata = add_section(
        &mut obj,
        ".rodata",
        SectionKind::ReadOnlyData,
        &words(&[0x00000004, 0x00000010]),
    );
    let data = add_section(
        &mut obj,
        ".data",
        SectionKind::Data,
        &words(&[0, 0, 0x00000100, 0]),
    );
    let bss = obj.add_section(Vec::new(), b".bss".to_vec(), SectionKind::UninitializedData);
    obj.append_section_bss(bss, 0x30, 4);
    let exports = add_section(&mut obj, ".exports", SectionKind::Data, &[0; 16]);

    let ctor = add_global(&mut obj, "module_ctor", text, 0xC, elf::STT_FUNC);
    let dtor = add_global(&mut obj, "module_dtor", text, 0x1C, elf::STT_FUNC);
    let func = add_global(&mut obj, "dispatch", text, 0x18, elf::STT_FUNC);
    let var = add_global(&mut obj, "state", data, 0x4, elf::STT_OBJECT);
    let gp_disp = add_undefined(&mut obj, "_gp_disp");

    add_rel(&mut obj, text, 0x0, gp_disp, elf::R_MIPS_HI16);
    add_rel(&mut obj, text, 0x4, gp_disp, elf::R_MIPS_LO16);
    add_rel(&mut obj, text, 0x10, var, elf::R_MIPS_GOT16);
    add_rel(&mut obj, text, 0x14, func, elf::R_MIPS_CALL16);
    add_rel(&mut obj, text, 0x18, var, elf::R_MIPS_GOT16);

    add_rel(&mut obj, rodata, 0x0, var, elf::R_MIPS_GPREL32);
    add_rel(&mut obj, rodata, 0x4, ctor, elf::R_MIPS_GPREL32);

    add_rel(&mut obj, data, 0x8, func, elf::R_MIPS_32);

    add_rel(&mut obj, exports, 0x0, ctor, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x4, dtor, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x8, var, elf::R_MIPS_32);

    obj.write().unwrap()
}

#[test]
fn converts_full_module() {
    let module = build_dll(&full_object(), Options::default()).unwrap();

    // Header record + 5 export words, then 32 bytes of code, a table of
    // 4 fixed + 2 dynamic GOT entries, 1 GP entry, 1 data entry and the
    // three sentinels, then rodata and data padded to 16 bytes each.
    assert_eq!(module.len(), 144);
    let header_size = be32(&module, 0);
    assert_eq!(header_size, 36);
    assert_eq!(be32(&module, 4), 128); // data offset
    assert_eq!(be32(&module, 8), 68); // table offset
    assert_eq!(be16(&module, 12), 1); // exports besides ctor/dtor
    assert_eq!(be16(&module, 14), 0);

    // Exports: ctor, dtor, terminator, the one export, terminator.
    assert_eq!(be32(&module, 16), 0xC);
    assert_eq!(be32(&module, 20), 0x1C);
    assert_eq!(be32(&module, 24), 0);
    assert_eq!(be32(&module, 28), 0x4);
    assert_eq!(be32(&module, 32), 0);

    // Code starts right at the header boundary and its padded size is a
    // multiple of 16.
    let text = header_size as usize;
    assert_eq!(text, 36);
    assert_eq!((68 - text) % 16, 0);

    // GP stub rewritten to lui/ori/nop with zero immediates; the jr after it
    // is untouched.
    assert_eq!(be32(&module, text), 0x3C1C0000);
    assert_eq!(be32(&module, text + 4), 0x379C0000);
    assert_eq!(be32(&module, text + 8), 0x00000000);
    assert_eq!(be32(&module, text + 0xC), 0x03E00008);

    // Both references to `state` share GOT slot 4; `dispatch` takes slot 5.
    assert_eq!(be32(&module, text + 0x10), 0x8F990010);
    assert_eq!(be32(&module, text + 0x14), 0x8F990014);
    assert_eq!(be32(&module, text + 0x18), 0x8F990010);

    // Region bases are measured from the header boundary.
    let (got, gp, data_table) = scan_table(&module, 68);
    assert_eq!(got, vec![0, 112 - 36, 128 - 36, 144 - 36, 0x4 + 128 - 36, 0x18]);
    assert_eq!(gp, vec![0x0]);
    assert_eq!(data_table, vec![0x8]);

    // Data pointer resolved against its region, preserving the stored word.
    assert_eq!(be32(&module, 128 + 0x8), 0x18 + 0x100 - (128 - 36));

    // GP-relative literals rewritten as signed deltas from the GP base, and
    // adding the base back recovers the addresses exactly.
    let gp_base = 68 - 36u32;
    let positive = be32(&module, 112);
    let negative = be32(&module, 116);
    assert_eq!(gp_base.wrapping_add(positive), 0x4 + 128 - 36);
    assert_eq!(gp_base.wrapping_add(negative), 0x10);
    assert!((negative as i32) < 0);
}

/// No code, no read-only data, no indirections: the table region vanishes
/// and two export entries mean an export count of zero.
fn data_only_object() -> Vec<u8> {
    let mut obj = new_object();
    let data = add_section(&mut obj, ".data", SectionKind::Data, &[0; 8]);
    let exports = add_section(&mut obj, ".exports", SectionKind::Data, &[0; 8]);
    let ctor = add_global(&mut obj, "module_ctor", data, 0x0, elf::STT_OBJECT);
    let dtor = add_global(&mut obj, "module_dtor", data, 0x4, elf::STT_OBJECT);
    add_rel(&mut obj, exports, 0x0, ctor, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x4, dtor, elf::R_MIPS_32);
    obj.write().unwrap()
}

#[test]
fn omits_table_without_rodata_or_indirections() {
    let module = build_dll(&data_only_object(), Options::default()).unwrap();

    assert_eq!(be32(&module, 0), 32);
    assert_eq!(be32(&module, 4), 32); // data region directly after exports
    assert_eq!(be32(&module, 8), NONE); // no table region
    assert_eq!(be16(&module, 12), 0);

    // Exactly ctor, dtor and the two terminators.
    assert_eq!(be32(&module, 16), 0x0);
    assert_eq!(be32(&module, 20), 0x4);
    assert_eq!(be32(&module, 24), 0);
    assert_eq!(be32(&module, 28), 0);
    assert_eq!(module.len(), 48);
}

#[test]
fn reports_unsupported_relocation_kind() {
    let mut obj = new_object();
    let text = add_section(&mut obj, ".text", SectionKind::Text, &[0; 0x60]);
    let exports = add_section(&mut obj, ".exports", SectionKind::Data, &[0; 8]);
    let foo = add_global(&mut obj, "foo", text, 0x0, elf::STT_FUNC);
    add_rel(&mut obj, text, 0x40, foo, 99);
    add_rel(&mut obj, exports, 0x0, foo, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x4, foo, elf::R_MIPS_32);

    let error = build_dll(&obj.write().unwrap(), Options::default()).unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("kind 99"), "{message}");
    assert!(message.contains("0x40"), "{message}");
    assert!(message.contains("\"foo\""), "{message}");
}

#[test]
fn reports_unresolved_indirection_target() {
    let mut obj = new_object();
    let text = add_section(&mut obj, ".text", SectionKind::Text, &words(&[0x8F990000]));
    let exports = add_section(&mut obj, ".exports", SectionKind::Data, &[0; 8]);
    let local = add_global(&mut obj, "entry", text, 0x0, elf::STT_FUNC);
    let ext = add_undefined(&mut obj, "ext");
    add_rel(&mut obj, text, 0x0, ext, elf::R_MIPS_GOT16);
    add_rel(&mut obj, exports, 0x0, local, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x4, local, elf::R_MIPS_32);

    let error = build_dll(&obj.write().unwrap(), Options::default()).unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("unresolved symbol \"ext\""), "{message}");
}

#[test]
fn reports_missing_export_relocations() {
    let mut obj = new_object();
    add_section(&mut obj, ".data", SectionKind::Data, &[0; 8]);

    let error = build_dll(&obj.write().unwrap(), Options::default()).unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("export relocation list"), "{message}");
}

#[test]
fn reports_missing_code_relocations() {
    let mut obj = new_object();
    add_section(&mut obj, ".text", SectionKind::Text, &words(&[0x03E00008]));
    let data = add_section(&mut obj, ".data", SectionKind::Data, &[0; 8]);
    let exports = add_section(&mut obj, ".exports", SectionKind::Data, &[0; 8]);
    let ctor = add_global(&mut obj, "module_ctor", data, 0x0, elf::STT_OBJECT);
    add_rel(&mut obj, exports, 0x0, ctor, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x4, ctor, elf::R_MIPS_32);

    let error = build_dll(&obj.write().unwrap(), Options::default()).unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("no code relocation list"), "{message}");
}

#[test]
fn rejects_non_mips_input() {
    let error = build_dll(b"not an elf file", Options::default()).unwrap_err();
    assert!(!format!("{error:#}").is_empty());
}

#[test]
fn bss_size_hint_writes_literal_size() {
    let mut obj = new_object();
    let data = add_section(&mut obj, ".data", SectionKind::Data, &[0; 8]);
    let bss = obj.add_section(Vec::new(), b".bss".to_vec(), SectionKind::UninitializedData);
    obj.append_section_bss(bss, 0x30, 4);
    let exports = add_section(&mut obj, ".exports", SectionKind::Data, &[0; 8]);
    let ctor = add_global(&mut obj, "module_ctor", data, 0x0, elf::STT_OBJECT);
    let dtor = add_global(&mut obj, "module_dtor", data, 0x4, elf::STT_OBJECT);
    add_rel(&mut obj, exports, 0x0, ctor, elf::R_MIPS_32);
    add_rel(&mut obj, exports, 0x4, dtor, elf::R_MIPS_32);
    let elf_data = obj.write().unwrap();

    // Flag off: the slot stays a zero terminator.
    let module = build_dll(&elf_data, Options::default()).unwrap();
    assert_eq!(be32(&module, 24), 0);

    // Flag on: the whole bss size survives the image's trailing padding, so
    // the literal size is recorded.
    let options = Options {
        bss_size_hint: true,
    };
    let module = build_dll(&elf_data, options).unwrap();
    assert_eq!(be32(&module, 24), 0x30);
}

#[test]
fn bss_size_hint_marks_zero_size() {
    let module = build_dll(
        &data_only_object(),
        Options {
            bss_size_hint: true,
        },
    )
    .unwrap();
    assert_eq!(be32(&module, 24), NONE);
}
