//! Definitions for the output module format.
//!
//! A module is one contiguous image:
//!
//! ```text
//! 0x00  header_size            u32  (header record + exports table)
//! 0x04  data_offset | NONE     u32  (absolute offset of initialized data)
//! 0x08  table_offset | NONE    u32  (absolute offset of the table region)
//! 0x0C  export_count           u16
//! 0x0E  padding                u16
//! 0x10  exports                u32 x (export_count + 2 + 2)
//! ----  code                   16-byte aligned size
//! ----  table region           GOT entries, GOT_END, GP entries, GP_END,
//!                              data entries, DATA_END
//! ----  read-only data         16-byte aligned size
//! ----  initialized data       16-byte aligned size
//! ```
//!
//! The uninitialized-data region is not stored; the loader zero-fills it
//! after the image. All fields are big-endian. Offsets inside the image
//! (GOT fixed entries, the GP base) are relative to `header_size`; the two
//! header offset fields are absolute.

/// Size of the fixed header record; the exports table starts here.
pub(crate) const HEADER_RECORD_SIZE: u32 = 16;

pub(crate) const HEADER_SIZE_FIELD: u32 = 0;
pub(crate) const DATA_OFFSET_FIELD: u32 = 4;
pub(crate) const TABLE_OFFSET_FIELD: u32 = 8;
pub(crate) const EXPORT_COUNT_FIELD: u32 = 12;

/// Marker for an absent region in the header, and the "size is zero" state
/// of the uninitialized-data size hint.
pub(crate) const NONE: u32 = 0xFFFFFFFF;

pub(crate) const GOT_END: u32 = 0xFFFFFFFE;
pub(crate) const GP_END: u32 = 0xFFFFFFFD;
pub(crate) const DATA_END: u32 = 0xFFFFFFFF;

/// The three terminators are always present when a table region is emitted.
pub(crate) const TABLE_MIN_SIZE: u32 = 3 * WORD_SIZE;

pub(crate) const WORD_SIZE: u32 = 4;

pub(crate) const REGION_ALIGNMENT: u32 = 16;

/// Fixed GOT entries: the base offsets of the code, read-only-data,
/// initialized-data and uninitialized-data regions, in that order.
pub(crate) const GOT_FIXED_ENTRIES: u32 = 4;
