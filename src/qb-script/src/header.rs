//! Generic QB item header
//!
//! The container owns this header; script records only read and write it
//! around their own fields.

use std::fmt;
use std::io::{Read, Write};

use crate::config::Endian;
use crate::key::QbKey;
use crate::Result;

/// Header size in bytes
pub const HEADER_SIZE: usize = 12;

/// QB item type tags
///
/// Section tags are `0x0020_xx00` where `xx` is the value type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    SectionInteger,
    SectionFloat,
    SectionString,
    SectionStringW,
    SectionFloatsX2,
    SectionFloatsX3,
    SectionStruct,
    SectionArray,
    SectionQbKey,
    SectionScript,
    SectionQbKeyString,
    SectionStringPointer,
    SectionQbKeyStringQs,
    Other(u32),
}

impl ItemType {
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0x0020_0100 => ItemType::SectionInteger,
            0x0020_0200 => ItemType::SectionFloat,
            0x0020_0300 => ItemType::SectionString,
            0x0020_0400 => ItemType::SectionStringW,
            0x0020_0500 => ItemType::SectionFloatsX2,
            0x0020_0600 => ItemType::SectionFloatsX3,
            0x0020_0a00 => ItemType::SectionStruct,
            0x0020_0c00 => ItemType::SectionArray,
            0x0020_0d00 => ItemType::SectionQbKey,
            0x0020_0e00 => ItemType::SectionScript,
            0x0020_1a00 => ItemType::SectionQbKeyString,
            0x0020_1b00 => ItemType::SectionStringPointer,
            0x0020_1c00 => ItemType::SectionQbKeyStringQs,
            other => ItemType::Other(other),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            ItemType::SectionInteger => 0x0020_0100,
            ItemType::SectionFloat => 0x0020_0200,
            ItemType::SectionString => 0x0020_0300,
            ItemType::SectionStringW => 0x0020_0400,
            ItemType::SectionFloatsX2 => 0x0020_0500,
            ItemType::SectionFloatsX3 => 0x0020_0600,
            ItemType::SectionStruct => 0x0020_0a00,
            ItemType::SectionArray => 0x0020_0c00,
            ItemType::SectionQbKey => 0x0020_0d00,
            ItemType::SectionScript => 0x0020_0e00,
            ItemType::SectionQbKeyString => 0x0020_1a00,
            ItemType::SectionStringPointer => 0x0020_1b00,
            ItemType::SectionQbKeyStringQs => 0x0020_1c00,
            ItemType::Other(tag) => tag,
        }
    }

    #[inline]
    pub fn is_script(self) -> bool {
        self == ItemType::SectionScript
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Other(tag) => write!(f, "0x{:08X}", tag),
            named => write!(f, "{:?}", named),
        }
    }
}

/// Generic header preceding every item's own fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    pub item_type: ItemType,
    /// Name of the item, not interpreted here
    pub item_key: QbKey,
    /// Checksum of the owning file's name
    pub file_key: QbKey,
}

impl ItemHeader {
    pub fn new(item_type: ItemType) -> Self {
        Self {
            item_type,
            item_key: QbKey::default(),
            file_key: QbKey::default(),
        }
    }

    pub fn read<R: Read>(reader: &mut R, endian: Endian) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        Ok(Self {
            item_type: ItemType::from_tag(endian.read_u32(&buf[0..4])),
            item_key: QbKey(endian.read_u32(&buf[4..8])),
            file_key: QbKey(endian.read_u32(&buf[8..12])),
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W, endian: Endian) -> Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        endian.write_u32(&mut buf[0..4], self.item_type.tag());
        endian.write_u32(&mut buf[4..8], self.item_key.crc());
        endian.write_u32(&mut buf[8..12], self.file_key.crc());
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Serialized length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        HEADER_SIZE
    }
}
