//! Fixed 0x70-byte header at the start of every dex file

use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{DexReader, DexWriter};
use crate::core::item::{Item, ReadContext};
use crate::core::kind::{ItemKind, INDEXED_ORDER};
use crate::core::section::{Section, SectionInfo};
use serde::Serialize;

pub const DEFAULT_MAGIC: [u8; 8] = *b"dex\n035\0";
pub const HEADER_SIZE: u32 = 0x70;
pub const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// Byte range of the stored checksum.
pub const CHECKSUM_RANGE: std::ops::Range<usize> = 8..12;

/// Byte range of the stored signature.
pub const SIGNATURE_RANGE: std::ops::Range<usize> = 12..32;

const SUPPORTED_VERSIONS: [&[u8; 3]; 5] = [b"035", b"036", b"037", b"038", b"039"];

/// Dex header item (always at offset 0)
///
/// Only the fields that cannot be derived from the sections are stored. The
/// index-table counts and offsets are written from the live sections, and
/// `map_offset`, `file_size`, `data_offset` and `data_size` are stamped by
/// placement. `checksum` and `signature` are whatever was last read; the
/// finalize step rewrites them in the emitted bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HeaderItem {
    /// Magic number: "dex\n" + three version digits + NUL
    pub magic: [u8; 8],

    /// Adler-32 of everything after this field
    pub checksum: u32,

    /// SHA-1 of everything after this field
    pub signature: [u8; 20],

    pub file_size: u32,
    pub link_size: u32,
    pub link_offset: u32,
    pub map_offset: u32,
    pub data_size: u32,
    pub data_offset: u32,
}

impl HeaderItem {
    pub fn new() -> Self {
        HeaderItem {
            magic: DEFAULT_MAGIC,
            checksum: 0,
            signature: [0; 20],
            file_size: 0,
            link_size: 0,
            link_offset: 0,
            map_offset: 0,
            data_size: 0,
            data_offset: 0,
        }
    }

    /// Validate the magic number and version digits
    pub fn validate_magic(magic: &[u8; 8]) -> Result<()> {
        if &magic[..4] != b"dex\n" || magic[7] != 0 {
            return Err(DexError::InvalidMagic(*magic));
        }
        let version = &magic[4..7];
        if !SUPPORTED_VERSIONS.iter().any(|v| v.as_slice() == version) {
            return Err(DexError::UnsupportedVersion(
                String::from_utf8_lossy(version).into_owned(),
            ));
        }
        Ok(())
    }

    /// Format version, e.g. "035"
    pub fn version(&self) -> String {
        String::from_utf8_lossy(&self.magic[4..7]).into_owned()
    }
}

impl Default for HeaderItem {
    fn default() -> Self {
        Self::new()
    }
}

impl Item for HeaderItem {
    const KIND: ItemKind = ItemKind::Header;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.header
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.header
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        HEADER_SIZE
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_bytes(&self.magic);
        out.write_u32(self.checksum);
        out.write_bytes(&self.signature);
        out.write_u32(self.file_size);
        out.write_u32(HEADER_SIZE);
        out.write_u32(ENDIAN_CONSTANT);
        out.write_u32(self.link_size);
        out.write_u32(self.link_offset);
        out.write_u32(self.map_offset);

        for kind in INDEXED_ORDER {
            let section = file.section_for_kind(kind);
            out.write_u32(section.len() as u32);
            out.write_u32(section.offset().unwrap_or(0));
        }

        out.write_u32(self.data_size);
        out.write_u32(self.data_offset);
    }

    fn decode(input: &mut DexReader<'_>, _ctx: &mut ReadContext) -> Result<Self> {
        let magic: [u8; 8] = input.read_array()?;
        Self::validate_magic(&magic)?;

        let checksum = input.read_u32()?;
        let signature: [u8; 20] = input.read_array()?;
        let file_size = input.read_u32()?;

        let header_size = input.read_u32()?;
        if header_size != HEADER_SIZE {
            return Err(DexError::InvalidHeaderSize(header_size));
        }

        let endian_tag = input.read_u32()?;
        if endian_tag != ENDIAN_CONSTANT {
            return Err(DexError::InvalidEndianTag(endian_tag));
        }

        let link_size = input.read_u32()?;
        let link_offset = input.read_u32()?;
        let map_offset = input.read_u32()?;

        // Index table sizes and offsets; the map directory is authoritative.
        input.read_bytes(INDEXED_ORDER.len() * 8)?;

        let data_size = input.read_u32()?;
        let data_offset = input.read_u32()?;

        Ok(HeaderItem {
            magic,
            checksum,
            signature,
            file_size,
            link_size,
            link_offset,
            map_offset,
            data_size,
            data_offset,
        })
    }
}
