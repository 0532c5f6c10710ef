use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{uleb128_size, DexReader, DexWriter};
use crate::core::item::{Item, ReadContext};
use crate::core::kind::ItemKind;
use crate::core::section::Section;
use std::cmp::Ordering;
use std::fmt;

/// String contents in Modified UTF-8
///
/// Stored as read so that odd but valid encodings survive a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringDataItem {
    /// Length in UTF-16 code units
    pub utf16_len: u32,

    /// MUTF-8 bytes, without the trailing NUL
    pub data: Vec<u8>,
}

impl StringDataItem {
    pub fn new(value: &str) -> Self {
        let mut data = Vec::with_capacity(value.len());
        let mut utf16_len = 0;
        for unit in value.encode_utf16() {
            match unit {
                0x0001..=0x007f => data.push(unit as u8),
                0x0000 | 0x0080..=0x07ff => {
                    data.push(0xc0 | (unit >> 6) as u8);
                    data.push(0x80 | (unit & 0x3f) as u8);
                }
                _ => {
                    data.push(0xe0 | (unit >> 12) as u8);
                    data.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                    data.push(0x80 | (unit & 0x3f) as u8);
                }
            }
            utf16_len += 1;
        }
        StringDataItem { utf16_len, data }
    }

    /// Decode to UTF-16 code units. Malformed sequences decode byte-wise.
    pub fn utf16_units(&self) -> Vec<u16> {
        let bytes = &self.data;
        let mut units = Vec::with_capacity(self.data.len());
        let mut i = 0;
        while i < bytes.len() {
            let b0 = bytes[i] as u16;
            if b0 & 0xe0 == 0xc0 && i + 1 < bytes.len() {
                units.push(((b0 & 0x1f) << 6) | (bytes[i + 1] as u16 & 0x3f));
                i += 2;
            } else if b0 & 0xf0 == 0xe0 && i + 2 < bytes.len() {
                units.push(
                    ((b0 & 0x0f) << 12)
                        | ((bytes[i + 1] as u16 & 0x3f) << 6)
                        | (bytes[i + 2] as u16 & 0x3f),
                );
                i += 3;
            } else {
                units.push(b0);
                i += 1;
            }
        }
        units
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.utf16_units())
    }
}

impl fmt::Display for StringDataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Item for StringDataItem {
    const KIND: ItemKind = ItemKind::StringData;
    const SORTABLE: bool = true;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.string_data
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.string_data
    }

    fn size_in_bytes(&self, _file: &DexFile) -> u32 {
        uleb128_size(self.utf16_len) + self.data.len() as u32 + 1
    }

    fn write_to(&self, out: &mut DexWriter, _file: &DexFile) {
        out.write_uleb128(self.utf16_len);
        out.write_bytes(&self.data);
        out.write_u8(0);
    }

    fn decode(input: &mut DexReader<'_>, _ctx: &mut ReadContext) -> Result<Self> {
        let start = input.position();
        let utf16_len = input.read_uleb128()?;
        let mut data = Vec::with_capacity(utf16_len.min(1024) as usize);
        loop {
            match input.read_u8() {
                Ok(0) => break,
                Ok(byte) => data.push(byte),
                Err(_) => return Err(DexError::invalid(start, "unterminated string data")),
            }
        }
        let item = StringDataItem { utf16_len, data };
        let units = item.utf16_units().len();
        if units != utf16_len as usize {
            return Err(DexError::invalid(
                start,
                format!("string declares {utf16_len} utf-16 units but holds {units}"),
            ));
        }
        Ok(item)
    }

    fn canonical_cmp(&self, other: &Self, _file: &DexFile) -> Ordering {
        self.utf16_units().cmp(&other.utf16_units())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_encoding() {
        let item = StringDataItem::new("Lfoo;");
        assert_eq!(item.data, b"Lfoo;");
        assert_eq!(item.utf16_len, 5);
        assert_eq!(item.to_string(), "Lfoo;");
    }

    #[test]
    fn test_nul_uses_two_byte_form() {
        let item = StringDataItem::new("a\0b");
        assert_eq!(item.data, [b'a', 0xc0, 0x80, b'b']);
        assert_eq!(item.to_string_lossy(), "a\0b");
    }

    #[test]
    fn test_supplementary_characters_are_surrogate_pairs() {
        let item = StringDataItem::new("\u{1F600}");
        assert_eq!(item.utf16_len, 2);
        assert_eq!(item.data.len(), 6);
        assert_eq!(item.to_string_lossy(), "\u{1F600}");
    }

    #[test]
    fn test_decode_stops_at_nul() {
        let bytes = [3, b'a', b'b', b'c', 0, 0xff];
        let mut input = DexReader::new(&bytes);
        let mut ctx = ReadContext::new(true);
        let item = StringDataItem::decode(&mut input, &mut ctx).unwrap();
        assert_eq!(item, StringDataItem::new("abc"));
        assert_eq!(input.position(), 5);
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0x0f, b'a', 0];
        let mut ctx = ReadContext::new(true);
        assert!(matches!(
            StringDataItem::decode(&mut DexReader::new(&bytes), &mut ctx),
            Err(DexError::InvalidValue { offset: 0, .. })
        ));

        let short = [2, b'a', 0];
        assert!(StringDataItem::decode(&mut DexReader::new(&short), &mut ctx).is_err());
    }

    #[test]
    fn test_unterminated() {
        let bytes = [3, b'a', b'b'];
        let mut ctx = ReadContext::new(true);
        assert!(matches!(
            StringDataItem::decode(&mut DexReader::new(&bytes), &mut ctx),
            Err(DexError::InvalidValue { .. })
        ));
    }
}
