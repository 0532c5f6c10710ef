//! Encoded values, encoded annotations and the encoded array item
//!
//! Values are written in their minimal width: signed kinds sign-extended,
//! index kinds zero-extended, floating point right-zero-extended.

use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{uleb128_size, DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::{FieldIdItem, MethodIdItem, ProtoIdItem, StringIdItem, TypeIdItem};
use crate::core::kind::ItemKind;
use crate::core::section::Section;

const VALUE_BYTE: u8 = 0x00;
const VALUE_SHORT: u8 = 0x02;
const VALUE_CHAR: u8 = 0x03;
const VALUE_INT: u8 = 0x04;
const VALUE_LONG: u8 = 0x06;
const VALUE_FLOAT: u8 = 0x10;
const VALUE_DOUBLE: u8 = 0x11;
const VALUE_METHOD_TYPE: u8 = 0x15;
const VALUE_METHOD_HANDLE: u8 = 0x16;
const VALUE_STRING: u8 = 0x17;
const VALUE_TYPE: u8 = 0x18;
const VALUE_FIELD: u8 = 0x19;
const VALUE_METHOD: u8 = 0x1a;
const VALUE_ENUM: u8 = 0x1b;
const VALUE_ARRAY: u8 = 0x1c;
const VALUE_ANNOTATION: u8 = 0x1d;
const VALUE_NULL: u8 = 0x1e;
const VALUE_BOOLEAN: u8 = 0x1f;

const MAX_NESTING: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    /// IEEE-754 bits
    Float(u32),
    /// IEEE-754 bits
    Double(u64),
    MethodType(Handle<ProtoIdItem>),
    /// Index into the method handle table, which this crate does not model
    MethodHandle(u32),
    String(Handle<StringIdItem>),
    Type(Handle<TypeIdItem>),
    Field(Handle<FieldIdItem>),
    Method(Handle<MethodIdItem>),
    Enum(Handle<FieldIdItem>),
    Array(Vec<EncodedValue>),
    Annotation(EncodedAnnotation),
    Null,
    Boolean(bool),
}

/// Annotation body: type plus named element values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedAnnotation {
    pub annotation_type: Handle<TypeIdItem>,
    pub elements: Vec<(Handle<StringIdItem>, EncodedValue)>,
}

fn signed_width(value: i64) -> u32 {
    (1..8)
        .find(|&n| {
            let shift = 64 - 8 * n;
            (value << shift) >> shift == value
        })
        .unwrap_or(8)
}

fn unsigned_width(value: u64) -> u32 {
    (1..8).find(|&n| value >> (8 * n) == 0).unwrap_or(8)
}

/// Width of a right-zero-extended value of `total` bytes.
fn right_zero_width(bits: u64, total: u32) -> u32 {
    let trailing = (bits.trailing_zeros() / 8).min(total - 1);
    total - trailing
}

fn write_header(out: &mut DexWriter, value_type: u8, arg: u32) {
    out.write_u8(((arg as u8) << 5) | value_type);
}

fn write_signed(out: &mut DexWriter, value_type: u8, value: i64) {
    let width = signed_width(value);
    write_header(out, value_type, width - 1);
    out.write_bytes(&value.to_le_bytes()[..width as usize]);
}

fn write_unsigned(out: &mut DexWriter, value_type: u8, value: u64) {
    let width = unsigned_width(value);
    write_header(out, value_type, width - 1);
    out.write_bytes(&value.to_le_bytes()[..width as usize]);
}

fn write_right_zero(out: &mut DexWriter, value_type: u8, bits: u64, total: u32) {
    let width = right_zero_width(bits, total);
    write_header(out, value_type, width - 1);
    let shifted = bits >> (8 * (total - width));
    out.write_bytes(&shifted.to_le_bytes()[..width as usize]);
}

fn read_raw(input: &mut DexReader<'_>, width: u32) -> Result<u64> {
    let bytes = input.read_bytes(width as usize)?;
    Ok(bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

fn read_signed(input: &mut DexReader<'_>, width: u32) -> Result<i64> {
    let raw = read_raw(input, width)?;
    let shift = 64 - 8 * width;
    Ok(((raw << shift) as i64) >> shift)
}

impl EncodedValue {
    pub fn float(value: f32) -> Self {
        EncodedValue::Float(value.to_bits())
    }

    pub fn double(value: f64) -> Self {
        EncodedValue::Double(value.to_bits())
    }

    pub fn size_in_bytes(&self, file: &DexFile) -> u32 {
        1 + match self {
            EncodedValue::Byte(_) => 1,
            EncodedValue::Short(v) => signed_width(*v as i64),
            EncodedValue::Char(v) => unsigned_width(*v as u64),
            EncodedValue::Int(v) => signed_width(*v as i64),
            EncodedValue::Long(v) => signed_width(*v),
            EncodedValue::Float(bits) => right_zero_width(*bits as u64, 4),
            EncodedValue::Double(bits) => right_zero_width(*bits, 8),
            EncodedValue::MethodType(h) => unsigned_width(file.index_of(*h) as u64),
            EncodedValue::MethodHandle(index) => unsigned_width(*index as u64),
            EncodedValue::String(h) => unsigned_width(file.index_of(*h) as u64),
            EncodedValue::Type(h) => unsigned_width(file.index_of(*h) as u64),
            EncodedValue::Field(h) | EncodedValue::Enum(h) => {
                unsigned_width(file.index_of(*h) as u64)
            }
            EncodedValue::Method(h) => unsigned_width(file.index_of(*h) as u64),
            EncodedValue::Array(values) => array_size(values, file),
            EncodedValue::Annotation(annotation) => annotation.size_in_bytes(file),
            EncodedValue::Null | EncodedValue::Boolean(_) => 0,
        }
    }

    pub fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        match self {
            EncodedValue::Byte(v) => {
                write_header(out, VALUE_BYTE, 0);
                out.write_u8(*v as u8);
            }
            EncodedValue::Short(v) => write_signed(out, VALUE_SHORT, *v as i64),
            EncodedValue::Char(v) => write_unsigned(out, VALUE_CHAR, *v as u64),
            EncodedValue::Int(v) => write_signed(out, VALUE_INT, *v as i64),
            EncodedValue::Long(v) => write_signed(out, VALUE_LONG, *v),
            EncodedValue::Float(bits) => write_right_zero(out, VALUE_FLOAT, *bits as u64, 4),
            EncodedValue::Double(bits) => write_right_zero(out, VALUE_DOUBLE, *bits, 8),
            EncodedValue::MethodType(h) => {
                write_unsigned(out, VALUE_METHOD_TYPE, file.index_of(*h) as u64)
            }
            EncodedValue::MethodHandle(index) => {
                write_unsigned(out, VALUE_METHOD_HANDLE, *index as u64)
            }
            EncodedValue::String(h) => write_unsigned(out, VALUE_STRING, file.index_of(*h) as u64),
            EncodedValue::Type(h) => write_unsigned(out, VALUE_TYPE, file.index_of(*h) as u64),
            EncodedValue::Field(h) => write_unsigned(out, VALUE_FIELD, file.index_of(*h) as u64),
            EncodedValue::Method(h) => write_unsigned(out, VALUE_METHOD, file.index_of(*h) as u64),
            EncodedValue::Enum(h) => write_unsigned(out, VALUE_ENUM, file.index_of(*h) as u64),
            EncodedValue::Array(values) => {
                write_header(out, VALUE_ARRAY, 0);
                write_array(values, out, file);
            }
            EncodedValue::Annotation(annotation) => {
                write_header(out, VALUE_ANNOTATION, 0);
                annotation.write_to(out, file);
            }
            EncodedValue::Null => write_header(out, VALUE_NULL, 0),
            EncodedValue::Boolean(v) => write_header(out, VALUE_BOOLEAN, *v as u32),
        }
    }

    pub fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Self::decode_nested(input, ctx, 0)
    }

    fn decode_nested(input: &mut DexReader<'_>, ctx: &mut ReadContext, depth: u32) -> Result<Self> {
        let start = input.position();
        if depth > MAX_NESTING {
            return Err(DexError::invalid(start, "encoded value nested too deeply"));
        }

        let header = input.read_u8()?;
        let value_type = header & 0x1f;
        let arg = (header >> 5) as u32;
        let width = arg + 1;

        let check_width = |max: u32| {
            if width > max {
                Err(DexError::invalid(
                    start,
                    format!("value type {value_type:#04x} with width {width}"),
                ))
            } else {
                Ok(())
            }
        };

        let value = match value_type {
            VALUE_BYTE => {
                check_width(1)?;
                EncodedValue::Byte(read_signed(input, 1)? as i8)
            }
            VALUE_SHORT => {
                check_width(2)?;
                EncodedValue::Short(read_signed(input, width)? as i16)
            }
            VALUE_CHAR => {
                check_width(2)?;
                EncodedValue::Char(read_raw(input, width)? as u16)
            }
            VALUE_INT => {
                check_width(4)?;
                EncodedValue::Int(read_signed(input, width)? as i32)
            }
            VALUE_LONG => EncodedValue::Long(read_signed(input, width)?),
            VALUE_FLOAT => {
                check_width(4)?;
                let raw = read_raw(input, width)?;
                EncodedValue::Float((raw << (8 * (4 - width))) as u32)
            }
            VALUE_DOUBLE => {
                let raw = read_raw(input, width)?;
                EncodedValue::Double(raw << (8 * (8 - width)))
            }
            VALUE_METHOD_TYPE | VALUE_METHOD_HANDLE | VALUE_STRING | VALUE_TYPE | VALUE_FIELD
            | VALUE_METHOD | VALUE_ENUM => {
                check_width(4)?;
                let index = read_raw(input, width)? as u32;
                match value_type {
                    VALUE_METHOD_TYPE => EncodedValue::MethodType(ctx.index(index)),
                    VALUE_METHOD_HANDLE => EncodedValue::MethodHandle(index),
                    VALUE_STRING => EncodedValue::String(ctx.index(index)),
                    VALUE_TYPE => EncodedValue::Type(ctx.index(index)),
                    VALUE_FIELD => EncodedValue::Field(ctx.index(index)),
                    VALUE_METHOD => EncodedValue::Method(ctx.index(index)),
                    _ => EncodedValue::Enum(ctx.index(index)),
                }
            }
            VALUE_ARRAY => EncodedValue::Array(read_array(input, ctx, depth + 1)?),
            VALUE_ANNOTATION => EncodedValue::Annotation(EncodedAnnotation::decode_nested(
                input,
                ctx,
                depth + 1,
            )?),
            VALUE_NULL => EncodedValue::Null,
            VALUE_BOOLEAN => {
                check_width(2)?;
                EncodedValue::Boolean(arg == 1)
            }
            other => {
                return Err(DexError::invalid(
                    start,
                    format!("unknown value type {other:#04x}"),
                ))
            }
        };
        Ok(value)
    }
}

fn array_size(values: &[EncodedValue], file: &DexFile) -> u32 {
    uleb128_size(values.len() as u32) + values.iter().map(|v| v.size_in_bytes(file)).sum::<u32>()
}

fn write_array(values: &[EncodedValue], out: &mut DexWriter, file: &DexFile) {
    out.write_uleb128(values.len() as u32);
    for value in values {
        value.write_to(out, file);
    }
}

fn read_array(
    input: &mut DexReader<'_>,
    ctx: &mut ReadContext,
    depth: u32,
) -> Result<Vec<EncodedValue>> {
    let count = input.read_uleb128()?;
    let mut values = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        values.push(EncodedValue::decode_nested(input, ctx, depth)?);
    }
    Ok(values)
}

impl EncodedAnnotation {
    pub fn size_in_bytes(&self, file: &DexFile) -> u32 {
        let elements: u32 = self
            .elements
            .iter()
            .map(|(name, value)| uleb128_size(file.index_of(*name)) + value.size_in_bytes(file))
            .sum();
        uleb128_size(file.index_of(self.annotation_type))
            + uleb128_size(self.elements.len() as u32)
            + elements
    }

    pub fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_uleb128(file.index_of(self.annotation_type));
        out.write_uleb128(self.elements.len() as u32);
        for (name, value) in &self.elements {
            out.write_uleb128(file.index_of(*name));
            value.write_to(out, file);
        }
    }

    pub fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Self::decode_nested(input, ctx, 0)
    }

    fn decode_nested(input: &mut DexReader<'_>, ctx: &mut ReadContext, depth: u32) -> Result<Self> {
        let annotation_type = ctx.index(input.read_uleb128()?);
        let count = input.read_uleb128()?;
        let mut elements = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let name = ctx.index(input.read_uleb128()?);
            let value = EncodedValue::decode_nested(input, ctx, depth)?;
            elements.push((name, value));
        }
        Ok(EncodedAnnotation {
            annotation_type,
            elements,
        })
    }
}

/// Static field initial values of a class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedArrayItem {
    pub values: Vec<EncodedValue>,
}

impl EncodedArrayItem {
    pub fn new(values: Vec<EncodedValue>) -> Self {
        EncodedArrayItem { values }
    }
}

impl Item for EncodedArrayItem {
    const KIND: ItemKind = ItemKind::EncodedArray;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.encoded_arrays
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.encoded_arrays
    }

    fn size_in_bytes(&self, file: &DexFile) -> u32 {
        array_size(&self.values, file)
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        write_array(&self.values, out, file);
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        Ok(EncodedArrayItem {
            values: read_array(input, ctx, 0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(signed_width(0), 1);
        assert_eq!(signed_width(127), 1);
        assert_eq!(signed_width(128), 2);
        assert_eq!(signed_width(-128), 1);
        assert_eq!(signed_width(-129), 2);
        assert_eq!(signed_width(i64::MIN), 8);
        assert_eq!(unsigned_width(0), 1);
        assert_eq!(unsigned_width(0xff), 1);
        assert_eq!(unsigned_width(0x100), 2);
        assert_eq!(right_zero_width(0, 4), 1);
        assert_eq!(right_zero_width(1.0f32.to_bits() as u64, 4), 2);
        assert_eq!(right_zero_width(1.0f64.to_bits(), 8), 2);
    }

    fn decode_bytes(bytes: &[u8]) -> Result<EncodedValue> {
        let mut ctx = ReadContext::new(true);
        EncodedValue::decode(&mut DexReader::new(bytes), &mut ctx)
    }

    #[test]
    fn test_decode_primitives() {
        assert_eq!(decode_bytes(&[0x00, 0xff]).unwrap(), EncodedValue::Byte(-1));
        assert_eq!(
            decode_bytes(&[0x24, 0x00, 0x01]).unwrap(),
            EncodedValue::Int(256)
        );
        assert_eq!(decode_bytes(&[0x04, 0x80]).unwrap(), EncodedValue::Int(-128));
        assert_eq!(
            decode_bytes(&[0x30, 0x80, 0x3f]).unwrap(),
            EncodedValue::float(1.0)
        );
        assert_eq!(decode_bytes(&[0x3f]).unwrap(), EncodedValue::Boolean(true));
        assert_eq!(decode_bytes(&[0x1e]).unwrap(), EncodedValue::Null);
    }

    #[test]
    fn test_decode_rejects_bad_width() {
        // int with an 8-byte width
        assert!(matches!(
            decode_bytes(&[0xe4, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(DexError::InvalidValue { .. })
        ));
        assert!(matches!(
            decode_bytes(&[0x01]),
            Err(DexError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_nested_array() {
        let value = decode_bytes(&[0x1c, 0x02, 0x04, 0x05, 0x1c, 0x00]).unwrap();
        assert_eq!(
            value,
            EncodedValue::Array(vec![EncodedValue::Int(5), EncodedValue::Array(vec![])])
        );
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut bytes = Vec::new();
        for _ in 0..200 {
            bytes.extend_from_slice(&[0x1c, 0x01]);
        }
        bytes.push(0x1e);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(DexError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_index_values_record_references() {
        let mut ctx = ReadContext::new(true);
        let value = EncodedValue::decode(&mut DexReader::new(&[0x37, 0x09, 0x01]), &mut ctx).unwrap();
        assert_eq!(value, EncodedValue::String(Handle::new(0x109)));
        assert!(ctx.check_indices(ItemKind::StringId, 0x109).is_err());
    }
}
