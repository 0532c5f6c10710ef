//! Method bodies
//!
//! Instructions are kept as raw code units. Index operands inside them are
//! not rewritten, which holds because index tables are never reordered.

use crate::core::dex_file::DexFile;
use crate::core::error::{DexError, Result};
use crate::core::io::{sleb128_size, uleb128_size, DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext};
use crate::core::items::{DebugInfoItem, TypeIdItem};
use crate::core::kind::ItemKind;
use crate::core::section::Section;

/// A guarded instruction range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TryItem {
    pub start_addr: u32,
    pub insn_count: u16,
    /// Index into [`CodeItem::handlers`].
    pub handler: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CatchHandler {
    /// Exception type and handler address, in match order.
    pub catches: Vec<(Handle<TypeIdItem>, u32)>,
    pub catch_all: Option<u32>,
}

impl CatchHandler {
    fn size_in_bytes(&self, file: &DexFile) -> u32 {
        let pairs: u32 = self
            .catches
            .iter()
            .map(|(ty, addr)| uleb128_size(file.index_of(*ty)) + uleb128_size(*addr))
            .sum();
        sleb128_size(self.encoded_len())
            + pairs
            + self.catch_all.map_or(0, uleb128_size)
    }

    /// Negative when a catch-all follows the typed pairs.
    fn encoded_len(&self) -> i32 {
        let len = self.catches.len() as i32;
        if self.catch_all.is_some() {
            -len
        } else {
            len
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CodeItem {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub debug_info: Option<Handle<DebugInfoItem>>,
    pub insns: Vec<u16>,
    pub tries: Vec<TryItem>,
    pub handlers: Vec<CatchHandler>,
}

impl CodeItem {
    fn needs_padding(&self) -> bool {
        !self.tries.is_empty() && self.insns.len() % 2 == 1
    }

    /// Byte offset of each handler within the encoded handler list.
    fn handler_offsets(&self, file: &DexFile) -> Vec<u32> {
        let mut offset = uleb128_size(self.handlers.len() as u32);
        self.handlers
            .iter()
            .map(|handler| {
                let this = offset;
                offset += handler.size_in_bytes(file);
                this
            })
            .collect()
    }
}

impl Item for CodeItem {
    const KIND: ItemKind = ItemKind::Code;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.code_items
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.code_items
    }

    fn size_in_bytes(&self, file: &DexFile) -> u32 {
        let mut size = 16 + 2 * self.insns.len() as u32;
        if self.needs_padding() {
            size += 2;
        }
        if !self.tries.is_empty() {
            size += 8 * self.tries.len() as u32;
            size += uleb128_size(self.handlers.len() as u32);
            size += self
                .handlers
                .iter()
                .map(|h| h.size_in_bytes(file))
                .sum::<u32>();
        }
        size
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_u16(self.registers_size);
        out.write_u16(self.ins_size);
        out.write_u16(self.outs_size);
        out.write_u16(self.tries.len() as u16);
        out.write_u32(file.optional_offset_of(self.debug_info));
        out.write_u32(self.insns.len() as u32);
        for unit in &self.insns {
            out.write_u16(*unit);
        }
        if self.tries.is_empty() {
            return;
        }
        if self.needs_padding() {
            out.write_u16(0);
        }

        let handler_offsets = self.handler_offsets(file);
        for try_item in &self.tries {
            out.write_u32(try_item.start_addr);
            out.write_u16(try_item.insn_count);
            out.write_u16(handler_offsets[try_item.handler] as u16);
        }

        out.write_uleb128(self.handlers.len() as u32);
        for handler in &self.handlers {
            out.write_sleb128(handler.encoded_len());
            for (ty, addr) in &handler.catches {
                out.write_uleb128(file.index_of(*ty));
                out.write_uleb128(*addr);
            }
            if let Some(addr) = handler.catch_all {
                out.write_uleb128(addr);
            }
        }
    }

    fn assert_encodable(&self) {
        for (index, handler) in self.handlers.iter().enumerate() {
            assert!(
                !handler.catches.is_empty() || handler.catch_all.is_some(),
                "catch handler {index} has neither typed catches nor a catch-all"
            );
        }
        for try_item in &self.tries {
            assert!(
                try_item.handler < self.handlers.len(),
                "try block at {:#x} refers to handler {} of {}",
                try_item.start_addr,
                try_item.handler,
                self.handlers.len()
            );
        }
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let registers_size = input.read_u16()?;
        let ins_size = input.read_u16()?;
        let outs_size = input.read_u16()?;
        let tries_size = input.read_u16()?;
        let debug_info = ctx.optional_offset(input.read_u32()?);
        let insns_size = input.read_u32()?;

        let insns_bytes = input.read_bytes(2 * insns_size as usize)?;
        let insns = insns_bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect::<Vec<_>>();

        let mut code = CodeItem {
            registers_size,
            ins_size,
            outs_size,
            debug_info,
            insns,
            tries: Vec::new(),
            handlers: Vec::new(),
        };
        if tries_size == 0 {
            return Ok(code);
        }
        if insns_size % 2 == 1 {
            input.read_u16()?;
        }

        let mut raw_tries = Vec::with_capacity(tries_size as usize);
        for _ in 0..tries_size {
            let start_addr = input.read_u32()?;
            let insn_count = input.read_u16()?;
            let handler_off = input.read_u16()? as u32;
            raw_tries.push((start_addr, insn_count, handler_off));
        }

        let list_start = input.position();
        let handler_count = input.read_uleb128()?;
        let mut offsets = Vec::with_capacity(handler_count.min(1024) as usize);
        for _ in 0..handler_count {
            offsets.push((input.position() - list_start) as u32);
            let encoded_len = input.read_sleb128()?;
            let mut catches = Vec::with_capacity(encoded_len.unsigned_abs().min(256) as usize);
            for _ in 0..encoded_len.unsigned_abs() {
                let ty = ctx.index(input.read_uleb128()?);
                catches.push((ty, input.read_uleb128()?));
            }
            let catch_all = if encoded_len <= 0 {
                Some(input.read_uleb128()?)
            } else {
                None
            };
            code.handlers.push(CatchHandler { catches, catch_all });
        }

        for (start_addr, insn_count, handler_off) in raw_tries {
            let handler = offsets
                .iter()
                .position(|&o| o == handler_off)
                .ok_or_else(|| {
                    DexError::invalid(
                        list_start,
                        format!("try block points at no handler (offset {handler_off:#x})"),
                    )
                })?;
            code.tries.push(TryItem {
                start_addr,
                insn_count,
                handler,
            });
        }
        Ok(code)
    }
}
