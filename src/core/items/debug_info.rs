//! Line-number and local-variable state machine programs

use crate::core::dex_file::DexFile;
use crate::core::error::Result;
use crate::core::io::{sleb128_size, uleb128_size, DexReader, DexWriter};
use crate::core::item::{Handle, Item, ReadContext, NO_INDEX};
use crate::core::items::{StringIdItem, TypeIdItem};
use crate::core::kind::ItemKind;
use crate::core::section::Section;

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;

/// Register operand of a debug opcode
///
/// Some older compilers wrote registers as signed LEB128, which takes one
/// more byte for values with bit 6 of their top group set. `signed` records
/// that form so it can be written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub value: u32,
    pub signed: bool,
}

impl Register {
    pub fn new(value: u32) -> Self {
        Register {
            value,
            signed: false,
        }
    }

    fn size(&self) -> u32 {
        if self.signed {
            sleb128_size(self.value as i32)
        } else {
            uleb128_size(self.value)
        }
    }

    fn write(&self, out: &mut DexWriter) {
        if self.signed {
            out.write_sleb128(self.value as i32);
        } else {
            out.write_uleb128(self.value);
        }
    }

    fn read(input: &mut DexReader<'_>, ctx: &ReadContext) -> Result<Self> {
        let (value, len) = input.read_uleb128_with_len()?;
        let signed = ctx.preserve_signed_registers()
            && len as u32 > uleb128_size(value)
            && len as u32 == sleb128_size(value as i32);
        Ok(Register { value, signed })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DebugOp {
    AdvancePc(u32),
    AdvanceLine(i32),
    StartLocal {
        register: Register,
        name: Option<Handle<StringIdItem>>,
        local_type: Option<Handle<TypeIdItem>>,
    },
    StartLocalExtended {
        register: Register,
        name: Option<Handle<StringIdItem>>,
        local_type: Option<Handle<TypeIdItem>>,
        signature: Option<Handle<StringIdItem>>,
    },
    EndLocal(Register),
    RestartLocal(Register),
    SetPrologueEnd,
    SetEpilogueBegin,
    SetFile(Option<Handle<StringIdItem>>),
    /// Combined line and address advance, opcodes `0x0a..=0xff`.
    Special(u8),
}

/// Debug program of one method. The terminating end-sequence opcode is
/// implied and not stored in `ops`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DebugInfoItem {
    pub line_start: u32,
    pub parameter_names: Vec<Option<Handle<StringIdItem>>>,
    pub ops: Vec<DebugOp>,
}

fn p1_size(index: Option<u32>) -> u32 {
    uleb128_size(index.unwrap_or(NO_INDEX).wrapping_add(1))
}

impl DebugOp {
    fn size(&self, file: &DexFile) -> u32 {
        let string = |h: &Option<Handle<StringIdItem>>| p1_size(h.map(|h| file.index_of(h)));
        let ty = |h: &Option<Handle<TypeIdItem>>| p1_size(h.map(|h| file.index_of(h)));
        1 + match self {
            DebugOp::AdvancePc(diff) => uleb128_size(*diff),
            DebugOp::AdvanceLine(diff) => sleb128_size(*diff),
            DebugOp::StartLocal {
                register,
                name,
                local_type,
            } => register.size() + string(name) + ty(local_type),
            DebugOp::StartLocalExtended {
                register,
                name,
                local_type,
                signature,
            } => register.size() + string(name) + ty(local_type) + string(signature),
            DebugOp::EndLocal(register) | DebugOp::RestartLocal(register) => register.size(),
            DebugOp::SetPrologueEnd | DebugOp::SetEpilogueBegin | DebugOp::Special(_) => 0,
            DebugOp::SetFile(name) => string(name),
        }
    }

    fn write(&self, out: &mut DexWriter, file: &DexFile) {
        let string = |h: &Option<Handle<StringIdItem>>| h.map(|h| file.index_of(h));
        let ty = |h: &Option<Handle<TypeIdItem>>| h.map(|h| file.index_of(h));
        match self {
            DebugOp::AdvancePc(diff) => {
                out.write_u8(DBG_ADVANCE_PC);
                out.write_uleb128(*diff);
            }
            DebugOp::AdvanceLine(diff) => {
                out.write_u8(DBG_ADVANCE_LINE);
                out.write_sleb128(*diff);
            }
            DebugOp::StartLocal {
                register,
                name,
                local_type,
            } => {
                out.write_u8(DBG_START_LOCAL);
                register.write(out);
                out.write_uleb128p1(string(name));
                out.write_uleb128p1(ty(local_type));
            }
            DebugOp::StartLocalExtended {
                register,
                name,
                local_type,
                signature,
            } => {
                out.write_u8(DBG_START_LOCAL_EXTENDED);
                register.write(out);
                out.write_uleb128p1(string(name));
                out.write_uleb128p1(ty(local_type));
                out.write_uleb128p1(string(signature));
            }
            DebugOp::EndLocal(register) => {
                out.write_u8(DBG_END_LOCAL);
                register.write(out);
            }
            DebugOp::RestartLocal(register) => {
                out.write_u8(DBG_RESTART_LOCAL);
                register.write(out);
            }
            DebugOp::SetPrologueEnd => out.write_u8(DBG_SET_PROLOGUE_END),
            DebugOp::SetEpilogueBegin => out.write_u8(DBG_SET_EPILOGUE_BEGIN),
            DebugOp::SetFile(name) => {
                out.write_u8(DBG_SET_FILE);
                out.write_uleb128p1(string(name));
            }
            DebugOp::Special(opcode) => out.write_u8(*opcode),
        }
    }
}

impl Item for DebugInfoItem {
    const KIND: ItemKind = ItemKind::DebugInfo;

    fn section(file: &DexFile) -> &Section<Self> {
        &file.debug_info
    }

    fn section_mut(file: &mut DexFile) -> &mut Section<Self> {
        &mut file.debug_info
    }

    fn size_in_bytes(&self, file: &DexFile) -> u32 {
        let names: u32 = self
            .parameter_names
            .iter()
            .map(|name| p1_size(name.map(|h| file.index_of(h))))
            .sum();
        let ops: u32 = self.ops.iter().map(|op| op.size(file)).sum();
        uleb128_size(self.line_start)
            + uleb128_size(self.parameter_names.len() as u32)
            + names
            + ops
            + 1
    }

    fn write_to(&self, out: &mut DexWriter, file: &DexFile) {
        out.write_uleb128(self.line_start);
        out.write_uleb128(self.parameter_names.len() as u32);
        for name in &self.parameter_names {
            out.write_uleb128p1(name.map(|h| file.index_of(h)));
        }
        for op in &self.ops {
            op.write(out, file);
        }
        out.write_u8(DBG_END_SEQUENCE);
    }

    fn decode(input: &mut DexReader<'_>, ctx: &mut ReadContext) -> Result<Self> {
        let line_start = input.read_uleb128()?;
        let parameter_count = input.read_uleb128()?;
        let mut parameter_names = Vec::with_capacity(parameter_count.min(256) as usize);
        for _ in 0..parameter_count {
            let name = input.read_uleb128p1()?;
            parameter_names.push(name.map(|index| ctx.index(index)));
        }

        let mut ops = Vec::new();
        loop {
            let opcode = input.read_u8()?;
            let op = match opcode {
                DBG_END_SEQUENCE => break,
                DBG_ADVANCE_PC => DebugOp::AdvancePc(input.read_uleb128()?),
                DBG_ADVANCE_LINE => DebugOp::AdvanceLine(input.read_sleb128()?),
                DBG_START_LOCAL => {
                    let register = Register::read(input, ctx)?;
                    let name = input.read_uleb128p1()?.map(|i| ctx.index(i));
                    let local_type = input.read_uleb128p1()?.map(|i| ctx.index(i));
                    DebugOp::StartLocal {
                        register,
                        name,
                        local_type,
                    }
                }
                DBG_START_LOCAL_EXTENDED => {
                    let register = Register::read(input, ctx)?;
                    let name = input.read_uleb128p1()?.map(|i| ctx.index(i));
                    let local_type = input.read_uleb128p1()?.map(|i| ctx.index(i));
                    let signature = input.read_uleb128p1()?.map(|i| ctx.index(i));
                    DebugOp::StartLocalExtended {
                        register,
                        name,
                        local_type,
                        signature,
                    }
                }
                DBG_END_LOCAL => DebugOp::EndLocal(Register::read(input, ctx)?),
                DBG_RESTART_LOCAL => DebugOp::RestartLocal(Register::read(input, ctx)?),
                DBG_SET_PROLOGUE_END => DebugOp::SetPrologueEnd,
                DBG_SET_EPILOGUE_BEGIN => DebugOp::SetEpilogueBegin,
                DBG_SET_FILE => DebugOp::SetFile(input.read_uleb128p1()?.map(|i| ctx.index(i))),
                special => DebugOp::Special(special),
            };
            ops.push(op);
        }

        Ok(DebugInfoItem {
            line_start,
            parameter_names,
            ops,
        })
    }
}
