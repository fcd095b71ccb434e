//! Instruction decoder for the LC-3.
//!
//! Every instruction is a single 16-bit word. Bits 15..12 hold the opcode,
//! the remaining twelve bits are opcode-specific fields:
//!
//! ```text
//!  15  12 11  9 8   6 5 4     0
//! [opcode][ DR ][ SR1][m][ imm5 ]   ADD/AND (m = immediate mode)
//! [opcode][nzp ][  PCoffset9    ]   BR
//! [opcode][ DR ][  PCoffset9    ]   LD/LDI/LEA/ST/STI
//! [opcode][ DR ][BaseR][offset6 ]   LDR/STR
//! [opcode][L][  PCoffset11      ]   JSR (L=1) / JSRR (L=0, BaseR)
//! [opcode][0000][  trapvect8    ]   TRAP
//! ```

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The sixteen opcode slots, named after the top nibble of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Br = 0x0,
    Add = 0x1,
    Ld = 0x2,
    St = 0x3,
    Jsr = 0x4,
    And = 0x5,
    Ldr = 0x6,
    Str = 0x7,
    Rti = 0x8,
    Not = 0x9,
    Ldi = 0xA,
    Sti = 0xB,
    Jmp = 0xC,
    Res = 0xD,
    Lea = 0xE,
    Trap = 0xF,
    /// Not produced by any 16-bit word; kept so the mapping is total.
    Unknown = 0xFF,
}

impl Opcode {
    /// Select the opcode from the top four bits of an instruction word.
    pub fn from_word(word: u16) -> Self {
        match word >> 12 {
            0x0 => Opcode::Br,
            0x1 => Opcode::Add,
            0x2 => Opcode::Ld,
            0x3 => Opcode::St,
            0x4 => Opcode::Jsr,
            0x5 => Opcode::And,
            0x6 => Opcode::Ldr,
            0x7 => Opcode::Str,
            0x8 => Opcode::Rti,
            0x9 => Opcode::Not,
            0xA => Opcode::Ldi,
            0xB => Opcode::Sti,
            0xC => Opcode::Jmp,
            0xD => Opcode::Res,
            0xE => Opcode::Lea,
            0xF => Opcode::Trap,
            _ => Opcode::Unknown,
        }
    }
}

/// Second operand of ADD/AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Register mode: value of SR2
    Register(u16),
    /// Immediate mode: imm5, already sign-extended
    Immediate(u16),
}

/// Where a JSR/JSRR transfers control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsrTarget {
    /// JSR: PC + offset (PCoffset11, sign-extended)
    Offset(u16),
    /// JSRR: value of the base register
    Register(u16),
}

/// Decoded LC-3 instruction.
///
/// One variant per opcode. Register fields are 3-bit indices; offset and
/// immediate fields are already sign-extended to 16 bits, so adding them to
/// an address with wrapping arithmetic gives the two's-complement result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Control Flow ====================

    /// Conditional branch: if (nzp & COND) != 0 then PC := PC + offset
    Br { mask: u16, offset: u16 },

    /// Jump to subroutine: R7 := PC, then PC := target
    Jsr { target: JsrTarget },

    /// Jump: PC := R[base]. RET is JMP R7.
    Jmp { base: u16 },

    /// Return from interrupt (no-op here)
    Rti,

    /// Reserved opcode (no-op)
    Res,

    /// System call
    Trap { vector: u8 },

    // ==================== Operate ====================

    /// DR := SR1 + operand
    Add { dr: u16, sr1: u16, operand: Operand },

    /// DR := SR1 & operand
    And { dr: u16, sr1: u16, operand: Operand },

    /// DR := !SR
    Not { dr: u16, sr: u16 },

    /// DR := PC + offset (no memory access)
    Lea { dr: u16, offset: u16 },

    // ==================== Data Movement ====================

    /// DR := mem[PC + offset]
    Ld { dr: u16, offset: u16 },

    /// mem[PC + offset] := SR
    St { sr: u16, offset: u16 },

    /// DR := mem[mem[PC + offset]]
    Ldi { dr: u16, offset: u16 },

    /// mem[mem[PC + offset]] := SR
    Sti { sr: u16, offset: u16 },

    /// DR := mem[R[base] + offset]
    Ldr { dr: u16, base: u16, offset: u16 },

    /// mem[R[base] + offset] := SR
    Str { sr: u16, base: u16, offset: u16 },
}

/// Widen the low `bits` bits of `value` to 16 bits, preserving the
/// two's-complement sign.
///
/// `bits` must be in `1..=16`.
#[inline]
pub fn sign_extend(value: u16, bits: u32) -> u16 {
    debug_assert!((1..=16).contains(&bits), "field width {} out of range", bits);
    let field = value & low_mask(bits);
    if (field >> (bits - 1)) & 1 != 0 {
        field | !low_mask(bits)
    } else {
        field
    }
}

#[inline]
fn low_mask(bits: u32) -> u16 {
    ((1u32 << bits) - 1) as u16
}

/// Extract `bits` bits of `word` starting at bit `shift`.
#[inline]
fn field(word: u16, shift: u32, bits: u32) -> u16 {
    (word >> shift) & low_mask(bits)
}

#[inline]
fn dr(word: u16) -> u16 {
    field(word, 9, 3)
}

#[inline]
fn sr1(word: u16) -> u16 {
    field(word, 6, 3)
}

#[inline]
fn pc_offset9(word: u16) -> u16 {
    sign_extend(word, 9)
}

fn operand(word: u16) -> Operand {
    if field(word, 5, 1) == 1 {
        Operand::Immediate(sign_extend(word, 5))
    } else {
        Operand::Register(field(word, 0, 3))
    }
}

/// Decode a 16-bit instruction word.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let instruction = match Opcode::from_word(word) {
        Opcode::Br => Instruction::Br { mask: field(word, 9, 3), offset: pc_offset9(word) },
        Opcode::Add => Instruction::Add { dr: dr(word), sr1: sr1(word), operand: operand(word) },
        Opcode::Ld => Instruction::Ld { dr: dr(word), offset: pc_offset9(word) },
        Opcode::St => Instruction::St { sr: dr(word), offset: pc_offset9(word) },
        Opcode::Jsr => {
            let target = if field(word, 11, 1) == 1 {
                JsrTarget::Offset(sign_extend(word, 11))
            } else {
                JsrTarget::Register(sr1(word))
            };
            Instruction::Jsr { target }
        }
        Opcode::And => Instruction::And { dr: dr(word), sr1: sr1(word), operand: operand(word) },
        Opcode::Ldr => Instruction::Ldr { dr: dr(word), base: sr1(word), offset: sign_extend(word, 6) },
        Opcode::Str => Instruction::Str { sr: dr(word), base: sr1(word), offset: sign_extend(word, 6) },
        Opcode::Rti => Instruction::Rti,
        Opcode::Not => Instruction::Not { dr: dr(word), sr: sr1(word) },
        Opcode::Ldi => Instruction::Ldi { dr: dr(word), offset: pc_offset9(word) },
        Opcode::Sti => Instruction::Sti { sr: dr(word), offset: pc_offset9(word) },
        Opcode::Jmp => Instruction::Jmp { base: sr1(word) },
        Opcode::Res => Instruction::Res,
        Opcode::Lea => Instruction::Lea { dr: dr(word), offset: pc_offset9(word) },
        Opcode::Trap => Instruction::Trap { vector: (word & 0xFF) as u8 },
        Opcode::Unknown => return Err(DecodeError::UnknownOpcode(word)),
    };

    Ok(instruction)
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode in word {0:#06x}")]
    UnknownOpcode(u16),
}
