//! LC-3 register file.
//!
//! The machine has:
//! - R0..R7: eight 16-bit general purpose registers (R7 doubles as the link register)
//! - PC: 16-bit program counter
//! - COND: condition code, exactly one of P/Z/N

use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the link register written by JSR/JSRR.
pub const LINK_REGISTER: u16 = 7;

/// Program counter value before any image has been loaded.
pub const DEFAULT_ORIGIN: u16 = 0x3000;

/// The condition code.
///
/// Discriminants are the bit positions used by the n/z/p mask of a
/// BR instruction, so `mask & flag as u16` tests a branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ConditionFlag {
    /// Last written value was greater than zero (p bit)
    Positive = 0b001,
    /// Last written value was zero (z bit)
    Zero = 0b010,
    /// Last written value had bit 15 set (n bit)
    Negative = 0b100,
}

impl ConditionFlag {
    /// Classify a word by its two's-complement sign.
    pub fn from_value(value: u16) -> Self {
        if value == 0 {
            ConditionFlag::Zero
        } else if value >> 15 != 0 {
            ConditionFlag::Negative
        } else {
            ConditionFlag::Positive
        }
    }

    /// The flag as a 3-bit n/z/p mask.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }
}

impl Default for ConditionFlag {
    fn default() -> Self {
        ConditionFlag::Zero
    }
}

/// The LC-3 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0..R7
    gpr: [u16; REGISTER_COUNT],

    /// PC: address of the next instruction to fetch
    pub pc: u16,

    cond: ConditionFlag,
}

impl Registers {
    /// Create a register file with zeroed registers, PC at the default
    /// origin and the condition code set to Zero.
    pub fn new() -> Self {
        Self {
            gpr: [0; REGISTER_COUNT],
            pc: DEFAULT_ORIGIN,
            cond: ConditionFlag::Zero,
        }
    }

    /// Reset every register, placing the PC at `origin`.
    pub fn reset(&mut self, origin: u16) {
        *self = Self::new();
        self.pc = origin;
    }

    /// Read a general purpose register. Only the low 3 bits of `index` are used.
    #[inline]
    pub fn get(&self, index: u16) -> u16 {
        self.gpr[Self::slot(index)]
    }

    /// Write a general purpose register. Only the low 3 bits of `index` are used.
    ///
    /// This does not touch the condition code; see [`Registers::update_condition`].
    #[inline]
    pub fn set(&mut self, index: u16, value: u16) {
        self.gpr[Self::slot(index)] = value;
    }

    /// Current condition code.
    #[inline]
    pub fn condition(&self) -> ConditionFlag {
        self.cond
    }

    /// Recompute the condition code from the current contents of register `index`.
    pub fn update_condition(&mut self, index: u16) {
        self.cond = ConditionFlag::from_value(self.get(index));
    }

    /// All eight general purpose registers, R0 first.
    pub fn general(&self) -> &[u16; REGISTER_COUNT] {
        &self.gpr
    }

    /// Advance the program counter by one word, wrapping at the top of memory.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr;
    }

    /// PC-relative effective address: PC + offset, wrapping.
    ///
    /// The PC has already been advanced past the current instruction.
    #[inline]
    pub fn pc_relative(&self, offset: u16) -> u16 {
        self.pc.wrapping_add(offset)
    }

    /// Base-plus-offset effective address: R[base] + offset, wrapping.
    #[inline]
    pub fn base_offset(&self, base: u16, offset: u16) -> u16 {
        self.get(base).wrapping_add(offset)
    }

    #[inline]
    fn slot(index: u16) -> usize {
        usize::from(index & 0x7)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
