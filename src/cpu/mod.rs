//! CPU emulation for the LC-3.
//!
//! This module implements the complete machine:
//! - 65536 sixteen-bit memory words with a memory-mapped keyboard
//! - 8 general purpose registers, a PC and a P/Z/N condition code
//! - the 16-opcode instruction set, plus native TRAP services

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trap;

pub use memory::Memory;
pub use registers::{ConditionFlag, Registers};
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Vm, VmError, VmState, VmSnapshot, StepOutcome};
pub use trap::TrapVector;
