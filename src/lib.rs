//! # elshi
//!
//! An interpreter for the LC-3, the 16-bit word-addressed teaching
//! architecture: eight registers, a P/Z/N condition code, sixteen opcodes
//! and a memory-mapped keyboard.
//!
//! Load an image with [`Vm::from_bytes`] or [`load_image`], then drive it
//! with [`Vm::step`] or [`Vm::run`]. Console I/O goes through the
//! [`Console`] trait so the machine can be embedded.

pub mod console;
pub mod cpu;
pub mod image;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use console::{Console, StdConsole, BufferedConsole};
pub use cpu::{Vm, VmError, VmState, VmSnapshot, StepOutcome, ConditionFlag, Memory, Registers, Instruction};
pub use image::{ProgramImage, ImageError, load_image};
