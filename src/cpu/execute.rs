//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! Trap services live in [`crate::cpu::trap`].

use std::io::Read;

use crate::console::{Console, StdConsole};
use crate::cpu::decode::{self, DecodeError, Instruction, JsrTarget, Operand};
use crate::cpu::registers::{ConditionFlag, LINK_REGISTER, REGISTER_COUNT};
use crate::cpu::{Memory, Registers};
use crate::image::{ImageError, ProgramImage};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The run loop keeps fetching while the PC is below this address.
pub const MAX_ADDRESS: u16 = u16::MAX;

/// VM execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmState {
    /// VM is running normally.
    Running,
    /// VM has executed the HALT trap.
    Halted,
    /// VM executed a TRAP with an unrecognized vector.
    Faulted,
}

/// Result of executing one instruction (or of a run that stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// Execution can continue.
    Continuing,
    /// The HALT trap ran. A standalone runner exits with success.
    Halted,
    /// A TRAP named an unknown service. A standalone runner exits with failure.
    Faulted { vector: u8 },
}

/// Serializable view of the architectural state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub pc: u16,
    pub registers: [u16; REGISTER_COUNT],
    pub condition: ConditionFlag,
    pub state: VmState,
    pub steps: u64,
}

/// The LC-3 virtual machine.
///
/// Owns its registers, memory and console exclusively.
pub struct Vm<C: Console = StdConsole> {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: VmState,
    pub(crate) console: C,
    /// Instructions executed since load or reset.
    steps: u64,
    /// Image the VM was built from, kept for `reset`.
    image: ProgramImage,
}

impl<C: Console> Vm<C> {
    /// Create a VM with `image` loaded at its origin and the PC pointing there.
    pub fn new(image: ProgramImage, console: C) -> Self {
        let mut vm = Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: VmState::Running,
            console,
            steps: 0,
            image,
        };
        vm.load();
        vm
    }

    /// Parse a program image from raw bytes and build a VM from it.
    ///
    /// No VM is returned if the image is malformed.
    pub fn from_bytes(bytes: &[u8], console: C) -> Result<Self, ImageError> {
        let image = ProgramImage::from_bytes(bytes)?;
        Ok(Self::new(image, console))
    }

    /// Read a program image from `reader` and build a VM from it.
    pub fn from_reader<R: Read>(reader: R, console: C) -> Result<Self, ImageError> {
        let image = ProgramImage::from_reader(reader)?;
        Ok(Self::new(image, console))
    }

    /// Reset registers, memory and state, then reload the original image.
    pub fn reset(&mut self) {
        self.load();
    }

    fn load(&mut self) {
        self.regs.reset(self.image.origin);
        self.mem.clear();
        self.mem.load_program(self.image.origin, &self.image.words);
        self.state = VmState::Running;
        self.steps = 0;
        log::debug!(
            "loaded {} words at {:#06x}",
            self.image.len(),
            self.image.origin
        );
    }

    /// Execute a single instruction.
    ///
    /// The fetch is an ordinary memory read, so fetching from the keyboard
    /// status address polls the keyboard. The PC is advanced before the
    /// instruction runs; PC-relative offsets are relative to the next word.
    pub fn step(&mut self) -> Result<StepOutcome, VmError> {
        if self.state != VmState::Running {
            return Err(VmError::NotRunning(self.state));
        }

        // Fetch
        let raw = self.read(self.regs.pc);

        // Advance PC before execute (branches and jumps override it)
        self.regs.advance_pc();

        // Decode
        let instr = decode::decode(raw)?;

        // Execute
        let outcome = self.execute(instr);

        self.steps += 1;
        match outcome {
            StepOutcome::Continuing => {}
            StepOutcome::Halted => self.state = VmState::Halted,
            StepOutcome::Faulted { .. } => self.state = VmState::Faulted,
        }

        Ok(outcome)
    }

    /// Run until HALT, an unknown trap, or the PC reaching [`MAX_ADDRESS`].
    ///
    /// The PC wraps at the top of memory, so in practice only a trap stops
    /// the loop. A PC that lands exactly on 0xFFFF ends the run with
    /// [`StepOutcome::Continuing`].
    pub fn run(&mut self) -> Result<StepOutcome, VmError> {
        self.run_until(None)
    }

    /// Run for at most `max_steps` instructions.
    ///
    /// Returns [`StepOutcome::Continuing`] if the limit was reached first.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<StepOutcome, VmError> {
        self.run_until(Some(max_steps))
    }

    fn run_until(&mut self, limit: Option<u64>) -> Result<StepOutcome, VmError> {
        if self.state != VmState::Running {
            return Err(VmError::NotRunning(self.state));
        }

        let start = self.steps;
        while self.regs.pc < MAX_ADDRESS {
            if limit.is_some_and(|max| self.steps - start >= max) {
                return Ok(StepOutcome::Continuing);
            }
            match self.step()? {
                StepOutcome::Continuing => {}
                stopped => return Ok(stopped),
            }
        }

        log::debug!("program counter reached {:#06x}, run loop ends", self.regs.pc);
        Ok(StepOutcome::Continuing)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> StepOutcome {
        match instr {
            // ==================== Control Flow ====================

            Instruction::Br { mask, offset } => {
                if mask & self.regs.condition().bits() != 0 {
                    let target = self.regs.pc_relative(offset);
                    self.regs.jump(target);
                }
            }

            Instruction::Jsr { target } => {
                self.regs.set(LINK_REGISTER, self.regs.pc);
                let addr = match target {
                    JsrTarget::Offset(offset) => self.regs.pc_relative(offset),
                    JsrTarget::Register(base) => self.regs.get(base),
                };
                self.regs.jump(addr);
            }

            Instruction::Jmp { base } => {
                let addr = self.regs.get(base);
                self.regs.jump(addr);
            }

            Instruction::Rti | Instruction::Res => {}

            Instruction::Trap { vector } => return self.trap(vector),

            // ==================== Operate ====================

            Instruction::Add { dr, sr1, operand } => {
                let value = self.regs.get(sr1).wrapping_add(self.operand_value(operand));
                self.write_register(dr, value);
            }

            Instruction::And { dr, sr1, operand } => {
                let value = self.regs.get(sr1) & self.operand_value(operand);
                self.write_register(dr, value);
            }

            Instruction::Not { dr, sr } => {
                let value = !self.regs.get(sr);
                self.write_register(dr, value);
            }

            Instruction::Lea { dr, offset } => {
                let value = self.regs.pc_relative(offset);
                self.write_register(dr, value);
            }

            // ==================== Data Movement ====================

            Instruction::Ld { dr, offset } => {
                let addr = self.regs.pc_relative(offset);
                let value = self.read(addr);
                self.write_register(dr, value);
            }

            Instruction::St { sr, offset } => {
                let addr = self.regs.pc_relative(offset);
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Ldi { dr, offset } => {
                let pointer = self.read(self.regs.pc_relative(offset));
                let value = self.read(pointer);
                self.write_register(dr, value);
            }

            Instruction::Sti { sr, offset } => {
                let addr = self.read(self.regs.pc_relative(offset));
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Ldr { dr, base, offset } => {
                let addr = self.regs.base_offset(base, offset);
                let value = self.read(addr);
                self.write_register(dr, value);
            }

            Instruction::Str { sr, base, offset } => {
                let addr = self.regs.base_offset(base, offset);
                self.mem.write(addr, self.regs.get(sr));
            }
        }

        StepOutcome::Continuing
    }

    fn operand_value(&self, operand: Operand) -> u16 {
        match operand {
            Operand::Register(sr2) => self.regs.get(sr2),
            Operand::Immediate(imm) => imm,
        }
    }

    /// Write a general register and set the condition code from it.
    pub(crate) fn write_register(&mut self, index: u16, value: u16) {
        self.regs.set(index, value);
        self.regs.update_condition(index);
    }

    /// Memory read with device side effects.
    pub(crate) fn read(&mut self, addr: u16) -> u16 {
        self.mem.read(addr, &mut self.console)
    }

    /// Number of instructions executed since load or reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The image this VM was built from.
    pub fn image(&self) -> &ProgramImage {
        &self.image
    }

    /// Capture the architectural state.
    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot {
            pc: self.regs.pc,
            registers: *self.regs.general(),
            condition: self.regs.condition(),
            state: self.state,
            steps: self.steps,
        }
    }

    /// Borrow the console.
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Mutably borrow the console (e.g. to queue input).
    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Take the console back, dropping the VM.
    pub fn into_console(self) -> C {
        self.console
    }

    /// Check if the VM has halted.
    pub fn is_halted(&self) -> bool {
        self.state == VmState::Halted
    }

    /// Check if the VM is running.
    pub fn is_running(&self) -> bool {
        self.state == VmState::Running
    }
}

impl<C: Console> std::fmt::Debug for Vm<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during VM execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("VM not running: {0:?}")]
    NotRunning(VmState),

    #[error("decode error: {0}")]
    DecodeError(#[from] DecodeError),
}
