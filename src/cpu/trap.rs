//! TRAP service routines.
//!
//! The low byte of a TRAP instruction selects a console service. These are
//! implemented natively instead of as LC-3 code in a trap vector table.

use crate::console::Console;
use crate::cpu::execute::{StepOutcome, Vm};

/// Message written by the HALT service.
pub const HALT_MESSAGE: &str = "HALTing execution\n";

/// Known trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrapVector {
    /// Read a character into R0, no echo
    Getc = 0x20,
    /// Write the character in R0, then a newline
    Out = 0x21,
    /// Write a NUL-terminated string of one character per word
    Puts = 0x22,
    /// Read a character into R0 and echo it
    In = 0x23,
    /// Write a NUL-terminated string of two characters per word
    Putsp = 0x24,
    /// Stop the machine
    Halt = 0x25,
}

impl TrapVector {
    /// Look up a vector, `None` if no service is defined for it.
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            0x20 => Some(TrapVector::Getc),
            0x21 => Some(TrapVector::Out),
            0x22 => Some(TrapVector::Puts),
            0x23 => Some(TrapVector::In),
            0x24 => Some(TrapVector::Putsp),
            0x25 => Some(TrapVector::Halt),
            _ => None,
        }
    }
}

/// Render a memory word as a character. Surrogates become U+FFFD.
fn word_char(word: u16) -> char {
    char::from_u32(u32::from(word)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

impl<C: Console> Vm<C> {
    /// Run the service named by `vector`.
    pub(crate) fn trap(&mut self, vector: u8) -> StepOutcome {
        let Some(service) = TrapVector::from_u8(vector) else {
            log::error!(
                "unknown trap vector {:#04x} at {:#06x}",
                vector,
                self.regs.pc.wrapping_sub(1)
            );
            return StepOutcome::Faulted { vector };
        };

        match service {
            // GETC and IN leave the condition code alone
            TrapVector::Getc => {
                let c = self.read_char();
                self.regs.set(0, c);
            }

            TrapVector::Out => {
                // A newline follows the character, unlike the stock LC-3 OUT
                let text = format!("{}\n", word_char(self.regs.get(0)));
                self.emit(&text);
            }

            TrapVector::Puts => {
                let mut addr = self.regs.get(0);
                let mut text = String::new();
                loop {
                    let word = self.read(addr);
                    if word == 0 {
                        break;
                    }
                    text.push(word_char(word));
                    addr = addr.wrapping_add(1);
                }
                self.emit(&text);
            }

            TrapVector::In => {
                let c = self.read_char();
                self.regs.set(0, c);
                let text = format!("{}\n", char::from(c as u8));
                self.emit(&text);
            }

            TrapVector::Putsp => {
                let mut addr = self.regs.get(0);
                let mut text = String::new();
                loop {
                    let word = self.read(addr);
                    if word == 0 {
                        break;
                    }
                    let [low, high] = word.to_le_bytes();
                    text.push(char::from(low));
                    if high != 0 {
                        text.push(char::from(high));
                    }
                    addr = addr.wrapping_add(1);
                }
                self.emit(&text);
            }

            TrapVector::Halt => {
                self.emit(HALT_MESSAGE);
                log::info!("halted after {} steps", self.steps() + 1);
                return StepOutcome::Halted;
            }
        }

        StepOutcome::Continuing
    }

    /// Block for an input line and return its first byte, 0 if it is empty.
    fn read_char(&mut self) -> u16 {
        match self.console.read_line() {
            Ok(line) => line.first().copied().map_or(0, u16::from),
            Err(e) => {
                log::warn!("console read failed, treating as no input: {}", e);
                0
            }
        }
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.console.write_str(text) {
            log::warn!("console write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferedConsole;
    use crate::cpu::registers::ConditionFlag;
    use crate::cpu::memory::{KBSR, KBSR_READY};
    use crate::cpu::execute::VmState;
    use crate::image::ProgramImage;

    fn trap_vm(vector: u8, input: &[&str]) -> Vm<BufferedConsole> {
        let image = ProgramImage::new(0x3000, vec![0xF000 | u16::from(vector)]);
        Vm::new(image, BufferedConsole::with_input(input.iter().copied()))
    }

    #[test]
    fn test_vector_lookup() {
        for v in 0x20..=0x25u8 {
            assert_eq!(TrapVector::from_u8(v).map(|t| t as u8), Some(v));
        }
        assert_eq!(TrapVector::from_u8(0x1F), None);
        assert_eq!(TrapVector::from_u8(0x26), None);
    }

    #[test]
    fn test_getc_reads_without_echo() {
        let mut vm = trap_vm(0x20, &["abc"]);
        vm.step().unwrap();

        assert_eq!(vm.regs.get(0), u16::from(b'a'));
        assert_eq!(vm.console().output(), "");
    }

    #[test]
    fn test_getc_keeps_condition() {
        let mut vm = trap_vm(0x20, &["a"]);
        vm.regs.set(1, 0xFFFF);
        vm.regs.update_condition(1);
        vm.step().unwrap();

        assert_eq!(vm.regs.get(0), u16::from(b'a'));
        assert_eq!(vm.regs.condition(), ConditionFlag::Negative);
    }

    #[test]
    fn test_getc_empty_line_is_zero() {
        let mut vm = trap_vm(0x20, &[""]);
        vm.regs.set(0, 9);
        vm.regs.update_condition(0);
        vm.step().unwrap();

        assert_eq!(vm.regs.get(0), 0);
        assert_eq!(vm.regs.condition(), ConditionFlag::Positive);
    }

    #[test]
    fn test_getc_takes_first_byte_of_non_utf8_line() {
        let image = ProgramImage::new(0x3000, vec![0xF020]);
        let console = BufferedConsole::with_input([vec![0xE9u8, 0xFF]]);
        let mut vm = Vm::new(image, console);
        vm.step().unwrap();

        assert_eq!(vm.regs.get(0), 0x00E9);
    }

    #[test]
    fn test_out_appends_newline() {
        let mut vm = trap_vm(0x21, &[]);
        vm.regs.set(0, u16::from(b'Z'));
        vm.step().unwrap();

        assert_eq!(vm.console().output(), "Z\n");
    }

    #[test]
    fn test_puts_prints_string() {
        let mut vm = trap_vm(0x22, &[]);
        vm.mem.load_program(0x4000, &[0x0048, 0x0049, 0x0000]);
        vm.mem.write(0x4003, 0x0041);
        vm.regs.set(0, 0x4000);

        let outcome = vm.step().unwrap();

        assert_eq!(outcome, StepOutcome::Continuing);
        assert_eq!(vm.console().output(), "HI");
    }

    #[test]
    fn test_puts_stops_at_nul() {
        // NUL sits right below KBSR; reading one word further would poll
        let mut vm = trap_vm(0x22, &["unused"]);
        vm.mem.load_program(KBSR - 3, &[0x0048, 0x0049, 0x0000]);
        vm.regs.set(0, KBSR - 3);
        vm.step().unwrap();

        assert_eq!(vm.console().output(), "HI");
        assert_eq!(vm.console().pending_input(), 1);
    }

    #[test]
    fn test_puts_reads_through_device_registers() {
        // String placed so that its terminator check hits KBSR
        let mut vm = trap_vm(0x22, &[""]);
        vm.mem.write(KBSR - 1, u16::from(b'!'));
        vm.mem.write(KBSR, KBSR_READY);
        vm.regs.set(0, KBSR - 1);
        vm.step().unwrap();

        // The poll found no input and cleared KBSR, terminating the string
        assert_eq!(vm.console().output(), "!");
        assert_eq!(vm.console().pending_input(), 0);
    }

    #[test]
    fn test_in_echoes() {
        let mut vm = trap_vm(0x23, &["yes"]);
        vm.step().unwrap();

        assert_eq!(vm.regs.get(0), u16::from(b'y'));
        assert_eq!(vm.regs.condition(), ConditionFlag::Zero);
        assert_eq!(vm.console().output(), "y\n");
    }

    #[test]
    fn test_putsp_packs_two_per_word() {
        let mut vm = trap_vm(0x24, &[]);
        // "HEL" then NUL: low byte first, odd tail has a zero high byte
        vm.mem.load_program(0x4000, &[0x4548, 0x004C, 0x0000]);
        vm.regs.set(0, 0x4000);
        vm.step().unwrap();

        assert_eq!(vm.console().output(), "HEL");
    }

    #[test]
    fn test_halt() {
        let mut vm = trap_vm(0x25, &[]);
        let outcome = vm.step().unwrap();

        assert_eq!(outcome, StepOutcome::Halted);
        assert_eq!(vm.state, VmState::Halted);
        assert_eq!(vm.console().output(), HALT_MESSAGE);
    }

    #[test]
    fn test_unknown_vector_faults() {
        let mut vm = trap_vm(0x30, &[]);
        let outcome = vm.step().unwrap();

        assert_eq!(outcome, StepOutcome::Faulted { vector: 0x30 });
        assert_eq!(vm.state, VmState::Faulted);
        assert_eq!(vm.console().output(), "");
    }

    #[test]
    fn test_word_char() {
        assert_eq!(word_char(0x0041), 'A');
        assert_eq!(word_char(0x00E9), 'é');
        assert_eq!(word_char(0xD800), char::REPLACEMENT_CHARACTER);
    }
}
