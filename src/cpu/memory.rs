//! LC-3 memory subsystem.
//!
//! 65536 sixteen-bit words addressed by a `u16`, so every address is in
//! range and address arithmetic wraps at the top of memory. Two words near
//! the top are keyboard device registers.

use crate::console::Console;

/// The number of words in the address space.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register. Bit 15 set means a character is available.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register. Holds the most recently polled character.
pub const KBDR: u16 = 0xFE02;

/// KBSR value when a character is ready.
pub const KBSR_READY: u16 = 1 << 15;

/// LC-3 memory: 64K sixteen-bit words.
#[derive(Clone)]
pub struct Memory {
    cells: Box<[u16]>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0u16; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Read a word.
    ///
    /// Reading [`KBSR`] is a device access: before the value is returned the
    /// keyboard is polled, which blocks on `console` for one input line. If
    /// the line starts with a non-zero byte, KBSR becomes [`KBSR_READY`] and
    /// that byte is stored in [`KBDR`]; otherwise KBSR is cleared and KBDR is
    /// left alone. Every other address is plain storage.
    pub fn read<C: Console + ?Sized>(&mut self, addr: u16, console: &mut C) -> u16 {
        if addr == KBSR {
            self.poll_keyboard(console);
        }
        self.cells[usize::from(addr)]
    }

    /// Write a word. No address is write-protected.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[usize::from(addr)] = value;
    }

    /// Read a word without triggering device side effects.
    ///
    /// Meant for inspecting a machine from the outside; the execution
    /// engine always goes through [`Memory::read`].
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[usize::from(addr)]
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy `words` into memory starting at `origin`.
    ///
    /// Addresses wrap past 0xFFFF back to 0x0000.
    pub fn load_program(&mut self, origin: u16, words: &[u16]) {
        let mut addr = origin;
        for &word in words {
            self.write(addr, word);
            addr = addr.wrapping_add(1);
        }
    }

    /// Dump a range of words (for inspection). Wraps at the top of memory.
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        let mut addr = start;
        let mut out = Vec::with_capacity(count.min(MEMORY_SIZE));
        for _ in 0..count.min(MEMORY_SIZE) {
            out.push((addr, self.peek(addr)));
            addr = addr.wrapping_add(1);
        }
        out
    }

    fn poll_keyboard<C: Console + ?Sized>(&mut self, console: &mut C) {
        let line = match console.read_line() {
            Ok(line) => line,
            Err(e) => {
                log::warn!("keyboard poll failed, treating as no input: {}", e);
                Vec::new()
            }
        };

        match line.first() {
            Some(&byte) if byte != 0 => {
                self.write(KBSR, KBSR_READY);
                self.write(KBDR, u16::from(byte));
            }
            _ => self.write(KBSR, 0),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero words
        let non_zero = self.cells.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_words", &non_zero)
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferedConsole;
    use std::io;

    struct BrokenConsole;

    impl Console for BrokenConsole {
        fn read_line(&mut self) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn write_str(&mut self, _text: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::new();

        mem.write(0x3000, 0x1234);
        assert_eq!(mem.read(0x3000, &mut console), 0x1234);
        assert_eq!(mem.read(0xFFFF, &mut console), 0);
    }

    #[test]
    fn test_plain_reads_do_not_poll() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::with_input(["a"]);

        mem.read(KBDR, &mut console);
        mem.read(0x0000, &mut console);
        assert_eq!(console.pending_input(), 1);
    }

    #[test]
    fn test_keyboard_poll_with_input() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::with_input(["hello"]);

        let status = mem.read(KBSR, &mut console);

        assert_eq!(status, KBSR_READY);
        assert_eq!(mem.peek(KBDR), u16::from(b'h'));
        assert_eq!(console.pending_input(), 0);
    }

    #[test]
    fn test_keyboard_poll_idempotent_without_input() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::new();
        mem.write(KBDR, u16::from(b'q'));

        for _ in 0..3 {
            let status = mem.read(KBSR, &mut console);
            assert_eq!(status & KBSR_READY, 0);
            assert_eq!(mem.peek(KBDR), u16::from(b'q'));
        }
    }

    #[test]
    fn test_keyboard_poll_clears_stale_status() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::with_input(["x", ""]);

        assert_eq!(mem.read(KBSR, &mut console), KBSR_READY);
        assert_eq!(mem.read(KBSR, &mut console), 0);
        assert_eq!(mem.peek(KBDR), u16::from(b'x'));
    }

    #[test]
    fn test_keyboard_poll_non_utf8_byte() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::new();
        console.push_line(vec![0xE9u8]);

        assert_eq!(mem.read(KBSR, &mut console), KBSR_READY);
        assert_eq!(mem.peek(KBDR), 0x00E9);
    }

    #[test]
    fn test_keyboard_poll_nul_byte_is_not_ready() {
        let mut mem = Memory::new();
        let mut console = BufferedConsole::with_input(["\0abc"]);

        assert_eq!(mem.read(KBSR, &mut console), 0);
        assert_eq!(mem.peek(KBDR), 0);
    }

    #[test]
    fn test_keyboard_poll_error_is_not_ready() {
        let mut mem = Memory::new();
        mem.write(KBSR, KBSR_READY);

        assert_eq!(mem.read(KBSR, &mut BrokenConsole), 0);
    }

    #[test]
    fn test_load_program_wraps() {
        let mut mem = Memory::new();
        mem.load_program(0xFFFE, &[1, 2, 3]);

        assert_eq!(mem.peek(0xFFFE), 1);
        assert_eq!(mem.peek(0xFFFF), 2);
        assert_eq!(mem.peek(0x0000), 3);
    }

    #[test]
    fn test_dump_and_clear() {
        let mut mem = Memory::new();
        mem.load_program(0x3000, &[7, 8]);

        assert_eq!(mem.dump(0x3000, 3), vec![(0x3000, 7), (0x3001, 8), (0x3002, 0)]);

        mem.clear();
        assert_eq!(mem.peek(0x3000), 0);
    }
}
