//! Console collaborator used by the keyboard device and the trap service.
//!
//! The interpreter only needs two line-oriented operations: a blocking read
//! of the next input line and a write of some text. Input is raw bytes, so
//! a keypress outside ASCII still reaches the machine. [`StdConsole`] backs
//! them with the process's stdin/stdout; [`BufferedConsole`] keeps both
//! sides in memory for tests and for embedders such as the wasm bindings.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Line-oriented console I/O.
pub trait Console {
    /// Block until the next input line is available and return its bytes
    /// without the line terminator. An exhausted input returns an empty line.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Write `text` to the console as-is.
    fn write_str(&mut self, text: &str) -> io::Result<()>;
}

impl<C: Console + ?Sized> Console for &mut C {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_line()
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        (**self).write_str(text)
    }
}

/// Console on the process's standard input and output.
///
/// Output is flushed after every write so prompts appear before the
/// interpreter blocks on input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl StdConsole {
    /// Create a console on stdin/stdout.
    pub fn new() -> Self {
        Self
    }
}

impl Console for StdConsole {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        read_line_from(&mut io::stdin().lock())
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

/// In-memory console: scripted input lines and captured output.
#[derive(Debug, Default, Clone)]
pub struct BufferedConsole {
    input: VecDeque<Vec<u8>>,
    output: String,
}

impl BufferedConsole {
    /// Create a console with no pending input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console that will answer reads with `lines`, in order.
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    /// Queue another input line.
    pub fn push_line(&mut self, line: impl Into<Vec<u8>>) {
        self.input.push_back(line.into());
    }

    /// Number of input lines not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Everything written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the captured output, leaving the buffer empty.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Console for BufferedConsole {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.input.pop_front().map(strip_terminator).unwrap_or_default())
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.output.push_str(text);
        Ok(())
    }
}

/// Read one `\n`-terminated line of raw bytes from `reader`.
fn read_line_from<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    Ok(strip_terminator(line))
}

fn strip_terminator(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_reads_in_order() {
        let mut console = BufferedConsole::with_input(["first", "second\n"]);

        assert_eq!(console.read_line().unwrap(), b"first");
        assert_eq!(console.read_line().unwrap(), b"second");
        assert_eq!(console.pending_input(), 0);
    }

    #[test]
    fn test_buffered_exhausted_input_is_empty() {
        let mut console = BufferedConsole::new();
        assert!(console.read_line().unwrap().is_empty());
        assert!(console.read_line().unwrap().is_empty());
    }

    #[test]
    fn test_buffered_keeps_non_utf8_bytes() {
        let mut console = BufferedConsole::new();
        console.push_line(vec![0xE9, b'x', b'\n']);

        assert_eq!(console.read_line().unwrap(), vec![0xE9, b'x']);
    }

    #[test]
    fn test_buffered_captures_output() {
        let mut console = BufferedConsole::new();
        console.write_str("HI").unwrap();
        console.write_str("\n").unwrap();

        assert_eq!(console.output(), "HI\n");
        assert_eq!(console.take_output(), "HI\n");
        assert_eq!(console.output(), "");
    }

    #[test]
    fn test_read_line_from_stream() {
        let mut stream: &[u8] = b"\xE9abc\r\nnext\nlast";

        assert_eq!(read_line_from(&mut stream).unwrap(), vec![0xE9, b'a', b'b', b'c']);
        assert_eq!(read_line_from(&mut stream).unwrap(), b"next");
        assert_eq!(read_line_from(&mut stream).unwrap(), b"last");
        assert!(read_line_from(&mut stream).unwrap().is_empty());
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator(b"abc\r\n".to_vec()), b"abc");
        assert_eq!(strip_terminator(b"abc\n".to_vec()), b"abc");
        assert_eq!(strip_terminator(b"abc".to_vec()), b"abc");
        assert!(strip_terminator(b"\n".to_vec()).is_empty());
    }

    #[test]
    fn test_console_through_mut_ref() {
        let mut inner = BufferedConsole::with_input(["x"]);
        {
            let mut console: &mut BufferedConsole = &mut inner;
            assert_eq!(Console::read_line(&mut console).unwrap(), b"x");
            Console::write_str(&mut console, "y").unwrap();
        }
        assert_eq!(inner.output(), "y");
    }
}
