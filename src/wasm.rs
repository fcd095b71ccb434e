//! WebAssembly bindings for the interpreter.
//!
//! This module provides JavaScript-friendly wrappers around the core VM.
//! Console I/O is buffered: the page pushes input lines and drains output.

use wasm_bindgen::prelude::*;
use crate::{BufferedConsole, ProgramImage, StepOutcome, Vm};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly VM wrapper.
#[wasm_bindgen]
pub struct WasmVm {
    vm: Vm<BufferedConsole>,
}

#[wasm_bindgen]
impl WasmVm {
    /// Create a VM with an empty image at the default origin.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            vm: Vm::new(ProgramImage::default(), BufferedConsole::new()),
        }
    }

    /// Load a big-endian object image. Returns the number of words loaded.
    #[wasm_bindgen]
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<usize, JsError> {
        let image = ProgramImage::from_bytes(bytes)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let len = image.len();
        self.vm = Vm::new(image, BufferedConsole::new());
        Ok(len)
    }

    /// Queue a line of keyboard input.
    #[wasm_bindgen]
    pub fn push_input(&mut self, line: &str) {
        self.vm.console_mut().push_line(line);
    }

    /// Drain everything the program has written so far.
    #[wasm_bindgen]
    pub fn take_output(&mut self) -> String {
        self.vm.console_mut().take_output()
    }

    /// Step one instruction. Returns the outcome name.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let outcome = self.vm.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(outcome_name(outcome))
    }

    /// Run until halt, fault, or `max_steps`. Returns the outcome name.
    #[wasm_bindgen]
    pub fn run(&mut self, max_steps: u32) -> Result<String, JsError> {
        let outcome = self.vm.run_limited(u64::from(max_steps))
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(outcome_name(outcome))
    }

    /// Reset to the state right after loading.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.vm.reset();
    }

    /// Check if the VM is running.
    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.vm.is_running()
    }

    /// Check if the VM has halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.vm.is_halted()
    }

    /// Instructions executed since load.
    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.vm.steps()
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.vm.regs.pc
    }

    /// Get a general purpose register (index masked to 0-7).
    #[wasm_bindgen]
    pub fn register(&self, index: u16) -> u16 {
        self.vm.regs.get(index)
    }

    /// Get condition code as string.
    #[wasm_bindgen]
    pub fn condition(&self) -> String {
        format!("{:?}", self.vm.regs.condition())
    }

    /// Get memory word, without triggering the keyboard device.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: u16) -> u16 {
        self.vm.mem.peek(addr)
    }

    /// Get `count` words starting at `start`.
    #[wasm_bindgen]
    pub fn memory_range(&self, start: u16, count: usize) -> Vec<u16> {
        self.vm.mem.dump(start, count).into_iter().map(|(_, w)| w).collect()
    }

    /// Get architectural state as JSON string.
    #[wasm_bindgen]
    pub fn state_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.vm.snapshot())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmVm {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome_name(outcome: StepOutcome) -> String {
    match outcome {
        StepOutcome::Continuing => "continuing".to_string(),
        StepOutcome::Halted => "halted".to_string(),
        StepOutcome::Faulted { vector } => format!("faulted:{:#04x}", vector),
    }
}
