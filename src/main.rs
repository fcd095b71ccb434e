//! elshi - CLI Entry Point
//!
//! Commands:
//! - `elshi run <image>` - Load an LC-3 object image and run it on the terminal
//! - `elshi info <image>` - Show where an image loads without running it
//!
//! Set `RUST_LOG=debug` for loader and run-loop diagnostics on stderr.

use clap::{Parser, Subcommand};
use elshi::{load_image, ProgramImage, StdConsole, StepOutcome, Vm};

#[derive(Parser)]
#[command(name = "elshi")]
#[command(version)]
#[command(about = "An interpreter for the LC-3 16-bit instruction set")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the big-endian object image
        image: String,
        /// Stop after this many instructions (default: no limit)
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Print the final machine state as JSON on stderr
        #[arg(short, long)]
        dump_state: bool,
    },
    /// Describe an image without executing it
    Info {
        /// Path to the big-endian object image
        image: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { image, max_steps, dump_state } => {
            let code = run_program(&image, max_steps, dump_state);
            std::process::exit(code);
        }
        Commands::Info { image } => {
            describe_image(&image);
        }
    }
}

fn load_or_exit(path: &str) -> ProgramImage {
    match load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run the image and return the process exit status.
fn run_program(path: &str, max_steps: Option<u64>, dump_state: bool) -> i32 {
    let mut vm = Vm::new(load_or_exit(path), StdConsole::new());
    log::info!(
        "running {} ({} words at {:#06x})",
        path,
        vm.image().len(),
        vm.image().origin
    );

    let result = match max_steps {
        Some(limit) => vm.run_limited(limit),
        None => vm.run(),
    };

    if dump_state {
        match serde_json::to_string_pretty(&vm.snapshot()) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }

    match result {
        Ok(StepOutcome::Halted) => 0,
        Ok(StepOutcome::Faulted { vector }) => {
            eprintln!("❌ Unknown trap vector {:#04x} at PC={:#06x}", vector, vm.regs.pc.wrapping_sub(1));
            1
        }
        Ok(StepOutcome::Continuing) => {
            if max_steps.is_some_and(|limit| vm.steps() >= limit) {
                log::warn!("reached max steps limit ({}), stopping", vm.steps());
            }
            0
        }
        Err(e) => {
            eprintln!("❌ VM error at PC={:#06x}: {}", vm.regs.pc, e);
            1
        }
    }
}

fn describe_image(path: &str) {
    let image = load_or_exit(path);

    println!("Image:  {}", path);
    println!("Origin: {:#06x}", image.origin);
    println!("Words:  {}", image.len());
    println!("End:    {:#06x}", image.end());
}
