//! rvlab CLI: assemble and run RV32I assembly programs.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use rvlab_executor::abi_name;
use rvlab_simulator::{RunOutcome, Simulator, Snapshot, DEFAULT_STEP_BUDGET};

/// rvlab: RV32I assembler and simulator
#[derive(Parser)]
#[command(name = "rvlab")]
#[command(version = "0.1.0")]
#[command(about = "Assemble and simulate RV32I programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a program and print or save the machine code
    Asm {
        /// Path to the assembly source
        input: PathBuf,

        /// Write little-endian binary to this file instead of printing hex
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Assemble and run a program, then print the final state
    Run {
        /// Path to the assembly source
        input: PathBuf,

        /// Maximum instructions to execute
        #[arg(long, default_value_t = DEFAULT_STEP_BUDGET)]
        max_steps: u64,

        /// Memory size in bytes
        #[arg(long, default_value_t = rvlab_executor::memory::DEFAULT_MEM_SIZE)]
        mem_size: usize,

        /// Print the recent execution trace
        #[arg(long)]
        trace: bool,

        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Asm { input, output } => asm_command(&input, output.as_deref()),
        Commands::Run {
            input,
            max_steps,
            mem_size,
            trace,
            json,
        } => run_command(&input, max_steps, mem_size, trace, json),
    }
}

fn read_source(path: &std::path::Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error reading {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn asm_command(input: &std::path::Path, output: Option<&std::path::Path>) {
    let source = read_source(input);

    let words = match rvlab_assembler::assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("{}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            if let Err(e) = fs::write(path, &bytes) {
                eprintln!("error writing {}: {}", path.display(), e);
                std::process::exit(1);
            }
            println!("{} instructions -> {}", words.len(), path.display());
        }
        None => {
            for (i, word) in words.iter().enumerate() {
                println!("{:08x}:  {:08x}", i * 4, word);
            }
        }
    }
}

fn run_command(input: &std::path::Path, max_steps: u64, mem_size: usize, trace: bool, json: bool) {
    let source = read_source(input);

    let mut sim = Simulator::with_memory_size(mem_size);
    if let Err(e) = sim.load(&source) {
        eprintln!("{}: {}", input.display(), e);
        std::process::exit(1);
    }

    let report = match sim.run(max_steps) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report.snapshot) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error serializing snapshot: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    match report.outcome {
        RunOutcome::Halted(reason) => {
            println!(
                "halted ({:?}) after {} instructions, pc={:#010x}",
                reason, report.steps_executed, report.snapshot.pc
            );
        }
        RunOutcome::BudgetExhausted => {
            println!(
                "stopped: instruction budget ({}) exhausted, pc={:#010x}",
                max_steps, report.snapshot.pc
            );
        }
        RunOutcome::Fault(fault) => {
            println!("fault at pc={:#010x}: {}", fault.pc, fault.error);
            if let Some(word) = fault.word {
                println!("  instruction word: {:#010x}", word);
            }
        }
    }

    print_registers(&report.snapshot);

    if trace {
        println!("\nrecent trace:");
        for row in &report.snapshot.recent_trace {
            let writes: Vec<String> = row
                .writes
                .iter()
                .map(|w| format!("x{}: {:#x} -> {:#x}", w.reg, w.old, w.new))
                .collect();
            println!(
                "  [{:>5}] {:#010x}  {:08x}  {:<6} {}",
                row.clk,
                row.pc,
                row.bits,
                row.mnemonic,
                writes.join(", ")
            );
        }
    }
}

fn print_registers(snapshot: &Snapshot) {
    println!("\nregisters (nonzero):");
    for (i, &val) in snapshot.regs.iter().enumerate() {
        if val != 0 {
            println!("  x{:<2} ({:>4}) = {:#010x} ({})", i, abi_name(i as u8), val, val);
        }
    }
}
