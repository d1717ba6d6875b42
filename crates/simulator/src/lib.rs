//! rvlab-simulator: the driver tying assembler and executor together.
//!
//! A `Simulator` owns one CPU (registers, PC, memory) and the recent
//! execution trace, and walks the state machine
//! `Idle -> Loaded -> Running -> Halted | Error`:
//!
//! - `load` assembles a program and installs it at address 0
//! - `step` executes one instruction; `run` iterates until a halt, a
//!   fault, or the instruction budget runs out
//! - `reset` returns to `Idle` from any state
//!
//! The driver is single-threaded and synchronous: `step` runs to
//! completion and `run` is a tight loop bounded only by the budget.
//! Callers serving concurrent sessions keep one instance per session or
//! serialize access themselves.

use rvlab_assembler::{assemble, AsmError};
use rvlab_executor::{Cpu, ExecError, HaltCause, TraceBuffer, TraceRow};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default `run` instruction budget.
pub const DEFAULT_STEP_BUDGET: u64 = 10_000;

/// Recent trace rows retained for snapshots.
const RECENT_TRACE: usize = 32;

/// Driver state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    Loaded,
    Running,
    Halted,
    Error,
}

/// Why execution stopped cleanly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// ECALL executed.
    EnvCall,
    /// EBREAK executed.
    Breakpoint,
    /// PC walked past the loaded program.
    OffEnd,
}

/// A fault raised by the decoder/executor. The PC of the offending
/// instruction is preserved; `word` is its encoding when fetchable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub pc: u32,
    pub word: Option<u32>,
    pub error: ExecError,
}

/// Outcome of a single `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// One instruction executed, execution can continue.
    Executed,
    /// Execution stopped cleanly (the halting instruction, if any, did
    /// execute and is in the trace).
    Halted(HaltReason),
    /// The executor faulted; the driver is now in `Error`.
    Fault(Fault),
}

/// Outcome of a `run`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Halted(HaltReason),
    /// The instruction budget ran out before a halt. Not an error;
    /// another `run` or `step` resumes.
    BudgetExhausted,
    Fault(Fault),
}

/// Observable state returned by `step`, `run`, and `snapshot`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: State,
    pub pc: u32,
    pub regs: [u32; 32],
    pub halted: bool,
    pub instructions_executed: u64,
    pub recent_trace: Vec<TraceRow>,
}

/// Result of `step`, with a full snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub outcome: StepOutcome,
    pub snapshot: Snapshot,
}

/// Result of `run`, with a full snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub steps_executed: u64,
    pub snapshot: Snapshot,
}

/// Driver-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error(transparent)]
    Assemble(#[from] AsmError),

    #[error("program does not fit in memory ({bytes} bytes)")]
    ProgramTooLarge { bytes: usize },

    #[error("simulator is not runnable in state {state:?}")]
    NotRunnable { state: State },
}

/// The simulation driver.
pub struct Simulator {
    cpu: Cpu,
    state: State,
    program_len: u32,
    executed: u64,
    trace: TraceBuffer,
}

impl Simulator {
    /// Create a simulator with the default 1 MiB memory.
    pub fn new() -> Self {
        Self::with_memory_size(rvlab_executor::memory::DEFAULT_MEM_SIZE)
    }

    /// Create a simulator with a custom memory size in bytes.
    pub fn with_memory_size(size: usize) -> Self {
        Self {
            cpu: Cpu::with_memory_size(size),
            state: State::Idle,
            program_len: 0,
            executed: 0,
            trace: TraceBuffer::with_capacity(RECENT_TRACE),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Byte length of the loaded program.
    pub fn program_len(&self) -> u32 {
        self.program_len
    }

    /// Assemble `source` and install it at address 0.
    ///
    /// Assembly runs first; on failure no state changes and no partial
    /// program is installed.
    pub fn load(&mut self, source: &str) -> Result<Snapshot, SimError> {
        let words = assemble(source)?;
        self.install(&words)?;
        info!(instructions = words.len(), "program loaded");
        Ok(self.snapshot())
    }

    /// Install pre-assembled machine code at address 0.
    pub fn load_words(&mut self, words: &[u32]) -> Result<Snapshot, SimError> {
        self.install(words)?;
        info!(instructions = words.len(), "machine code loaded");
        Ok(self.snapshot())
    }

    fn install(&mut self, words: &[u32]) -> Result<(), SimError> {
        let image: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        if image.len() > self.cpu.memory.size() {
            return Err(SimError::ProgramTooLarge { bytes: image.len() });
        }
        self.cpu.reset();
        self.trace.clear();
        self.executed = 0;
        // Cannot fail: the fit was checked above.
        self.cpu
            .memory
            .load_image(0, &image)
            .expect("program image fits in memory");
        self.program_len = image.len() as u32;
        self.state = State::Loaded;
        Ok(())
    }

    /// Execute one instruction and append its trace entry.
    pub fn step(&mut self) -> Result<StepResult, SimError> {
        if matches!(self.state, State::Idle | State::Error) {
            return Err(SimError::NotRunnable { state: self.state });
        }

        // A latched ECALL/EBREAK stays halted: no further fetches.
        if let Some(cause) = self.cpu.halted() {
            self.state = State::Halted;
            return Ok(self.step_result(StepOutcome::Halted(halt_reason(cause))));
        }

        if self.cpu.pc >= self.program_len {
            debug!(pc = self.cpu.pc, "pc past end of program, halting");
            self.state = State::Halted;
            return Ok(self.step_result(StepOutcome::Halted(HaltReason::OffEnd)));
        }

        self.state = State::Running;
        match self.cpu.step() {
            Ok(row) => {
                self.executed += 1;
                self.trace.push(row);
                let outcome = match self.cpu.halted() {
                    Some(cause) => {
                        self.state = State::Halted;
                        StepOutcome::Halted(halt_reason(cause))
                    }
                    None => StepOutcome::Executed,
                };
                Ok(self.step_result(outcome))
            }
            Err(error) => {
                let pc = self.cpu.pc;
                warn!(%error, pc, "execution fault");
                self.state = State::Error;
                Ok(self.step_result(StepOutcome::Fault(Fault {
                    pc,
                    word: self.cpu.memory.read_u32(pc).ok(),
                    error,
                })))
            }
        }
    }

    /// Run until halt, fault, or at most `max_instructions` steps.
    pub fn run(&mut self, max_instructions: u64) -> Result<RunResult, SimError> {
        let start = self.executed;
        loop {
            let steps_executed = self.executed - start;
            if steps_executed >= max_instructions {
                info!(steps_executed, "instruction budget exhausted");
                self.state = State::Halted;
                return Ok(RunResult {
                    outcome: RunOutcome::BudgetExhausted,
                    steps_executed,
                    snapshot: self.snapshot(),
                });
            }
            let report = self.step()?;
            let steps_executed = self.executed - start;
            match report.outcome {
                StepOutcome::Executed => {}
                StepOutcome::Halted(reason) => {
                    info!(steps_executed, ?reason, "halted");
                    return Ok(RunResult {
                        outcome: RunOutcome::Halted(reason),
                        steps_executed,
                        snapshot: report.snapshot,
                    });
                }
                StepOutcome::Fault(fault) => {
                    return Ok(RunResult {
                        outcome: RunOutcome::Fault(fault),
                        steps_executed,
                        snapshot: report.snapshot,
                    });
                }
            }
        }
    }

    /// Return to `Idle`, clearing registers, PC, memory, and trace.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.trace.clear();
        self.executed = 0;
        self.program_len = 0;
        self.state = State::Idle;
        debug!("simulator reset");
    }

    /// Current observable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            pc: self.cpu.pc,
            regs: self.cpu.regs.as_array(),
            halted: self.state == State::Halted,
            instructions_executed: self.executed,
            recent_trace: self.trace.to_vec(),
        }
    }

    /// Read raw memory, for test harnesses and UIs.
    pub fn read_memory(&self, addr: u32, len: usize) -> Result<Vec<u8>, ExecError> {
        self.cpu.memory.slice(addr, len).map(|s| s.to_vec())
    }

    /// Write raw memory, for test harnesses and UIs.
    pub fn write_memory(&mut self, addr: u32, bytes: &[u8]) -> Result<(), ExecError> {
        self.cpu.memory.write_slice(addr, bytes)
    }

    fn step_result(&self, outcome: StepOutcome) -> StepResult {
        StepResult {
            outcome,
            snapshot: self.snapshot(),
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

fn halt_reason(cause: HaltCause) -> HaltReason {
    match cause {
        HaltCause::EnvCall => HaltReason::EnvCall,
        HaltCause::Breakpoint => HaltReason::Breakpoint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_load_run_reset() {
        let mut sim = Simulator::with_memory_size(4096);
        assert_eq!(sim.state(), State::Idle);
        assert!(matches!(
            sim.step(),
            Err(SimError::NotRunnable { state: State::Idle })
        ));

        sim.load("addi x1, x0, 1\necall\n").unwrap();
        assert_eq!(sim.state(), State::Loaded);

        let report = sim.run(DEFAULT_STEP_BUDGET).unwrap();
        assert_eq!(report.outcome, RunOutcome::Halted(HaltReason::EnvCall));
        assert_eq!(sim.state(), State::Halted);

        sim.reset();
        assert_eq!(sim.state(), State::Idle);
        assert_eq!(sim.snapshot().instructions_executed, 0);
    }

    #[test]
    fn test_load_failure_leaves_state_untouched() {
        let mut sim = Simulator::with_memory_size(4096);
        sim.load("addi x1, x0, 7\necall\n").unwrap();
        sim.run(10).unwrap();
        let before = sim.snapshot();

        assert!(sim.load("bogus x1, x2\n").is_err());
        let after = sim.snapshot();
        assert_eq!(after.state, before.state);
        assert_eq!(after.regs, before.regs);
        assert_eq!(after.pc, before.pc);
    }

    #[test]
    fn test_budget_exhaustion_resumes() {
        let mut sim = Simulator::with_memory_size(4096);
        // Infinite loop.
        sim.load("loop: jal x0, loop\n").unwrap();
        let report = sim.run(100).unwrap();
        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(report.steps_executed, 100);
        assert_eq!(sim.state(), State::Halted);

        // A halted-on-budget simulator picks up where it left off.
        let report = sim.run(50).unwrap();
        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(report.steps_executed, 50);
        assert_eq!(sim.snapshot().instructions_executed, 150);
    }

    #[test]
    fn test_step_after_env_call_stays_halted() {
        let mut sim = Simulator::with_memory_size(4096);
        sim.load("ecall\n").unwrap();
        let first = sim.step().unwrap();
        assert_eq!(first.outcome, StepOutcome::Halted(HaltReason::EnvCall));
        let second = sim.step().unwrap();
        assert_eq!(second.outcome, StepOutcome::Halted(HaltReason::EnvCall));
        assert_eq!(sim.snapshot().instructions_executed, 1);
    }

    #[test]
    fn test_pc_off_end_halts() {
        let mut sim = Simulator::with_memory_size(4096);
        // No ecall; execution walks off the program.
        sim.load("addi x1, x0, 3\n").unwrap();
        let report = sim.run(10).unwrap();
        assert_eq!(report.outcome, RunOutcome::Halted(HaltReason::OffEnd));
        assert_eq!(report.steps_executed, 1);
        assert_eq!(report.snapshot.regs[1], 3);
    }

    #[test]
    fn test_load_words_matches_assembly() {
        let mut sim_a = Simulator::with_memory_size(4096);
        let mut sim_b = Simulator::with_memory_size(4096);
        let source = "addi x1, x0, 10\naddi x2, x1, 5\necall\n";
        let words = assemble(source).unwrap();

        sim_a.load(source).unwrap();
        sim_b.load_words(&words).unwrap();
        let a = sim_a.run(10).unwrap();
        let b = sim_b.run(10).unwrap();
        assert_eq!(a.snapshot.regs, b.snapshot.regs);
        assert_eq!(a.outcome, b.outcome);
    }

    #[test]
    fn test_program_too_large() {
        let mut sim = Simulator::with_memory_size(8);
        let err = sim.load_words(&[0x13, 0x13, 0x13]).unwrap_err();
        assert_eq!(err, SimError::ProgramTooLarge { bytes: 12 });
    }

    #[test]
    fn test_read_write_memory() {
        let mut sim = Simulator::with_memory_size(4096);
        sim.write_memory(0x100, &[1, 2, 3, 4]).unwrap();
        assert_eq!(sim.read_memory(0x100, 4).unwrap(), vec![1, 2, 3, 4]);
        assert!(sim.read_memory(4093, 8).is_err());
    }

    #[test]
    fn test_trace_is_bounded() {
        let mut sim = Simulator::with_memory_size(4096);
        sim.load("loop: jal x0, loop\n").unwrap();
        sim.run(1000).unwrap();
        let snap = sim.snapshot();
        assert_eq!(snap.instructions_executed, 1000);
        assert!(snap.recent_trace.len() <= RECENT_TRACE);
    }
}
