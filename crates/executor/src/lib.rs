//! rvlab-executor: RV32I decoder and functional executor.
//!
//! This crate provides:
//! - Byte-addressable little-endian memory with alignment/bounds checks
//! - A register file with x0 hardwired to zero
//! - A pure bit-field instruction decoder
//! - A deterministic fetch-decode-execute CPU core with per-step trace rows

pub mod cpu;
pub mod decode;
pub mod error;
pub mod memory;
pub mod registers;
pub mod trace;

pub use cpu::{Cpu, HaltCause};
pub use decode::{DecodedInstr, InstrFormat};
pub use error::ExecError;
pub use memory::Memory;
pub use registers::{abi_name, RegisterFile};
pub use trace::{RegWrite, TraceBuffer, TraceRow};
