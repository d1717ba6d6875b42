//! Executor errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExecError {
    #[error("illegal instruction at pc={pc:#010x}: {bits:#010x}")]
    IllegalInstruction { pc: u32, bits: u32 },

    #[error("misaligned access at address {addr:#010x} (requires {required}-byte alignment)")]
    MemoryAlignment { addr: u32, required: u32 },

    #[error("memory access out of bounds: address {addr:#010x}")]
    MemoryBounds { addr: u32 },
}
