//! Assembler errors.
//!
//! Every variant carries the 1-based source line number; `Display` renders
//! a human-readable message suitable for direct UI display.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("line {line}: syntax error: {msg}")]
    Syntax { line: usize, msg: String },

    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: unknown register `{name}`")]
    UnknownRegister { line: usize, name: String },

    #[error("line {line}: unknown label `{label}`")]
    UnknownLabel { line: usize, label: String },

    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: immediate {value} out of range for {context}")]
    ImmediateOutOfRange {
        line: usize,
        value: i64,
        context: &'static str,
    },

    #[error("line {line}: `{mnemonic}` expects {expected} operands, found {found}")]
    OperandCount {
        line: usize,
        mnemonic: String,
        expected: &'static str,
        found: usize,
    },
}
