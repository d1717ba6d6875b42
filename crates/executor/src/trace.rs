//! Execution trace entries.
//!
//! Each executed instruction yields one `TraceRow`: the PC it was fetched
//! from, the raw word, its mnemonic, the next PC, and any register writes
//! as (register, old value, new value).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A register write performed by one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegWrite {
    pub reg: u8,
    pub old: u32,
    pub new: u32,
}

/// One executed instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Step number (0-based).
    pub clk: u64,
    /// PC the instruction was fetched from.
    pub pc: u32,
    /// Raw instruction word.
    pub bits: u32,
    /// Operation mnemonic.
    pub mnemonic: String,
    /// PC after this instruction.
    pub next_pc: u32,
    /// Register writes, in write-back order. Writes to x0 never appear.
    pub writes: Vec<RegWrite>,
}

/// Bounded buffer of the most recent trace rows.
///
/// Old rows are discarded once `cap` is reached; `len` keeps counting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceBuffer {
    rows: VecDeque<TraceRow>,
    cap: usize,
    total: u64,
}

impl TraceBuffer {
    /// Create a buffer keeping at most `cap` recent rows.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(cap),
            cap,
            total: 0,
        }
    }

    pub fn push(&mut self, row: TraceRow) {
        if self.rows.len() == self.cap {
            self.rows.pop_front();
        }
        self.rows.push_back(row);
        self.total += 1;
    }

    /// Number of rows currently retained.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total rows ever pushed, including discarded ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceRow> {
        self.rows.iter()
    }

    /// The retained rows, oldest first.
    pub fn to_vec(&self) -> Vec<TraceRow> {
        self.rows.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(clk: u64) -> TraceRow {
        TraceRow {
            clk,
            pc: (clk as u32) * 4,
            bits: 0x0000_0013,
            mnemonic: "addi".to_string(),
            next_pc: (clk as u32) * 4 + 4,
            writes: vec![],
        }
    }

    #[test]
    fn test_truncates_to_capacity() {
        let mut buf = TraceBuffer::with_capacity(3);
        for clk in 0..5 {
            buf.push(row(clk));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total(), 5);
        let clks: Vec<u64> = buf.iter().map(|r| r.clk).collect();
        assert_eq!(clks, vec![2, 3, 4]);
    }
}
