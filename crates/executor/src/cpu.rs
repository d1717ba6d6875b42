//! RV32I CPU core.
//!
//! A single `step` runs the fetch-decode-execute cycle for one
//! instruction: fetch the word at PC, decode it, apply it to the register
//! file and memory, then advance PC. All arithmetic is 32-bit
//! two's-complement with wrap-around; shifts use only the low 5 bits of
//! the shift-amount source.
//!
//! ECALL and EBREAK latch a halt cause instead of raising an error, so
//! that clean program termination stays distinct from faults
//! (`IllegalInstruction`, `MemoryAlignment`, `MemoryBounds`). On a fault
//! the PC is left at the offending instruction.

use crate::decode::{branch_funct3, funct7, load_funct3, op_funct3, opcode, store_funct3, DecodedInstr};
use crate::error::ExecError;
use crate::memory::Memory;
use crate::registers::RegisterFile;
use crate::trace::{RegWrite, TraceRow};
use serde::{Deserialize, Serialize};

/// Why the CPU halted cleanly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltCause {
    /// ECALL executed.
    EnvCall,
    /// EBREAK executed.
    Breakpoint,
}

/// RV32I CPU state.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// General-purpose registers x0..x31.
    pub regs: RegisterFile,
    /// Program counter.
    pub pc: u32,
    /// Instructions executed since reset.
    pub cycle: u64,
    /// Memory subsystem.
    pub memory: Memory,
    halt: Option<HaltCause>,
}

impl Cpu {
    /// Create a new CPU with the default memory size (1 MiB).
    pub fn new() -> Self {
        Self::with_memory_size(crate::memory::DEFAULT_MEM_SIZE)
    }

    /// Create a new CPU with a custom memory size.
    pub fn with_memory_size(size: usize) -> Self {
        Self {
            regs: RegisterFile::new(),
            pc: 0,
            cycle: 0,
            memory: Memory::new(size),
            halt: None,
        }
    }

    /// The halt cause, if an ECALL/EBREAK has executed since reset.
    pub fn halted(&self) -> Option<HaltCause> {
        self.halt
    }

    /// Reset registers, PC, cycle counter, halt latch, and memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.pc = 0;
        self.cycle = 0;
        self.halt = None;
        self.memory.clear();
    }

    /// Execute a single instruction and return its trace row.
    pub fn step(&mut self) -> Result<TraceRow, ExecError> {
        let pc = self.pc;
        let bits = self.memory.read_u32(pc)?;
        let instr = DecodedInstr::decode(bits);
        let illegal = ExecError::IllegalInstruction { pc, bits };

        let mut next_pc = pc.wrapping_add(4);
        let mut rd_val: Option<u32> = None;

        match instr.opcode {
            opcode::LUI => {
                rd_val = Some(instr.imm as u32);
            }

            opcode::AUIPC => {
                rd_val = Some(pc.wrapping_add(instr.imm as u32));
            }

            opcode::JAL => {
                rd_val = Some(pc.wrapping_add(4));
                next_pc = pc.wrapping_add(instr.imm as u32);
            }

            opcode::JALR => {
                if instr.funct3 != 0 {
                    return Err(illegal);
                }
                let base = self.regs.read(instr.rs1);
                rd_val = Some(pc.wrapping_add(4));
                // Target drops the low bit.
                next_pc = base.wrapping_add(instr.imm as u32) & !1;
            }

            opcode::BRANCH => {
                let a = self.regs.read(instr.rs1);
                let b = self.regs.read(instr.rs2);
                let taken = match instr.funct3 {
                    branch_funct3::BEQ => a == b,
                    branch_funct3::BNE => a != b,
                    branch_funct3::BLT => (a as i32) < (b as i32),
                    branch_funct3::BGE => (a as i32) >= (b as i32),
                    branch_funct3::BLTU => a < b,
                    branch_funct3::BGEU => a >= b,
                    _ => return Err(illegal),
                };
                if taken {
                    next_pc = pc.wrapping_add(instr.imm as u32);
                }
            }

            opcode::LOAD => {
                let addr = self.regs.read(instr.rs1).wrapping_add(instr.imm as u32);
                let val = match instr.funct3 {
                    load_funct3::LB => self.memory.read_u8(addr)? as i8 as i32 as u32,
                    load_funct3::LH => self.memory.read_u16(addr)? as i16 as i32 as u32,
                    load_funct3::LW => self.memory.read_u32(addr)?,
                    load_funct3::LBU => self.memory.read_u8(addr)? as u32,
                    load_funct3::LHU => self.memory.read_u16(addr)? as u32,
                    _ => return Err(illegal),
                };
                rd_val = Some(val);
            }

            opcode::STORE => {
                let addr = self.regs.read(instr.rs1).wrapping_add(instr.imm as u32);
                let val = self.regs.read(instr.rs2);
                match instr.funct3 {
                    store_funct3::SB => self.memory.write_u8(addr, val as u8)?,
                    store_funct3::SH => self.memory.write_u16(addr, val as u16)?,
                    store_funct3::SW => self.memory.write_u32(addr, val)?,
                    _ => return Err(illegal),
                }
            }

            opcode::OP_IMM => {
                let a = self.regs.read(instr.rs1);
                let imm = instr.imm as u32;
                let val = match instr.funct3 {
                    op_funct3::ADD_SUB => a.wrapping_add(imm),
                    op_funct3::SLT => ((a as i32) < instr.imm) as u32,
                    op_funct3::SLTU => (a < imm) as u32,
                    op_funct3::XOR => a ^ imm,
                    op_funct3::OR => a | imm,
                    op_funct3::AND => a & imm,
                    op_funct3::SLL => {
                        if instr.funct7 != funct7::BASE {
                            return Err(illegal);
                        }
                        a << instr.shamt()
                    }
                    op_funct3::SRL_SRA => match instr.funct7 {
                        funct7::BASE => a >> instr.shamt(),
                        funct7::SUB_SRA => ((a as i32) >> instr.shamt()) as u32,
                        _ => return Err(illegal),
                    },
                    _ => return Err(illegal),
                };
                rd_val = Some(val);
            }

            opcode::OP => {
                let a = self.regs.read(instr.rs1);
                let b = self.regs.read(instr.rs2);
                let val = match (instr.funct3, instr.funct7) {
                    (op_funct3::ADD_SUB, funct7::BASE) => a.wrapping_add(b),
                    (op_funct3::ADD_SUB, funct7::SUB_SRA) => a.wrapping_sub(b),
                    (op_funct3::SLL, funct7::BASE) => a << (b & 0x1F),
                    (op_funct3::SLT, funct7::BASE) => ((a as i32) < (b as i32)) as u32,
                    (op_funct3::SLTU, funct7::BASE) => (a < b) as u32,
                    (op_funct3::XOR, funct7::BASE) => a ^ b,
                    (op_funct3::SRL_SRA, funct7::BASE) => a >> (b & 0x1F),
                    (op_funct3::SRL_SRA, funct7::SUB_SRA) => ((a as i32) >> (b & 0x1F)) as u32,
                    (op_funct3::OR, funct7::BASE) => a | b,
                    (op_funct3::AND, funct7::BASE) => a & b,
                    _ => return Err(illegal),
                };
                rd_val = Some(val);
            }

            opcode::SYSTEM => match bits {
                0x0000_0073 => self.halt = Some(HaltCause::EnvCall),
                0x0010_0073 => self.halt = Some(HaltCause::Breakpoint),
                _ => return Err(illegal),
            },

            _ => return Err(illegal),
        }

        // Write-back. The register file discards x0 writes, so diffing the
        // destination before and after keeps x0 out of the trace without
        // any check here.
        let mut writes = Vec::new();
        if let Some(val) = rd_val {
            let old = self.regs.read(instr.rd);
            self.regs.write(instr.rd, val);
            let new = self.regs.read(instr.rd);
            if new != old {
                writes.push(RegWrite {
                    reg: instr.rd,
                    old,
                    new,
                });
            }
        }

        let row = TraceRow {
            clk: self.cycle,
            pc,
            bits,
            mnemonic: instr.mnemonic().to_string(),
            next_pc,
            writes,
        };

        self.pc = next_pc;
        self.cycle += 1;

        Ok(row)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
