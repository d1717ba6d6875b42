//! rvlab-assembler: two-pass RV32I assembler.
//!
//! Pass 1 collects labels, assigning instruction addresses sequentially
//! from 0 in steps of 4; a label points at the address of the next
//! instruction. Pass 2 parses and encodes each instruction, resolving
//! label operands in branches and JAL to PC-relative byte offsets.
//!
//! `assemble` is a pure function: no state survives between calls, and
//! the same text always produces the same words.

pub mod encode;
pub mod error;
pub mod parser;

pub use error::AsmError;

use parser::Stmt;
use std::collections::HashMap;

const OPC_LUI: u8 = 0b0110111;
const OPC_AUIPC: u8 = 0b0010111;
const OPC_JAL: u8 = 0b1101111;
const OPC_JALR: u8 = 0b1100111;
const OPC_BRANCH: u8 = 0b1100011;
const OPC_LOAD: u8 = 0b0000011;
const OPC_STORE: u8 = 0b0100011;
const OPC_OP_IMM: u8 = 0b0010011;
const OPC_OP: u8 = 0b0110011;

const ECALL_WORD: u32 = 0x0000_0073;
const EBREAK_WORD: u32 = 0x0010_0073;

/// Assemble a program into its 32-bit instruction words.
pub fn assemble(source: &str) -> Result<Vec<u32>, AsmError> {
    let mut symbols: HashMap<&str, u32> = HashMap::new();
    let mut statements: Vec<(usize, u32, Stmt<'_>)> = Vec::new();

    // Pass 1: collect labels and instruction addresses.
    let mut pc = 0u32;
    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let line = parser::split_line(number, raw)?;
        if let Some(label) = line.label {
            if symbols.insert(label, pc).is_some() {
                return Err(AsmError::DuplicateLabel {
                    line: number,
                    label: label.to_string(),
                });
            }
        }
        if let Some(stmt) = line.stmt {
            statements.push((number, pc, stmt));
            pc += 4;
        }
    }

    // Pass 2: encode.
    let mut words = Vec::with_capacity(statements.len());
    for (number, addr, stmt) in &statements {
        words.push(encode_stmt(*number, *addr, stmt, &symbols)?);
    }
    Ok(words)
}

fn expect_operands(
    line: usize,
    stmt: &Stmt<'_>,
    expected: usize,
    display: &'static str,
) -> Result<(), AsmError> {
    if stmt.operands.len() != expected {
        return Err(AsmError::OperandCount {
            line,
            mnemonic: stmt.mnemonic.clone(),
            expected: display,
            found: stmt.operands.len(),
        });
    }
    Ok(())
}

fn register(line: usize, name: &str) -> Result<u8, AsmError> {
    parser::parse_register(name).ok_or_else(|| AsmError::UnknownRegister {
        line,
        name: name.to_string(),
    })
}

fn immediate(line: usize, text: &str) -> Result<i64, AsmError> {
    parser::parse_immediate(text).ok_or_else(|| AsmError::Syntax {
        line,
        msg: format!("expected immediate, found `{text}`"),
    })
}

fn check_range(line: usize, value: i64, ok: bool, context: &'static str) -> Result<i32, AsmError> {
    if !ok {
        return Err(AsmError::ImmediateOutOfRange {
            line,
            value,
            context,
        });
    }
    Ok(value as i32)
}

/// Resolve a branch/JAL target operand: a known label becomes a
/// PC-relative byte offset, anything else must be a numeric offset.
fn resolve_target(
    line: usize,
    addr: u32,
    text: &str,
    symbols: &HashMap<&str, u32>,
) -> Result<i64, AsmError> {
    if let Some(&dest) = symbols.get(text) {
        return Ok(dest as i64 - addr as i64);
    }
    if let Some(value) = parser::parse_immediate(text) {
        return Ok(value);
    }
    if parser::is_ident(text) {
        return Err(AsmError::UnknownLabel {
            line,
            label: text.to_string(),
        });
    }
    Err(AsmError::Syntax {
        line,
        msg: format!("expected label or offset, found `{text}`"),
    })
}

/// Split and validate an `imm(reg)` memory operand.
fn mem_operand(line: usize, text: &str) -> Result<(i64, u8), AsmError> {
    let (imm_text, reg_text) = parser::split_mem_operand(text).ok_or_else(|| AsmError::Syntax {
        line,
        msg: format!("expected `imm(reg)`, found `{text}`"),
    })?;
    let offset = if imm_text.is_empty() {
        0
    } else {
        immediate(line, imm_text)?
    };
    Ok((offset, register(line, reg_text)?))
}

fn encode_stmt(
    line: usize,
    addr: u32,
    stmt: &Stmt<'_>,
    symbols: &HashMap<&str, u32>,
) -> Result<u32, AsmError> {
    let ops = &stmt.operands;

    match stmt.mnemonic.as_str() {
        // Register-register ALU.
        m @ ("add" | "sub" | "sll" | "slt" | "sltu" | "xor" | "srl" | "sra" | "or" | "and") => {
            expect_operands(line, stmt, 3, "3")?;
            let (funct3, funct7) = match m {
                "add" => (0b000, 0b0000000),
                "sub" => (0b000, 0b0100000),
                "sll" => (0b001, 0b0000000),
                "slt" => (0b010, 0b0000000),
                "sltu" => (0b011, 0b0000000),
                "xor" => (0b100, 0b0000000),
                "srl" => (0b101, 0b0000000),
                "sra" => (0b101, 0b0100000),
                "or" => (0b110, 0b0000000),
                _ => (0b111, 0b0000000),
            };
            let rd = register(line, ops[0])?;
            let rs1 = register(line, ops[1])?;
            let rs2 = register(line, ops[2])?;
            Ok(encode::encode_r(OPC_OP, rd, funct3, rs1, rs2, funct7))
        }

        // Register-immediate ALU.
        m @ ("addi" | "slti" | "sltiu" | "xori" | "ori" | "andi") => {
            expect_operands(line, stmt, 3, "3")?;
            let funct3 = match m {
                "addi" => 0b000,
                "slti" => 0b010,
                "sltiu" => 0b011,
                "xori" => 0b100,
                "ori" => 0b110,
                _ => 0b111,
            };
            let rd = register(line, ops[0])?;
            let rs1 = register(line, ops[1])?;
            let value = immediate(line, ops[2])?;
            let imm = check_range(line, value, encode::fits_i(value), "a 12-bit immediate")?;
            Ok(encode::encode_i(OPC_OP_IMM, rd, funct3, rs1, imm))
        }

        // Shift immediates. SRAI sets funct7 inside the I-immediate field.
        m @ ("slli" | "srli" | "srai") => {
            expect_operands(line, stmt, 3, "3")?;
            let funct3 = if m == "slli" { 0b001 } else { 0b101 };
            let rd = register(line, ops[0])?;
            let rs1 = register(line, ops[1])?;
            let value = immediate(line, ops[2])?;
            let shamt = check_range(line, value, encode::fits_shamt(value), "a shift amount")?;
            let imm = if m == "srai" { shamt | 0x400 } else { shamt };
            Ok(encode::encode_i(OPC_OP_IMM, rd, funct3, rs1, imm))
        }

        // Loads: rd, imm(rs1).
        m @ ("lb" | "lh" | "lw" | "lbu" | "lhu") => {
            expect_operands(line, stmt, 2, "2")?;
            let funct3 = match m {
                "lb" => 0b000,
                "lh" => 0b001,
                "lw" => 0b010,
                "lbu" => 0b100,
                _ => 0b101,
            };
            let rd = register(line, ops[0])?;
            let (value, rs1) = mem_operand(line, ops[1])?;
            let imm = check_range(line, value, encode::fits_i(value), "a load offset")?;
            Ok(encode::encode_i(OPC_LOAD, rd, funct3, rs1, imm))
        }

        // Stores: rs2, imm(rs1).
        m @ ("sb" | "sh" | "sw") => {
            expect_operands(line, stmt, 2, "2")?;
            let funct3 = match m {
                "sb" => 0b000,
                "sh" => 0b001,
                _ => 0b010,
            };
            let rs2 = register(line, ops[0])?;
            let (value, rs1) = mem_operand(line, ops[1])?;
            let imm = check_range(line, value, encode::fits_i(value), "a store offset")?;
            Ok(encode::encode_s(OPC_STORE, funct3, rs1, rs2, imm))
        }

        // Branches: rs1, rs2, label-or-offset.
        m @ ("beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu") => {
            expect_operands(line, stmt, 3, "3")?;
            let funct3 = match m {
                "beq" => 0b000,
                "bne" => 0b001,
                "blt" => 0b100,
                "bge" => 0b101,
                "bltu" => 0b110,
                _ => 0b111,
            };
            let rs1 = register(line, ops[0])?;
            let rs2 = register(line, ops[1])?;
            let value = resolve_target(line, addr, ops[2], symbols)?;
            let imm = check_range(line, value, encode::fits_b(value), "a branch offset")?;
            Ok(encode::encode_b(OPC_BRANCH, funct3, rs1, rs2, imm))
        }

        "jal" => {
            expect_operands(line, stmt, 2, "2")?;
            let rd = register(line, ops[0])?;
            let value = resolve_target(line, addr, ops[1], symbols)?;
            let imm = check_range(line, value, encode::fits_j(value), "a jump offset")?;
            Ok(encode::encode_j(OPC_JAL, rd, imm))
        }

        // The immediate may be omitted and defaults to 0.
        "jalr" => {
            if !(2..=3).contains(&ops.len()) {
                return Err(AsmError::OperandCount {
                    line,
                    mnemonic: stmt.mnemonic.clone(),
                    expected: "2 or 3",
                    found: ops.len(),
                });
            }
            let rd = register(line, ops[0])?;
            let rs1 = register(line, ops[1])?;
            let value = if ops.len() == 3 {
                immediate(line, ops[2])?
            } else {
                0
            };
            let imm = check_range(line, value, encode::fits_i(value), "a 12-bit immediate")?;
            Ok(encode::encode_i(OPC_JALR, rd, 0b000, rs1, imm))
        }

        m @ ("lui" | "auipc") => {
            expect_operands(line, stmt, 2, "2")?;
            let opcode = if m == "lui" { OPC_LUI } else { OPC_AUIPC };
            let rd = register(line, ops[0])?;
            let value = immediate(line, ops[1])?;
            check_range(line, value, encode::fits_u(value), "an upper immediate")?;
            Ok(encode::encode_u(opcode, rd, value as u32))
        }

        "ecall" => {
            expect_operands(line, stmt, 0, "0")?;
            Ok(ECALL_WORD)
        }

        "ebreak" => {
            expect_operands(line, stmt, 0, "0")?;
            Ok(EBREAK_WORD)
        }

        _ => Err(AsmError::UnknownMnemonic {
            line,
            mnemonic: stmt.mnemonic.clone(),
        }),
    }
}
