//! Round-trip tests: every assembled word, decoded and re-encoded from its
//! decoded fields, must reproduce the original word bit for bit. The B and
//! J formats scatter immediate bits non-monotonically, so these programs
//! lean on branches and jumps in both directions.

use rvlab_assembler::{assemble, encode};
use rvlab_executor::{DecodedInstr, InstrFormat};

/// Re-encode a decoded instruction from its fields alone.
fn reencode(instr: &DecodedInstr) -> u32 {
    match instr.format {
        InstrFormat::R => encode::encode_r(
            instr.opcode,
            instr.rd,
            instr.funct3,
            instr.rs1,
            instr.rs2,
            instr.funct7,
        ),
        InstrFormat::I => encode::encode_i(instr.opcode, instr.rd, instr.funct3, instr.rs1, instr.imm),
        InstrFormat::S => encode::encode_s(instr.opcode, instr.funct3, instr.rs1, instr.rs2, instr.imm),
        InstrFormat::B => encode::encode_b(instr.opcode, instr.funct3, instr.rs1, instr.rs2, instr.imm),
        InstrFormat::U => encode::encode_u(instr.opcode, instr.rd, (instr.imm as u32) >> 12),
        InstrFormat::J => encode::encode_j(instr.opcode, instr.rd, instr.imm),
    }
}

fn assert_roundtrip(source: &str) {
    let words = assemble(source).unwrap();
    for (i, &word) in words.iter().enumerate() {
        let instr = DecodedInstr::decode(word);
        assert_eq!(instr.bits, word);
        assert_eq!(
            reencode(&instr),
            word,
            "word {i} ({:#010x}, {}) did not round-trip",
            word,
            instr.mnemonic()
        );
    }
}

#[test]
fn roundtrip_every_mnemonic() {
    assert_roundtrip(
        "start:\n\
         add x1, x2, x3\n\
         sub x4, x5, x6\n\
         and x7, x8, x9\n\
         or x10, x11, x12\n\
         xor x13, x14, x15\n\
         sll x16, x17, x18\n\
         srl x19, x20, x21\n\
         sra x22, x23, x24\n\
         slt x25, x26, x27\n\
         sltu x28, x29, x30\n\
         addi x1, x2, -2048\n\
         andi x3, x4, 2047\n\
         ori x5, x6, 0xFF\n\
         xori x7, x8, -1\n\
         slti x9, x10, -5\n\
         sltiu x11, x12, 5\n\
         slli x13, x14, 31\n\
         srli x15, x16, 1\n\
         srai x17, x18, 15\n\
         lb x1, -1(x2)\n\
         lh x3, 2(x4)\n\
         lw x5, 4(x6)\n\
         lbu x7, 0(x8)\n\
         lhu x9, 6(x10)\n\
         sb x1, -1(x2)\n\
         sh x3, 2(x4)\n\
         sw x5, 4(x6)\n\
         beq x1, x2, start\n\
         bne x3, x4, start\n\
         blt x5, x6, end\n\
         bge x7, x8, end\n\
         bltu x9, x10, start\n\
         bgeu x11, x12, end\n\
         jal x1, start\n\
         jal x0, end\n\
         jalr x1, x2, -4\n\
         lui x1, 0xFFFFF\n\
         lui x2, 0\n\
         auipc x3, 0x12345\n\
         end: ecall\n\
         ebreak\n",
    );
}

#[test]
fn roundtrip_branch_offset_extremes() {
    // Offsets that flip bit 11 and bit 12 of the B-immediate, the classic
    // mis-scatter cases.
    for offset in [-4096i32, -2048, -16, -4, 4, 16, 2046, 2048, 4094] {
        let word = encode::encode_b(0b1100011, 0b001, 12, 0, offset);
        let instr = DecodedInstr::decode(word);
        assert_eq!(instr.imm, offset, "B-immediate {offset} mis-decoded");
        assert_eq!(reencode(&instr), word);
    }
}

#[test]
fn roundtrip_jump_offset_extremes() {
    for offset in [-1048576i32, -4096, -2048, -16, 4, 2048, 4096, 1048574] {
        let word = encode::encode_j(0b1101111, 1, offset);
        let instr = DecodedInstr::decode(word);
        assert_eq!(instr.imm, offset, "J-immediate {offset} mis-decoded");
        assert_eq!(reencode(&instr), word);
    }
}

#[test]
fn roundtrip_fibonacci() {
    assert_roundtrip(
        "addi x10, x0, 0\n\
         addi x11, x0, 1\n\
         addi x12, x0, 10\n\
         loop:\n\
         add x13, x10, x11\n\
         addi x10, x11, 0\n\
         addi x11, x13, 0\n\
         addi x12, x12, -1\n\
         bne x12, x0, loop\n\
         ecall\n",
    );
}
