//! Source-line parsing: comments, labels, mnemonics, operands, register
//! names, and immediate literals.
//!
//! One statement per line. A line is blank, a comment (`# ...`), a label
//! (`ident:`), an instruction, or a label followed by an instruction.
//! Mnemonics are case-insensitive; register names and labels are
//! case-sensitive.

use crate::error::AsmError;

/// A source line split into its label and statement, if any.
#[derive(Debug, PartialEq, Eq)]
pub struct Line<'a> {
    pub number: usize,
    pub label: Option<&'a str>,
    pub stmt: Option<Stmt<'a>>,
}

/// A parsed instruction statement.
#[derive(Debug, PartialEq, Eq)]
pub struct Stmt<'a> {
    /// Mnemonic, lowercased.
    pub mnemonic: String,
    pub operands: Vec<&'a str>,
}

/// Identifier rule for labels: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split one raw source line (1-based `number`) into label and statement.
pub fn split_line(number: usize, raw: &str) -> Result<Line<'_>, AsmError> {
    // Comments run from `#` to end of line.
    let code = raw.split('#').next().unwrap_or("").trim();

    let (label, rest) = match code.find(':') {
        Some(pos) => {
            let label = code[..pos].trim();
            if !is_ident(label) {
                return Err(AsmError::Syntax {
                    line: number,
                    msg: format!("invalid label `{label}`"),
                });
            }
            (Some(label), code[pos + 1..].trim())
        }
        None => (None, code),
    };

    let stmt = if rest.is_empty() {
        None
    } else {
        // Operands may be separated by commas, whitespace, or both.
        let mut parts = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let mnemonic = parts.next().map(|m| m.to_ascii_lowercase());
        mnemonic.map(|mnemonic| Stmt {
            mnemonic,
            operands: parts.collect(),
        })
    };

    Ok(Line {
        number,
        label,
        stmt,
    })
}

/// Parse a register name: `x0..x31` or an ABI name (`fp` aliases `s0`).
pub fn parse_register(name: &str) -> Option<u8> {
    let n = match name {
        "x0" | "zero" => 0,
        "x1" | "ra" => 1,
        "x2" | "sp" => 2,
        "x3" | "gp" => 3,
        "x4" | "tp" => 4,
        "x5" | "t0" => 5,
        "x6" | "t1" => 6,
        "x7" | "t2" => 7,
        "x8" | "s0" | "fp" => 8,
        "x9" | "s1" => 9,
        "x10" | "a0" => 10,
        "x11" | "a1" => 11,
        "x12" | "a2" => 12,
        "x13" | "a3" => 13,
        "x14" | "a4" => 14,
        "x15" | "a5" => 15,
        "x16" | "a6" => 16,
        "x17" | "a7" => 17,
        "x18" | "s2" => 18,
        "x19" | "s3" => 19,
        "x20" | "s4" => 20,
        "x21" | "s5" => 21,
        "x22" | "s6" => 22,
        "x23" | "s7" => 23,
        "x24" | "s8" => 24,
        "x25" | "s9" => 25,
        "x26" | "s10" => 26,
        "x27" | "s11" => 27,
        "x28" | "t3" => 28,
        "x29" | "t4" => 29,
        "x30" | "t5" => 30,
        "x31" | "t6" => 31,
        _ => return None,
    };
    Some(n)
}

/// Parse an immediate literal: signed decimal, `0x` hex, or `0b` binary.
pub fn parse_immediate(s: &str) -> Option<i64> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        body.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Split a load/store memory operand `imm(reg)` into its two halves.
pub fn split_mem_operand(s: &str) -> Option<(&str, &str)> {
    let open = s.find('(')?;
    let rest = &s[open + 1..];
    let close = rest.find(')')?;
    if !rest[close + 1..].trim().is_empty() {
        return None;
    }
    Some((s[..open].trim(), rest[..close].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comment_lines() {
        let line = split_line(1, "   # just a comment").unwrap();
        assert_eq!(line.label, None);
        assert_eq!(line.stmt, None);
        let line = split_line(2, "").unwrap();
        assert_eq!(line.stmt, None);
    }

    #[test]
    fn test_plain_instruction() {
        let line = split_line(1, "addi x1, x0, 10  # set x1").unwrap();
        let stmt = line.stmt.unwrap();
        assert_eq!(stmt.mnemonic, "addi");
        assert_eq!(stmt.operands, vec!["x1", "x0", "10"]);
    }

    #[test]
    fn test_mnemonic_case_insensitive() {
        let line = split_line(1, "ADDI x1, x0, 10").unwrap();
        assert_eq!(line.stmt.unwrap().mnemonic, "addi");
    }

    #[test]
    fn test_label_alone() {
        let line = split_line(1, "loop:").unwrap();
        assert_eq!(line.label, Some("loop"));
        assert_eq!(line.stmt, None);
    }

    #[test]
    fn test_label_with_instruction() {
        let line = split_line(1, "target: ecall").unwrap();
        assert_eq!(line.label, Some("target"));
        assert_eq!(line.stmt.unwrap().mnemonic, "ecall");
    }

    #[test]
    fn test_invalid_label() {
        assert!(split_line(1, "1st:").is_err());
        assert!(split_line(1, "a b:").is_err());
    }

    #[test]
    fn test_operands_without_commas() {
        let line = split_line(1, "add x3 x1 x2").unwrap();
        assert_eq!(line.stmt.unwrap().operands, vec!["x3", "x1", "x2"]);
    }

    #[test]
    fn test_register_names() {
        assert_eq!(parse_register("x0"), Some(0));
        assert_eq!(parse_register("zero"), Some(0));
        assert_eq!(parse_register("sp"), Some(2));
        assert_eq!(parse_register("fp"), Some(8));
        assert_eq!(parse_register("s0"), Some(8));
        assert_eq!(parse_register("a7"), Some(17));
        assert_eq!(parse_register("t6"), Some(31));
        assert_eq!(parse_register("x31"), Some(31));
        assert_eq!(parse_register("x32"), None);
        // Register names are case-sensitive.
        assert_eq!(parse_register("X1"), None);
        assert_eq!(parse_register("SP"), None);
    }

    #[test]
    fn test_immediates() {
        assert_eq!(parse_immediate("10"), Some(10));
        assert_eq!(parse_immediate("-1"), Some(-1));
        assert_eq!(parse_immediate("+4"), Some(4));
        assert_eq!(parse_immediate("0x10"), Some(16));
        assert_eq!(parse_immediate("-0x10"), Some(-16));
        assert_eq!(parse_immediate("0b1010"), Some(10));
        assert_eq!(parse_immediate("abc"), None);
        assert_eq!(parse_immediate(""), None);
        assert_eq!(parse_immediate("0x"), None);
    }

    #[test]
    fn test_mem_operand() {
        assert_eq!(split_mem_operand("0(x1)"), Some(("0", "x1")));
        assert_eq!(split_mem_operand("-4(sp)"), Some(("-4", "sp")));
        assert_eq!(split_mem_operand("0x10(t0)"), Some(("0x10", "t0")));
        assert_eq!(split_mem_operand("x1"), None);
        assert_eq!(split_mem_operand("0(x1)x"), None);
    }

    #[test]
    fn test_is_ident() {
        assert!(is_ident("loop"));
        assert!(is_ident("_start"));
        assert!(is_ident("L1"));
        assert!(!is_ident("1st"));
        assert!(!is_ident(""));
        assert!(!is_ident("a-b"));
    }
}
