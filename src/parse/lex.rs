//! Tokenizing MIPS assembly.
//!
//! This module holds the tokens that characterize MIPS assembly ([`Token`]).
//! It is used by the second assembler pass to break a cleaned source line
//! into registers, immediates, and punctuation before encoding.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::ast::Reg;

/// A unit of information in MIPS source code.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+", skip r"#[^\n]*", error = LexErr)]
pub enum Token {
    // These regexes span over tokens that are technically invalid
    // (e.g., `123abc` matches the integer regex even though it shouldn't).
    // This is intended. Each regex collects one discernable unit
    // and validates it in its callback.

    /// An integer literal, decimal or `0x` hex, optionally negated
    /// (e.g. `9`, `-14`, `0x7F`).
    #[regex(r"-?\d\w*", lex_int)]
    Int(i64),

    /// A register (e.g. `$t0`, `$sp`, `$31`).
    #[regex(r"\$\w+", lex_reg)]
    Reg(Reg),

    /// An identifier: a mnemonic or a label name.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A directive (e.g. `.text`, `.data`).
    #[regex(r"\.[A-Za-z_]\w*", |lx| lx.slice()[1..].to_string())]
    Directive(String),

    /// A colon, which ends a label definition.
    #[token(":")]
    Colon,

    /// A comma, which delineates operands of an instruction.
    #[token(",")]
    Comma,

    /// An opening parenthesis (base register of an address operand).
    #[token("(")]
    LParen,

    /// A closing parenthesis.
    #[token(")")]
    RParen,
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Integer literal does not fit in 64 bits.
    IntTooLarge,
    /// Integer literal has invalid decimal digits.
    InvalidNumeric,
    /// Hex literal (starting with 0x) has invalid hex digits.
    InvalidHex,
    /// Hex literal (starting with 0x) has no digits after the prefix.
    InvalidHexEmpty,
    /// Int parsing failed but the reason why is unknown.
    UnknownIntErr,
    /// Token had the format `$name`, but `name` is not a register.
    InvalidReg,
    /// A symbol was used which is not allowed in MIPS assembly files.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::IntTooLarge => f.write_str("integer literal is too large"),
            LexErr::InvalidNumeric => f.write_str("invalid decimal literal"),
            LexErr::InvalidHex => f.write_str("invalid hex literal"),
            LexErr::InvalidHexEmpty => f.write_str("invalid hex literal"),
            LexErr::UnknownIntErr => f.write_str("could not parse integer"),
            LexErr::InvalidReg => f.write_str("invalid register"),
            LexErr::InvalidSymbol => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::IntTooLarge => Some("integer literals must fit in 64 bits before field truncation".into()),
            LexErr::InvalidNumeric => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::InvalidHex => Some("a hex literal starts with '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidHexEmpty => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::UnknownIntErr => None,
            LexErr::InvalidReg => Some("registers are $zero, $at, $v0-$v1, $a0-$a3, $t0-$t9, $s0-$s7, $k0-$k1, $gp, $sp, $fp, $ra (or $0-$31)".into()),
            LexErr::InvalidSymbol => Some("this char does not occur in any token in MIPS assembly".into()),
        }
    }
}

fn convert_int_error(e: &IntErrorKind, invalid_digits_err: LexErr, empty_err: LexErr) -> LexErr {
    match e {
        IntErrorKind::Empty => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow => LexErr::IntTooLarge,
        IntErrorKind::NegOverflow => LexErr::IntTooLarge,
        _ => LexErr::UnknownIntErr,
    }
}

fn lex_int(lx: &Lexer<'_, Token>) -> Result<i64, LexErr> {
    let (neg, digits) = match lx.slice().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lx.slice()),
    };

    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty))?,
        None => digits
            .parse::<i64>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidNumeric))?,
    };

    Ok(if neg { -value } else { value })
}

fn lex_reg(lx: &Lexer<'_, Token>) -> Result<Reg, LexErr> {
    Reg::from_name(&lx.slice()[1..]).ok_or(LexErr::InvalidReg)
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use super::{LexErr, Token};
    use crate::ast::reg_consts;

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }

    #[test]
    fn test_lex_rtype() {
        let mut tokens = Token::lexer("add $t0, $t1, $t2");
        assert_eq!(tokens.next(), Some(Ok(ident("add"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::T1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::T2))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_lex_mem_operand() {
        let mut tokens = Token::lexer("lw $t0, -100($sp)");
        assert_eq!(tokens.next(), Some(Ok(ident("lw"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(-100))));
        assert_eq!(tokens.next(), Some(Ok(Token::LParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::SP))));
        assert_eq!(tokens.next(), Some(Ok(Token::RParen)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_lex_ints() {
        let mut tokens = Token::lexer("0x7F 0X10 15 -15 -0x10");
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0x7f))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(0x10))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(15))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(-15))));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(-0x10))));
        assert_eq!(tokens.next(), None);

        let mut tokens = Token::lexer("123abc");
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidNumeric)));
        let mut tokens = Token::lexer("0xGG");
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidHex)));
        let mut tokens = Token::lexer("0x");
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidHexEmpty)));
    }

    #[test]
    fn test_lex_bad_reg() {
        let mut tokens = Token::lexer("$q9");
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidReg)));
        let mut tokens = Token::lexer("$32");
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidReg)));
    }

    #[test]
    fn test_lex_comment_and_label() {
        let mut tokens = Token::lexer("loop: addi $t0, $t0, 1 # bump");
        assert_eq!(tokens.next(), Some(Ok(ident("loop"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Colon)));
        assert_eq!(tokens.next(), Some(Ok(ident("addi"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(reg_consts::T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Int(1))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_lex_directive() {
        let mut tokens = Token::lexer(".text");
        assert_eq!(tokens.next(), Some(Ok(Token::Directive("text".to_string()))));
        assert_eq!(tokens.next(), None);
    }
}
