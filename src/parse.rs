//! Breaking MIPS assembly source into lines, labels, and operand tokens.
//!
//! The first assembler pass uses the line-level helpers here
//! ([`strip_comment`], [`split_label`]) to clean the source and find label
//! definitions; the second pass uses [`tokenize`] and the [`Operands`] cursor
//! to check and reorder each instruction's operands before encoding.

pub mod lex;

use std::collections::VecDeque;

use logos::Logos;

use crate::ast::Reg;
use self::lex::{LexErr, Token};

/// Removes a trailing `#` comment from a line and trims surrounding
/// whitespace.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
    .trim()
}

/// Splits a leading `name:` label definition off a line.
///
/// Returns the label name and the (trimmed) remainder of the line, or `None`
/// if the line does not start with a label definition.
///
/// ```
/// use mipsim::parse::split_label;
///
/// assert_eq!(split_label("loop: addi $t0, $t0, 1"), Some(("loop", "addi $t0, $t0, 1")));
/// assert_eq!(split_label("done:"), Some(("done", "")));
/// assert_eq!(split_label("addi $t0, $t0, 1"), None);
/// ```
pub fn split_label(line: &str) -> Option<(&str, &str)> {
    let (head, rest) = line.split_once(':')?;
    let head = head.trim_end();
    is_ident(head).then_some((head, rest.trim_start()))
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Tokenizes a single cleaned source line.
pub fn tokenize(line: &str) -> Result<Vec<Token>, LexErr> {
    Token::lexer(line).collect()
}

/// A branch or jump target operand: either a label to resolve against the
/// symbol table, or a numeric value used as-is.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Target {
    /// A label reference.
    Label(String),
    /// A literal value (a word offset for branches, an absolute address for jumps).
    Imm(i64),
}

/// Kinds of errors that can occur from reading an instruction's operands.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OperandErr {
    /// Expected a register operand.
    ExpectedReg,
    /// Expected an immediate operand.
    ExpectedImm,
    /// Expected a label or immediate operand.
    ExpectedTarget,
    /// Expected a comma between operands.
    ExpectedComma,
    /// Expected a parenthesized base register after the offset.
    ExpectedLParen,
    /// Expected a closing parenthesis after the base register.
    ExpectedRParen,
    /// There were leftover tokens after the last operand.
    ExpectedEnd,
}
impl std::fmt::Display for OperandErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperandErr::ExpectedReg => f.write_str("expected a register operand"),
            OperandErr::ExpectedImm => f.write_str("expected an immediate operand"),
            OperandErr::ExpectedTarget => f.write_str("expected a label or immediate operand"),
            OperandErr::ExpectedComma => f.write_str("expected a comma between operands"),
            OperandErr::ExpectedLParen => f.write_str("expected a parenthesized base register"),
            OperandErr::ExpectedRParen => f.write_str("expected a closing parenthesis"),
            OperandErr::ExpectedEnd => f.write_str("instruction has extra operands"),
        }
    }
}
impl std::error::Error for OperandErr {}
impl crate::err::Error for OperandErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            OperandErr::ExpectedReg => Some("register operands are written with a $ sigil, like $t0".into()),
            OperandErr::ExpectedLParen | OperandErr::ExpectedRParen => {
                Some("load/store addresses are written offset($base), like 4($sp)".into())
            }
            OperandErr::ExpectedEnd => Some("remove the trailing operands".into()),
            _ => None,
        }
    }
}

/// A cursor over an instruction's operand tokens.
///
/// Operands are comma-separated; each accessor consumes one operand (and the
/// comma before it, when it is not the first). [`Operands::finish`] asserts
/// the whole list was consumed.
#[derive(Debug)]
pub struct Operands {
    toks: VecDeque<Token>,
    first: bool,
}

impl Operands {
    /// Creates a cursor over the tokens following a mnemonic.
    pub fn new(toks: impl IntoIterator<Item = Token>) -> Self {
        Operands { toks: toks.into_iter().collect(), first: true }
    }

    /// Whether any operand tokens remain.
    pub fn has_more(&self) -> bool {
        !self.toks.is_empty()
    }

    fn sep(&mut self) -> Result<(), OperandErr> {
        if std::mem::take(&mut self.first) {
            return Ok(());
        }
        match self.toks.pop_front() {
            Some(Token::Comma) => Ok(()),
            _ => Err(OperandErr::ExpectedComma),
        }
    }

    /// Reads a register operand.
    pub fn reg(&mut self) -> Result<Reg, OperandErr> {
        self.sep()?;
        match self.toks.pop_front() {
            Some(Token::Reg(r)) => Ok(r),
            _ => Err(OperandErr::ExpectedReg),
        }
    }

    /// Reads an immediate operand.
    pub fn imm(&mut self) -> Result<i64, OperandErr> {
        self.sep()?;
        match self.toks.pop_front() {
            Some(Token::Int(v)) => Ok(v),
            _ => Err(OperandErr::ExpectedImm),
        }
    }

    /// Reads a branch/jump target operand (label or immediate).
    pub fn target(&mut self) -> Result<Target, OperandErr> {
        self.sep()?;
        match self.toks.pop_front() {
            Some(Token::Ident(name)) => Ok(Target::Label(name)),
            Some(Token::Int(v)) => Ok(Target::Imm(v)),
            _ => Err(OperandErr::ExpectedTarget),
        }
    }

    /// Reads an `offset($base)` address operand.
    pub fn mem(&mut self) -> Result<(i64, Reg), OperandErr> {
        self.sep()?;
        let off = match self.toks.pop_front() {
            Some(Token::Int(v)) => v,
            _ => return Err(OperandErr::ExpectedImm),
        };
        match self.toks.pop_front() {
            Some(Token::LParen) => {}
            _ => return Err(OperandErr::ExpectedLParen),
        }
        let base = match self.toks.pop_front() {
            Some(Token::Reg(r)) => r,
            _ => return Err(OperandErr::ExpectedReg),
        };
        match self.toks.pop_front() {
            Some(Token::RParen) => Ok((off, base)),
            _ => Err(OperandErr::ExpectedRParen),
        }
    }

    /// Asserts that every operand token was consumed.
    pub fn finish(mut self) -> Result<(), OperandErr> {
        match self.toks.pop_front() {
            None => Ok(()),
            Some(_) => Err(OperandErr::ExpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_comment, tokenize, OperandErr, Operands, Target};
    use crate::ast::reg_consts;

    fn operands(src: &str) -> Operands {
        Operands::new(tokenize(src).unwrap())
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("  add $t0, $t1, $t2 # sum"), "add $t0, $t1, $t2");
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment("   "), "");
    }

    #[test]
    fn test_operand_cursor() {
        let mut ops = operands("$t0, $t1, 5");
        assert_eq!(ops.reg(), Ok(reg_consts::T0));
        assert_eq!(ops.reg(), Ok(reg_consts::T1));
        assert_eq!(ops.imm(), Ok(5));
        assert_eq!(ops.finish(), Ok(()));
    }

    #[test]
    fn test_mem_operand() {
        let mut ops = operands("$t0, -8($sp)");
        assert_eq!(ops.reg(), Ok(reg_consts::T0));
        assert_eq!(ops.mem(), Ok((-8, reg_consts::SP)));
        assert_eq!(ops.finish(), Ok(()));

        let mut ops = operands("$t0, -8");
        ops.reg().unwrap();
        assert_eq!(ops.mem(), Err(OperandErr::ExpectedLParen));
    }

    #[test]
    fn test_target_operand() {
        let mut ops = operands("$t0, loop");
        ops.reg().unwrap();
        assert_eq!(ops.target(), Ok(Target::Label("loop".to_string())));

        let mut ops = operands("$t0, -2");
        ops.reg().unwrap();
        assert_eq!(ops.target(), Ok(Target::Imm(-2)));
    }

    #[test]
    fn test_missing_comma() {
        let mut ops = operands("$t0 $t1");
        assert_eq!(ops.reg(), Ok(reg_consts::T0));
        assert_eq!(ops.reg(), Err(OperandErr::ExpectedComma));
    }

    #[test]
    fn test_trailing_tokens() {
        let mut ops = operands("$t0, $t1, $t2, $t3");
        ops.reg().unwrap();
        ops.reg().unwrap();
        ops.reg().unwrap();
        assert_eq!(ops.finish(), Err(OperandErr::ExpectedEnd));
    }
}
