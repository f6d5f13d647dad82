//! Assembling MIPS source text into machine words.
//!
//! This module converts assembly source into an [`ObjectFile`] that can be
//! loaded into the simulator and executed.
//!
//! The assembler module notably consists of:
//! - [`assemble`]: the main function, which runs both assembler passes
//! - [`SymbolTable`]: a struct holding the label addresses computed by the first pass
//! - [`ObjectFile`]: a struct holding the encoded words (and the source text of
//!   each word, kept for diagnostics)
//!
//! The first pass strips comments, tracks `.text`/`.data` sections, records
//! label addresses, and retains the instruction lines; the second pass
//! tokenizes each retained line and packs it into a 32-bit word using the
//! mnemonic's [`InstrSpec`].
//!
//! [`InstrSpec`]: crate::ast::InstrSpec

use std::collections::HashMap;

use crate::ast::{reg_consts, InstrSpec, Mnemonic, OperandForm, Reg};
use crate::parse::lex::{LexErr, Token};
use crate::parse::{split_label, strip_comment, tokenize, OperandErr, Operands, Target};
use crate::sim::mem::TEXT_START;

/// Assembles MIPS assembly source code into an object file.
///
/// # Example
/// ```
/// use mipsim::asm::assemble;
///
/// let obj = assemble("
///     one: addi $t0, $zero, 1
///          add $t1, $t0, $t0
/// ").unwrap();
///
/// assert_eq!(obj.words().len(), 2);
/// assert_eq!(obj.symbol_table().lookup_label("one"), Some(0x0040_0000));
/// ```
pub fn assemble(src: &str) -> Result<ObjectFile, AsmErr> {
    let (lines, sym) = SymbolTable::new(src);
    ObjectFile::new(lines, sym)
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with line information attached.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AsmErrKind {
    /// A line could not be tokenized.
    Lex(LexErr),
    /// A line did not start with an instruction mnemonic.
    ExpectedMnemonic,
    /// The mnemonic is not one the assembler knows.
    UnknownMnemonic(String),
    /// A label operand was never defined.
    CouldNotFindLabel(String),
    /// The operand list did not match the mnemonic's form.
    BadOperand(OperandErr),
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(e) => e.fmt(f),
            Self::ExpectedMnemonic => f.write_str("expected an instruction mnemonic"),
            Self::UnknownMnemonic(m) => write!(f, "unknown mnemonic '{m}'"),
            Self::CouldNotFindLabel(l) => write!(f, "undefined label '{l}'"),
            Self::BadOperand(e) => e.fmt(f),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The 1-indexed source line the error occurred on.
    pub line: usize,
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AsmErrKind::Lex(e) => Some(e),
            AsmErrKind::BadOperand(e) => Some(e),
            _ => None,
        }
    }
}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match &self.kind {
            AsmErrKind::Lex(e) => crate::err::Error::help(e),
            AsmErrKind::ExpectedMnemonic => {
                Some("every text line must be an instruction, optionally preceded by 'label:'".into())
            }
            AsmErrKind::UnknownMnemonic(_) => None,
            AsmErrKind::CouldNotFindLabel(_) => {
                Some("labels are defined by writing 'name:' before an instruction".into())
            }
            AsmErrKind::BadOperand(e) => crate::err::Error::help(e),
        }
    }
}

/// A retained instruction line: its cleaned text, the source line it came
/// from, and the byte address its word will occupy.
#[derive(Debug, Clone)]
struct SrcLine {
    text: String,
    line_no: usize,
    addr: u32,
}

/// The symbol table created in the first assembler pass,
/// mapping each label to the byte address of the next retained instruction.
///
/// Labels are case-sensitive; defining the same label twice silently keeps
/// the last definition.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct SymbolTable {
    label_map: HashMap<String, u32>,
}

impl SymbolTable {
    /// Runs the first assembler pass over the source.
    ///
    /// This strips comments and blank lines, consumes `.text`/`.data`
    /// directive lines (when no section directive appears anywhere, every
    /// non-empty line is treated as text), records label addresses, and
    /// returns the retained instruction lines alongside the table.
    fn new(src: &str) -> (Vec<SrcLine>, SymbolTable) {
        let has_sections = src
            .lines()
            .map(strip_comment)
            .any(|l| l == ".text" || l == ".data");

        let mut in_text = !has_sections;
        let mut lines = Vec::new();
        let mut label_map = HashMap::new();
        let mut lc = TEXT_START;

        for (idx, raw) in src.lines().enumerate() {
            let mut line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            match line {
                ".text" => {
                    in_text = true;
                    continue;
                }
                ".data" => {
                    in_text = false;
                    continue;
                }
                _ => {}
            }
            if !in_text {
                continue;
            }

            while let Some((label, rest)) = split_label(line) {
                label_map.insert(label.to_string(), lc);
                line = rest;
            }
            if line.is_empty() {
                continue;
            }

            lines.push(SrcLine { text: line.to_string(), line_no: idx + 1, addr: lc });
            lc += 4;
        }

        (lines, SymbolTable { label_map })
    }

    /// Gets the byte address of a given label (if it exists).
    ///
    /// ## Example
    /// ```
    /// use mipsim::asm::assemble;
    ///
    /// let obj = assemble("
    ///     loop: addi $t0, $t0, 1
    ///           bne $t0, $t1, loop
    ///     done: jr $ra
    /// ").unwrap();
    ///
    /// let sym = obj.symbol_table();
    /// assert_eq!(sym.lookup_label("loop"), Some(0x0040_0000));
    /// assert_eq!(sym.lookup_label("done"), Some(0x0040_0008));
    /// assert_eq!(sym.lookup_label("loop_de_loop"), None);
    /// ```
    pub fn lookup_label(&self, label: &str) -> Option<u32> {
        self.label_map.get(label).copied()
    }

    /// Gets an iterable of the mapping from labels to addresses.
    pub fn label_iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.label_map.iter().map(|(label, &addr)| (&**label, addr))
    }
}

/// An object file.
///
/// This is the final product after assembly source code is fully assembled.
/// It holds the encoded instruction words in order, the cleaned source text
/// of each word (kept for diagnostics), and the symbol table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ObjectFile {
    words: Vec<u32>,
    src: Vec<String>,
    sym: SymbolTable,
}

impl ObjectFile {
    /// Runs the second assembler pass, encoding every retained line.
    fn new(lines: Vec<SrcLine>, sym: SymbolTable) -> Result<Self, AsmErr> {
        let mut words = Vec::with_capacity(lines.len());
        let mut src = Vec::with_capacity(lines.len());

        for line in lines {
            let word = encode_line(&line.text, line.addr, &sym)
                .map_err(|kind| AsmErr { kind, line: line.line_no })?;
            words.push(word);
            src.push(line.text);
        }

        Ok(ObjectFile { words, src, sym })
    }

    /// The encoded instruction words, in source order.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// The cleaned source text of the word at the given index.
    pub fn source_line(&self, index: usize) -> Option<&str> {
        self.src.get(index).map(|s| s.as_str())
    }

    /// The symbol table built by the first pass.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.sym
    }
}

/// Encodes one cleaned instruction line into a machine word.
fn encode_line(text: &str, addr: u32, sym: &SymbolTable) -> Result<u32, AsmErrKind> {
    let mut toks = tokenize(text).map_err(AsmErrKind::Lex)?.into_iter();
    let name = match toks.next() {
        Some(Token::Ident(name)) => name,
        _ => return Err(AsmErrKind::ExpectedMnemonic),
    };
    let m = Mnemonic::from_name(&name).ok_or(AsmErrKind::UnknownMnemonic(name))?;

    encode_instr(m, Operands::new(toks), addr, sym)
}

/// Packs a mnemonic and its operand list into a word, reordering the
/// source operands into the canonical field order for the mnemonic's form.
fn encode_instr(
    m: Mnemonic,
    mut ops: Operands,
    addr: u32,
    sym: &SymbolTable,
) -> Result<u32, AsmErrKind> {
    use reg_consts::{RA, ZERO};

    let InstrSpec { form, opcode, funct } = m.spec();

    let word = match form {
        OperandForm::DstSrcSrc => {
            let rd = ops.reg()?;
            let rs = ops.reg()?;
            let rt = ops.reg()?;
            r_type(rs, rt, rd, 0, funct)
        }
        OperandForm::ShiftImm => {
            let rd = ops.reg()?;
            let rt = ops.reg()?;
            let sh = ops.imm()?;
            r_type(ZERO, rt, rd, sh as u8 & 0x1f, funct)
        }
        OperandForm::ShiftReg => {
            let rd = ops.reg()?;
            let rt = ops.reg()?;
            let rs = ops.reg()?;
            r_type(rs, rt, rd, 0, funct)
        }
        OperandForm::SrcSrc => {
            let rs = ops.reg()?;
            let rt = ops.reg()?;
            r_type(rs, rt, ZERO, 0, funct)
        }
        OperandForm::DstOnly => r_type(ZERO, ZERO, ops.reg()?, 0, funct),
        OperandForm::SrcOnly => r_type(ops.reg()?, ZERO, ZERO, 0, funct),
        OperandForm::Jalr => {
            // `jalr $rs` links through $ra; `jalr $rd, $rs` picks the link register
            let first = ops.reg()?;
            let (rd, rs) = match ops.has_more() {
                true => (first, ops.reg()?),
                false => (RA, first),
            };
            r_type(rs, ZERO, rd, 0, funct)
        }
        OperandForm::Bare => r_type(ZERO, ZERO, ZERO, 0, funct),
        OperandForm::SrcBranch => {
            // the rt field carries the branch condition code
            let rs = ops.reg()?;
            let off = branch_offset(ops.target()?, addr, sym)?;
            i_type(opcode, rs, Reg(funct), off)
        }
        OperandForm::SrcTrapImm => {
            let rs = ops.reg()?;
            let imm = ops.imm()?;
            i_type(opcode, rs, Reg(funct), imm as u16)
        }
        OperandForm::CmpBranch => {
            let rs = ops.reg()?;
            let rt = ops.reg()?;
            let off = branch_offset(ops.target()?, addr, sym)?;
            i_type(opcode, rs, rt, off)
        }
        OperandForm::ArithImm => {
            let rt = ops.reg()?;
            let rs = ops.reg()?;
            let imm = ops.imm()?;
            i_type(opcode, rs, rt, imm as u16)
        }
        OperandForm::LoadUpper => {
            let rt = ops.reg()?;
            let imm = ops.imm()?;
            i_type(opcode, ZERO, rt, imm as u16)
        }
        OperandForm::Mem => {
            let rt = ops.reg()?;
            let (off, base) = ops.mem()?;
            i_type(opcode, base, rt, off as u16)
        }
        OperandForm::Jump => {
            let field = jump_target(ops.target()?, sym)?;
            j_type(opcode, field)
        }
    };

    ops.finish()?;
    Ok(word)
}

impl From<OperandErr> for AsmErrKind {
    fn from(e: OperandErr) -> Self {
        AsmErrKind::BadOperand(e)
    }
}

/// Resolves a branch target into the signed 16-bit word offset
/// `(label - (addr + 4)) / 4`. Numeric targets are used verbatim.
fn branch_offset(target: Target, addr: u32, sym: &SymbolTable) -> Result<u16, AsmErrKind> {
    match target {
        Target::Imm(v) => Ok(v as u16),
        Target::Label(name) => {
            let laddr = sym
                .lookup_label(&name)
                .ok_or(AsmErrKind::CouldNotFindLabel(name))?;
            let words = (i64::from(laddr) - (i64::from(addr) + 4)) / 4;
            Ok(words as u16)
        }
    }
}

/// Resolves a jump target into the word-shifted 26-bit field.
fn jump_target(target: Target, sym: &SymbolTable) -> Result<u32, AsmErrKind> {
    let addr = match target {
        Target::Imm(v) => v as u32,
        Target::Label(name) => sym
            .lookup_label(&name)
            .ok_or(AsmErrKind::CouldNotFindLabel(name))?,
    };
    Ok((addr >> 2) & 0x03ff_ffff)
}

fn r_type(rs: Reg, rt: Reg, rd: Reg, shamt: u8, funct: u8) -> u32 {
    u32::from(rs.reg_no()) << 21
        | u32::from(rt.reg_no()) << 16
        | u32::from(rd.reg_no()) << 11
        | u32::from(shamt & 0x1f) << 6
        | u32::from(funct & 0x3f)
}

fn i_type(opcode: u8, rs: Reg, rt: Reg, imm: u16) -> u32 {
    u32::from(opcode) << 26
        | u32::from(rs.reg_no()) << 21
        | u32::from(rt.reg_no()) << 16
        | u32::from(imm)
}

fn j_type(opcode: u8, field: u32) -> u32 {
    u32::from(opcode) << 26 | (field & 0x03ff_ffff)
}

#[cfg(test)]
mod tests {
    use super::{assemble, AsmErr, AsmErrKind, ObjectFile};
    use crate::parse::OperandErr;

    fn assert_asm_fail(r: Result<ObjectFile, AsmErr>, kind: AsmErrKind) {
        assert_eq!(r.unwrap_err().kind, kind);
    }
    fn one_word(src: &str) -> u32 {
        let obj = assemble(src).unwrap();
        assert_eq!(obj.words().len(), 1, "expected one word from {src:?}");
        obj.words()[0]
    }

    #[test]
    fn test_rtype_golden() {
        assert_eq!(one_word("add $t0, $t1, $t2"), 0x012a_4020);
        assert_eq!(one_word("sub $t0, $t1, $t2"), 0x012a_4022);
        assert_eq!(one_word("and $s0, $s1, $s2"), 0x0232_8024);
        assert_eq!(one_word("nor $t0, $t1, $t2"), 0x012a_4027);
        assert_eq!(one_word("slt $t0, $t1, $t2"), 0x012a_402a);
        assert_eq!(one_word("syscall"), 0x0000_000c);
        assert_eq!(one_word("jr $ra"), 0x03e0_0008);
        assert_eq!(one_word("mult $t0, $t1"), 0x0109_0018);
        assert_eq!(one_word("mfhi $t0"), 0x0000_4010);
        assert_eq!(one_word("mtlo $t0"), 0x0100_0013);
    }

    #[test]
    fn test_shift_golden() {
        assert_eq!(one_word("sll $t0, $t1, 3"), 0x0009_40c0);
        assert_eq!(one_word("sra $t0, $t1, 31"), 0x0009_47c3);
        assert_eq!(one_word("sllv $t0, $t1, $t2"), 0x0149_4004);
        // shamt is masked to 5 bits
        assert_eq!(one_word("sll $t0, $t1, 35"), one_word("sll $t0, $t1, 3"));
    }

    #[test]
    fn test_itype_golden() {
        assert_eq!(one_word("addi $t0, $t0, -1"), 0x2108_ffff);
        assert_eq!(one_word("addiu $t0, $t0, 1"), 0x2508_0001);
        assert_eq!(one_word("ori $t0, $zero, 0x1234"), 0x3408_1234);
        assert_eq!(one_word("lui $t0, 0x1001"), 0x3c08_1001);
        assert_eq!(one_word("sltiu $t0, $t1, 10"), 0x2d28_000a);
    }

    #[test]
    fn test_mem_golden() {
        assert_eq!(one_word("lw $t0, 4($sp)"), 0x8fa8_0004);
        assert_eq!(one_word("sw $t0, -8($fp)"), 0xafc8_fff8);
        assert_eq!(one_word("lbu $t0, 0($t1)"), 0x9128_0000);
        assert_eq!(one_word("swr $t0, 2($t1)"), 0xb928_0002);
    }

    #[test]
    fn test_jalr_forms() {
        assert_eq!(one_word("jalr $t0"), 0x0100_f809);
        assert_eq!(one_word("jalr $t1, $t0"), 0x0100_4809);
    }

    #[test]
    fn test_labels_and_branches() {
        let obj = assemble("
            loop: addi $t0, $t0, 1
                  beq $t0, $t1, done
                  j loop
            done: jr $ra
        ")
        .unwrap();

        let sym = obj.symbol_table();
        assert_eq!(sym.lookup_label("loop"), Some(0x0040_0000));
        assert_eq!(sym.lookup_label("done"), Some(0x0040_000c));

        assert_eq!(obj.words(), &[
            0x2108_0001, // addi $t0, $t0, 1
            0x1109_0001, // beq, one word forward
            0x0810_0000, // j 0x400000
            0x03e0_0008, // jr $ra
        ]);
        assert_eq!(obj.source_line(1), Some("beq $t0, $t1, done"));
    }

    #[test]
    fn test_backward_branch_offset() {
        let obj = assemble("
            loop: add $zero, $zero, $zero
                  add $zero, $zero, $zero
                  beq $zero, $zero, loop
        ")
        .unwrap();

        // beq sits at 0x400008; (0x400000 - 0x40000c) / 4 = -3
        assert_eq!(obj.words()[2], 0x1000_fffd);
    }

    #[test]
    fn test_condition_code_branches() {
        let obj = assemble("
            top: bltz $t0, top
                 bgezal $t0, top
                 tnei $t0, 5
        ")
        .unwrap();

        assert_eq!(obj.words(), &[
            0x0500_ffff, // bltz $t0, -1
            0x0511_fffe, // bgezal $t0, -2
            0x050e_0005, // tnei $t0, 5
        ]);
    }

    #[test]
    fn test_sections() {
        let obj = assemble("
            .data
            ignored_by_the_assembler
            .text
            add $t0, $t1, $t2
            .data
            also_ignored
        ")
        .unwrap();
        assert_eq!(obj.words(), &[0x012a_4020]);
    }

    #[test]
    fn test_no_sections_means_all_text() {
        let obj = assemble("add $t0, $t1, $t2\nsub $t0, $t1, $t2").unwrap();
        assert_eq!(obj.words().len(), 2);
    }

    #[test]
    fn test_comments_and_label_lines() {
        let obj = assemble("
            # leading comment
            start: addi $t0, $zero, 1 # trailing comment
            alias: end:
            jr $ra
        ")
        .unwrap();

        assert_eq!(obj.words().len(), 2);
        let sym = obj.symbol_table();
        assert_eq!(sym.lookup_label("start"), Some(0x0040_0000));
        // a bare label names the next instruction, even across lines
        assert_eq!(sym.lookup_label("alias"), Some(0x0040_0004));
        assert_eq!(sym.lookup_label("end"), Some(0x0040_0004));
    }

    #[test]
    fn test_duplicate_label_last_wins() {
        let obj = assemble("
            a: add $zero, $zero, $zero
            a: add $zero, $zero, $zero
        ")
        .unwrap();
        assert_eq!(obj.symbol_table().lookup_label("a"), Some(0x0040_0004));
    }

    #[test]
    fn test_unknown_mnemonic() {
        assert_asm_fail(
            assemble("mov $t0, $t1"),
            AsmErrKind::UnknownMnemonic("mov".to_string()),
        );
    }

    #[test]
    fn test_undefined_label() {
        let err = assemble("beq $t0, $t1, nowhere").unwrap_err();
        assert_eq!(err.kind, AsmErrKind::CouldNotFindLabel("nowhere".to_string()));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_bad_operands() {
        assert_asm_fail(
            assemble("add $t0, $t1"),
            AsmErrKind::BadOperand(OperandErr::ExpectedReg),
        );
        assert_asm_fail(
            assemble("add $t0, $t1, $t2, $t3"),
            AsmErrKind::BadOperand(OperandErr::ExpectedEnd),
        );
        assert_asm_fail(
            assemble("lw $t0, $t1"),
            AsmErrKind::BadOperand(OperandErr::ExpectedImm),
        );
    }
}
