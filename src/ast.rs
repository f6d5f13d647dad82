//! Components used to represent MIPS instructions on both sides of the pipeline:
//!
//! - [`Reg`]: a register operand (the 32 general-purpose registers plus `hi`/`lo`),
//! - [`Mnemonic`]: every instruction mnemonic the assembler accepts,
//! - [`InstrSpec`]: the per-mnemonic encoding rule (operand form + opcode/funct constants),
//! - [`Instr`]: a raw 32-bit machine word with bit-field accessors and disassembly.
//!
//! The assembler maps [`Mnemonic`]s to words through [`Mnemonic::spec`];
//! the simulator maps words back to mnemonics through [`Mnemonic::decode`].

/// The conventional names of the 32 general-purpose registers, in index order.
pub const REG_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3",
    "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7",
    "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7",
    "t8", "t9", "k0", "k1", "gp", "sp", "fp", "ra",
];

/// The number of register slots in the register file
/// (32 general-purpose registers plus `hi` and `lo`).
pub const REG_COUNT: usize = 34;

/// A register.
///
/// This covers the 32 general-purpose registers (indices 0–31) and the
/// `hi`/`lo` multiply-divide registers (indices 32 and 33). A `Reg` can be
/// constructed by picking one from [`reg_consts`] or by name via
/// [`Reg::from_name`].
///
/// ## Examples
///
/// ```text
/// add $t0, $t1, $t2
///     ~~~  ~~~  ~~~
/// lw $t0, 4($sp)
///    ~~~    ~~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The always-conventionally-zero register, `$zero`.
    pub const ZERO: Reg = Reg(0);
    /// The assembler temporary, `$at`.
    pub const AT: Reg = Reg(1);
    /// The first return-value register, `$v0`. Holds the syscall code.
    pub const V0: Reg = Reg(2);
    /// The second return-value register, `$v1`.
    pub const V1: Reg = Reg(3);
    /// The first argument register, `$a0`.
    pub const A0: Reg = Reg(4);
    /// The second argument register, `$a1`.
    pub const A1: Reg = Reg(5);
    /// The third argument register, `$a2`.
    pub const A2: Reg = Reg(6);
    /// The fourth argument register, `$a3`.
    pub const A3: Reg = Reg(7);
    /// Temporary register `$t0`.
    pub const T0: Reg = Reg(8);
    /// Temporary register `$t1`.
    pub const T1: Reg = Reg(9);
    /// Temporary register `$t2`.
    pub const T2: Reg = Reg(10);
    /// Saved register `$s0`.
    pub const S0: Reg = Reg(16);
    /// The global pointer, `$gp`.
    pub const GP: Reg = Reg(28);
    /// The stack pointer, `$sp`.
    pub const SP: Reg = Reg(29);
    /// The frame pointer, `$fp`.
    pub const FP: Reg = Reg(30);
    /// The return address register, `$ra`.
    pub const RA: Reg = Reg(31);
    /// The high word of a multiply (or the quotient of a divide), `hi`.
    pub const HI: Reg = Reg(32);
    /// The low word of a multiply (or the remainder of a divide), `lo`.
    pub const LO: Reg = Reg(33);
}

impl Reg {
    /// Gets the register file index of this register. Always below [`REG_COUNT`].
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Resolves a register name (without the `$` sigil) to a register.
    ///
    /// Both the conventional names (`t0`, `sp`, ...) and plain indices
    /// (`0`–`31`) are accepted. `hi` and `lo` are not addressable from
    /// assembly and therefore do not resolve.
    ///
    /// ```
    /// use mipsim::ast::{Reg, reg_consts};
    ///
    /// assert_eq!(Reg::from_name("sp"), Some(reg_consts::SP));
    /// assert_eq!(Reg::from_name("8"), Some(reg_consts::T0));
    /// assert_eq!(Reg::from_name("hi"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Reg> {
        if let Some(i) = REG_NAMES.iter().position(|&n| n == name) {
            return Some(Reg(i as u8));
        }
        name.parse::<u8>().ok().filter(|&n| n < 32).map(Reg)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match REG_NAMES.get(usize::from(self.0)) {
            Some(name) => write!(f, "${name}"),
            None if self.0 == 32 => f.write_str("hi"),
            None if self.0 == 33 => f.write_str("lo"),
            None => write!(f, "${}", self.0),
        }
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}

macro_rules! mnemonic_enum {
    ($($instr:ident: $name:literal),+ $(,)?) => {
        /// An instruction mnemonic.
        ///
        /// Every mnemonic the assembler accepts appears here; each one maps to
        /// a fixed encoding rule through [`Mnemonic::spec`].
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
        pub enum Mnemonic {
            $(
                #[allow(missing_docs)]
                $instr
            ),+
        }

        impl Mnemonic {
            /// Resolves an identifier to a mnemonic, if it names one.
            /// Mnemonics are case-insensitive.
            pub fn from_name(s: &str) -> Option<Self> {
                match &*s.to_lowercase() {
                    $($name => Some(Self::$instr)),+,
                    _ => None
                }
            }
        }

        impl std::fmt::Display for Mnemonic {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$instr => f.write_str($name)),+
                }
            }
        }
    };
}
mnemonic_enum! {
    Sll: "sll", Srl: "srl", Sra: "sra", Sllv: "sllv", Srlv: "srlv", Srav: "srav",
    Jr: "jr", Jalr: "jalr", Syscall: "syscall",
    Mfhi: "mfhi", Mthi: "mthi", Mflo: "mflo", Mtlo: "mtlo",
    Mult: "mult", Multu: "multu", Div: "div", Divu: "divu",
    Add: "add", Addu: "addu", Sub: "sub", Subu: "subu",
    And: "and", Or: "or", Xor: "xor", Nor: "nor",
    Slt: "slt", Sltu: "sltu",
    Tge: "tge", Tgeu: "tgeu", Tlt: "tlt", Tltu: "tltu", Teq: "teq", Tne: "tne",
    Bltz: "bltz", Bgez: "bgez", Bltzal: "bltzal", Bgezal: "bgezal",
    Tgei: "tgei", Tgeiu: "tgeiu", Tlti: "tlti", Tltiu: "tltiu", Tnei: "tnei",
    J: "j", Jal: "jal",
    Beq: "beq", Bne: "bne", Blez: "blez", Bgtz: "bgtz",
    Addi: "addi", Addiu: "addiu", Slti: "slti", Sltiu: "sltiu",
    Andi: "andi", Ori: "ori", Xori: "xori", Lui: "lui",
    Lb: "lb", Lh: "lh", Lwl: "lwl", Lw: "lw", Lbu: "lbu", Lhu: "lhu", Lwr: "lwr",
    Sb: "sb", Sh: "sh", Swl: "swl", Sw: "sw", Swr: "swr",
}

/// The assembly operand shape of a mnemonic, in source order.
///
/// The encoder uses this to reorder operands into the canonical
/// opcode/rs/rt/rd/shamt/funct field order, so the reordering rule is data
/// rather than per-mnemonic splicing code.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OperandForm {
    /// `m $rd, $rs, $rt` (three-register ALU ops)
    DstSrcSrc,
    /// `m $rd, $rt, shamt` (constant shifts)
    ShiftImm,
    /// `m $rd, $rt, $rs` (variable shifts)
    ShiftReg,
    /// `m $rs, $rt` (mult/div and register traps)
    SrcSrc,
    /// `m $rd` (moves from hi/lo)
    DstOnly,
    /// `m $rs` (jr and moves to hi/lo)
    SrcOnly,
    /// `jalr $rs` or `jalr $rd, $rs`
    Jalr,
    /// no operands (`syscall`)
    Bare,
    /// `m $rs, target` (branches comparing rs against zero)
    SrcBranch,
    /// `m $rs, imm` (immediate traps)
    SrcTrapImm,
    /// `m $rs, $rt, target` (beq/bne)
    CmpBranch,
    /// `m $rt, $rs, imm` (immediate ALU ops)
    ArithImm,
    /// `m $rt, imm` (lui)
    LoadUpper,
    /// `m $rt, offset($rs)` (loads and stores)
    Mem,
    /// `m target` (j/jal)
    Jump,
}

/// The encoding rule for a mnemonic.
///
/// For R-cluster instructions (`opcode == 0`), `funct` is the funct field;
/// for the branch/trap cluster (`opcode == 1`), `funct` holds the rt
/// dispatch code; otherwise it is zero.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct InstrSpec {
    /// The source-order operand shape.
    pub form: OperandForm,
    /// The 6-bit opcode.
    pub opcode: u8,
    /// The funct field (opcode 0) or rt dispatch code (opcode 1).
    pub funct: u8,
}

impl Mnemonic {
    /// The encoding rule for this mnemonic.
    pub fn spec(self) -> InstrSpec {
        use OperandForm::*;

        let (form, opcode, funct) = match self {
            Mnemonic::Sll     => (ShiftImm,   0, 0x00),
            Mnemonic::Srl     => (ShiftImm,   0, 0x02),
            Mnemonic::Sra     => (ShiftImm,   0, 0x03),
            Mnemonic::Sllv    => (ShiftReg,   0, 0x04),
            Mnemonic::Srlv    => (ShiftReg,   0, 0x06),
            Mnemonic::Srav    => (ShiftReg,   0, 0x07),
            Mnemonic::Jr      => (SrcOnly,    0, 0x08),
            Mnemonic::Jalr    => (Jalr,       0, 0x09),
            Mnemonic::Syscall => (Bare,       0, 0x0c),
            Mnemonic::Mfhi    => (DstOnly,    0, 0x10),
            Mnemonic::Mthi    => (SrcOnly,    0, 0x11),
            Mnemonic::Mflo    => (DstOnly,    0, 0x12),
            Mnemonic::Mtlo    => (SrcOnly,    0, 0x13),
            Mnemonic::Mult    => (SrcSrc,     0, 0x18),
            Mnemonic::Multu   => (SrcSrc,     0, 0x19),
            Mnemonic::Div     => (SrcSrc,     0, 0x1a),
            Mnemonic::Divu    => (SrcSrc,     0, 0x1b),
            Mnemonic::Add     => (DstSrcSrc,  0, 0x20),
            Mnemonic::Addu    => (DstSrcSrc,  0, 0x21),
            Mnemonic::Sub     => (DstSrcSrc,  0, 0x22),
            Mnemonic::Subu    => (DstSrcSrc,  0, 0x23),
            Mnemonic::And     => (DstSrcSrc,  0, 0x24),
            Mnemonic::Or      => (DstSrcSrc,  0, 0x25),
            Mnemonic::Xor     => (DstSrcSrc,  0, 0x26),
            Mnemonic::Nor     => (DstSrcSrc,  0, 0x27),
            Mnemonic::Slt     => (DstSrcSrc,  0, 0x2a),
            Mnemonic::Sltu    => (DstSrcSrc,  0, 0x2b),
            Mnemonic::Tge     => (SrcSrc,     0, 0x30),
            Mnemonic::Tgeu    => (SrcSrc,     0, 0x31),
            Mnemonic::Tlt     => (SrcSrc,     0, 0x32),
            Mnemonic::Tltu    => (SrcSrc,     0, 0x33),
            Mnemonic::Teq     => (SrcSrc,     0, 0x34),
            Mnemonic::Tne     => (SrcSrc,     0, 0x36),
            Mnemonic::Bltz    => (SrcBranch,  1, 0x00),
            Mnemonic::Bgez    => (SrcBranch,  1, 0x01),
            Mnemonic::Tgei    => (SrcTrapImm, 1, 0x08),
            Mnemonic::Tgeiu   => (SrcTrapImm, 1, 0x09),
            Mnemonic::Tlti    => (SrcTrapImm, 1, 0x0a),
            Mnemonic::Tltiu   => (SrcTrapImm, 1, 0x0b),
            Mnemonic::Tnei    => (SrcTrapImm, 1, 0x0e),
            Mnemonic::Bltzal  => (SrcBranch,  1, 0x10),
            Mnemonic::Bgezal  => (SrcBranch,  1, 0x11),
            Mnemonic::J       => (Jump,       0x02, 0),
            Mnemonic::Jal     => (Jump,       0x03, 0),
            Mnemonic::Beq     => (CmpBranch,  0x04, 0),
            Mnemonic::Bne     => (CmpBranch,  0x05, 0),
            Mnemonic::Blez    => (SrcBranch,  0x06, 0),
            Mnemonic::Bgtz    => (SrcBranch,  0x07, 0),
            Mnemonic::Addi    => (ArithImm,   0x08, 0),
            Mnemonic::Addiu   => (ArithImm,   0x09, 0),
            Mnemonic::Slti    => (ArithImm,   0x0a, 0),
            Mnemonic::Sltiu   => (ArithImm,   0x0b, 0),
            Mnemonic::Andi    => (ArithImm,   0x0c, 0),
            Mnemonic::Ori     => (ArithImm,   0x0d, 0),
            Mnemonic::Xori    => (ArithImm,   0x0e, 0),
            Mnemonic::Lui     => (LoadUpper,  0x0f, 0),
            Mnemonic::Lb      => (Mem,        0x20, 0),
            Mnemonic::Lh      => (Mem,        0x21, 0),
            Mnemonic::Lwl     => (Mem,        0x22, 0),
            Mnemonic::Lw      => (Mem,        0x23, 0),
            Mnemonic::Lbu     => (Mem,        0x24, 0),
            Mnemonic::Lhu     => (Mem,        0x25, 0),
            Mnemonic::Lwr     => (Mem,        0x26, 0),
            Mnemonic::Sb      => (Mem,        0x28, 0),
            Mnemonic::Sh      => (Mem,        0x29, 0),
            Mnemonic::Swl     => (Mem,        0x2a, 0),
            Mnemonic::Sw      => (Mem,        0x2b, 0),
            Mnemonic::Swr     => (Mem,        0x2e, 0),
        };
        InstrSpec { form, opcode, funct }
    }

    /// Recovers the mnemonic encoded in a machine word,
    /// dispatching on the opcode (and funct / rt code where the opcode demands it).
    pub fn decode(instr: Instr) -> Result<Mnemonic, DecodeErr> {
        match instr.opcode() {
            0 => match instr.funct() {
                0x00 => Ok(Mnemonic::Sll),
                0x02 => Ok(Mnemonic::Srl),
                0x03 => Ok(Mnemonic::Sra),
                0x04 => Ok(Mnemonic::Sllv),
                0x06 => Ok(Mnemonic::Srlv),
                0x07 => Ok(Mnemonic::Srav),
                0x08 => Ok(Mnemonic::Jr),
                0x09 => Ok(Mnemonic::Jalr),
                0x0c => Ok(Mnemonic::Syscall),
                0x10 => Ok(Mnemonic::Mfhi),
                0x11 => Ok(Mnemonic::Mthi),
                0x12 => Ok(Mnemonic::Mflo),
                0x13 => Ok(Mnemonic::Mtlo),
                0x18 => Ok(Mnemonic::Mult),
                0x19 => Ok(Mnemonic::Multu),
                0x1a => Ok(Mnemonic::Div),
                0x1b => Ok(Mnemonic::Divu),
                0x20 => Ok(Mnemonic::Add),
                0x21 => Ok(Mnemonic::Addu),
                0x22 => Ok(Mnemonic::Sub),
                0x23 => Ok(Mnemonic::Subu),
                0x24 => Ok(Mnemonic::And),
                0x25 => Ok(Mnemonic::Or),
                0x26 => Ok(Mnemonic::Xor),
                0x27 => Ok(Mnemonic::Nor),
                0x2a => Ok(Mnemonic::Slt),
                0x2b => Ok(Mnemonic::Sltu),
                0x30 => Ok(Mnemonic::Tge),
                0x31 => Ok(Mnemonic::Tgeu),
                0x32 => Ok(Mnemonic::Tlt),
                0x33 => Ok(Mnemonic::Tltu),
                0x34 => Ok(Mnemonic::Teq),
                0x36 => Ok(Mnemonic::Tne),
                f => Err(DecodeErr::Funct(f)),
            },
            1 => match instr.rt().reg_no() {
                0x00 => Ok(Mnemonic::Bltz),
                0x01 => Ok(Mnemonic::Bgez),
                0x08 => Ok(Mnemonic::Tgei),
                0x09 => Ok(Mnemonic::Tgeiu),
                0x0a => Ok(Mnemonic::Tlti),
                0x0b => Ok(Mnemonic::Tltiu),
                0x0e => Ok(Mnemonic::Tnei),
                0x10 => Ok(Mnemonic::Bltzal),
                0x11 => Ok(Mnemonic::Bgezal),
                rt => Err(DecodeErr::BranchCode(rt)),
            },
            0x02 => Ok(Mnemonic::J),
            0x03 => Ok(Mnemonic::Jal),
            0x04 => Ok(Mnemonic::Beq),
            0x05 => Ok(Mnemonic::Bne),
            0x06 => Ok(Mnemonic::Blez),
            0x07 => Ok(Mnemonic::Bgtz),
            0x08 => Ok(Mnemonic::Addi),
            0x09 => Ok(Mnemonic::Addiu),
            0x0a => Ok(Mnemonic::Slti),
            0x0b => Ok(Mnemonic::Sltiu),
            0x0c => Ok(Mnemonic::Andi),
            0x0d => Ok(Mnemonic::Ori),
            0x0e => Ok(Mnemonic::Xori),
            0x0f => Ok(Mnemonic::Lui),
            0x20 => Ok(Mnemonic::Lb),
            0x21 => Ok(Mnemonic::Lh),
            0x22 => Ok(Mnemonic::Lwl),
            0x23 => Ok(Mnemonic::Lw),
            0x24 => Ok(Mnemonic::Lbu),
            0x25 => Ok(Mnemonic::Lhu),
            0x26 => Ok(Mnemonic::Lwr),
            0x28 => Ok(Mnemonic::Sb),
            0x29 => Ok(Mnemonic::Sh),
            0x2a => Ok(Mnemonic::Swl),
            0x2b => Ok(Mnemonic::Sw),
            0x2e => Ok(Mnemonic::Swr),
            op => Err(DecodeErr::Opcode(op)),
        }
    }
}

/// The field that failed to decode when a machine word matched no instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum DecodeErr {
    /// The opcode (top 6 bits) is not assigned to any instruction.
    Opcode(u8),
    /// The opcode was 0, but the funct field is not assigned.
    Funct(u8),
    /// The opcode was 1, but the rt dispatch code is not assigned.
    BranchCode(u8),
}
impl std::fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErr::Opcode(op) => write!(f, "unrecognized opcode 0x{op:02x}"),
            DecodeErr::Funct(ft) => write!(f, "unrecognized funct 0x{ft:02x}"),
            DecodeErr::BranchCode(rt) => write!(f, "unrecognized branch/trap code 0x{rt:02x}"),
        }
    }
}
impl std::error::Error for DecodeErr {}

/// A 32-bit machine word, with accessors for every instruction bit field.
///
/// The layout interpretation (R, I, or J) is up to the caller; the accessors
/// simply mask and shift.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Instr(pub u32);

impl Instr {
    /// The opcode (bits 31–26).
    pub fn opcode(self) -> u8 {
        (self.0 >> 26) as u8
    }
    /// The rs register field (bits 25–21).
    pub fn rs(self) -> Reg {
        Reg((self.0 >> 21) as u8 & 0x1f)
    }
    /// The rt register field (bits 20–16).
    pub fn rt(self) -> Reg {
        Reg((self.0 >> 16) as u8 & 0x1f)
    }
    /// The rd register field (bits 15–11).
    pub fn rd(self) -> Reg {
        Reg((self.0 >> 11) as u8 & 0x1f)
    }
    /// The shift amount field (bits 10–6).
    pub fn shamt(self) -> u8 {
        (self.0 >> 6) as u8 & 0x1f
    }
    /// The funct field (bits 5–0).
    pub fn funct(self) -> u8 {
        self.0 as u8 & 0x3f
    }
    /// The immediate field (bits 15–0), zero-extended.
    pub fn imm(self) -> u16 {
        self.0 as u16
    }
    /// The immediate field (bits 15–0), sign-extended.
    pub fn simm(self) -> i16 {
        self.0 as u16 as i16
    }
    /// The 26-bit jump target field, as a word index.
    pub fn target(self) -> u32 {
        self.0 & 0x03ff_ffff
    }
}

impl std::fmt::Display for Instr {
    /// Disassembles the word. Words that decode to no instruction
    /// render as a `.word` directive.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Ok(m) = Mnemonic::decode(*self) else {
            return write!(f, ".word 0x{:08x}", self.0);
        };

        match m.spec().form {
            OperandForm::DstSrcSrc => write!(f, "{m} {}, {}, {}", self.rd(), self.rs(), self.rt()),
            OperandForm::ShiftImm => write!(f, "{m} {}, {}, {}", self.rd(), self.rt(), self.shamt()),
            OperandForm::ShiftReg => write!(f, "{m} {}, {}, {}", self.rd(), self.rt(), self.rs()),
            OperandForm::SrcSrc => write!(f, "{m} {}, {}", self.rs(), self.rt()),
            OperandForm::DstOnly => write!(f, "{m} {}", self.rd()),
            OperandForm::SrcOnly => write!(f, "{m} {}", self.rs()),
            OperandForm::Jalr => write!(f, "{m} {}, {}", self.rd(), self.rs()),
            OperandForm::Bare => write!(f, "{m}"),
            OperandForm::SrcBranch => write!(f, "{m} {}, {}", self.rs(), self.simm()),
            OperandForm::SrcTrapImm => write!(f, "{m} {}, {}", self.rs(), self.simm()),
            OperandForm::CmpBranch => write!(f, "{m} {}, {}, {}", self.rs(), self.rt(), self.simm()),
            OperandForm::ArithImm => match m {
                Mnemonic::Andi | Mnemonic::Ori | Mnemonic::Xori => {
                    write!(f, "{m} {}, {}, 0x{:x}", self.rt(), self.rs(), self.imm())
                }
                _ => write!(f, "{m} {}, {}, {}", self.rt(), self.rs(), self.simm()),
            },
            OperandForm::LoadUpper => write!(f, "{m} {}, 0x{:x}", self.rt(), self.imm()),
            OperandForm::Mem => write!(f, "{m} {}, {}({})", self.rt(), self.simm(), self.rs()),
            OperandForm::Jump => write!(f, "{m} 0x{:x}", self.target() << 2),
        }
    }
}
