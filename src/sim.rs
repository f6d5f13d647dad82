//! Simulating and executing assembled MIPS code.
//!
//! This module is focused on executing fully assembled code (i.e., [`ObjectFile`]).
//!
//! This module consists of:
//! - [`Simulator`]: the struct that simulates assembled code
//! - [`mem`]: the module handling the address space and register file
//! - [`io`]: the module handling input, output, and file descriptors for
//!   system calls
//!
//! # Usage
//!
//! To simulate some code, instantiate a Simulator and load an object file to it:
//!
//! ```
//! use mipsim::asm::assemble;
//! use mipsim::sim::{Exit, Simulator};
//!
//! let obj = assemble("
//!     addi $v0, $zero, 17
//!     addi $a0, $zero, 3
//!     syscall
//! ").unwrap();
//!
//! let mut simulator = Simulator::new();
//! simulator.load_program(&obj);
//! assert_eq!(simulator.run().unwrap(), Exit::Program(3));
//! ```
//!
//! Beyond the basic [`Simulator::run`] (which runs until the program exits
//! or execution falls off the end of the text segment), [`Simulator::step`]
//! executes one instruction at a time.

pub mod io;
pub mod mem;

use std::io::Write;

use crate::asm::ObjectFile;
use crate::ast::{reg_consts, DecodeErr, Instr, Mnemonic};
use self::io::{InputSource, SysIo};
use self::mem::{AddrSpace, RegFile, SP_INIT, TEXT_START};

/// Errors that can occur during simulation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SimErr {
    /// The word at the program counter does not decode to any instruction.
    Decode {
        /// Which bit field failed to decode.
        err: DecodeErr,
        /// The offending word.
        word: u32,
    },
    /// A signed add or subtract overflowed 32 bits.
    Overflow(Instr),
    /// A `div` or `divu` had a zero divisor.
    DivideByZero,
    /// A trap instruction's condition held.
    Trap(Mnemonic),
    /// An input system call ran, but the input script had no lines left.
    InputExhausted,
    /// An input system call read a line that was not of the expected shape.
    BadInput(String),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::Decode { err, word } => write!(f, "could not decode word 0b{word:032b}: {err}"),
            SimErr::Overflow(i) => write!(f, "arithmetic overflow on '{i}'"),
            SimErr::DivideByZero => f.write_str("division by zero"),
            SimErr::Trap(m) => write!(f, "trap raised by '{m}'"),
            SimErr::InputExhausted => f.write_str("ran out of program input"),
            SimErr::BadInput(s) => write!(f, "could not parse input '{s}'"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::Decode { .. } => {
                Some("execution may have run past the program into non-instruction data".into())
            }
            SimErr::InputExhausted => {
                Some("the input script has fewer lines than the program reads".into())
            }
            SimErr::BadInput(_) => Some("an integer was expected here".into()),
            _ => None,
        }
    }
}

/// How a program finished executing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Exit {
    /// The program counter ran off the end of the loaded text segment.
    EndOfText,
    /// The program called an exit system call, with the given exit code.
    Program(i32),
}
impl Exit {
    /// The process exit code this result corresponds to.
    pub fn code(self) -> i32 {
        match self {
            Exit::EndOfText => 0,
            Exit::Program(code) => code,
        }
    }
}

/// Anything that can cause a step to break control flow.
enum StepBreak {
    /// The program called an exit system call.
    Exit(i32),
    /// A fatal simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(e: SimErr) -> Self {
        StepBreak::Err(e)
    }
}

/// Executes assembled code.
#[derive(Debug)]
pub struct Simulator {
    /// The register file.
    pub reg_file: RegFile,

    /// The machine's memory.
    pub mem: AddrSpace,

    /// The program counter.
    pub pc: u32,

    /// Where the program counter moves after the current instruction.
    ///
    /// Sequential instructions leave this at `pc + 4`; jumps, branches, and
    /// `jr`/`jalr` overwrite it.
    next_pc: u32,

    /// The number of instructions executed since the last load.
    pub instructions_run: u64,

    io: SysIo,
}

impl Simulator {
    /// Creates a simulator over an empty address space,
    /// with the stack pointer seeded and the program counter at the text origin.
    pub fn new() -> Self {
        let mut reg_file = RegFile::new();
        reg_file[reg_consts::SP] = SP_INIT;

        Simulator {
            reg_file,
            mem: AddrSpace::new(),
            pc: TEXT_START,
            next_pc: TEXT_START.wrapping_add(4),
            instructions_run: 0,
            io: SysIo::new(),
        }
    }

    /// Loads an object file's words into the text segment and resets the
    /// program counter to the text origin.
    pub fn load_program(&mut self, obj: &ObjectFile) {
        self.mem.load_text(obj.words());
        self.pc = TEXT_START;
        self.instructions_run = 0;
    }

    /// Replaces where input system calls read from.
    pub fn set_input(&mut self, input: InputSource) {
        self.io.set_input(input);
    }

    /// Replaces where output system calls write to.
    pub fn set_output(&mut self, out: Box<dyn Write + Send>) {
        self.io.set_output(out);
    }

    /// Runs the program until it exits or the program counter runs off the
    /// end of the text segment.
    pub fn run(&mut self) -> Result<Exit, SimErr> {
        loop {
            if self.pc == self.mem.text_end() {
                return Ok(Exit::EndOfText);
            }
            if let Some(exit) = self.step()? {
                return Ok(exit);
            }
        }
    }

    /// Executes a single instruction.
    ///
    /// Returns `Ok(Some(exit))` if that instruction ended the program.
    pub fn step(&mut self) -> Result<Option<Exit>, SimErr> {
        match self.step_inner() {
            Ok(()) => Ok(None),
            Err(StepBreak::Exit(code)) => Ok(Some(Exit::Program(code))),
            Err(StepBreak::Err(e)) => Err(e),
        }
    }

    fn step_inner(&mut self) -> Result<(), StepBreak> {
        let word = Instr(self.mem.read32(self.pc));
        let m = Mnemonic::decode(word).map_err(|err| SimErr::Decode { err, word: word.0 })?;
        trace!("0x{:08x}: {}", self.pc, word);

        self.next_pc = self.pc.wrapping_add(4);
        self.execute(m, word)?;
        self.pc = self.next_pc;
        self.instructions_run += 1;
        Ok(())
    }

    /// Redirects the next program counter to the branch target.
    fn take_branch(&mut self, i: Instr) {
        let off = (i32::from(i.simm()) << 2) as u32;
        self.next_pc = self.pc.wrapping_add(4).wrapping_add(off);
    }

    fn execute(&mut self, m: Mnemonic, i: Instr) -> Result<(), StepBreak> {
        use reg_consts::{HI, LO, RA};
        use Mnemonic::*;

        match m {
            // shifts
            Sll => self.reg_file[i.rd()] = self.reg_file[i.rt()] << i.shamt(),
            Srl => self.reg_file[i.rd()] = self.reg_file[i.rt()] >> i.shamt(),
            Sra => self.reg_file[i.rd()] = ((self.reg_file[i.rt()] as i32) >> i.shamt()) as u32,
            Sllv => self.reg_file[i.rd()] = self.reg_file[i.rt()] << (self.reg_file[i.rs()] & 0x1f),
            Srlv => self.reg_file[i.rd()] = self.reg_file[i.rt()] >> (self.reg_file[i.rs()] & 0x1f),
            Srav => {
                let sh = self.reg_file[i.rs()] & 0x1f;
                self.reg_file[i.rd()] = ((self.reg_file[i.rt()] as i32) >> sh) as u32;
            }

            // register jumps
            Jr => self.next_pc = self.reg_file[i.rs()],
            Jalr => {
                let target = self.reg_file[i.rs()];
                self.reg_file[i.rd()] = self.pc.wrapping_add(4);
                self.next_pc = target;
            }

            Syscall => self.syscall()?,

            // hi/lo moves
            Mfhi => self.reg_file[i.rd()] = self.reg_file[HI],
            Mthi => self.reg_file[HI] = self.reg_file[i.rs()],
            Mflo => self.reg_file[i.rd()] = self.reg_file[LO],
            Mtlo => self.reg_file[LO] = self.reg_file[i.rs()],

            // multiply and divide
            Mult => {
                let prod = i64::from(self.reg_file[i.rs()] as i32)
                    * i64::from(self.reg_file[i.rt()] as i32);
                self.reg_file[HI] = (prod >> 32) as u32;
                self.reg_file[LO] = prod as u32;
            }
            Multu => {
                let prod = u64::from(self.reg_file[i.rs()]) * u64::from(self.reg_file[i.rt()]);
                self.reg_file[HI] = (prod >> 32) as u32;
                self.reg_file[LO] = prod as u32;
            }
            // div puts the quotient in hi and the remainder in lo
            Div => {
                let (a, b) = (self.reg_file[i.rs()] as i32, self.reg_file[i.rt()] as i32);
                if b == 0 {
                    return Err(SimErr::DivideByZero.into());
                }
                self.reg_file[HI] = a.wrapping_div(b) as u32;
                self.reg_file[LO] = a.wrapping_rem(b) as u32;
            }
            Divu => {
                let (a, b) = (self.reg_file[i.rs()], self.reg_file[i.rt()]);
                if b == 0 {
                    return Err(SimErr::DivideByZero.into());
                }
                self.reg_file[HI] = a / b;
                self.reg_file[LO] = a % b;
            }

            // three-register ALU ops
            Add => {
                self.reg_file[i.rd()] =
                    add_signed(self.reg_file[i.rs()], self.reg_file[i.rt()], i)?;
            }
            Addu => {
                self.reg_file[i.rd()] =
                    self.reg_file[i.rs()].wrapping_add(self.reg_file[i.rt()]);
            }
            Sub => {
                self.reg_file[i.rd()] =
                    sub_signed(self.reg_file[i.rs()], self.reg_file[i.rt()], i)?;
            }
            Subu => {
                self.reg_file[i.rd()] =
                    self.reg_file[i.rs()].wrapping_sub(self.reg_file[i.rt()]);
            }
            And => self.reg_file[i.rd()] = self.reg_file[i.rs()] & self.reg_file[i.rt()],
            Or => self.reg_file[i.rd()] = self.reg_file[i.rs()] | self.reg_file[i.rt()],
            Xor => self.reg_file[i.rd()] = self.reg_file[i.rs()] ^ self.reg_file[i.rt()],
            Nor => self.reg_file[i.rd()] = !(self.reg_file[i.rs()] | self.reg_file[i.rt()]),
            Slt => {
                self.reg_file[i.rd()] =
                    u32::from((self.reg_file[i.rs()] as i32) < (self.reg_file[i.rt()] as i32));
            }
            Sltu => {
                self.reg_file[i.rd()] = u32::from(self.reg_file[i.rs()] < self.reg_file[i.rt()]);
            }

            // register traps
            Tge => self.trap_if(m, (self.reg_file[i.rs()] as i32) >= (self.reg_file[i.rt()] as i32))?,
            Tgeu => self.trap_if(m, self.reg_file[i.rs()] >= self.reg_file[i.rt()])?,
            Tlt => self.trap_if(m, (self.reg_file[i.rs()] as i32) < (self.reg_file[i.rt()] as i32))?,
            Tltu => self.trap_if(m, self.reg_file[i.rs()] < self.reg_file[i.rt()])?,
            Teq => self.trap_if(m, self.reg_file[i.rs()] == self.reg_file[i.rt()])?,
            Tne => self.trap_if(m, self.reg_file[i.rs()] != self.reg_file[i.rt()])?,

            // condition-code branches
            Bltz => {
                if (self.reg_file[i.rs()] as i32) < 0 {
                    self.take_branch(i);
                }
            }
            Bgez => {
                if (self.reg_file[i.rs()] as i32) >= 0 {
                    self.take_branch(i);
                }
            }
            // the -al pair only links when the branch is taken
            Bltzal => {
                if (self.reg_file[i.rs()] as i32) < 0 {
                    self.reg_file[RA] = self.pc.wrapping_add(4);
                    self.take_branch(i);
                }
            }
            Bgezal => {
                if (self.reg_file[i.rs()] as i32) >= 0 {
                    self.reg_file[RA] = self.pc.wrapping_add(4);
                    self.take_branch(i);
                }
            }

            // immediate traps
            Tgei => self.trap_if(m, (self.reg_file[i.rs()] as i32) >= i32::from(i.simm()))?,
            Tgeiu => self.trap_if(m, self.reg_file[i.rs()] >= i32::from(i.simm()) as u32)?,
            Tlti => self.trap_if(m, (self.reg_file[i.rs()] as i32) < i32::from(i.simm()))?,
            Tltiu => self.trap_if(m, self.reg_file[i.rs()] < i32::from(i.simm()) as u32)?,
            Tnei => self.trap_if(m, (self.reg_file[i.rs()] as i32) != i32::from(i.simm()))?,

            // absolute jumps
            J => self.next_pc = i.target() << 2,
            Jal => {
                self.reg_file[RA] = self.pc.wrapping_add(4);
                self.next_pc = i.target() << 2;
            }

            // compare branches
            Beq => {
                if self.reg_file[i.rs()] == self.reg_file[i.rt()] {
                    self.take_branch(i);
                }
            }
            Bne => {
                if self.reg_file[i.rs()] != self.reg_file[i.rt()] {
                    self.take_branch(i);
                }
            }
            Blez => {
                if (self.reg_file[i.rs()] as i32) <= 0 {
                    self.take_branch(i);
                }
            }
            Bgtz => {
                if (self.reg_file[i.rs()] as i32) > 0 {
                    self.take_branch(i);
                }
            }

            // immediate ALU ops
            Addi => {
                self.reg_file[i.rt()] =
                    add_signed(self.reg_file[i.rs()], i32::from(i.simm()) as u32, i)?;
            }
            Addiu => {
                self.reg_file[i.rt()] =
                    self.reg_file[i.rs()].wrapping_add(i32::from(i.simm()) as u32);
            }
            Slti => {
                self.reg_file[i.rt()] =
                    u32::from((self.reg_file[i.rs()] as i32) < i32::from(i.simm()));
            }
            Sltiu => {
                self.reg_file[i.rt()] =
                    u32::from(self.reg_file[i.rs()] < i32::from(i.simm()) as u32);
            }
            Andi => self.reg_file[i.rt()] = self.reg_file[i.rs()] & u32::from(i.imm()),
            Ori => self.reg_file[i.rt()] = self.reg_file[i.rs()] | u32::from(i.imm()),
            Xori => self.reg_file[i.rt()] = self.reg_file[i.rs()] ^ u32::from(i.imm()),
            Lui => self.reg_file[i.rt()] = u32::from(i.imm()) << 16,

            // loads
            Lb => {
                let addr = self.eff_addr(i);
                self.reg_file[i.rt()] = self.mem.read8(addr) as i8 as i32 as u32;
            }
            Lbu => {
                let addr = self.eff_addr(i);
                self.reg_file[i.rt()] = u32::from(self.mem.read8(addr));
            }
            Lh => {
                let addr = self.eff_addr(i);
                self.reg_file[i.rt()] = self.mem.read16(addr) as i16 as i32 as u32;
            }
            Lhu => {
                let addr = self.eff_addr(i);
                self.reg_file[i.rt()] = u32::from(self.mem.read16(addr));
            }
            Lw => {
                let addr = self.eff_addr(i);
                self.reg_file[i.rt()] = self.mem.read32(addr);
            }
            // the unaligned loads replace only the bytes their window covers
            Lwl => {
                let addr = self.eff_addr(i);
                let off = addr % 4;
                let mut window = 0;
                let mut mask = 0;
                for lane in 0..(4 - off) {
                    window |= u32::from(self.mem.read8(addr + lane)) << (8 * lane);
                    mask |= 0xffu32 << (8 * lane);
                }
                self.reg_file[i.rt()] = window | (self.reg_file[i.rt()] & !mask);
            }
            Lwr => {
                let addr = self.eff_addr(i);
                let off = addr % 4;
                let mut window = 0;
                let mut mask = 0;
                for lane in 0..=off {
                    window |= u32::from(self.mem.read8(addr - off + lane)) << (8 * lane);
                    mask |= 0xffu32 << (8 * lane);
                }
                self.reg_file[i.rt()] = window | (self.reg_file[i.rt()] & !mask);
            }

            // stores
            Sb => {
                let addr = self.eff_addr(i);
                self.mem.write8(addr, self.reg_file[i.rt()] as u8);
            }
            Sh => {
                let addr = self.eff_addr(i);
                self.mem.write16(addr, self.reg_file[i.rt()] as u16);
            }
            Sw => {
                let addr = self.eff_addr(i);
                self.mem.write32(addr, self.reg_file[i.rt()]);
            }
            Swl => {
                let addr = self.eff_addr(i);
                let off = addr % 4;
                let value = self.reg_file[i.rt()];
                for lane in 0..(4 - off) {
                    self.mem.write8(addr + lane, (value >> (8 * (off + lane))) as u8);
                }
            }
            Swr => {
                let addr = self.eff_addr(i);
                let off = addr % 4;
                let value = self.reg_file[i.rt()];
                for lane in 0..=off {
                    self.mem.write8(addr - off + lane, (value >> (8 * lane)) as u8);
                }
            }
        }

        Ok(())
    }

    /// The effective address of a load or store.
    fn eff_addr(&self, i: Instr) -> u32 {
        self.reg_file[i.rs()].wrapping_add(i32::from(i.simm()) as u32)
    }

    fn trap_if(&self, m: Mnemonic, cond: bool) -> Result<(), SimErr> {
        match cond {
            true => Err(SimErr::Trap(m)),
            false => Ok(()),
        }
    }

    /// Dispatches a system call on the code in `$v0`.
    fn syscall(&mut self) -> Result<(), StepBreak> {
        use reg_consts::{A0, A1, A2, V0};

        match self.reg_file[V0] {
            // print integer
            1 => {
                let v = self.reg_file[A0] as i32;
                self.io.write_out(&v.to_string());
            }
            // print NUL-terminated string
            4 => {
                let s = self.read_cstr(self.reg_file[A0]);
                self.io.write_out(&s);
            }
            // read integer
            5 => self.reg_file[V0] = self.read_int()? as u32,
            // read string into a buffer of at most $a1 bytes (incl. NUL)
            8 => {
                let line = self.io.read_line().ok_or(SimErr::InputExhausted)?;
                let addr = self.reg_file[A0];
                let maxlen = self.reg_file[A1];
                if maxlen > 0 {
                    let bytes = line.as_bytes();
                    let n = bytes.len().min(maxlen as usize - 1);
                    for (k, &b) in bytes[..n].iter().enumerate() {
                        self.mem.write8(addr.wrapping_add(k as u32), b);
                    }
                    self.mem.write8(addr.wrapping_add(n as u32), 0);
                }
            }
            // sbrk
            9 => {
                let size = self.reg_file[A0];
                self.reg_file[V0] = self.mem.allocate(size);
            }
            // exit
            10 => return Err(StepBreak::Exit(0)),
            // print character
            11 => {
                let c = (self.reg_file[A0] as u8 as char).to_string();
                self.io.write_out(&c);
            }
            // read character
            12 => {
                let line = self.io.read_line().ok_or(SimErr::InputExhausted)?;
                self.reg_file[V0] = line.bytes().next().map_or(u32::from(b'\n'), u32::from);
            }
            // open file: $a0 path, $a1 flags; descriptor lands in $a0
            13 => {
                let path = self.read_cstr(self.reg_file[A0]);
                let flags = self.reg_file[A1];
                self.reg_file[A0] = self.io.open(&path, flags) as u32;
            }
            // read file: $a0 fd, $a1 buffer, $a2 length; count lands in $a0
            14 => {
                let fd = self.reg_file[A0] as i32;
                let addr = self.reg_file[A1];
                let len = self.reg_file[A2];
                let mut buf = vec![0; len as usize];
                let n = self.io.read(fd, &mut buf);
                for (k, &b) in buf.iter().take(n.max(0) as usize).enumerate() {
                    self.mem.write8(addr.wrapping_add(k as u32), b);
                }
                self.reg_file[A0] = n as u32;
            }
            // write file: $a0 fd, $a1 buffer, $a2 length; count lands in $a0
            15 => {
                let fd = self.reg_file[A0] as i32;
                let addr = self.reg_file[A1];
                let len = self.reg_file[A2];
                let buf: Vec<u8> = (0..len).map(|k| self.mem.read8(addr.wrapping_add(k))).collect();
                self.reg_file[A0] = self.io.write(fd, &buf) as u32;
            }
            // close file
            16 => self.io.close(self.reg_file[A0] as i32),
            // exit with code
            17 => return Err(StepBreak::Exit(self.reg_file[A0] as i32)),

            code => warn!("unrecognized syscall code {code}"),
        }

        Ok(())
    }

    /// Reads a NUL-terminated string out of memory.
    fn read_cstr(&self, start: u32) -> String {
        let mut bytes = Vec::new();
        let mut addr = start;
        loop {
            let b = self.mem.read8(addr);
            if b == 0 {
                break;
            }
            bytes.push(b);
            addr = addr.wrapping_add(1);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Reads and parses one line of input as a signed integer.
    fn read_int(&mut self) -> Result<i32, SimErr> {
        let line = self.io.read_line().ok_or(SimErr::InputExhausted)?;
        let text = line.trim();
        text.parse().map_err(|_| SimErr::BadInput(text.to_string()))
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

fn add_signed(a: u32, b: u32, i: Instr) -> Result<u32, SimErr> {
    let sum = i64::from(a as i32) + i64::from(b as i32);
    i32::try_from(sum).map(|v| v as u32).map_err(|_| SimErr::Overflow(i))
}

fn sub_signed(a: u32, b: u32, i: Instr) -> Result<u32, SimErr> {
    let diff = i64::from(a as i32) - i64::from(b as i32);
    i32::try_from(diff).map(|v| v as u32).map_err(|_| SimErr::Overflow(i))
}

#[cfg(test)]
mod tests {
    use super::io::{InputSource, SharedBuf};
    use super::mem::{DATA_START, SP_INIT, TEXT_START};
    use super::{Exit, SimErr, Simulator};
    use crate::asm::assemble;
    use crate::ast::reg_consts::*;

    fn sim_with(src: &str) -> Simulator {
        let obj = assemble(src).unwrap();
        let mut sim = Simulator::new();
        sim.load_program(&obj);
        sim
    }

    #[test]
    fn test_add() {
        let mut sim = sim_with("add $t0, $t1, $t2");
        sim.reg_file[T1] = 2;
        sim.reg_file[T2] = 3;

        assert_eq!(sim.step(), Ok(None));
        assert_eq!(sim.reg_file[T0], 5);
        assert_eq!(sim.pc, TEXT_START + 4);
        assert_eq!(sim.instructions_run, 1);
    }

    #[test]
    fn test_add_overflow_is_fatal() {
        let mut sim = sim_with("addi $t0, $t0, 1");
        sim.reg_file[T0] = i32::MAX as u32;

        assert!(matches!(sim.run(), Err(SimErr::Overflow(_))));
        // the destination was never written
        assert_eq!(sim.reg_file[T0], i32::MAX as u32);
    }

    #[test]
    fn test_wrapping_ops_do_not_overflow() {
        let mut sim = sim_with("addu $t0, $t1, $t2");
        sim.reg_file[T1] = u32::MAX;
        sim.reg_file[T2] = 2;
        assert_eq!(sim.step(), Ok(None));
        assert_eq!(sim.reg_file[T0], 1);
    }

    #[test]
    fn test_backward_branch() {
        let mut sim = sim_with("
                  addi $t1, $zero, 3
            loop: addi $t0, $t0, 1
                  bne $t0, $t1, loop
        ");

        // addi, addi, bne (taken)
        for _ in 0..3 {
            assert_eq!(sim.step(), Ok(None));
        }
        assert_eq!(sim.pc, TEXT_START + 4, "taken branch should land on loop");

        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[T0], 3);
    }

    #[test]
    fn test_exit_stops_execution() {
        let mut sim = sim_with("
            addi $v0, $zero, 10
            syscall
            addi $t0, $zero, 99
        ");
        assert_eq!(sim.run(), Ok(Exit::Program(0)));
        // the instruction after the exit never ran
        assert_eq!(sim.reg_file[T0], 0);
    }

    #[test]
    fn test_exit_with_code() {
        let mut sim = sim_with("
            addi $v0, $zero, 17
            addi $a0, $zero, 3
            syscall
        ");
        let exit = sim.run().unwrap();
        assert_eq!(exit, Exit::Program(3));
        assert_eq!(exit.code(), 3);
    }

    #[test]
    fn test_div_quotient_in_hi() {
        let mut sim = sim_with("div $t0, $t1");
        sim.reg_file[T0] = 7;
        sim.reg_file[T1] = 2;
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[HI], 3);
        assert_eq!(sim.reg_file[LO], 1);
    }

    #[test]
    fn test_div_by_zero_is_fatal() {
        let mut sim = sim_with("div $t0, $t1");
        sim.reg_file[T0] = 7;
        assert_eq!(sim.run(), Err(SimErr::DivideByZero));
    }

    #[test]
    fn test_mult() {
        let mut sim = sim_with("
            lui $t0, 1
            mult $t0, $t0
        ");
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        // 0x10000 * 0x10000 = 2^32
        assert_eq!(sim.reg_file[HI], 1);
        assert_eq!(sim.reg_file[LO], 0);
    }

    #[test]
    fn test_slt_writes_zero_on_false() {
        let mut sim = sim_with("slt $t0, $t1, $t2");
        sim.reg_file[T0] = 77;
        sim.reg_file[T1] = 5;
        sim.reg_file[T2] = 5;
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[T0], 0);
    }

    #[test]
    fn test_jal_links_and_jr_returns() {
        let mut sim = sim_with("
                  jal sub
                  addi $v0, $zero, 10
                  syscall
            sub:  addi $t0, $zero, 9
                  jr $ra
        ");
        assert_eq!(sim.run(), Ok(Exit::Program(0)));
        assert_eq!(sim.reg_file[RA], TEXT_START + 4);
        assert_eq!(sim.reg_file[T0], 9);
    }

    #[test]
    fn test_zero_register_is_writable() {
        let mut sim = sim_with("
            addi $zero, $zero, 5
            add $t0, $zero, $zero
        ");
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[ZERO], 5);
        assert_eq!(sim.reg_file[T0], 10);
    }

    #[test]
    fn test_store_load_roundtrip() {
        let mut sim = sim_with("
            sw $t0, -4($sp)
            lw $t1, -4($sp)
        ");
        sim.reg_file[T0] = 0xDEAD_BEEF;
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[T1], 0xDEAD_BEEF);
        assert_eq!(sim.mem.read32(SP_INIT - 4), 0xDEAD_BEEF);
    }

    #[test]
    fn test_byte_loads_extend() {
        let mut sim = sim_with("
            sb $t0, 0($sp)
            lb $t1, 0($sp)
            lbu $t2, 0($sp)
        ");
        sim.reg_file[T0] = 0x80;
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[T1], 0xFFFF_FF80);
        assert_eq!(sim.reg_file[T2], 0x0000_0080);
    }

    #[test]
    fn test_unaligned_loads_merge() {
        let mut sim = sim_with("
            sw $t1, 0($sp)
            lwl $t0, 2($sp)
            sw $t1, 0($sp)
            lwr $t2, 1($sp)
        ");
        sim.reg_file[T0] = 0xAABB_CCDD;
        sim.reg_file[T2] = 0xAABB_CCDD;
        sim.reg_file[T1] = 0x1122_3344;
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[T0], 0xAABB_1122);
        assert_eq!(sim.reg_file[T2], 0xAABB_3344);
    }

    #[test]
    fn test_trap_is_fatal() {
        let mut sim = sim_with("teq $t0, $t1");
        assert!(matches!(sim.run(), Err(SimErr::Trap(_))));
    }

    #[test]
    fn test_unknown_word_is_fatal() {
        let obj = assemble("j skip").unwrap();
        let mut sim = Simulator::new();
        sim.load_program(&obj);
        // overwrite the only instruction with an unassigned opcode
        sim.mem.write32(TEXT_START, 0xfc00_0000);
        assert!(matches!(sim.run(), Err(SimErr::Decode { word: 0xfc00_0000, .. })));
    }

    #[test]
    fn test_print_int() {
        let buf = SharedBuf::new();
        let mut sim = sim_with("
            addi $a0, $zero, 42
            addi $v0, $zero, 1
            syscall
        ");
        sim.set_output(Box::new(buf.clone()));
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(buf.contents(), "42");
    }

    #[test]
    fn test_read_int_from_script() {
        let mut sim = sim_with("
            addi $v0, $zero, 5
            syscall
        ");
        sim.set_input(InputSource::script("123\n"));
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[V0], 123);
    }

    #[test]
    fn test_exhausted_script_is_fatal() {
        let mut sim = sim_with("
            addi $v0, $zero, 5
            syscall
        ");
        sim.set_input(InputSource::script(""));
        assert_eq!(sim.run(), Err(SimErr::InputExhausted));
    }

    #[test]
    fn test_non_numeric_input_is_fatal() {
        let mut sim = sim_with("
            addi $v0, $zero, 5
            syscall
        ");
        sim.set_input(InputSource::script("pony\n"));
        assert_eq!(sim.run(), Err(SimErr::BadInput("pony".to_string())));
    }

    #[test]
    fn test_sbrk() {
        let mut sim = sim_with("
            addi $a0, $zero, 16
            addi $v0, $zero, 9
            syscall
        ");
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[V0], DATA_START);
        assert_eq!(sim.mem.dynamic_end(), DATA_START + 16);
    }

    #[test]
    fn test_unknown_syscall_is_ignored() {
        let mut sim = sim_with("
            addi $v0, $zero, 99
            syscall
            addi $t0, $zero, 1
        ");
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(sim.reg_file[T0], 1);
    }

    #[test]
    fn test_print_string() {
        let buf = SharedBuf::new();
        let mut sim = sim_with("
            addi $v0, $zero, 4
            syscall
        ");
        sim.set_output(Box::new(buf.clone()));
        // lay the string down by hand and point $a0 at it
        for (k, b) in b"hi!\0".iter().enumerate() {
            sim.mem.write8(DATA_START + k as u32, *b);
        }
        sim.reg_file[A0] = DATA_START;
        assert_eq!(sim.run(), Ok(Exit::EndOfText));
        assert_eq!(buf.contents(), "hi!");
    }
}
