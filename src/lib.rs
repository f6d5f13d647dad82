//! A MIPS32 assembler and simulator.
//!
//! This is meant as a small, complete toy machine for computer architecture
//! courses: assembly source goes in, machine words come out, and those words
//! run on a simulated processor with a flat address space and a
//! SPIM-flavored system call interface.
//!
//! # Usage
//!
//! To convert MIPS source code to an object file, assemble it:
//! ```
//! use mipsim::asm::{assemble, ObjectFile};
//!
//! let code = "
//!     main: addi $t0, $zero, 7
//!           addi $t1, $zero, 3
//!           add  $t2, $t0, $t1
//! ";
//! let obj_file: ObjectFile = assemble(code).unwrap();
//! assert_eq!(obj_file.words().len(), 3);
//! ```
//!
//! Once an object file has been created, it can be executed with the simulator:
//! ```
//! # let obj_file = mipsim::asm::assemble("
//! #     main: addi $t0, $zero, 7
//! #           addi $t1, $zero, 3
//! #           add  $t2, $t0, $t1
//! # ").unwrap();
//! use mipsim::sim::Simulator;
//! use mipsim::ast::reg_consts::T2;
//!
//! let mut simulator = Simulator::new();
//! simulator.load_program(&obj_file);
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//! assert_eq!(simulator.reg_file[T2], 10);
//! ```
//!
//! If more granularity is needed for simulation, there is also a per-instruction
//! step function. See the [`sim`] module for more details.
#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
