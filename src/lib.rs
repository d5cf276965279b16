//! A CHIP-8 interpreter and interactive debugger.
//!
//! This crate provides a full interpreter for the classic CHIP-8 virtual machine
//! (4 KiB of memory, 16 byte registers, a call stack, two countdown timers,
//! a 64x32 monochrome framebuffer and a 16-key keypad) alongside a line-oriented
//! debugger that can single-step, breakpoint and inspect the machine.
//!
//! # Usage
//!
//! To run a program, load its image into a [`sim::Simulator`] and step it:
//! ```
//! use chip8_dbg::sim::Simulator;
//! use chip8_dbg::ast::reg_consts::V0;
//!
//! // LD V0, 0x05
//! // ADD V0, 0x03
//! let program = [0x60, 0x05, 0x70, 0x03];
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&program).unwrap();
//!
//! sim.step_in().unwrap();
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[V0], 0x08);
//! assert_eq!(sim.pc, 0x204);
//! ```
//!
//! Instruction words can be decoded and displayed on their own:
//! ```
//! use chip8_dbg::ast::sim::SimInstr;
//!
//! let instr = SimInstr::decode(0x2ABC).unwrap();
//! assert!(instr.is_call());
//! assert_eq!(instr.to_string(), "CALL 0xABC");
//! assert_eq!(instr.encode(), 0x2ABC);
//! ```
//!
//! The debugger (see the [`dbg`] module) drives a simulator command by command:
//! ```
//! use chip8_dbg::dbg::{Debugger, DbgFlags};
//! use chip8_dbg::sim::Simulator;
//!
//! let mut dbg = Debugger::new(Simulator::new(Default::default()), DbgFlags::unpaced());
//! dbg.load_program(&[0x12, 0x00]).unwrap(); // JP 0x200
//!
//! let mut out = Vec::new();
//! dbg.execute_line("b 0x200", &mut out).unwrap();
//! dbg.execute_line("ib", &mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("0x0200"));
//! ```
#![warn(missing_docs)]

pub mod ast;
pub mod dis;
pub mod sim;
pub mod dbg;
pub mod err;
