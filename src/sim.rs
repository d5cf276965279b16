//! Simulating and execution for CHIP-8 programs.
//!
//! This module is focused on executing raw program images.
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates a program.
//! - [`mem`]: The module handling memory and the register file.
//! - [`screen`]: The module handling the framebuffer.
//! - [`device`]: The module handling the keypad, display, timers and halt requests.
//! - [`debug`]: The module handling breakpoint tables for the debugger.
//! - [`frame`]: The module handling the call stack.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load a program into it:
//!
//! ```
//! use chip8_dbg::sim::Simulator;
//! use chip8_dbg::ast::reg_consts::V0;
//!
//! let program = [
//!     0x60, 0x00, // LD V0, 0x00
//!     0x70, 0x01, // ADD V0, 0x01
//!     0x70, 0x01, // ADD V0, 0x01
//! ];
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&program).unwrap();
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[V0], 0);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[V0], 1);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[V0], 2);
//! assert_eq!(sim.pc, 0x206);
//! ```
//!
//! ## Flags
//!
//! Here, we define `sim` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! to make random numbers reproducible and drive the timers by hand:
//!
//! ```
//! # use chip8_dbg::sim::{Simulator, SimFlags};
//! let mut sim = Simulator::new(SimFlags { timer_hz: 0, seed: Some(1234) });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::step_in`] (which executes one instruction),
//! there are also:
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: programmatic execution
//! - [`Simulator::run_paced`]: free-running execution at a fixed instruction rate
//!
//! Every instruction that modifies the framebuffer sets `render_pending`.
//! The run drivers present a frame to the display device (via [`Simulator::present`])
//! after each instruction that left the flag set.
//!
//! ## Devices
//!
//! Key input, display output and halt requests are handled by the devices
//! in the `device_handler` field (see [`device::DeviceHandler`]).
//!
//! ```
//! use chip8_dbg::sim::Simulator;
//! use chip8_dbg::sim::device::BufferedKeypad;
//! use chip8_dbg::ast::reg_consts::V3;
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&[0xF3, 0x0A]).unwrap(); // LD V3, K
//!
//! let keypad = BufferedKeypad::new();
//! sim.device_handler.set_keypad(keypad.clone());
//! keypad.press(0xB);
//!
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[V3], 0xB);
//! ```
pub mod mem;
pub mod debug;
pub mod frame;
pub mod device;
pub mod screen;

use std::time::Duration;

use crossbeam_channel as cbc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ast::reg_consts::{V0, VF};
use crate::ast::sim::SimInstr;
use device::{DeviceHandler, TimerDevice, Timers};
use frame::{CallStack, MAX_CALL_DEPTH};
use mem::{Mem, RegFile, ADDR_MASK, MEM_SIZE, PROGRAM_START};
use screen::Framebuffer;

/// How long the Simulator waits for a key in one go while suspended on `LD Vx, K`.
const KEY_POLL: Duration = Duration::from_millis(5);

/// Errors that can occur during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimErr {
    /// The word at `addr` does not decode to an instruction.
    IllegalInstruction {
        /// The offending instruction word.
        word: u16,
        /// The address it was fetched from.
        addr: u16
    },
    /// A call at `addr` exceeded the maximum call depth.
    StackOverflow {
        /// The address of the call.
        addr: u16
    },
    /// A return at `addr` was executed with an empty call stack.
    StackUnderflow {
        /// The address of the return.
        addr: u16
    },
    /// The program image does not fit in memory.
    ProgramTooLarge {
        /// The length of the image, in bytes.
        len: usize
    },
    /// An address outside of memory was accessed.
    MemoryOutOfRange {
        /// The address.
        addr: u32
    },
    /// Execution was interrupted by a halt request.
    Interrupted,
}
impl SimErr {
    /// Whether this error leaves the machine in a state that only a reset can clear.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimErr::StackOverflow { .. } | SimErr::StackUnderflow { .. })
    }
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalInstruction { word, addr } => write!(f, "illegal instruction 0x{word:04X} at 0x{addr:03X}"),
            SimErr::StackOverflow { addr }  => write!(f, "stack overflow at 0x{addr:03X}"),
            SimErr::StackUnderflow { addr } => write!(f, "stack underflow at 0x{addr:03X}"),
            SimErr::ProgramTooLarge { len } => write!(f, "program of {len} bytes does not fit in memory"),
            SimErr::MemoryOutOfRange { addr } => write!(f, "address 0x{addr:X} is out of range"),
            SimErr::Interrupted => f.write_str("execution interrupted"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::IllegalInstruction { .. } => Some("the word can be patched in memory and execution retried".into()),
            SimErr::StackOverflow { .. } => Some(format!("subroutine calls can only be nested {MAX_CALL_DEPTH} deep; reset the machine to continue").into()),
            SimErr::StackUnderflow { .. } => Some("a return was executed outside of any subroutine; reset the machine to continue".into()),
            SimErr::ProgramTooLarge { .. } => Some(format!("programs can be at most {} bytes", MAX_PROGRAM_LEN).into()),
            SimErr::MemoryOutOfRange { .. } => Some(format!("addresses must be less than 0x{MEM_SIZE:X}").into()),
            SimErr::Interrupted => None,
        }
    }
}

/// The largest program image that can be loaded.
pub const MAX_PROGRAM_LEN: usize = MEM_SIZE - PROGRAM_START as usize;

/// Configuration flags for [`Simulator`].
///
/// These are preserved between resets, and take effect on
/// [`Simulator::new`] and [`Simulator::reset`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The rate the delay and sound timers count down at, in ticks per second.
    ///
    /// If 0, the timers only move through [`Simulator::tick_timers`].
    ///
    /// By default, this is 60.
    pub timer_hz: u32,

    /// The seed for the random number generator (used by `RND`).
    ///
    /// If `None`, the generator is seeded from entropy.
    ///
    /// By default, this is `None`.
    pub seed: Option<u64>
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            timer_hz: 60,
            seed: None
        }
    }
}

/// Executes CHIP-8 programs.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    pub mem: Mem,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The address register.
    ///
    /// Only the low 12 bits are significant.
    pub i: u16,

    /// The program counter.
    ///
    /// This points at the next instruction to execute.
    pub pc: u16,

    /// The call stack.
    pub stack: CallStack,

    /// The delay and sound timers.
    pub timers: Timers,

    /// The framebuffer.
    pub framebuffer: Framebuffer,

    /// Whether the framebuffer changed since the last presented frame.
    pub render_pending: bool,

    /// The number of instructions successfully run since this `Simulator` was reset.
    pub instructions_run: u64,

    /// A fatal error which execution cannot continue past until reset.
    fault: Option<SimErr>,

    rng: Box<StdRng>,

    timer: TimerDevice,

    // ------------------ CONFIG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Configuration settings for the simulator.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// All external devices connected to the system.
    pub device_handler: DeviceHandler
}
impl Simulator where Simulator: Send {}

impl Simulator {
    /// Creates a new simulator with the provided flags and with the font loaded,
    /// but without a loaded program.
    pub fn new(flags: SimFlags) -> Self {
        let rng = match flags.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            mem: Mem::new(),
            reg_file: RegFile::new(),
            i: 0,
            pc: PROGRAM_START,
            stack: CallStack::new(),
            timers: Timers::new(),
            framebuffer: Framebuffer::new(),
            render_pending: false,
            instructions_run: 0,
            fault: None,
            rng: Box::new(rng),
            timer: TimerDevice::new(flags.timer_hz),

            flags,
            device_handler: Default::default()
        }
    }

    /// Resets the simulator.
    ///
    /// This zeroes memory (reinstalling the font), registers, the stack and the framebuffer,
    /// and clears any fatal error, while preserving flags and devices.
    /// The devices themselves are reset.
    ///
    /// This does not reload the program. It has to be reloaded into the Simulator.
    pub fn reset(&mut self) {
        let flags = self.flags;
        let dev_handler = std::mem::take(&mut self.device_handler);

        *self = Simulator::new(flags);
        self.device_handler = dev_handler;
        self.device_handler.reset();
    }

    /// Loads a program image into memory at `0x200`.
    ///
    /// This does not reset the Simulator. Any memory outside the image is left untouched.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), SimErr> {
        if image.len() > MAX_PROGRAM_LEN {
            return Err(SimErr::ProgramTooLarge { len: image.len() });
        }

        self.mem.copy_block(PROGRAM_START, image);
        log::debug!("loaded {} byte program", image.len());
        Ok(())
    }

    /// Reads the byte at the provided address, erroring if it is outside of memory.
    pub fn read_byte(&self, addr: u32) -> Result<u8, SimErr> {
        let addr = check_addr(addr)?;
        Ok(self.mem.get(addr))
    }

    /// Writes the byte at the provided address, erroring if it is outside of memory.
    pub fn write_byte(&mut self, addr: u32, data: u8) -> Result<(), SimErr> {
        let addr = check_addr(addr)?;
        self.mem.set(addr, data);
        Ok(())
    }

    /// Gets up to `count` bytes of memory starting at `addr`.
    ///
    /// The range is clamped to the end of memory.
    ///
    /// ```
    /// use chip8_dbg::sim::Simulator;
    ///
    /// let sim = Simulator::new(Default::default());
    /// assert_eq!(sim.examine(0x000, 2).unwrap(), &[0xF0, 0x90]);
    /// assert_eq!(sim.examine(0xFFE, 16).unwrap().len(), 2);
    /// assert!(sim.examine(0x1000, 1).is_err());
    /// ```
    pub fn examine(&self, addr: u32, count: usize) -> Result<&[u8], SimErr> {
        let start = usize::from(check_addr(addr)?);
        let end = start.saturating_add(count).min(MEM_SIZE);
        Ok(&self.mem.as_slice()[start..end])
    }

    /// Decodes the instruction at the given address without executing it.
    pub fn instr_at(&self, addr: u16) -> Result<SimInstr, SimErr> {
        let word = self.mem.read_word(addr);
        SimInstr::decode(word)
            .map_err(|_| SimErr::IllegalInstruction { word, addr: addr & ADDR_MASK })
    }

    /// The fatal error the machine is stopped on, if any.
    pub fn fault(&self) -> Option<&SimErr> {
        self.fault.as_ref()
    }

    /// Decrements both timers once, signalling the display's alert if the sound timer runs out.
    pub fn tick_timers(&mut self) {
        if self.timers.tick() {
            log::debug!("sound timer expired");
            self.device_handler.alert();
        }
    }

    /// Applies every timer tick that elapsed since the timers were last updated.
    ///
    /// Timers count down in real time whether or not the machine is executing.
    /// Execution applies the elapsed ticks at every instruction boundary,
    /// and a driver that is idle (such as a debugger waiting for a command)
    /// should call this whenever [`Simulator::timer_wakeups`] fires.
    pub fn update_timers(&mut self) {
        for _ in 0..self.timer.pending() {
            if self.timers == Timers::new() { break };
            self.tick_timers();
        }
    }

    /// A channel which receives a message whenever a timer tick elapses.
    ///
    /// See [`Simulator::update_timers`].
    pub fn timer_wakeups(&self) -> cbc::Receiver<std::time::Instant> {
        self.timer.wakeups()
    }

    /// Presents the framebuffer to the display, if it changed since the last frame.
    ///
    /// This returns whether a frame was presented.
    pub fn present(&mut self) -> bool {
        let pending = std::mem::take(&mut self.render_pending);
        if pending {
            self.device_handler.render(&self.framebuffer);
        }
        pending
    }

    /// Runs until the tripwire condition returns false (or an error occurs).
    ///
    /// The tripwire is checked before every instruction.
    /// If the device handler signals a halt request, this errors with [`SimErr::Interrupted`].
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        loop {
            if self.device_handler.poll_interrupt() {
                break Err(SimErr::Interrupted);
            }
            if !tripwire(self) {
                break Ok(());
            }

            self.step_in()?;
            self.present();
        }
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until an error occurs or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Execute the program, executing one instruction every `period`.
    ///
    /// This only returns once an error occurs (including a halt request).
    pub fn run_paced(&mut self, period: Duration) -> Result<(), SimErr> {
        let ticker = cbc::tick(period);
        self.run_while(|_| ticker.recv().is_ok())
    }

    /// Waits for a key press, servicing the timers while waiting.
    fn wait_key(&mut self) -> Result<u8, SimErr> {
        loop {
            if self.device_handler.poll_interrupt() {
                return Err(SimErr::Interrupted);
            }
            self.update_timers();
            if let Some(key) = self.device_handler.wait_press(KEY_POLL) {
                return Ok(key);
            }
        }
    }

    /// Skips the next instruction if the condition holds.
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    /// Simulate one step, executing one instruction.
    ///
    /// On success, the PC points to the next instruction to execute.
    /// If an error occurs, the PC is left on the instruction that caused it.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        self.update_timers();

        let addr = self.pc & ADDR_MASK;
        self.pc = addr;
        let instr = self.instr_at(addr)?;
        log::trace!("0x{addr:03X}: {instr}");

        match self.execute(instr) {
            Ok(()) => {
                // Every instruction ends with this increment, so control flow
                // instructions target 2 bytes before their destination.
                self.pc = self.pc.wrapping_add(2) & ADDR_MASK;
                self.instructions_run = self.instructions_run.wrapping_add(1);
                Ok(())
            },
            Err(e) => {
                self.pc = addr;
                if e.is_fatal() {
                    log::debug!("machine faulted: {e}");
                    self.fault = Some(e.clone());
                }
                Err(e)
            }
        }
    }

    fn execute(&mut self, instr: SimInstr) -> Result<(), SimErr> {
        let pc = self.pc;

        match instr {
            SimInstr::CLS => {
                self.framebuffer.clear();
                self.render_pending = true;
            },
            SimInstr::RET => {
                let ret = self.stack.pop().ok_or(SimErr::StackUnderflow { addr: pc })?;
                self.pc = ret;
            },
            SimInstr::SYS(a) => log::warn!("ignoring SYS {a} at 0x{pc:03X}"),
            SimInstr::JP(a) => self.pc = a.get().wrapping_sub(2),
            SimInstr::CALL(a) => {
                self.stack.push(pc).map_err(|_| SimErr::StackOverflow { addr: pc })?;
                self.pc = a.get().wrapping_sub(2);
            },
            SimInstr::SE(r, b)    => self.skip_if(self.reg_file[r] == b),
            SimInstr::SNE(r, b)   => self.skip_if(self.reg_file[r] != b),
            SimInstr::SER(r1, r2) => self.skip_if(self.reg_file[r1] == self.reg_file[r2]),
            SimInstr::SNER(r1, r2) => self.skip_if(self.reg_file[r1] != self.reg_file[r2]),
            SimInstr::LD(r, b)  => self.reg_file[r] = b,
            SimInstr::ADD(r, b) => self.reg_file[r] = self.reg_file[r].wrapping_add(b),
            SimInstr::LDR(r1, r2) => self.reg_file[r1] = self.reg_file[r2],
            SimInstr::OR(r1, r2)  => self.reg_file[r1] |= self.reg_file[r2],
            SimInstr::AND(r1, r2) => self.reg_file[r1] &= self.reg_file[r2],
            SimInstr::XOR(r1, r2) => self.reg_file[r1] ^= self.reg_file[r2],

            // For the flag-setting ALU operations, VF is written last,
            // so the flag wins if VF is also the destination.
            SimInstr::ADDR(r1, r2) => {
                let (result, carry) = self.reg_file[r1].overflowing_add(self.reg_file[r2]);
                self.reg_file[r1] = result;
                self.reg_file[VF] = u8::from(carry);
            },
            SimInstr::SUB(r1, r2) => {
                let (result, borrow) = self.reg_file[r1].overflowing_sub(self.reg_file[r2]);
                self.reg_file[r1] = result;
                self.reg_file[VF] = u8::from(!borrow);
            },
            SimInstr::SUBN(r1, r2) => {
                let (result, borrow) = self.reg_file[r2].overflowing_sub(self.reg_file[r1]);
                self.reg_file[r1] = result;
                self.reg_file[VF] = u8::from(!borrow);
            },
            SimInstr::SHR(r, _) => {
                let val = self.reg_file[r];
                self.reg_file[r] = val >> 1;
                self.reg_file[VF] = val & 1;
            },
            SimInstr::SHL(r, _) => {
                let val = self.reg_file[r];
                self.reg_file[r] = val << 1;
                self.reg_file[VF] = val >> 7;
            },

            SimInstr::LDI(a) => self.i = a.get(),
            SimInstr::JPV0(a) => {
                let target = a.get().wrapping_add(u16::from(self.reg_file[V0]));
                self.pc = target.wrapping_sub(2);
            },
            SimInstr::RND(r, mask) => self.reg_file[r] = self.rng.gen::<u8>() & mask,
            SimInstr::DRW(rx, ry, n) => {
                let mut sprite = [0; 15];
                let sprite = &mut sprite[..usize::from(n.get())];
                for (off, byte) in (0..).zip(sprite.iter_mut()) {
                    *byte = self.mem.get(self.i.wrapping_add(off));
                }

                let x = usize::from(self.reg_file[rx]);
                let y = usize::from(self.reg_file[ry]);
                let collision = self.framebuffer.draw_sprite(x, y, sprite);
                self.reg_file[VF] = u8::from(collision);
                self.render_pending = true;
            },
            SimInstr::SKP(r) => {
                let held = self.device_handler.is_pressed(self.reg_file[r] & 0xF);
                self.skip_if(held);
            },
            SimInstr::SKNP(r) => {
                let held = self.device_handler.is_pressed(self.reg_file[r] & 0xF);
                self.skip_if(!held);
            },
            SimInstr::LDDT(r)  => self.reg_file[r] = self.timers.delay,
            SimInstr::LDK(r)   => self.reg_file[r] = self.wait_key()?,
            SimInstr::SETDT(r) => self.timers.delay = self.reg_file[r],
            SimInstr::SETST(r) => self.timers.sound = self.reg_file[r],
            SimInstr::ADDI(r)  => self.i = self.i.wrapping_add(u16::from(self.reg_file[r])) & ADDR_MASK,
            SimInstr::LDF(r)   => self.i = mem::glyph_addr(self.reg_file[r]),
            SimInstr::LDB(r) => {
                let val = self.reg_file[r];
                self.mem.set(self.i, val / 100);
                self.mem.set(self.i.wrapping_add(1), val / 10 % 10);
                self.mem.set(self.i.wrapping_add(2), val % 10);
            },
            // I ends one past the last byte transferred.
            SimInstr::STM(last) => {
                for r in last.up_to() {
                    self.mem.set(self.i, self.reg_file[r]);
                    self.i = self.i.wrapping_add(1) & ADDR_MASK;
                }
            },
            SimInstr::LDM(last) => {
                for r in last.up_to() {
                    self.reg_file[r] = self.mem.get(self.i);
                    self.i = self.i.wrapping_add(1) & ADDR_MASK;
                }
            },
        }

        Ok(())
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

fn check_addr(addr: u32) -> Result<u16, SimErr> {
    match u16::try_from(addr) {
        Ok(a) if usize::from(a) < MEM_SIZE => Ok(a),
        _ => Err(SimErr::MemoryOutOfRange { addr }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::{SimErr, SimFlags, Simulator};
    use crate::ast::reg_consts::{V0, V1, V2, V5, VF};
    use crate::sim::device::{BufferedDisplay, BufferedKeypad, InterruptFromFn};
    use crate::sim::frame::MAX_CALL_DEPTH;

    fn flags() -> SimFlags {
        SimFlags { timer_hz: 0, seed: Some(0) }
    }

    fn sim_with(words: &[u16]) -> Simulator {
        let image: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        let mut sim = Simulator::new(flags());
        sim.load_program(&image).unwrap();
        sim
    }

    #[test]
    fn test_load_store_immediate() {
        let mut sim = sim_with(&[0x6AFE, 0x7A03, 0x7A01]);
        sim.run_with_limit(3).unwrap();
        assert_eq!(sim.reg_file[crate::ast::reg_consts::VA], 0x02);
        // immediate adds leave the flag alone
        assert_eq!(sim.reg_file[VF], 0);
        assert_eq!(sim.pc, 0x206);
        assert_eq!(sim.instructions_run, 3);
    }

    #[test]
    fn test_add_carry() {
        let mut sim = sim_with(&[0x8014]);
        sim.reg_file[V0] = 0xFF;
        sim.reg_file[V1] = 0x01;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0x00);
        assert_eq!(sim.reg_file[VF], 1);
    }

    #[test]
    fn test_sub_borrow() {
        let mut sim = sim_with(&[0x8015, 0x8015]);
        sim.reg_file[V0] = 0x01;
        sim.reg_file[V1] = 0x02;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0xFF);
        assert_eq!(sim.reg_file[VF], 0);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0xFD);
        assert_eq!(sim.reg_file[VF], 1);
    }

    #[test]
    fn test_subn() {
        let mut sim = sim_with(&[0x8017, 0x8017]);
        sim.reg_file[V0] = 0x02;
        sim.reg_file[V1] = 0x05;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0x03);
        assert_eq!(sim.reg_file[VF], 1);

        sim.reg_file[V0] = 0x06;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0xFF);
        assert_eq!(sim.reg_file[VF], 0);
    }

    #[test]
    fn test_shifts() {
        let mut sim = sim_with(&[0x8016, 0x801E, 0x801E]);
        sim.reg_file[V0] = 0b1000_0011;
        sim.reg_file[V1] = 0xAA; // Y is ignored

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0b0100_0001);
        assert_eq!(sim.reg_file[VF], 1);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0b1000_0010);
        assert_eq!(sim.reg_file[VF], 0);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V0], 0b0000_0100);
        assert_eq!(sim.reg_file[VF], 1);
        assert_eq!(sim.reg_file[V1], 0xAA);
    }

    #[test]
    fn test_flag_written_last() {
        // ADD VF, V1
        let mut sim = sim_with(&[0x8F14]);
        sim.reg_file[VF] = 0x10;
        sim.reg_file[V1] = 0x01;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[VF], 0);
    }

    #[test]
    fn test_bitwise() {
        let mut sim = sim_with(&[0x8011, 0x8022, 0x8013, 0x8500]);
        sim.reg_file[V0] = 0b0011;
        sim.reg_file[V1] = 0b0101;
        sim.reg_file[V2] = 0b1110;
        sim.run_with_limit(4).unwrap();
        // ((0011 | 0101) & 1110) ^ 0101
        assert_eq!(sim.reg_file[V0], 0b0011);
        assert_eq!(sim.reg_file[V5], 0b0011);
    }

    #[test]
    fn test_call_ret() {
        let mut sim = sim_with(&[0x2300]);
        sim.mem.set(0x300, 0x00);
        sim.mem.set(0x301, 0xEE);

        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x300);
        assert_eq!(sim.stack.len(), 1);

        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x202);
        assert!(sim.stack.is_empty());
    }

    #[test]
    fn test_jumps() {
        let mut sim = sim_with(&[0x1208]);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x208);

        // BNNN at 0x208
        sim.mem.set(0x208, 0xB3);
        sim.mem.set(0x209, 0x00);
        sim.reg_file[V0] = 0x10;
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x310);

        // JP 0x000 wraps through the post-increment
        sim.mem.set(0x310, 0x10);
        sim.mem.set(0x311, 0x00);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x000);
    }

    #[test]
    fn test_skips() {
        // SE V0, 0x05; (skipped); SNE V0, 0x05; SER V0, V1
        let mut sim = sim_with(&[0x3005, 0x0000, 0x4005, 0x5010]);
        sim.reg_file[V0] = 0x05;
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x204);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x206);

        sim.reg_file[V1] = 0x05;
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x20A);
    }

    #[test]
    fn test_ser_ignores_low_nibble() {
        let mut sim = sim_with(&[0x501F, 0x0000, 0x901F]);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x204);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x206);
    }

    #[test]
    fn test_stack_overflow_latches() {
        // CALL 0x200 forever
        let mut sim = sim_with(&[0x2200]);
        for _ in 0..MAX_CALL_DEPTH {
            sim.step_in().unwrap();
        }

        let err = SimErr::StackOverflow { addr: 0x200 };
        assert_eq!(sim.step_in(), Err(err.clone()));
        assert_eq!(sim.pc, 0x200);
        assert_eq!(sim.stack.len(), MAX_CALL_DEPTH);
        assert_eq!(sim.fault(), Some(&err));

        // stays faulted
        assert_eq!(sim.step_in(), Err(err));

        sim.reset();
        assert!(sim.fault().is_none());
        assert!(sim.stack.is_empty());
    }

    #[test]
    fn test_stack_underflow() {
        let mut sim = sim_with(&[0x00EE]);
        assert_eq!(sim.step_in(), Err(SimErr::StackUnderflow { addr: 0x200 }));
        assert_eq!(sim.pc, 0x200);
        assert!(sim.step_in().is_err());
    }

    #[test]
    fn test_illegal_does_not_advance() {
        let mut sim = sim_with(&[0x6001, 0x8008]);
        sim.step_in().unwrap();
        assert_eq!(sim.step_in(), Err(SimErr::IllegalInstruction { word: 0x8008, addr: 0x202 }));
        assert_eq!(sim.pc, 0x202);
        assert!(sim.fault().is_none());

        // patching the word lets execution continue
        sim.write_byte(0x203, 0x00).unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x204);
    }

    #[test]
    fn test_sys_is_noop() {
        let mut sim = sim_with(&[0x0123]);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x202);
        assert_eq!(sim.instructions_run, 1);
    }

    #[test]
    fn test_cls_then_blank_sprite() {
        let mut sim = sim_with(&[0x00E0, 0xD015]);
        sim.framebuffer.toggle(3, 3);
        sim.i = 0x300; // zeroed
        sim.run_with_limit(1).unwrap();
        sim.render_pending = false;
        sim.step_in().unwrap();

        assert!(sim.framebuffer.is_blank());
        assert!(sim.render_pending);
        assert_eq!(sim.reg_file[VF], 0);
    }

    #[test]
    fn test_sprite_collision() {
        // LD F, V0; DRW V1, V2, 5; DRW V1, V2, 5
        let mut sim = sim_with(&[0xF029, 0xD125, 0xD125]);
        sim.reg_file[V0] = 0x8;
        sim.reg_file[V1] = 62;
        sim.reg_file[V2] = 30;

        sim.step_in().unwrap();
        assert_eq!(sim.i, 40);
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[VF], 0);
        assert!(sim.framebuffer.get(62, 30));
        // wrapped onto the left and top edges
        assert!(sim.framebuffer.get(1, 0));

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[VF], 1);
        assert!(sim.framebuffer.is_blank());
    }

    #[test]
    fn test_bcd() {
        let mut sim = sim_with(&[0xF533]);
        sim.reg_file[V5] = 234;
        sim.i = 0x300;
        sim.step_in().unwrap();
        assert_eq!(sim.examine(0x300, 3).unwrap(), &[2, 3, 4]);
    }

    #[test]
    fn test_block_store_load() {
        let mut sim = sim_with(&[0xF255, 0xF565]);
        sim.reg_file[V0] = 1;
        sim.reg_file[V1] = 2;
        sim.reg_file[V2] = 3;
        sim.reg_file[crate::ast::reg_consts::V3] = 0xFF;
        sim.i = 0x400;

        sim.step_in().unwrap();
        assert_eq!(sim.examine(0x400, 4).unwrap(), &[1, 2, 3, 0]);
        assert_eq!(sim.i, 0x403);

        sim.write_byte(0x408, 0x55).unwrap();
        sim.step_in().unwrap();
        assert_eq!(&sim.reg_file.as_slice()[..6], &[0, 0, 0, 0, 0, 0x55]);
        assert_eq!(sim.i, 0x409);
    }

    #[test]
    fn test_block_store_wraps() {
        // LD [I], V1
        let mut sim = sim_with(&[0xF155]);
        sim.reg_file[V0] = 0xAA;
        sim.reg_file[V1] = 0xBB;
        sim.i = 0xFFF;

        sim.step_in().unwrap();
        assert_eq!(sim.read_byte(0xFFF), Ok(0xAA));
        assert_eq!(sim.read_byte(0x000), Ok(0xBB));
        assert_eq!(sim.i, 0x001);
    }

    #[test]
    fn test_font_addr_unmasked() {
        // LD F, V0
        let mut sim = sim_with(&[0xF029]);
        sim.reg_file[V0] = 0x10;
        sim.step_in().unwrap();
        assert_eq!(sim.i, 0x50);
    }

    #[test]
    fn test_addi_wraps() {
        let mut sim = sim_with(&[0xAFFF, 0xF01E]);
        sim.reg_file[V0] = 2;
        sim.run_with_limit(2).unwrap();
        assert_eq!(sim.i, 0x001);
        assert_eq!(sim.reg_file[VF], 0);
    }

    #[test]
    fn test_rnd_masked_and_seeded() {
        let program = [0xC00F, 0xC1FF, 0xC2FF];
        let mut a = sim_with(&program);
        let mut b = sim_with(&program);
        a.run_with_limit(3).unwrap();
        b.run_with_limit(3).unwrap();

        assert_eq!(a.reg_file[V0] & 0xF0, 0);
        assert_eq!(a.reg_file, b.reg_file);
    }

    #[test]
    fn test_timers() {
        // LD V0, 0x01; LD DT, V0; LD ST, V0; LD V1, DT
        let mut sim = sim_with(&[0x6001, 0xF015, 0xF018, 0xF107]);
        let display = BufferedDisplay::default();
        sim.device_handler.set_display(display.clone());

        sim.run_with_limit(3).unwrap();
        assert_eq!(sim.timers.delay, 1);
        assert_eq!(sim.timers.sound, 1);

        sim.tick_timers();
        assert_eq!(sim.timers.delay, 0);
        assert_eq!(display.alert_count(), 1);
        sim.tick_timers();
        assert_eq!(sim.timers.delay, 0);
        assert_eq!(display.alert_count(), 1);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V1], 0);
    }

    #[test]
    fn test_timers_count_in_real_time() {
        // LD V0, 0x05; LD DT, V0; LD V1, DT
        let mut sim = Simulator::new(SimFlags { timer_hz: 60, seed: Some(0) });
        sim.load_program(&[0x60, 0x05, 0xF0, 0x15, 0xF1, 0x07]).unwrap();

        sim.step_in().unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.timers.delay, 5);

        // the pause between steps still counts down
        std::thread::sleep(Duration::from_millis(200));
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V1], 0);
        assert_eq!(sim.timers.delay, 0);

        // as does a pause with no step at all
        sim.timers.delay = 3;
        std::thread::sleep(Duration::from_millis(100));
        sim.update_timers();
        assert_eq!(sim.timers.delay, 0);
    }

    #[test]
    fn test_timers_count_while_waiting_for_key() {
        // LD V0, 0x30; LD DT, V0; LD V1, K
        let mut sim = Simulator::new(SimFlags { timer_hz: 60, seed: Some(0) });
        sim.load_program(&[0x60, 0x30, 0xF0, 0x15, 0xF1, 0x0A]).unwrap();

        let keypad = BufferedKeypad::new();
        sim.device_handler.set_keypad(keypad.clone());
        let start = Instant::now();
        sim.device_handler.set_interrupt(InterruptFromFn::new(move || {
            if start.elapsed() >= Duration::from_millis(200) {
                keypad.press(0xC);
            }
            false
        }));

        sim.run_with_limit(3).unwrap();
        assert_eq!(sim.reg_file[V1], 0xC);
        assert!(sim.timers.delay <= 0x30 - 8, "delay only fell to {}", sim.timers.delay);
    }

    #[test]
    fn test_keys() {
        // SKP V0; (skipped); SKNP V0
        let mut sim = sim_with(&[0xE09E, 0x0000, 0xE0A1]);
        let keypad = BufferedKeypad::new();
        sim.device_handler.set_keypad(keypad.clone());

        sim.reg_file[V0] = 0x7;
        keypad.press(0x7);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x204);

        keypad.release(0x7);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x208);
    }

    #[test]
    fn test_wait_key_interrupted() {
        let mut sim = sim_with(&[0xF10A]);
        let halt = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&halt);
        sim.device_handler.set_interrupt(InterruptFromFn::new(move || flag.swap(false, Ordering::Relaxed)));

        let keypad = BufferedKeypad::new();
        sim.device_handler.set_keypad(keypad.clone());

        halt.store(true, Ordering::Relaxed);
        assert_eq!(sim.step_in(), Err(SimErr::Interrupted));
        assert_eq!(sim.pc, 0x200);

        keypad.press(0x2);
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[V1], 0x2);
        assert_eq!(sim.pc, 0x202);
    }

    #[test]
    fn test_run_interrupted() {
        let mut sim = sim_with(&[0x1200]);
        let (tx, rx) = crossbeam_channel::unbounded();
        sim.device_handler.set_interrupt(InterruptFromFn::from_channel(rx));

        tx.send(()).unwrap();
        assert_eq!(sim.run_while(|_| true), Err(SimErr::Interrupted));
        assert_eq!(sim.instructions_run, 0);
    }

    #[test]
    fn test_run_presents_frames() {
        let mut sim = sim_with(&[0x00E0, 0x6000, 0x00E0]);
        let display = BufferedDisplay::default();
        sim.device_handler.set_display(display.clone());

        sim.run_with_limit(3).unwrap();
        assert_eq!(display.frame_count(), 2);
        assert!(!sim.render_pending);
    }

    #[test]
    fn test_program_too_large() {
        let mut sim = Simulator::new(flags());
        assert!(sim.load_program(&[0; super::MAX_PROGRAM_LEN]).is_ok());
        assert_eq!(
            sim.load_program(&[0; super::MAX_PROGRAM_LEN + 1]),
            Err(SimErr::ProgramTooLarge { len: super::MAX_PROGRAM_LEN + 1 })
        );
    }

    #[test]
    fn test_memory_range() {
        let mut sim = Simulator::new(flags());
        assert!(sim.write_byte(0xFFF, 1).is_ok());
        assert_eq!(sim.read_byte(0xFFF), Ok(1));
        assert_eq!(sim.read_byte(0x1000), Err(SimErr::MemoryOutOfRange { addr: 0x1000 }));
        assert_eq!(sim.write_byte(0x10000, 1), Err(SimErr::MemoryOutOfRange { addr: 0x10000 }));
    }

    #[test]
    fn test_reset_preserves_devices() {
        let mut sim = sim_with(&[0x00E0]);
        let display = BufferedDisplay::default();
        sim.device_handler.set_display(display.clone());
        sim.reg_file[V0] = 9;
        sim.i = 0x123;
        sim.run_with_limit(1).unwrap();
        assert_eq!(display.frame_count(), 1);

        sim.reset();
        assert_eq!(sim.reg_file[V0], 0);
        assert_eq!(sim.i, 0);
        assert_eq!(sim.pc, 0x200);
        assert_eq!(sim.read_byte(0x200), Ok(0));
        assert_eq!(sim.read_byte(0x000), Ok(0xF0));
        assert_eq!(sim.flags, flags());

        // the display was reset, but is still attached
        assert_eq!(display.frame_count(), 0);
        sim.framebuffer.toggle(0, 0);
        sim.render_pending = true;
        sim.present();
        assert_eq!(display.frame_count(), 1);
    }
}
