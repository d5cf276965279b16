//! An interactive debugger for the [`Simulator`].
//!
//! The key type here is [`Debugger`], which owns a Simulator together with
//! two [`BreakpointTable`]s (persistent and temporary) and drives it
//! command by command.
//!
//! The debugger is either `Stopped` (waiting for a command) or `Running`
//! (executing instructions at a fixed tick rate). It stops running when:
//! - an enabled persistent breakpoint is at the PC,
//! - an enabled temporary breakpoint is at the PC (which removes it),
//! - the Simulator raises an error,
//! - or a halt is requested through the Simulator's interrupt device.
//!
//! Resuming never stops on the breakpoint the PC is already sitting on:
//! breakpoints are only checked after the first instruction of a run has executed.
//!
//! Commands are parsed from lines of text (see [`cmd`]), and their output is
//! written to any [`Write`]r.
//!
//! ```
//! use chip8_dbg::dbg::{Debugger, DbgFlags};
//! use chip8_dbg::sim::{Simulator, SimFlags};
//!
//! let program = [
//!     0x23, 0x00, // 0x200: CALL 0x300
//!     0x12, 0x02, // 0x202: JP 0x202
//! ];
//! let mut dbg = Debugger::new(Simulator::new(SimFlags { timer_hz: 0, seed: None }), DbgFlags::unpaced());
//! dbg.load_program(&program).unwrap();
//! dbg.sim.write_byte(0x300, 0x00).unwrap(); // 0x300: RET
//! dbg.sim.write_byte(0x301, 0xEE).unwrap();
//!
//! let mut out = Vec::new();
//! dbg.execute_line("n", &mut out).unwrap();
//! assert_eq!(dbg.sim.pc, 0x202);
//! ```
pub mod cmd;
pub mod lex;

use std::io::Write;
use std::time::Duration;

use crossbeam_channel as cbc;
use crossterm::style::{style, Color, Stylize};

use crate::dis::Disassembly;
use crate::err::Error as _;
use crate::sim::debug::BreakpointTable;
use crate::sim::device::InterruptFromFn;
use crate::sim::mem::{ADDR_MASK, MEM_SIZE};
use crate::sim::{SimErr, Simulator};
use cmd::{BpKind, BpOp, CmdErr, Command};

const PROMPT: &str = ">>> ";

/// The number of bytes printed per row when examining memory.
const EXAMINE_ROW: usize = 16;

/// Configuration flags for [`Debugger`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DbgFlags {
    /// The time between instructions while running.
    ///
    /// If zero, instructions run back to back.
    ///
    /// By default, this is 2ms.
    pub tick: Duration,

    /// Whether output is colored with terminal escape codes.
    ///
    /// By default, this is `true`.
    pub color: bool
}
impl DbgFlags {
    /// Flags which run as fast as possible without color.
    ///
    /// Useful for driving the debugger programmatically.
    pub fn unpaced() -> Self {
        Self { tick: Duration::ZERO, color: false }
    }
}
impl Default for DbgFlags {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(2),
            color: true
        }
    }
}

/// Whether the debugger is executing instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DbgState {
    /// Waiting for a command.
    #[default]
    Stopped,
    /// Executing instructions.
    Running
}

/// Why the debugger stopped running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// An enabled persistent breakpoint was hit at the given address.
    Breakpoint(u16),
    /// An enabled temporary breakpoint was hit (and removed) at the given address.
    TempBreakpoint(u16),
    /// A halt was requested.
    Interrupted,
    /// The Simulator raised an error.
    Error(SimErr),
}

/// What the caller should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Wait for the next command.
    Continue,
    /// Exit the debugger.
    Quit
}

/// Errors raised by debugger commands.
///
/// None of these change the state of the machine.
#[derive(Debug)]
pub enum DbgErr {
    /// The command line was malformed.
    Cmd(CmdErr),
    /// The Simulator rejected an access.
    Sim(SimErr),
    /// A breakpoint command addressed a breakpoint that does not exist.
    NoSuchBreakpoint {
        /// The table the breakpoint was looked up in.
        kind: BpKind,
        /// The address of the breakpoint.
        addr: u16
    },
    /// The output could not be written.
    Io(std::io::Error),
}
impl From<CmdErr> for DbgErr {
    fn from(value: CmdErr) -> Self {
        Self::Cmd(value)
    }
}
impl From<SimErr> for DbgErr {
    fn from(value: SimErr) -> Self {
        Self::Sim(value)
    }
}
impl From<std::io::Error> for DbgErr {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
impl std::fmt::Display for DbgErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbgErr::Cmd(e) => e.fmt(f),
            DbgErr::Sim(e) => e.fmt(f),
            DbgErr::NoSuchBreakpoint { kind: BpKind::Persistent, addr } => write!(f, "no breakpoint at 0x{addr:04X}"),
            DbgErr::NoSuchBreakpoint { kind: BpKind::Temporary, addr } => write!(f, "no temporary breakpoint at 0x{addr:04X}"),
            DbgErr::Io(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for DbgErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbgErr::Cmd(e) => Some(e),
            DbgErr::Sim(e) => Some(e),
            DbgErr::NoSuchBreakpoint { .. } => None,
            DbgErr::Io(e) => Some(e),
        }
    }
}
impl crate::err::Error for DbgErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            DbgErr::Cmd(e) => e.help(),
            DbgErr::Sim(e) => e.help(),
            DbgErr::NoSuchBreakpoint { .. } => Some("use `ib` to list breakpoints".into()),
            DbgErr::Io(_) => None,
        }
    }
}

/// The debugger.
///
/// See the [module-level documentation][self] for more details.
#[derive(Debug)]
pub struct Debugger {
    /// The debugged machine.
    pub sim: Simulator,

    bps: BreakpointTable,
    tbps: BreakpointTable,
    state: DbgState,

    /// Whether breakpoints are ignored until the next instruction executes.
    resumed: bool,

    /// The last non-empty command line.
    last_line: String,

    /// The loaded program image, kept for `reset`.
    image: Vec<u8>,

    /// Configuration settings for the debugger.
    pub flags: DbgFlags
}

impl Debugger {
    /// Creates a new debugger over the given Simulator, with no breakpoints set.
    pub fn new(sim: Simulator, flags: DbgFlags) -> Self {
        Self {
            sim,
            bps: BreakpointTable::new(),
            tbps: BreakpointTable::new(),
            state: DbgState::Stopped,
            resumed: false,
            last_line: String::new(),
            image: vec![],
            flags
        }
    }

    /// Resets the Simulator and loads a program image into it.
    ///
    /// The image is kept so that the `reset` command can reload it.
    pub fn load_program(&mut self, image: &[u8]) -> Result<(), SimErr> {
        self.sim.reset();
        self.sim.load_program(image)?;
        self.image = image.to_vec();
        Ok(())
    }

    /// The persistent breakpoints.
    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.bps
    }

    /// The temporary breakpoints.
    pub fn temp_breakpoints(&self) -> &BreakpointTable {
        &self.tbps
    }

    /// Whether the debugger is currently running the Simulator.
    pub fn state(&self) -> DbgState {
        self.state
    }

    fn table_mut(&mut self, kind: BpKind) -> &mut BreakpointTable {
        match kind {
            BpKind::Persistent => &mut self.bps,
            BpKind::Temporary  => &mut self.tbps,
        }
    }

    fn paint(&self, text: impl std::fmt::Display, color: Color) -> String {
        match self.flags.color {
            true  => style(text).with(color).to_string(),
            false => text.to_string(),
        }
    }

    /// Parses and executes one command line.
    ///
    /// An empty line repeats the last non-empty line.
    /// A line that fails to parse is reported as an error and does not change any state.
    pub fn execute_line(&mut self, line: &str, out: &mut impl Write) -> Result<Flow, DbgErr> {
        let line = match line.trim() {
            "" => std::mem::take(&mut self.last_line),
            l  => l.to_string(),
        };
        self.last_line = line.clone();

        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let cmd = line.parse::<Command>()?;
        self.execute(cmd, out)
    }

    /// Executes one command.
    pub fn execute(&mut self, cmd: Command, out: &mut impl Write) -> Result<Flow, DbgErr> {
        self.sim.update_timers();

        match cmd {
            Command::Reset => {
                writeln!(out, "Resetting machine")?;
                self.sim.reset();
                self.sim.load_program(&self.image)?;
                self.print_context(out)?;
            },
            Command::Context => self.print_context(out)?,
            Command::ListBreakpoints => self.print_breakpoints(out)?,
            Command::Breakpoint { op, kind, addr } => self.edit_breakpoint(op, kind, addr)?,
            Command::Continue => {
                writeln!(out, "Running")?;
                let reason = self.run();
                self.report_stop(&reason, out)?;
            },
            Command::Step => {
                if let Err(e) = self.step() {
                    self.report_stop(&StopReason::Error(e), out)?;
                } else {
                    self.print_context(out)?;
                }
            },
            Command::Next => {
                match self.next() {
                    Ok(()) => self.print_context(out)?,
                    Err(reason) => self.report_stop(&reason, out)?,
                }
            },
            Command::Examine { count, addr } => self.examine(addr, count, out)?,
            Command::Edit { addr, value } => self.sim.write_byte(u32::from(addr), value)?,
            Command::Quit => {
                writeln!(out, "goodbye.")?;
                return Ok(Flow::Quit);
            },
        }

        Ok(Flow::Continue)
    }

    fn edit_breakpoint(&mut self, op: BpOp, kind: BpKind, addr: u16) -> Result<(), DbgErr> {
        let table = self.table_mut(kind);
        let found = match op {
            BpOp::Add => {
                table.insert(addr);
                true
            },
            BpOp::Remove  => table.remove(addr).is_some(),
            BpOp::Enable  => table.set_enabled(addr, true),
            BpOp::Disable => table.set_enabled(addr, false),
        };

        match found {
            true  => Ok(()),
            false => Err(DbgErr::NoSuchBreakpoint { kind, addr }),
        }
    }

    /// Checks the breakpoints at the current PC, consuming a temporary breakpoint if one is hit.
    fn check_breakpoints(&mut self) -> Option<StopReason> {
        let pc = self.sim.pc;
        if self.tbps.hit(pc) {
            self.tbps.remove(pc);
            return Some(StopReason::TempBreakpoint(pc));
        }
        if self.bps.hit(pc) {
            return Some(StopReason::Breakpoint(pc));
        }
        None
    }

    /// Runs the Simulator until a breakpoint is hit, an error occurs,
    /// or a halt is requested.
    ///
    /// A breakpoint at the current PC does not stop the run before
    /// the first instruction executes.
    pub fn run(&mut self) -> StopReason {
        self.state = DbgState::Running;
        self.resumed = true;
        log::debug!("running from 0x{:03X}", self.sim.pc);

        let ticker = match self.flags.tick.is_zero() {
            true  => None,
            false => Some(cbc::tick(self.flags.tick)),
        };

        let reason = loop {
            if self.sim.device_handler.poll_interrupt() {
                break StopReason::Interrupted;
            }
            if !self.resumed {
                if let Some(reason) = self.check_breakpoints() {
                    break reason;
                }
            }
            if let Some(ticker) = &ticker {
                // tick channels never disconnect
                ticker.recv().ok();
            }

            match self.sim.step_in() {
                Ok(()) => self.resumed = false,
                Err(SimErr::Interrupted) => break StopReason::Interrupted,
                Err(e) => break StopReason::Error(e),
            }
            self.sim.present();
        };

        self.state = DbgState::Stopped;
        log::debug!("stopped at 0x{:03X}: {reason:?}", self.sim.pc);
        reason
    }

    /// Executes exactly one instruction.
    pub fn step(&mut self) -> Result<(), SimErr> {
        self.sim.step_in()?;
        self.sim.present();
        Ok(())
    }

    /// Executes one instruction, running through the whole subroutine if it is a call.
    ///
    /// For a call, this plants a temporary breakpoint after the call and runs until it is hit.
    /// If the run stops for any other reason (such as a breakpoint inside the subroutine),
    /// that reason is returned and the temporary breakpoint stays planted.
    pub fn next(&mut self) -> Result<(), StopReason> {
        let pc = self.sim.pc;
        let is_call = self.sim.instr_at(pc).is_ok_and(|i| i.is_call());
        if !is_call {
            return self.step().map_err(StopReason::Error);
        }

        let ret = pc.wrapping_add(2) & ADDR_MASK;
        self.tbps.insert(ret);
        match self.run() {
            StopReason::TempBreakpoint(addr) if addr == ret => Ok(()),
            reason => Err(reason),
        }
    }

    fn report_stop(&self, reason: &StopReason, out: &mut impl Write) -> std::io::Result<()> {
        match reason {
            StopReason::Breakpoint(addr) => writeln!(out, "{}", self.paint(format!("Hit breakpoint 0x{addr:04X}"), Color::Red))?,
            StopReason::TempBreakpoint(addr) => writeln!(out, "{}", self.paint(format!("Hit temporary breakpoint 0x{addr:04X}"), Color::Red))?,
            StopReason::Interrupted => writeln!(out, "Interrupted")?,
            StopReason::Error(e) => {
                writeln!(out, "{}", self.paint(format!("error: {e}"), Color::Red))?;
                if let Some(help) = e.help() {
                    writeln!(out, "help: {help}")?;
                }
            },
        }
        self.print_context(out)
    }

    fn write_instr(&self, out: &mut impl Write, prefix: &str, addr: u16, color: Color) -> std::io::Result<()> {
        let dis = Disassembly::new(self.sim.mem.read_word(addr));
        writeln!(out, "{prefix}0x{addr:04X} {} {}",
            self.paint(format_args!("{:04X}", dis.word()), Color::Green),
            self.paint(&dis, color)
        )
    }

    /// Prints the registers, timers and the instructions around the PC.
    ///
    /// If the PC is on a call, the first few instructions of the subroutine are also shown.
    pub fn print_context(&self, out: &mut impl Write) -> std::io::Result<()> {
        let sim = &self.sim;
        let header = |name: &str| format!("{} {} {}", self.paint("--", Color::Green), self.paint(name, Color::Yellow), self.paint("--", Color::Green));

        writeln!(out, "{}", header("Registers"))?;
        writeln!(out, "PC: {} I: {} SP: {}",
            self.paint(format_args!("0x{:04X}", sim.pc), Color::White),
            self.paint(format_args!("0x{:04X}", sim.i), Color::White),
            self.paint(sim.stack.len(), Color::White),
        )?;
        writeln!(out, "Delay: {} Sound: {}",
            self.paint(format_args!("0x{:02X}", sim.timers.delay), Color::White),
            self.paint(format_args!("0x{:02X}", sim.timers.sound), Color::White),
        )?;
        for row in sim.reg_file.as_slice().chunks(4).enumerate() {
            let (r, vals) = row;
            let line: Vec<_> = (0..).zip(vals)
                .map(|(c, v)| format!("V{:X}: {}", r * 4 + c, self.paint(format_args!("{v:02X}"), Color::White)))
                .collect();
            writeln!(out, "{}", line.join(", "))?;
        }
        if !sim.stack.is_empty() {
            let frames: Vec<_> = sim.stack.frames().iter().map(|a| format!("0x{a:04X}")).collect();
            writeln!(out, "Stack: {}", frames.join(" "))?;
        }
        if let Some(fault) = sim.fault() {
            writeln!(out, "{}", self.paint(format!("Machine faulted: {fault}"), Color::Red))?;
        }

        writeln!(out, "{}", header("Assembly"))?;
        let pc = sim.pc;
        for back in [4, 2] {
            if let Some(addr) = pc.checked_sub(back) {
                self.write_instr(out, "", addr, Color::Reset)?;
            }
        }
        self.write_instr(out, "", pc, Color::Blue)?;

        // peek into the callee
        let target = Disassembly::new(sim.mem.read_word(pc)).instr()
            .and_then(|i| i.call_target());
        let peek = target.into_iter()
            .flat_map(|t| (0..3).map(move |k| t + 2 * k))
            .filter(|&a| usize::from(a) < MEM_SIZE);
        for (k, addr) in peek.enumerate() {
            let prefix = match k {
                0 => "\u{2937}  ",
                _ => "   ",
            };
            self.write_instr(out, prefix, addr, Color::Cyan)?;
        }

        let forward = (1..8)
            .map(|k| pc + 2 * k)
            .filter(|&a| usize::from(a) < MEM_SIZE);
        for addr in forward {
            self.write_instr(out, "", addr, Color::Cyan)?;
        }
        Ok(())
    }

    /// Prints both breakpoint tables.
    pub fn print_breakpoints(&self, out: &mut impl Write) -> std::io::Result<()> {
        if self.bps.is_empty() && self.tbps.is_empty() {
            return writeln!(out, "No breakpoints");
        }

        for (title, table) in [("Breakpoints", &self.bps), ("Temporary breakpoints", &self.tbps)] {
            if table.is_empty() { continue };

            writeln!(out, "{}", self.paint(title, Color::White))?;
            for (addr, bp) in table.iter() {
                let disabled = match bp.enabled {
                    true  => "",
                    false => " (disabled)",
                };
                writeln!(out, "0x{addr:04X}{disabled} hits: {}", bp.hit_count)?;
            }
        }
        Ok(())
    }

    /// Prints `count` bytes of memory starting at `addr`, in rows of 16.
    pub fn examine(&self, addr: u16, count: u16, out: &mut impl Write) -> Result<(), DbgErr> {
        let bytes = self.sim.examine(u32::from(addr), usize::from(count))?;

        for (row_addr, row) in (usize::from(addr)..).step_by(EXAMINE_ROW).zip(bytes.chunks(EXAMINE_ROW)) {
            let hex: Vec<_> = row.iter().map(|b| format!("{b:02x}")).collect();
            writeln!(out, "{} {}", self.paint(format_args!("{row_addr:#05x}:"), Color::White), hex.join(" "))?;
        }
        Ok(())
    }

    fn report_error(&self, e: &DbgErr, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "{}", self.paint(e, Color::Red))?;
        if let Some(help) = e.help() {
            writeln!(out, "help: {help}")?;
        }
        Ok(())
    }

    /// Runs the command loop until `q` is entered or the line channel closes.
    ///
    /// Lines are read from `lines`, and any message on `halt` requests a halt while running.
    /// While running, a line arriving on `lines` also requests a halt
    /// (and is executed once the debugger stops).
    /// Halt requests arriving while stopped are discarded.
    ///
    /// The Simulator's interrupt device is replaced for the duration of the loop.
    pub fn repl(&mut self, lines: cbc::Receiver<String>, halt: cbc::Receiver<()>, out: &mut impl Write) -> std::io::Result<()> {
        let pending = lines.clone();
        let halt_rx = halt.clone();
        let prev = self.sim.device_handler.set_interrupt(InterruptFromFn::new(move || {
            halt_rx.try_iter().count() > 0 || !pending.is_empty()
        }));

        let result = self.repl_loop(&lines, &halt, out);

        match prev {
            Some(int) => { self.sim.device_handler.set_interrupt(int); },
            None => { self.sim.device_handler.clear_interrupt(); },
        }
        result
    }

    fn repl_loop(&mut self, lines: &cbc::Receiver<String>, halt: &cbc::Receiver<()>, out: &mut impl Write) -> std::io::Result<()> {
        self.print_context(out)?;
        let wakeups = self.sim.timer_wakeups();

        loop {
            write!(out, "{}", self.paint(PROMPT, Color::Red))?;
            out.flush()?;

            // the timers keep running while waiting for a command
            let line = loop {
                cbc::select! {
                    recv(lines) -> line => break line,
                    recv(wakeups) -> _ => self.sim.update_timers(),
                }
            };
            let Ok(line) = line else {
                writeln!(out)?;
                return Ok(());
            };
            halt.try_iter().for_each(drop);

            match self.execute_line(&line, out) {
                Ok(Flow::Continue) => {},
                Ok(Flow::Quit) => return Ok(()),
                Err(DbgErr::Io(e)) => return Err(e),
                Err(e) => self.report_error(&e, out)?,
            }
        }
    }
}
