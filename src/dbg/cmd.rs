//! Debugger commands.
//!
//! Every command line parses into exactly one [`Command`] (see its [`FromStr`] impl).
//! Parsing is pure: it never touches the machine.
//!
//! | command            | meaning                                     |
//! |--------------------|---------------------------------------------|
//! | `reset`            | reset the machine and reload the program    |
//! | `ctx`              | print the machine context                   |
//! | `ib`               | list breakpoints                            |
//! | `b`/`tb <addr>`    | add a (temporary) breakpoint                |
//! | `db`/`dtb <addr>`  | disable a (temporary) breakpoint            |
//! | `eb`/`etb <addr>`  | enable a (temporary) breakpoint             |
//! | `rb`/`rtb <addr>`  | remove a (temporary) breakpoint             |
//! | `c`                | continue                                    |
//! | `s`, `si`          | step one instruction                        |
//! | `n`, `ni`          | step over a call                            |
//! | `x [count] <addr>` | examine memory                              |
//! | `e <addr> <value>` | patch one byte of memory                    |
//! | `q`                | quit                                        |

use std::str::FromStr;

use logos::Logos;

use super::lex::{LexErr, Token};
use crate::sim::mem::MEM_SIZE;

/// Which breakpoint table a breakpoint command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BpKind {
    /// Breakpoints which survive being hit.
    Persistent,
    /// Breakpoints which are removed when they are hit.
    Temporary
}

/// What a breakpoint command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BpOp {
    /// Adds a breakpoint.
    Add,
    /// Removes a breakpoint.
    Remove,
    /// Enables a breakpoint.
    Enable,
    /// Disables a breakpoint.
    Disable
}

/// A debugger command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Resets the machine and reloads the program.
    Reset,
    /// Prints the machine context.
    Context,
    /// Lists every breakpoint.
    ListBreakpoints,
    /// Operates on the breakpoint at an address.
    Breakpoint {
        /// The operation.
        op: BpOp,
        /// The table operated on.
        kind: BpKind,
        /// The address.
        addr: u16
    },
    /// Runs until a breakpoint is hit or an error occurs.
    Continue,
    /// Executes one instruction.
    Step,
    /// Executes one instruction, running through entire subroutines if it is a call.
    Next,
    /// Prints `count` bytes of memory starting at `addr`.
    Examine {
        /// The number of bytes.
        count: u16,
        /// The first address.
        addr: u16
    },
    /// Writes one byte of memory.
    Edit {
        /// The address.
        addr: u16,
        /// The new value.
        value: u8
    },
    /// Exits the debugger.
    Quit,
}

/// Errors raised when a command line cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdErr {
    /// The line held no command.
    Empty,
    /// The command is not recognized.
    UnknownCommand(String),
    /// The command's arguments are malformed.
    Usage(&'static str),
    /// The line could not be tokenized.
    Lex(LexErr),
    /// An address was outside of memory.
    AddrOutOfRange(u32),
    /// A value does not fit in a byte.
    ValueOutOfRange(u32),
}
impl From<LexErr> for CmdErr {
    fn from(value: LexErr) -> Self {
        Self::Lex(value)
    }
}
impl std::fmt::Display for CmdErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmdErr::Empty => f.write_str("no command given"),
            CmdErr::UnknownCommand(c) => write!(f, "illegal command: '{c}'"),
            CmdErr::Usage(u) => write!(f, "usage: {u}"),
            CmdErr::Lex(e) => e.fmt(f),
            CmdErr::AddrOutOfRange(a) => write!(f, "address {a:#X} is out of range"),
            CmdErr::ValueOutOfRange(v) => write!(f, "value {v:#X} does not fit in a byte"),
        }
    }
}
impl std::error::Error for CmdErr {}
impl crate::err::Error for CmdErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            CmdErr::Empty => None,
            CmdErr::UnknownCommand(_) => Some("commands are: reset, ctx, ib, b, tb, db, dtb, eb, etb, rb, rtb, c, s, si, n, ni, x, e, q".into()),
            CmdErr::Usage(_) => Some("numbers can be decimal or 0x-prefixed hex".into()),
            CmdErr::Lex(e) => crate::err::Error::help(e),
            CmdErr::AddrOutOfRange(_) => Some(format!("addresses must be less than {MEM_SIZE:#X}").into()),
            CmdErr::ValueOutOfRange(_) => Some(format!("values must be at most {:#X}", u8::MAX).into()),
        }
    }
}

/// The usage line of the given command, or `None` if it is not a command.
fn usage(name: &str) -> Option<&'static str> {
    let u = match name {
        "reset" => "reset",
        "ctx"   => "ctx",
        "ib"    => "ib",
        "b"     => "b <addr>",
        "tb"    => "tb <addr>",
        "db"    => "db <addr>",
        "dtb"   => "dtb <addr>",
        "eb"    => "eb <addr>",
        "etb"   => "etb <addr>",
        "rb"    => "rb <addr>",
        "rtb"   => "rtb <addr>",
        "c"     => "c",
        "s"     => "s",
        "si"    => "si",
        "n"     => "n",
        "ni"    => "ni",
        "x"     => "x [count] <addr>",
        "e"     => "e <addr> <value>",
        "q"     => "q",
        _ => return None,
    };
    Some(u)
}

fn breakpoint_op(name: &str) -> Option<(BpOp, BpKind)> {
    let op = match name {
        "b"  | "tb"  => BpOp::Add,
        "rb" | "rtb" => BpOp::Remove,
        "eb" | "etb" => BpOp::Enable,
        "db" | "dtb" => BpOp::Disable,
        _ => return None,
    };
    let kind = match name {
        "tb" | "rtb" | "etb" | "dtb" => BpKind::Temporary,
        _ => BpKind::Persistent,
    };

    Some((op, kind))
}

fn parse_addr(n: u32) -> Result<u16, CmdErr> {
    u16::try_from(n).ok()
        .filter(|&a| usize::from(a) < MEM_SIZE)
        .ok_or(CmdErr::AddrOutOfRange(n))
}

impl FromStr for Command {
    type Err = CmdErr;

    /// Parses a command line.
    ///
    /// ```
    /// use chip8_dbg::dbg::cmd::{BpKind, BpOp, Command, CmdErr};
    ///
    /// assert_eq!("x 0x200".parse::<Command>(), Ok(Command::Examine { count: 1, addr: 0x200 }));
    /// assert_eq!(
    ///     "rtb 768".parse::<Command>(),
    ///     Ok(Command::Breakpoint { op: BpOp::Remove, kind: BpKind::Temporary, addr: 0x300 })
    /// );
    /// assert_eq!("b 0x1000".parse::<Command>(), Err(CmdErr::AddrOutOfRange(0x1000)));
    /// assert_eq!("b".parse::<Command>(), Err(CmdErr::Usage("b <addr>")));
    /// ```
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = Token::lexer(line).collect::<Result<Vec<_>, _>>()?;

        let (name, args) = match tokens.split_first() {
            Some((Token::Word(w), args)) => (w.as_str(), args),
            Some((Token::Unsigned(n), _)) => return Err(CmdErr::UnknownCommand(n.to_string())),
            None => return Err(CmdErr::Empty),
        };
        let usage = usage(name).ok_or_else(|| CmdErr::UnknownCommand(name.to_string()))?;

        let nums = args.iter()
            .map(|t| match t {
                Token::Unsigned(n) => Some(*n),
                Token::Word(_) => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(CmdErr::Usage(usage))?;

        let cmd = match (name, &*nums) {
            ("reset", []) => Command::Reset,
            ("ctx", [])   => Command::Context,
            ("ib", [])    => Command::ListBreakpoints,
            ("c", [])     => Command::Continue,
            ("s" | "si", []) => Command::Step,
            ("n" | "ni", []) => Command::Next,
            ("q", [])     => Command::Quit,
            ("x", &[addr]) => Command::Examine { count: 1, addr: parse_addr(addr)? },
            ("x", &[count, addr]) => {
                // no more than the whole memory can be examined
                let count = count.min(MEM_SIZE as u32) as u16;
                Command::Examine { count, addr: parse_addr(addr)? }
            },
            ("e", &[addr, value]) => Command::Edit {
                addr: parse_addr(addr)?,
                value: u8::try_from(value).map_err(|_| CmdErr::ValueOutOfRange(value))?
            },
            (name, &[addr]) => match breakpoint_op(name) {
                Some((op, kind)) => Command::Breakpoint { op, kind, addr: parse_addr(addr)? },
                None => return Err(CmdErr::Usage(usage)),
            },
            _ => return Err(CmdErr::Usage(usage)),
        };

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::{BpKind, BpOp, CmdErr, Command};
    use crate::dbg::lex::LexErr;

    fn bp(op: BpOp, kind: BpKind, addr: u16) -> Command {
        Command::Breakpoint { op, kind, addr }
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!("reset".parse::<Command>(), Ok(Command::Reset));
        assert_eq!("ctx".parse::<Command>(), Ok(Command::Context));
        assert_eq!("ib".parse::<Command>(), Ok(Command::ListBreakpoints));
        assert_eq!("c".parse::<Command>(), Ok(Command::Continue));
        assert_eq!("s".parse::<Command>(), Ok(Command::Step));
        assert_eq!("si".parse::<Command>(), Ok(Command::Step));
        assert_eq!("n".parse::<Command>(), Ok(Command::Next));
        assert_eq!("ni".parse::<Command>(), Ok(Command::Next));
        assert_eq!("  q  ".parse::<Command>(), Ok(Command::Quit));
    }

    #[test]
    fn test_breakpoint_commands() {
        let cases = [
            ("b",   BpOp::Add,     BpKind::Persistent),
            ("tb",  BpOp::Add,     BpKind::Temporary),
            ("db",  BpOp::Disable, BpKind::Persistent),
            ("dtb", BpOp::Disable, BpKind::Temporary),
            ("eb",  BpOp::Enable,  BpKind::Persistent),
            ("etb", BpOp::Enable,  BpKind::Temporary),
            ("rb",  BpOp::Remove,  BpKind::Persistent),
            ("rtb", BpOp::Remove,  BpKind::Temporary),
        ];
        for (name, op, kind) in cases {
            assert_eq!(format!("{name} 0x2A0").parse::<Command>(), Ok(bp(op, kind, 0x2A0)), "{name}");
            assert_eq!(format!("{name} 4095").parse::<Command>(), Ok(bp(op, kind, 0xFFF)), "{name}");
            assert_eq!(format!("{name} 4096").parse::<Command>(), Err(CmdErr::AddrOutOfRange(4096)), "{name}");
        }
    }

    #[test]
    fn test_examine() {
        assert_eq!("x 0x200".parse::<Command>(), Ok(Command::Examine { count: 1, addr: 0x200 }));
        assert_eq!("x 32 0x200".parse::<Command>(), Ok(Command::Examine { count: 32, addr: 0x200 }));
        assert_eq!("x 100000 0".parse::<Command>(), Ok(Command::Examine { count: 0x1000, addr: 0 }));
        assert_eq!("x".parse::<Command>(), Err(CmdErr::Usage("x [count] <addr>")));
        assert_eq!("x 1 2 3".parse::<Command>(), Err(CmdErr::Usage("x [count] <addr>")));
    }

    #[test]
    fn test_edit() {
        assert_eq!("e 0x300 0xFF".parse::<Command>(), Ok(Command::Edit { addr: 0x300, value: 0xFF }));
        assert_eq!("e 0x300 256".parse::<Command>(), Err(CmdErr::ValueOutOfRange(256)));
        assert_eq!("e 0x1000 1".parse::<Command>(), Err(CmdErr::AddrOutOfRange(0x1000)));
        assert_eq!("e 0x300".parse::<Command>(), Err(CmdErr::Usage("e <addr> <value>")));
    }

    #[test]
    fn test_malformed() {
        assert_eq!("".parse::<Command>(), Err(CmdErr::Empty));
        assert_eq!("jump 0x200".parse::<Command>(), Err(CmdErr::UnknownCommand("jump".to_string())));
        assert_eq!("512".parse::<Command>(), Err(CmdErr::UnknownCommand("512".to_string())));
        assert_eq!("b pc".parse::<Command>(), Err(CmdErr::Usage("b <addr>")));
        assert_eq!("c 1".parse::<Command>(), Err(CmdErr::Usage("c")));
        assert_eq!("b 0xZZ".parse::<Command>(), Err(CmdErr::Lex(LexErr::InvalidHex)));
    }
}
