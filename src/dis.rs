//! Disassembly of CHIP-8 instruction words.
//!
//! [`SimInstr`] implements [`std::fmt::Display`] with the conventional CHIP-8 mnemonics
//! (`CLS`, `LD Vx, 0xNN`, `DRW Vx, Vy, 0xN`, ...).
//!
//! Since memory can hold anything (including sprite data), [`Disassembly`] wraps a raw
//! word and renders words that fail to decode as `<ILL>` instead of erroring.
//! This module is only used to produce display text; it never affects execution.
use std::fmt::Write as _;

use crate::ast::sim::SimInstr;

impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CLS          => f.write_str("CLS"),
            Self::RET          => f.write_str("RET"),
            Self::SYS(a)       => write!(f, "SYS {a}"),
            Self::JP(a)        => write!(f, "JP {a}"),
            Self::CALL(a)      => write!(f, "CALL {a}"),
            Self::SE(r, b)     => write!(f, "SE {r}, {b:#04X}"),
            Self::SNE(r, b)    => write!(f, "SNE {r}, {b:#04X}"),
            Self::SER(r, s)    => write!(f, "SE {r}, {s}"),
            Self::LD(r, b)     => write!(f, "LD {r}, {b:#04X}"),
            Self::ADD(r, b)    => write!(f, "ADD {r}, {b:#04X}"),
            Self::LDR(r, s)    => write!(f, "LD {r}, {s}"),
            Self::OR(r, s)     => write!(f, "OR {r}, {s}"),
            Self::AND(r, s)    => write!(f, "AND {r}, {s}"),
            Self::XOR(r, s)    => write!(f, "XOR {r}, {s}"),
            Self::ADDR(r, s)   => write!(f, "ADD {r}, {s}"),
            Self::SUB(r, s)    => write!(f, "SUB {r}, {s}"),
            Self::SHR(r, s)    => write!(f, "SHR {r}, {s}"),
            Self::SUBN(r, s)   => write!(f, "SUBN {r}, {s}"),
            Self::SHL(r, s)    => write!(f, "SHL {r}, {s}"),
            Self::SNER(r, s)   => write!(f, "SNE {r}, {s}"),
            Self::LDI(a)       => write!(f, "LD I, {a}"),
            Self::JPV0(a)      => write!(f, "JP V0, {a}"),
            Self::RND(r, b)    => write!(f, "RND {r}, {b:#04X}"),
            Self::DRW(r, s, n) => write!(f, "DRW {r}, {s}, {n}"),
            Self::SKP(r)       => write!(f, "SKP {r}"),
            Self::SKNP(r)      => write!(f, "SKNP {r}"),
            Self::LDDT(r)      => write!(f, "LD {r}, DT"),
            Self::LDK(r)       => write!(f, "LD {r}, K"),
            Self::SETDT(r)     => write!(f, "LD DT, {r}"),
            Self::SETST(r)     => write!(f, "LD ST, {r}"),
            Self::ADDI(r)      => write!(f, "ADD I, {r}"),
            Self::LDF(r)       => write!(f, "LD F, {r}"),
            Self::LDB(r)       => write!(f, "LD B, {r}"),
            Self::STM(r)       => write!(f, "LD [I], {r}"),
            Self::LDM(r)       => write!(f, "LD {r}, [I]"),
        }
    }
}

/// The mnemonic used for words that do not decode.
pub const ILLEGAL_MNEMONIC: &str = "<ILL>";

/// A raw instruction word prepared for display.
///
/// ```
/// use chip8_dbg::dis::Disassembly;
///
/// assert_eq!(Disassembly::new(0x6A0F).to_string(), "LD VA, 0x0F");
/// assert_eq!(Disassembly::new(0xF0FF).to_string(), "<ILL>");
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Disassembly {
    word: u16,
    instr: Option<SimInstr>
}
impl Disassembly {
    /// Disassembles a single word.
    pub fn new(word: u16) -> Self {
        Self { word, instr: SimInstr::decode(word).ok() }
    }

    /// The raw instruction word.
    pub fn word(&self) -> u16 {
        self.word
    }

    /// The decoded instruction, if the word is legal.
    pub fn instr(&self) -> Option<SimInstr> {
        self.instr
    }
}
impl std::fmt::Display for Disassembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.instr {
            Some(instr) => instr.fmt(f),
            None => f.write_str(ILLEGAL_MNEMONIC),
        }
    }
}

/// Disassembles a byte slice as consecutive big-endian words.
///
/// A trailing odd byte is ignored.
///
/// ```
/// use chip8_dbg::dis::disassemble;
///
/// let listing = disassemble(&[0x00, 0xE0, 0x12, 0x00], 0x200);
/// assert_eq!(listing, "0x200  00E0  CLS\n0x202  1200  JP 0x200\n");
/// ```
pub fn disassemble(bytes: &[u8], start: u16) -> String {
    let mut out = String::new();
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let addr = start.wrapping_add(2 * i as u16);
        let dis = Disassembly::new(u16::from_be_bytes([pair[0], pair[1]]));
        // writing to a String does not fail
        let _ = writeln!(out, "{addr:#05X}  {:04X}  {dis}", dis.word());
    }
    out
}
