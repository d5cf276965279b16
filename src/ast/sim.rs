//! Decoded CHIP-8 instructions.
//!
//! The key type here is [`SimInstr`], which is produced from a raw
//! 16-bit instruction word with [`SimInstr::decode`] and turned back
//! into one with [`SimInstr::encode`].
//!
//! Words are grouped by their top nibble. Groups `0x0`, `0x8`, `0xE` and `0xF`
//! dispatch further on their low nibble or low byte; any unassigned value in those
//! groups is an [`IllegalInstr`].

use super::{Addr, Nibble, Reg};

/// One decoded CHIP-8 instruction.
///
/// Operands are stored in the order they appear in the mnemonic.
/// `x` and `y` refer to the register nibbles of the word (`_X__` and `__Y_`).
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    /// `00E0`: clear the display.
    CLS,
    /// `00EE`: return from a subroutine.
    RET,
    /// `0NNN`: call a machine routine (no-op on this interpreter).
    SYS(Addr),
    /// `1NNN`: jump to `NNN`.
    JP(Addr),
    /// `2NNN`: call the subroutine at `NNN`.
    CALL(Addr),
    /// `3XNN`: skip the next instruction if `Vx == NN`.
    SE(Reg, u8),
    /// `4XNN`: skip the next instruction if `Vx != NN`.
    SNE(Reg, u8),
    /// `5XY_`: skip the next instruction if `Vx == Vy`.
    SER(Reg, Reg),
    /// `6XNN`: `Vx = NN`.
    LD(Reg, u8),
    /// `7XNN`: `Vx += NN` (no carry).
    ADD(Reg, u8),
    /// `8XY0`: `Vx = Vy`.
    LDR(Reg, Reg),
    /// `8XY1`: `Vx |= Vy`.
    OR(Reg, Reg),
    /// `8XY2`: `Vx &= Vy`.
    AND(Reg, Reg),
    /// `8XY3`: `Vx ^= Vy`.
    XOR(Reg, Reg),
    /// `8XY4`: `Vx += Vy`, `VF` = carry.
    ADDR(Reg, Reg),
    /// `8XY5`: `Vx -= Vy`, `VF` = no borrow.
    SUB(Reg, Reg),
    /// `8XY6`: `Vx >>= 1`, `VF` = bit shifted out.
    SHR(Reg, Reg),
    /// `8XY7`: `Vx = Vy - Vx`, `VF` = no borrow.
    SUBN(Reg, Reg),
    /// `8XYE`: `Vx <<= 1`, `VF` = bit shifted out.
    SHL(Reg, Reg),
    /// `9XY_`: skip the next instruction if `Vx != Vy`.
    SNER(Reg, Reg),
    /// `ANNN`: `I = NNN`.
    LDI(Addr),
    /// `BNNN`: jump to `NNN + V0`.
    JPV0(Addr),
    /// `CXNN`: `Vx = random & NN`.
    RND(Reg, u8),
    /// `DXYN`: draw the `N`-byte sprite at `I` at `(Vx, Vy)`, `VF` = collision.
    DRW(Reg, Reg, Nibble),
    /// `EX9E`: skip the next instruction if key `Vx` is held.
    SKP(Reg),
    /// `EXA1`: skip the next instruction if key `Vx` is not held.
    SKNP(Reg),
    /// `FX07`: `Vx = DT`.
    LDDT(Reg),
    /// `FX0A`: wait for a key press and store it in `Vx`.
    LDK(Reg),
    /// `FX15`: `DT = Vx`.
    SETDT(Reg),
    /// `FX18`: `ST = Vx`.
    SETST(Reg),
    /// `FX1E`: `I += Vx`.
    ADDI(Reg),
    /// `FX29`: `I` = address of the font glyph for digit `Vx`.
    LDF(Reg),
    /// `FX33`: store the decimal digits of `Vx` at `I`, `I+1`, `I+2`.
    LDB(Reg),
    /// `FX55`: store `V0..=Vx` to memory starting at `I`.
    STM(Reg),
    /// `FX65`: load `V0..=Vx` from memory starting at `I`.
    LDM(Reg),
}

/// The word could not be decoded into an instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct IllegalInstr(pub u16);

impl std::fmt::Display for IllegalInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal instruction {:04X}", self.0)
    }
}
impl std::error::Error for IllegalInstr {}
impl crate::err::Error for IllegalInstr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        let help = match self.0 >> 12 {
            0x8 => "the 8XY_ group only assigns low nibbles 0-7 and E",
            0xE => "the EX__ group only assigns EX9E and EXA1",
            0xF => "the FX__ group only assigns 07, 0A, 15, 18, 1E, 29, 33, 55 and 65",
            _   => return None,
        };
        Some(help.into())
    }
}

// Operand fields.
fn x(word: u16) -> Reg {
    Reg::from_nibble((word >> 8) as u8)
}
fn y(word: u16) -> Reg {
    Reg::from_nibble((word >> 4) as u8)
}
fn nn(word: u16) -> u8 {
    word as u8
}
fn nnn(word: u16) -> Addr {
    Addr::new_trunc(word)
}

fn pack_xnn(op: u16, x: Reg, nn: u8) -> u16 {
    op << 12 | u16::from(x.0) << 8 | u16::from(nn)
}
fn pack_xyn(op: u16, x: Reg, y: Reg, n: u8) -> u16 {
    op << 12 | u16::from(x.0) << 8 | u16::from(y.0) << 4 | u16::from(n & 0xF)
}
fn pack_nnn(op: u16, nnn: Addr) -> u16 {
    op << 12 | nnn.get()
}

impl SimInstr {
    /// Decodes a big-endian instruction word.
    ///
    /// Decoding is pure: the same word always decodes to the same instruction.
    ///
    /// ```
    /// use chip8_dbg::ast::sim::{IllegalInstr, SimInstr};
    /// use chip8_dbg::ast::reg_consts::{V1, V2};
    ///
    /// assert_eq!(SimInstr::decode(0x8124), Ok(SimInstr::ADDR(V1, V2)));
    /// assert_eq!(SimInstr::decode(0x8128), Err(IllegalInstr(0x8128)));
    /// ```
    pub fn decode(word: u16) -> Result<Self, IllegalInstr> {
        let instr = match word >> 12 {
            0x0 => match word {
                0x00E0 => Self::CLS,
                0x00EE => Self::RET,
                _      => Self::SYS(nnn(word)),
            },
            0x1 => Self::JP(nnn(word)),
            0x2 => Self::CALL(nnn(word)),
            0x3 => Self::SE(x(word), nn(word)),
            0x4 => Self::SNE(x(word), nn(word)),
            0x5 => Self::SER(x(word), y(word)),
            0x6 => Self::LD(x(word), nn(word)),
            0x7 => Self::ADD(x(word), nn(word)),
            0x8 => match word & 0xF {
                0x0 => Self::LDR(x(word), y(word)),
                0x1 => Self::OR(x(word), y(word)),
                0x2 => Self::AND(x(word), y(word)),
                0x3 => Self::XOR(x(word), y(word)),
                0x4 => Self::ADDR(x(word), y(word)),
                0x5 => Self::SUB(x(word), y(word)),
                0x6 => Self::SHR(x(word), y(word)),
                0x7 => Self::SUBN(x(word), y(word)),
                0xE => Self::SHL(x(word), y(word)),
                _   => return Err(IllegalInstr(word)),
            },
            0x9 => Self::SNER(x(word), y(word)),
            0xA => Self::LDI(nnn(word)),
            0xB => Self::JPV0(nnn(word)),
            0xC => Self::RND(x(word), nn(word)),
            0xD => Self::DRW(x(word), y(word), Nibble::new_trunc(word as u8)),
            0xE => match word & 0xFF {
                0x9E => Self::SKP(x(word)),
                0xA1 => Self::SKNP(x(word)),
                _    => return Err(IllegalInstr(word)),
            },
            0xF => match word & 0xFF {
                0x07 => Self::LDDT(x(word)),
                0x0A => Self::LDK(x(word)),
                0x15 => Self::SETDT(x(word)),
                0x18 => Self::SETST(x(word)),
                0x1E => Self::ADDI(x(word)),
                0x29 => Self::LDF(x(word)),
                0x33 => Self::LDB(x(word)),
                0x55 => Self::STM(x(word)),
                0x65 => Self::LDM(x(word)),
                _    => return Err(IllegalInstr(word)),
            },
            _ => unreachable!("word >> 12 should be a nibble"),
        };

        Ok(instr)
    }

    /// Encodes this instruction into its instruction word.
    ///
    /// For `SER` and `SNER`, the unused low nibble is encoded as 0.
    pub fn encode(&self) -> u16 {
        match *self {
            Self::CLS         => 0x00E0,
            Self::RET         => 0x00EE,
            Self::SYS(a)      => pack_nnn(0x0, a),
            Self::JP(a)       => pack_nnn(0x1, a),
            Self::CALL(a)     => pack_nnn(0x2, a),
            Self::SE(r, b)    => pack_xnn(0x3, r, b),
            Self::SNE(r, b)   => pack_xnn(0x4, r, b),
            Self::SER(r, s)   => pack_xyn(0x5, r, s, 0x0),
            Self::LD(r, b)    => pack_xnn(0x6, r, b),
            Self::ADD(r, b)   => pack_xnn(0x7, r, b),
            Self::LDR(r, s)   => pack_xyn(0x8, r, s, 0x0),
            Self::OR(r, s)    => pack_xyn(0x8, r, s, 0x1),
            Self::AND(r, s)   => pack_xyn(0x8, r, s, 0x2),
            Self::XOR(r, s)   => pack_xyn(0x8, r, s, 0x3),
            Self::ADDR(r, s)  => pack_xyn(0x8, r, s, 0x4),
            Self::SUB(r, s)   => pack_xyn(0x8, r, s, 0x5),
            Self::SHR(r, s)   => pack_xyn(0x8, r, s, 0x6),
            Self::SUBN(r, s)  => pack_xyn(0x8, r, s, 0x7),
            Self::SHL(r, s)   => pack_xyn(0x8, r, s, 0xE),
            Self::SNER(r, s)  => pack_xyn(0x9, r, s, 0x0),
            Self::LDI(a)      => pack_nnn(0xA, a),
            Self::JPV0(a)     => pack_nnn(0xB, a),
            Self::RND(r, b)   => pack_xnn(0xC, r, b),
            Self::DRW(r, s, n) => pack_xyn(0xD, r, s, n.get()),
            Self::SKP(r)      => pack_xnn(0xE, r, 0x9E),
            Self::SKNP(r)     => pack_xnn(0xE, r, 0xA1),
            Self::LDDT(r)     => pack_xnn(0xF, r, 0x07),
            Self::LDK(r)      => pack_xnn(0xF, r, 0x0A),
            Self::SETDT(r)    => pack_xnn(0xF, r, 0x15),
            Self::SETST(r)    => pack_xnn(0xF, r, 0x18),
            Self::ADDI(r)     => pack_xnn(0xF, r, 0x1E),
            Self::LDF(r)      => pack_xnn(0xF, r, 0x29),
            Self::LDB(r)      => pack_xnn(0xF, r, 0x33),
            Self::STM(r)      => pack_xnn(0xF, r, 0x55),
            Self::LDM(r)      => pack_xnn(0xF, r, 0x65),
        }
    }

    /// Whether this instruction is a subroutine call (`2NNN`).
    pub fn is_call(&self) -> bool {
        matches!(self, Self::CALL(_))
    }

    /// The subroutine address this instruction calls, if it is a call.
    pub fn call_target(&self) -> Option<u16> {
        match self {
            Self::CALL(a) => Some(a.get()),
            _ => None
        }
    }
}
