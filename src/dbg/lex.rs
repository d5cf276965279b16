//! Tokenizing debugger command lines.
//!
//! A command line is a sequence of whitespace-separated [`Token`]s:
//! a command word followed by its numeric arguments.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in a debugger command line.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n]+", error = LexErr)]
pub enum Token {
    // This regex spans over tokens that are technically invalid
    // (e.g., 23trst matches even though it isn't a number).
    // The callback is what validates it.

    /// An unsigned numeric value, in decimal or `0x`-prefixed hex (e.g., `9`, `512`, `0x200`)
    #[regex(r"\d\w*", lex_unsigned)]
    Unsigned(u32),

    /// A word (e.g., `b`, `ctx`, `rtb`).
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().to_string())]
    Word(String),
}

/// Any errors raised in attempting to tokenize a command line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of a u32
    DoesNotFitU32,
    /// Hex literal (starting with 0x) has invalid hex digits
    InvalidHex,
    /// Hex literal (starting with 0x) doesn't have digits after it.
    InvalidHexEmpty,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9)
    InvalidNumeric,
    /// A symbol was used which is not allowed in a command line
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU32   => f.write_str("numeric token does not fit 32-bit unsigned integer"),
            LexErr::InvalidHex      => f.write_str("invalid hex literal"),
            LexErr::InvalidHexEmpty => f.write_str("invalid hex literal"),
            LexErr::InvalidNumeric  => f.write_str("invalid decimal literal"),
            LexErr::InvalidSymbol   => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU32   => Some(format!("the range for a 32-bit unsigned integer is [{}, {}]", u32::MIN, u32::MAX).into()),
            LexErr::InvalidHex      => Some("a hex literal starts with '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidHexEmpty => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::InvalidNumeric  => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::InvalidSymbol   => Some("commands only consist of words and unsigned numbers".into()),
        }
    }
}

fn lex_unsigned(lx: &Lexer<'_, Token>) -> Result<u32, LexErr> {
    let src = lx.slice();

    match src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map_err(|e| match e.kind() {
                IntErrorKind::Empty => LexErr::InvalidHexEmpty,
                IntErrorKind::PosOverflow => LexErr::DoesNotFitU32,
                _ => LexErr::InvalidHex,
            }),
        None => src.parse::<u32>()
            .map_err(|e| match e.kind() {
                IntErrorKind::PosOverflow => LexErr::DoesNotFitU32,
                _ => LexErr::InvalidNumeric,
            }),
    }
}
