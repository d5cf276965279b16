//! Memory handling for the CHIP-8 simulator.
//!
//! This module consists of:
//! - [`Mem`]: The 4 KiB memory, which holds the built-in font at its start.
//! - [`RegFile`]: The register file (`V0`-`VF`).

use crate::ast::Reg;

/// The number of addressable bytes.
pub const MEM_SIZE: usize = 0x1000;
/// Mask applied to every address (12 significant bits).
pub const ADDR_MASK: u16 = 0x0FFF;
/// The address programs are loaded at (and where PC starts).
pub const PROGRAM_START: u16 = 0x200;
/// The address of the first font glyph.
pub const FONT_START: u16 = 0x000;
/// The number of bytes in a font glyph.
pub const GLYPH_SIZE: u16 = 5;

/// The built-in hexadecimal font (`0`-`F`), 5 bytes per glyph.
pub const FONT: [u8; 16 * GLYPH_SIZE as usize] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// The address of the font glyph for `digit`.
///
/// Only digits up to `0xF` have a glyph. Larger values point past the font table.
pub fn glyph_addr(digit: u8) -> u16 {
    FONT_START + GLYPH_SIZE * u16::from(digit)
}

/// Memory.
///
/// Every access wraps its address to 12 bits,
/// so any `u16` is accepted as an address.
///
/// ```
/// use chip8_dbg::sim::mem::{Mem, FONT};
///
/// let mut mem = Mem::new();
/// assert_eq!(&mem.as_slice()[..FONT.len()], &FONT);
///
/// mem.set(0x200, 0x12);
/// mem.set(0x201, 0x34);
/// assert_eq!(mem.read_word(0x200), 0x1234);
/// assert_eq!(mem.get(0x1200), 0x12); // wraps
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Mem(Box<[u8; MEM_SIZE]>);

impl Mem {
    /// Creates zeroed memory with the font table installed.
    pub fn new() -> Self {
        let mut mem = Self(Box::new([0; MEM_SIZE]));
        mem.install_font();
        mem
    }

    /// (Re)writes the font table to its fixed location.
    pub fn install_font(&mut self) {
        let start = usize::from(FONT_START);
        self.0[start..start + FONT.len()].copy_from_slice(&FONT);
    }

    /// Reads the byte at the given address.
    pub fn get(&self, addr: u16) -> u8 {
        self.0[usize::from(addr & ADDR_MASK)]
    }

    /// Writes the byte at the given address.
    pub fn set(&mut self, addr: u16, data: u8) {
        self.0[usize::from(addr & ADDR_MASK)] = data;
    }

    /// Reads the big-endian word at the given address.
    ///
    /// A word starting at `0xFFF` takes its low byte from `0x000`.
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.get(addr), self.get(addr.wrapping_add(1))])
    }

    /// Copies a block of bytes into memory, starting at the given address.
    ///
    /// The block must fit before the end of memory.
    pub(crate) fn copy_block(&mut self, start: u16, data: &[u8]) {
        let si = usize::from(start & ADDR_MASK);
        self.0[si..si + data.len()].copy_from_slice(data);
    }

    /// The underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &*self.0
    }
}
impl Default for Mem {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mem").finish_non_exhaustive()
    }
}

/// The register file.
///
/// It can be indexed with a [`Reg`]:
/// ```
/// use chip8_dbg::sim::mem::RegFile;
/// use chip8_dbg::ast::reg_consts::VF;
///
/// let mut regs = RegFile::new();
/// regs[VF] = 1;
/// assert_eq!(regs[VF], 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegFile([u8; 16]);
impl RegFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self([0; 16])
    }

    /// All registers, `V0` first.
    pub fn as_slice(&self) -> &[u8; 16] {
        &self.0
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u8;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use super::{glyph_addr, Mem, FONT, MEM_SIZE};

    #[test]
    fn test_font_installed() {
        let mem = Mem::new();
        assert_eq!(mem.as_slice().len(), MEM_SIZE);
        assert_eq!(&mem.as_slice()[..80], &FONT);
        assert!(mem.as_slice()[80..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_glyph_addr() {
        assert_eq!(glyph_addr(0x0), 0);
        assert_eq!(glyph_addr(0xA), 50);
        assert_eq!(glyph_addr(0xF), 75);
        // no masking: the address is past the font table
        assert_eq!(glyph_addr(0x10), 80);
        assert_eq!(glyph_addr(0xFF), 1275);
    }

    #[test]
    fn test_word_wraps() {
        let mut mem = Mem::new();
        mem.set(0xFFF, 0xAB);
        mem.set(0x000, 0xCD);
        assert_eq!(mem.read_word(0xFFF), 0xABCD);
    }
}
