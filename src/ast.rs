//! Components used to represent CHIP-8 instructions.
//!
//! These components together are used to construct [`sim::SimInstr`]
//! (a data structure holding one decoded instruction word).

pub mod sim;

use std::num::TryFromIntError;
use offset_base::OffsetBacking;

/// A general-purpose register. Must be between 0 and 15.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// `VF` doubles as the flag register: carry, borrow, shifted-out bits and
/// sprite collisions are all reported through it.
///
/// ## Examples
///
/// ```text
/// LD V0, 0x0A
///    ~~
/// ADD V1, V2
///     ~~  ~~
/// DRW V3, V4, 0x5
///     ~~  ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// Register `V0`.
    pub const V0: Reg = Reg(0);
    /// Register `V1`.
    pub const V1: Reg = Reg(1);
    /// Register `V2`.
    pub const V2: Reg = Reg(2);
    /// Register `V3`.
    pub const V3: Reg = Reg(3);
    /// Register `V4`.
    pub const V4: Reg = Reg(4);
    /// Register `V5`.
    pub const V5: Reg = Reg(5);
    /// Register `V6`.
    pub const V6: Reg = Reg(6);
    /// Register `V7`.
    pub const V7: Reg = Reg(7);
    /// Register `V8`.
    pub const V8: Reg = Reg(8);
    /// Register `V9`.
    pub const V9: Reg = Reg(9);
    /// Register `VA`.
    pub const VA: Reg = Reg(10);
    /// Register `VB`.
    pub const VB: Reg = Reg(11);
    /// Register `VC`.
    pub const VC: Reg = Reg(12);
    /// Register `VD`.
    pub const VD: Reg = Reg(13);
    /// Register `VE`.
    pub const VE: Reg = Reg(14);
    /// Register `VF`, the flag register.
    pub const VF: Reg = Reg(15);
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 15.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Takes the low nibble of the given byte as a register number.
    pub(crate) fn from_nibble(n: u8) -> Self {
        Reg(n & 0xF)
    }

    /// Iterates over the registers `V0` to `self` (inclusive).
    pub fn up_to(self) -> impl Iterator<Item = Reg> {
        (0..=self.0).map(Reg)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{:X}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=15 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _      => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// A 12-bit memory address operand.
///
/// ## Examples
///
/// ```text
/// JP 0x208
///    ~~~~~
/// CALL 0x300
///      ~~~~~
/// LD I, 0x2EA
///       ~~~~~
/// ```
pub type Addr = Offset<u16, 12>;
/// A 4-bit constant operand (only used as the sprite height of `DRW`).
///
/// ## Examples
///
/// ```text
/// DRW V0, V1, 0x5
///             ~~~
/// ```
pub type Nibble = Offset<u8, 4>;

/// A value representing an unsigned constant limited to `N` bits.
///
/// The `OFF` type represents the backing type of this value
/// (`u16` for addresses, `u8` for nibbles).
///
/// The value is displayed in hexadecimal, padded to the width of `N` bits.
///
/// ```
/// use chip8_dbg::ast::{Addr, Nibble};
///
/// assert_eq!(Addr::new_trunc(0x20).to_string(), "0x020");
/// assert_eq!(Nibble::new_trunc(0xA).to_string(), "0xA");
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Offset<OFF, const N: u32>(OFF);

impl<OFF: std::fmt::UpperHex, const N: u32> std::fmt::Display for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = ((N + 3) / 4) as usize;
        write!(f, "0x{:0width$X}", self.0)
    }
}
impl<OFF: std::fmt::UpperHex, const N: u32> std::fmt::UpperHex for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

mod offset_base {
    /// Any type that could store a value for [`Offset`].
    ///
    /// [`Offset`]: super::Offset
    pub trait OffsetBacking: Copy + Eq {
        /// How many bits are contained within this backing.
        const BITS: u32;

        /// Truncates the given value to the provided `bit_size`.
        ///
        /// This bit size is always known to be at most BITS.
        fn truncate(self, bit_size: u32) -> Self;
    }

    macro_rules! impl_offset_backing_for_ints {
        ($($Int:ty),*) => {
            $(
                impl OffsetBacking for $Int {
                    const BITS: u32 = Self::BITS;

                    fn truncate(self, bit_size: u32) -> Self {
                        match bit_size {
                            0 => 0,
                            n => (self << (Self::BITS - n)) >> (Self::BITS - n)
                        }
                    }
                }
            )*
        }
    }
    impl_offset_backing_for_ints! { u8, u16 }
}

impl<OFF: OffsetBacking, const N: u32> Offset<OFF, N> {
    /// Creates a new value by keeping the low N bits of the integer,
    /// and discarding the rest.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chip8_dbg::ast::Offset;
    /// #
    /// let addr = Offset::<u16, 12>::new_trunc(0x2345);
    /// assert_eq!(addr.get(), 0x345);
    ///
    /// let nib = Offset::<u8, 4>::new_trunc(0xAB);
    /// assert_eq!(nib.get(), 0xB);
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the backing (e.g., for backing `u16`, larger than 16).
    ///
    /// ```should_panic
    /// # use chip8_dbg::ast::Offset;
    /// #
    /// let oh_no = Offset::<u16, 17>::new_trunc(18);
    /// ```
    pub fn new_trunc(n: OFF) -> Self {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        Self(n.truncate(N))
    }

    /// Gets the value.
    pub fn get(&self) -> OFF {
        self.0
    }
}
