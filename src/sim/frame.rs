//! The call stack.
//!
//! This module exposes [`CallStack`], a fixed-capacity stack of return addresses.
//! Exceeding its capacity is reported to the caller rather than reusing slots.

/// The maximum number of nested subroutine calls.
pub const MAX_CALL_DEPTH: usize = 16;

/// The stack of return addresses.
///
/// Each entry is the address of the `CALL` instruction that created it;
/// returning resumes at the instruction after it.
///
/// ```
/// use chip8_dbg::sim::frame::{CallStack, MAX_CALL_DEPTH};
///
/// let mut stack = CallStack::new();
/// for _ in 0..MAX_CALL_DEPTH {
///     stack.push(0x200).unwrap();
/// }
/// assert!(stack.push(0x200).is_err());
/// assert_eq!(stack.pop(), Some(0x200));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    frames: [u16; MAX_CALL_DEPTH],
    len: usize
}

/// A push onto a full [`CallStack`] was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFull;

impl CallStack {
    /// Creates an empty call stack.
    pub fn new() -> Self {
        Self { frames: [0; MAX_CALL_DEPTH], len: 0 }
    }

    /// Pushes a return address.
    pub fn push(&mut self, addr: u16) -> Result<(), StackFull> {
        let slot = self.frames.get_mut(self.len).ok_or(StackFull)?;
        *slot = addr;
        self.len += 1;
        Ok(())
    }

    /// Pops the most recent return address, or `None` if the stack is empty.
    pub fn pop(&mut self) -> Option<u16> {
        self.len = self.len.checked_sub(1)?;
        Some(self.frames[self.len])
    }

    /// The number of calls currently on the stack (the stack pointer).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The return addresses on the stack, bottom first.
    pub fn frames(&self) -> &[u16] {
        &self.frames[..self.len]
    }
}
impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}
