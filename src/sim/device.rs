//! Handlers for external devices connected to the Simulator.
//!
//! The interpreter only depends on two capabilities:
//! - [`Keypad`]: "is key K held" and "wait for the next key press".
//! - [`DisplayDevice`]: present the framebuffer (and sound the alert).
//!
//! These are collected, together with an optional halt poller ([`InterruptFromFn`]),
//! in the [`DeviceHandler`] held by the Simulator.
//!
//! This module also provides some devices:
//! - [`NullDevice`]: Does nothing (no keys are ever held, nothing is drawn).
//! - [`BufferedKeypad`]: Keypad driven programmatically through a shared buffer.
//! - [`ChannelKeypad`]: Keypad driven by press/release events over a channel.
//! - [`BufferedDisplay`]: Display that records frames into a shared buffer.
//! - [`TermDisplay`]: Display that draws the framebuffer into a terminal.
//! - [`TimerDevice`]: The fixed-rate tick source for the delay and sound timers.

mod keyboard;
mod display;
mod timer;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel as cbc;

use super::screen::Framebuffer;
pub use keyboard::{key_for_char, BufferedKeypad, ChannelKeypad, KeyEvent, HOLD_WINDOW};
pub use display::{BufferedDisplay, DisplayLog, TermDisplay};
pub use timer::{TimerDevice, Timers};

/// The number of keys on the keypad.
pub const KEY_COUNT: u8 = 16;

/// A 16-key keypad.
pub trait Keypad: Send + 'static {
    /// Whether the given key (`0x0`-`0xF`) is currently held.
    fn is_pressed(&mut self, key: u8) -> bool;

    /// Waits up to `timeout` for the next key press,
    /// returning the pressed key or `None` if no key was pressed in time.
    ///
    /// The Simulator calls this repeatedly while it is suspended on `LD Vx, K`,
    /// servicing timers and checking for interrupts between calls.
    fn wait_press(&mut self, timeout: Duration) -> Option<u8>;

    /// Resets the keypad state.
    fn reset(&mut self) {}
}

/// A consumer of framebuffer frames.
pub trait DisplayDevice: Send + 'static {
    /// Presents a frame.
    fn render(&mut self, fb: &Framebuffer);

    /// Emits the one-shot alert signalled when the sound timer reaches zero.
    fn alert(&mut self) {}

    /// Resets the display.
    fn reset(&mut self) {}
}

/// A device that signals halt requests with a function.
///
/// The function is polled once per instruction (and continuously while
/// the Simulator waits for a key). Returning `true` requests a halt.
pub struct InterruptFromFn(Box<dyn FnMut() -> bool + Send + 'static>);
impl InterruptFromFn {
    /// Creates a new interrupt from a function.
    pub fn new(f: impl FnMut() -> bool + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Creates an interrupt that fires whenever a message arrives on the given channel.
    ///
    /// Every pending message is consumed by a single poll.
    pub fn from_channel<T: Send + 'static>(rx: cbc::Receiver<T>) -> Self {
        Self::new(move || rx.try_iter().count() > 0)
    }

    fn poll(&mut self) -> bool {
        (self.0)()
    }
}
impl std::fmt::Debug for InterruptFromFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptFromFn").finish_non_exhaustive()
    }
}

/// The central hub for all external devices for the Simulator.
pub struct DeviceHandler {
    keypad: Box<dyn Keypad>,
    display: Box<dyn DisplayDevice>,
    interrupt: Option<InterruptFromFn>
}

impl DeviceHandler {
    /// Creates a new device handler with no devices attached.
    pub fn new() -> Self {
        Self {
            keypad: Box::new(NullDevice),
            display: Box::new(NullDevice),
            interrupt: None
        }
    }

    /// Set the keypad device.
    pub fn set_keypad(&mut self, kp: impl Keypad) {
        self.keypad = Box::new(kp);
    }
    /// Set the display device.
    pub fn set_display(&mut self, ds: impl DisplayDevice) {
        self.display = Box::new(ds);
    }
    /// Set the halt poller, returning the previous one.
    pub fn set_interrupt(&mut self, int: InterruptFromFn) -> Option<InterruptFromFn> {
        self.interrupt.replace(int)
    }
    /// Remove the halt poller.
    pub fn clear_interrupt(&mut self) -> Option<InterruptFromFn> {
        self.interrupt.take()
    }

    /// Checks whether a halt was requested.
    pub fn poll_interrupt(&mut self) -> bool {
        self.interrupt.as_mut().is_some_and(InterruptFromFn::poll)
    }

    pub(super) fn is_pressed(&mut self, key: u8) -> bool {
        self.keypad.is_pressed(key)
    }
    pub(super) fn wait_press(&mut self, timeout: Duration) -> Option<u8> {
        self.keypad.wait_press(timeout)
            .filter(|&k| k < KEY_COUNT)
    }
    pub(super) fn render(&mut self, fb: &Framebuffer) {
        self.display.render(fb);
    }
    pub(super) fn alert(&mut self) {
        self.display.alert();
    }

    /// Resets all the devices connected to this handler.
    pub fn reset(&mut self) {
        self.keypad.reset();
        self.display.reset();
    }
}
impl Default for DeviceHandler {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for DeviceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandler")
            .field("interrupt", &self.interrupt)
            .finish_non_exhaustive()
    }
}

/// Does nothing.
///
/// No key is ever held, and frames are discarded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullDevice;
impl Keypad for NullDevice {
    fn is_pressed(&mut self, _key: u8) -> bool {
        false
    }

    fn wait_press(&mut self, timeout: Duration) -> Option<u8> {
        std::thread::sleep(timeout);
        None
    }
}
impl DisplayDevice for NullDevice {
    fn render(&mut self, _fb: &Framebuffer) {}
}

fn resolve_lock<G>(e: std::sync::TryLockResult<G>) -> Option<G> {
    use std::sync::TryLockError;

    match e {
        Ok(guard) => Some(guard),
        Err(TryLockError::WouldBlock) => None,
        Err(TryLockError::Poisoned(e)) => Some(e.into_inner())
    }
}
impl<K: Keypad> Keypad for Arc<Mutex<K>> {
    fn is_pressed(&mut self, key: u8) -> bool {
        resolve_lock(self.try_lock())
            .is_some_and(|mut g| g.is_pressed(key))
    }

    fn wait_press(&mut self, timeout: Duration) -> Option<u8> {
        resolve_lock(self.try_lock())?
            .wait_press(timeout)
    }

    fn reset(&mut self) {
        if let Some(mut guard) = resolve_lock(self.try_lock()) {
            guard.reset();
        }
    }
}
impl<D: DisplayDevice> DisplayDevice for Arc<Mutex<D>> {
    fn render(&mut self, fb: &Framebuffer) {
        if let Some(mut guard) = resolve_lock(self.try_lock()) {
            guard.render(fb);
        }
    }

    fn alert(&mut self) {
        if let Some(mut guard) = resolve_lock(self.try_lock()) {
            guard.alert();
        }
    }

    fn reset(&mut self) {
        if let Some(mut guard) = resolve_lock(self.try_lock()) {
            guard.reset();
        }
    }
}
