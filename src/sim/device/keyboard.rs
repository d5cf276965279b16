use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};
use std::time::{Duration, Instant};

use crossbeam_channel as cbc;

use super::{Keypad, KEY_COUNT};

/// How long a key counts as held after its last press event.
///
/// Terminals only report key presses (and auto-repeat), never releases,
/// so a press is treated as a hold for this long.
pub const HOLD_WINDOW: Duration = Duration::from_millis(100);

/// Maps a character on the left side of a QWERTY keyboard to its keypad key.
///
/// ```text
/// 1 2 3 4        1 2 3 C
/// q w e r   ->   4 5 6 D
/// a s d f        7 8 9 E
/// z x c v        A 0 B F
/// ```
pub fn key_for_char(c: char) -> Option<u8> {
    let key = match c.to_ascii_lowercase() {
        '1' => 0x1, '2' => 0x2, '3' => 0x3, '4' => 0xC,
        'q' => 0x4, 'w' => 0x5, 'e' => 0x6, 'r' => 0xD,
        'a' => 0x7, 's' => 0x8, 'd' => 0x9, 'f' => 0xE,
        'z' => 0xA, 'x' => 0x0, 'c' => 0xB, 'v' => 0xF,
        _ => return None,
    };
    Some(key)
}

#[derive(Debug, Default)]
struct KeyState {
    held: [bool; KEY_COUNT as usize],
    presses: VecDeque<u8>
}

/// Keypad whose state is set through a shared buffer.
///
/// Clones share the same state, so a test can hold one clone
/// while the Simulator holds another.
///
/// ```
/// use chip8_dbg::sim::device::{BufferedKeypad, Keypad};
/// use std::time::Duration;
///
/// let mut keypad = BufferedKeypad::default();
/// keypad.clone().press(0xA);
///
/// assert!(keypad.is_pressed(0xA));
/// assert_eq!(keypad.wait_press(Duration::ZERO), Some(0xA));
/// assert_eq!(keypad.wait_press(Duration::ZERO), None);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferedKeypad {
    state: Arc<RwLock<KeyState>>
}
impl BufferedKeypad {
    /// Creates a new keypad with no keys held.
    pub fn new() -> Self {
        Default::default()
    }

    fn try_state(&self) -> Option<RwLockWriteGuard<'_, KeyState>> {
        match self.state.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Presses a key: it becomes held and a press event is queued.
    pub fn press(&self, key: u8) {
        if let Some(mut state) = self.try_state() {
            state.held[usize::from(key & 0xF)] = true;
            state.presses.push_back(key & 0xF);
        }
    }

    /// Releases a key.
    pub fn release(&self, key: u8) {
        if let Some(mut state) = self.try_state() {
            state.held[usize::from(key & 0xF)] = false;
        }
    }
}
impl Keypad for BufferedKeypad {
    fn is_pressed(&mut self, key: u8) -> bool {
        self.try_state()
            .is_some_and(|s| s.held.get(usize::from(key)).copied().unwrap_or(false))
    }

    fn wait_press(&mut self, timeout: Duration) -> Option<u8> {
        let next = self.try_state()?.presses.pop_front();
        match next {
            Some(k) => Some(k),
            None => {
                std::thread::sleep(timeout);
                None
            }
        }
    }

    fn reset(&mut self) {
        if let Some(mut state) = self.try_state() {
            *state = KeyState::default();
        }
    }
}

/// A key event delivered to a [`ChannelKeypad`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// The key was pressed (or auto-repeated).
    Press(u8),
    /// The key was released.
    Release(u8),
}

/// Keypad fed by [`KeyEvent`]s arriving over a channel.
///
/// A key is held from its press event until its release event,
/// or until [`HOLD_WINDOW`] has elapsed since its last press,
/// whichever comes first.
#[derive(Debug)]
pub struct ChannelKeypad {
    events: cbc::Receiver<KeyEvent>,
    last_press: [Option<Instant>; KEY_COUNT as usize],
    hold: Duration
}
impl ChannelKeypad {
    /// Creates a new keypad reading events from the given channel.
    pub fn new(events: cbc::Receiver<KeyEvent>) -> Self {
        Self::with_hold(events, HOLD_WINDOW)
    }

    /// Creates a new keypad with a custom hold window.
    pub fn with_hold(events: cbc::Receiver<KeyEvent>, hold: Duration) -> Self {
        Self { events, last_press: [None; KEY_COUNT as usize], hold }
    }

    /// Applies an event, returning the key if it was a press.
    fn apply(&mut self, event: KeyEvent) -> Option<u8> {
        match event {
            KeyEvent::Press(k) => {
                let slot = self.last_press.get_mut(usize::from(k))?;
                *slot = Some(Instant::now());
                Some(k)
            },
            KeyEvent::Release(k) => {
                if let Some(slot) = self.last_press.get_mut(usize::from(k)) {
                    *slot = None;
                }
                None
            },
        }
    }

    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }
}
impl Keypad for ChannelKeypad {
    fn is_pressed(&mut self, key: u8) -> bool {
        self.drain();
        self.last_press.get(usize::from(key))
            .copied()
            .flatten()
            .is_some_and(|t| t.elapsed() < self.hold)
    }

    fn wait_press(&mut self, timeout: Duration) -> Option<u8> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.events.recv_deadline(deadline) {
                Ok(event) => if let Some(k) = self.apply(event) {
                    break Some(k);
                },
                Err(cbc::RecvTimeoutError::Timeout) => break None,
                Err(cbc::RecvTimeoutError::Disconnected) => {
                    // no more events can arrive, so wait out the timeout like an idle keypad
                    std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    break None;
                },
            }
        }
    }

    fn reset(&mut self) {
        self.drain();
        self.last_press = [None; KEY_COUNT as usize];
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{key_for_char, BufferedKeypad, ChannelKeypad, KeyEvent};
    use crate::sim::device::Keypad;

    #[test]
    fn test_keymap() {
        assert_eq!(key_for_char('1'), Some(0x1));
        assert_eq!(key_for_char('4'), Some(0xC));
        assert_eq!(key_for_char('X'), Some(0x0));
        assert_eq!(key_for_char('v'), Some(0xF));
        assert_eq!(key_for_char('p'), None);

        let mut keys: Vec<_> = "1234qwerasdfzxcv".chars().filter_map(key_for_char).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_buffered_release() {
        let mut keypad = BufferedKeypad::new();
        keypad.press(3);
        assert!(keypad.is_pressed(3));
        keypad.release(3);
        assert!(!keypad.is_pressed(3));
        // the press event stays queued
        assert_eq!(keypad.wait_press(Duration::ZERO), Some(3));

        keypad.press(4);
        keypad.reset();
        assert!(!keypad.is_pressed(4));
        assert_eq!(keypad.wait_press(Duration::ZERO), None);
    }

    #[test]
    fn test_channel_hold() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut keypad = ChannelKeypad::new(rx);

        assert!(!keypad.is_pressed(5));
        tx.send(KeyEvent::Press(5)).unwrap();
        assert!(keypad.is_pressed(5));
        tx.send(KeyEvent::Release(5)).unwrap();
        assert!(!keypad.is_pressed(5));
    }

    #[test]
    fn test_channel_hold_expires() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut keypad = ChannelKeypad::with_hold(rx, Duration::from_millis(10));

        tx.send(KeyEvent::Press(1)).unwrap();
        assert!(keypad.is_pressed(1));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!keypad.is_pressed(1));
    }

    #[test]
    fn test_channel_wait_press() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut keypad = ChannelKeypad::new(rx);

        assert_eq!(keypad.wait_press(Duration::from_millis(1)), None);

        tx.send(KeyEvent::Release(2)).unwrap();
        tx.send(KeyEvent::Press(9)).unwrap();
        assert_eq!(keypad.wait_press(Duration::from_millis(1)), Some(9));
        assert!(keypad.is_pressed(9));

        // out-of-range keys are ignored
        tx.send(KeyEvent::Press(20)).unwrap();
        assert_eq!(keypad.wait_press(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_channel_disconnected_waits() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut keypad = ChannelKeypad::new(rx);
        tx.send(KeyEvent::Press(7)).unwrap();
        drop(tx);

        // queued events are still delivered
        assert_eq!(keypad.wait_press(Duration::from_millis(1)), Some(7));

        let start = std::time::Instant::now();
        assert_eq!(keypad.wait_press(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
