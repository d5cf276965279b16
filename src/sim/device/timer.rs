use std::time::{Duration, Instant};

use crossbeam_channel as cbc;

/// The delay and sound countdown registers.
///
/// ```
/// use chip8_dbg::sim::device::Timers;
///
/// let mut timers = Timers { delay: 1, sound: 0 };
/// timers.tick();
/// assert_eq!(timers.delay, 0);
/// timers.tick();
/// assert_eq!(timers.delay, 0);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    /// The delay timer.
    pub delay: u8,
    /// The sound timer. The alert is signalled when it counts down to zero.
    pub sound: u8
}
impl Timers {
    /// Creates a pair of stopped timers.
    pub fn new() -> Self {
        Default::default()
    }

    /// Decrements each nonzero timer by one.
    ///
    /// This returns whether the sound timer has just reached zero.
    pub fn tick(&mut self) -> bool {
        self.delay = self.delay.saturating_sub(1);
        match self.sound {
            0 => false,
            n => {
                self.sound = n - 1;
                self.sound == 0
            }
        }
    }
}

/// The fixed-rate tick source for the [`Timers`].
///
/// Ticks are counted from wall-clock time since the device was created,
/// so they keep elapsing whether or not anything is executing.
/// Elapsed ticks accumulate until they are collected with [`TimerDevice::pending`].
/// A device with a rate of 0 never ticks.
#[derive(Debug)]
pub struct TimerDevice {
    epoch: Instant,
    collected: u64,
    hz: u32
}
impl TimerDevice {
    /// Creates a tick source which ticks `hz` times per second.
    pub fn new(hz: u32) -> Self {
        Self { epoch: Instant::now(), collected: 0, hz }
    }

    /// Collects the number of ticks that elapsed since the last call.
    pub fn pending(&mut self) -> u64 {
        let elapsed = self.epoch.elapsed().as_nanos() * u128::from(self.hz) / 1_000_000_000;
        let due = u64::try_from(elapsed).unwrap_or(u64::MAX);
        let n = due.saturating_sub(self.collected);
        self.collected = due;
        n
    }

    /// A channel which receives a message once per tick.
    ///
    /// This is used to wake up and collect ticks while nothing else is running.
    /// Missed messages are dropped, so the count of received messages is not the tick count.
    pub fn wakeups(&self) -> cbc::Receiver<Instant> {
        match self.hz {
            0 => cbc::never(),
            n => cbc::tick(Duration::from_secs(1) / n),
        }
    }
}
impl Default for TimerDevice {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{TimerDevice, Timers};

    #[test]
    fn test_timers_independent() {
        let mut timers = Timers { delay: 3, sound: 1 };
        assert!(timers.tick());
        assert_eq!(timers, Timers { delay: 2, sound: 0 });

        // the alert only fires on the transition
        assert!(!timers.tick());
        assert_eq!(timers, Timers { delay: 1, sound: 0 });
    }

    #[test]
    fn test_timers_no_underflow() {
        let mut timers = Timers::new();
        for _ in 0..3 {
            assert!(!timers.tick());
        }
        assert_eq!(timers, Timers::new());
    }

    #[test]
    fn test_device_disabled() {
        let mut device = TimerDevice::new(0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(device.pending(), 0);
        assert!(device.wakeups().recv_timeout(Duration::from_millis(5)).is_err());
    }

    #[test]
    fn test_device_catches_up() {
        let mut device = TimerDevice::new(100);
        std::thread::sleep(Duration::from_millis(100));

        // every elapsed tick is counted, not just the latest one
        let n = device.pending();
        assert!(n >= 10, "only {n} ticks elapsed");
        assert!(device.pending() <= 1);
    }

    #[test]
    fn test_device_wakeups() {
        let device = TimerDevice::default();
        assert!(device.wakeups().recv_timeout(Duration::from_millis(500)).is_ok());
    }
}
