use std::io::{Stdout, Write};
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};

use crossterm::{cursor, queue, style, terminal};

use super::DisplayDevice;
use crate::sim::screen::{Framebuffer, HEIGHT, WIDTH};

/// What a [`BufferedDisplay`] has received so far.
#[derive(Debug, Default, Clone)]
pub struct DisplayLog {
    /// The number of frames presented.
    pub frames: usize,
    /// The number of alerts signalled.
    pub alerts: usize,
    /// The most recently presented frame.
    pub last: Option<Framebuffer>
}

/// A display that records presented frames into a shared buffer.
///
/// Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferedDisplay {
    buffer: Arc<RwLock<DisplayLog>>
}
impl BufferedDisplay {
    /// Creates a new display, wrapping it around a given buffer.
    pub fn new(buffer: Arc<RwLock<DisplayLog>>) -> Self {
        Self { buffer }
    }

    /// Gets a reference to the internal buffer of this display.
    pub fn get_buffer(&self) -> &Arc<RwLock<DisplayLog>> {
        &self.buffer
    }

    fn try_output(&self) -> Option<RwLockWriteGuard<'_, DisplayLog>> {
        match self.buffer.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// The number of frames presented so far.
    pub fn frame_count(&self) -> usize {
        self.try_output().map_or(0, |log| log.frames)
    }
    /// The number of alerts signalled so far.
    pub fn alert_count(&self) -> usize {
        self.try_output().map_or(0, |log| log.alerts)
    }
    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<Framebuffer> {
        self.try_output()?.last.clone()
    }
}
impl DisplayDevice for BufferedDisplay {
    fn render(&mut self, fb: &Framebuffer) {
        if let Some(mut log) = self.try_output() {
            log.frames += 1;
            log.last = Some(fb.clone());
        }
    }

    fn alert(&mut self) {
        if let Some(mut log) = self.try_output() {
            log.alerts += 1;
        }
    }

    fn reset(&mut self) {
        if let Some(mut log) = self.try_output() {
            *log = DisplayLog::default();
        }
    }
}

const LIT: char = '\u{2588}';
const UNLIT: char = ' ';

/// A display that draws the framebuffer into a terminal, one cell per pixel.
///
/// Frames are drawn at the top-left corner of the terminal.
/// The alert is the terminal bell.
#[derive(Debug)]
pub struct TermDisplay<W: Write = Stdout> {
    out: W
}
impl TermDisplay {
    /// Creates a display writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}
impl<W: Write> TermDisplay<W> {
    /// Creates a display writing to the given terminal.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Gets a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Switches to the alternate screen and hides the cursor.
    pub fn enter(&mut self) -> std::io::Result<()> {
        queue!(self.out, terminal::EnterAlternateScreen, cursor::Hide, terminal::Clear(terminal::ClearType::All))?;
        self.out.flush()
    }

    /// Restores the screen and cursor.
    pub fn leave(&mut self) -> std::io::Result<()> {
        queue!(self.out, cursor::Show, terminal::LeaveAlternateScreen)?;
        self.out.flush()
    }

    fn draw(&mut self, fb: &Framebuffer) -> std::io::Result<()> {
        for y in 0..HEIGHT {
            let line: String = (0..WIDTH)
                .map(|x| match fb.get(x, y) {
                    true  => LIT,
                    false => UNLIT,
                })
                .collect();

            queue!(self.out, cursor::MoveTo(0, y as u16), style::Print(line))?;
        }
        self.out.flush()
    }
}
impl<W: Write + Send + 'static> DisplayDevice for TermDisplay<W> {
    fn render(&mut self, fb: &Framebuffer) {
        if let Err(e) = self.draw(fb) {
            log::warn!("failed to draw frame: {e}");
        }
    }

    fn alert(&mut self) {
        let result = self.out.write_all(b"\x07")
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            log::warn!("failed to ring terminal bell: {e}");
        }
    }

    fn reset(&mut self) {
        let result = queue!(self.out, terminal::Clear(terminal::ClearType::All))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            log::warn!("failed to clear terminal: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferedDisplay, TermDisplay};
    use crate::sim::device::DisplayDevice;
    use crate::sim::screen::Framebuffer;

    #[test]
    fn test_buffered_records() {
        let display = BufferedDisplay::default();
        let mut handle = display.clone();
        assert!(display.last_frame().is_none());

        let mut fb = Framebuffer::new();
        fb.toggle(1, 1);
        handle.render(&fb);
        handle.render(&fb);
        handle.alert();

        assert_eq!(display.frame_count(), 2);
        assert_eq!(display.alert_count(), 1);
        assert_eq!(display.last_frame(), Some(fb));

        handle.reset();
        assert_eq!(display.frame_count(), 0);
    }

    #[test]
    fn test_term_draws_pixels() {
        let mut display = TermDisplay::new(Vec::new());
        let mut fb = Framebuffer::new();
        fb.toggle(0, 0);
        fb.toggle(5, 0);
        display.render(&fb);

        let out = String::from_utf8(display.get_ref().clone()).unwrap();
        assert_eq!(out.matches('\u{2588}').count(), 2);
    }

    #[test]
    fn test_term_alert_rings_bell() {
        let mut display = TermDisplay::new(Vec::new());
        display.alert();
        assert_eq!(display.get_ref().as_slice(), b"\x07");
    }
}
