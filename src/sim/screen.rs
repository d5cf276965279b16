//! The monochrome framebuffer.
//!
//! [`Framebuffer`] is a 64x32 grid of one-bit pixels. Sprites are XOR-blitted onto it
//! with wraparound on both axes (see [`Framebuffer::draw_sprite`]).

/// Width of the display, in pixels.
pub const WIDTH: usize = 64;
/// Height of the display, in pixels.
pub const HEIGHT: usize = 32;

/// A 64x32 monochrome framebuffer.
///
/// Each row is stored as a `u64`, where bit 63 is the leftmost pixel.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Framebuffer {
    rows: [u64; HEIGHT]
}

impl Framebuffer {
    /// Creates a blank framebuffer.
    pub fn new() -> Self {
        Self { rows: [0; HEIGHT] }
    }

    fn mask(x: usize) -> u64 {
        1 << (WIDTH - 1 - x % WIDTH)
    }

    /// Gets the pixel at `(x, y)`. Coordinates wrap.
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.rows[y % HEIGHT] & Self::mask(x) != 0
    }

    /// Flips the pixel at `(x, y)`, returning whether it was previously set.
    /// Coordinates wrap.
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let row = &mut self.rows[y % HEIGHT];
        let was_set = *row & Self::mask(x) != 0;
        *row ^= Self::mask(x);
        was_set
    }

    /// Clears every pixel.
    pub fn clear(&mut self) {
        self.rows = [0; HEIGHT];
    }

    /// XORs an 8-pixel-wide sprite onto the framebuffer with its top-left corner at `(x, y)`.
    ///
    /// Each byte of `sprite` is one row, most significant bit leftmost.
    /// Pixels that fall off an edge wrap around to the opposite edge.
    ///
    /// This returns whether any set pixel was turned off (a collision).
    ///
    /// ```
    /// use chip8_dbg::sim::screen::Framebuffer;
    ///
    /// let mut fb = Framebuffer::new();
    /// assert!(!fb.draw_sprite(62, 0, &[0b1100_0000]));
    /// assert!(fb.get(62, 0) && fb.get(63, 0));
    ///
    /// // wraps to the left edge:
    /// assert!(!fb.draw_sprite(63, 0, &[0b0100_0000]));
    /// assert!(fb.get(0, 0));
    ///
    /// // turns an already-set pixel off:
    /// assert!(fb.draw_sprite(62, 0, &[0b1000_0000]));
    /// assert!(!fb.get(62, 0));
    /// ```
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let x = x % WIDTH;
        let mut collision = false;

        for (dy, &byte) in sprite.iter().enumerate() {
            // place the byte at the top of a row, then rotate it into position
            let bits = (u64::from(byte) << (WIDTH - 8)).rotate_right(x as u32);
            let row = &mut self.rows[(y + dy) % HEIGHT];

            collision |= *row & bits != 0;
            *row ^= bits;
        }

        collision
    }

    /// Whether every pixel is off.
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|&r| r == 0)
    }

    /// Iterates over every pixel with its coordinate, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = ((usize, usize), bool)> + '_ {
        (0..HEIGHT).flat_map(move |y| {
            (0..WIDTH).map(move |x| ((x, y), self.get(x, y)))
        })
    }

    /// The rows of the framebuffer, with bit 63 as the leftmost pixel.
    pub fn rows(&self) -> &[u64; HEIGHT] {
        &self.rows
    }
}
impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("lit", &self.rows.iter().map(|r| r.count_ones()).sum::<u32>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Framebuffer, HEIGHT, WIDTH};

    #[test]
    fn test_blank_sprite_stays_blank() {
        let mut fb = Framebuffer::new();
        assert!(!fb.draw_sprite(10, 10, &[0; 15]));
        assert!(fb.is_blank());
    }

    #[test]
    fn test_collision_on_redraw() {
        let mut fb = Framebuffer::new();
        let sprite = [0xF0, 0x90, 0xF0];
        assert!(!fb.draw_sprite(5, 5, &sprite));
        assert!(!fb.is_blank());
        assert!(fb.draw_sprite(5, 5, &sprite));
        assert!(fb.is_blank());
    }

    #[test]
    fn test_vertical_wrap() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, HEIGHT - 1, &[0x80, 0x80]);
        assert!(fb.get(0, HEIGHT - 1));
        assert!(fb.get(0, 0));
    }

    #[test]
    fn test_coordinates_wrap() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(WIDTH + 1, HEIGHT + 2, &[0x80]);
        assert!(fb.get(1, 2));
    }

    #[test]
    fn test_pixels() {
        let mut fb = Framebuffer::new();
        fb.toggle(3, 4);
        assert_eq!(fb.pixels().count(), WIDTH * HEIGHT);
        let lit: Vec<_> = fb.pixels().filter(|&(_, on)| on).map(|(c, _)| c).collect();
        assert_eq!(lit, [(3, 4)]);
    }
}
