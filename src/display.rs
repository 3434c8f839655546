/// Display width in pixels.
pub const WIDTH: usize = 64;
/// Display height in pixels.
pub const HEIGHT: usize = 32;

// Sprites are always one byte wide.
const SPRITE_WIDTH: usize = 8;

/// What a sprite blit did to the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Blit {
    /// At least one lit pixel was switched off.
    pub collision: bool,
    /// At least one pixel changed state.
    pub changed: bool,
}

/// The 64x32 monochrome framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pixels: [[bool; WIDTH]; HEIGHT],
}

impl Default for Display {
    fn default() -> Self {
        Display::new()
    }
}

impl Display {
    pub fn new() -> Self {
        Display { pixels: [[false; WIDTH]; HEIGHT] }
    }

    /// Switches every pixel off.
    pub fn clear(&mut self) {
        self.pixels.fill([false; WIDTH]);
    }

    /// Returns whether the pixel at (`x`, `y`) is lit. Coordinates wrap.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[y % HEIGHT][x % WIDTH]
    }

    /// Iterates over the framebuffer top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool; WIDTH]> {
        self.pixels.iter()
    }

    /// XORs `sprite` onto the screen with its top-left corner at (`x0`, `y0`).
    ///
    /// Each byte is one 8-pixel row, MSB leftmost. Every pixel wraps around
    /// both edges on its own, so a sprite straddling an edge reappears on the
    /// opposite side.
    pub fn draw(&mut self, x0: usize, y0: usize, sprite: &[u8]) -> Blit {
        let mut blit = Blit::default();
        for (i, row) in sprite.iter().enumerate() {
            let y = (y0 + i) % HEIGHT;
            for j in 0..SPRITE_WIDTH {
                if row & (0x80 >> j) == 0 {
                    continue;
                }
                let x = (x0 + j) % WIDTH;
                let pixel = &mut self.pixels[y][x];
                if *pixel {
                    blit.collision = true;
                }
                *pixel = !*pixel;
                blit.changed = true;
            }
        }
        blit
    }

    #[cfg(test)]
    pub(crate) fn lit(&self) -> usize {
        self.pixels.iter().flatten().filter(|p| **p).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_sets_pixels_msb_first() {
        let mut display = Display::new();
        let blit = display.draw(0, 0, &[0b1010_0000]);
        assert_eq!(blit, Blit { collision: false, changed: true });
        assert!(display.pixel(0, 0));
        assert!(!display.pixel(1, 0));
        assert!(display.pixel(2, 0));
        assert_eq!(display.lit(), 2);
    }

    #[test]
    fn full_row_onto_lit_row_collides() {
        let mut display = Display::new();
        display.draw(8, 4, &[0xFF]);
        let blit = display.draw(8, 4, &[0xFF]);
        assert!(blit.collision);
        assert_eq!(display.lit(), 0);
    }

    #[test]
    fn full_row_onto_clear_row_does_not_collide() {
        let mut display = Display::new();
        let blit = display.draw(8, 4, &[0xFF]);
        assert!(!blit.collision);
        assert_eq!(display.lit(), 8);
    }

    #[test]
    fn drawing_twice_restores_screen() {
        let mut display = Display::new();
        display.draw(3, 3, &[0x3C]);
        let before = display.clone();
        let sprite = [0xF0, 0x90, 0xF0, 0x10, 0xF0];
        display.draw(10, 10, &sprite);
        assert_ne!(display, before);
        display.draw(10, 10, &sprite);
        assert_eq!(display, before);
    }

    #[test]
    fn sprite_wraps_horizontally() {
        let mut display = Display::new();
        display.draw(60, 0, &[0xFF]);
        for x in 60..64 {
            assert!(display.pixel(x, 0), "x = {x}");
        }
        for x in 0..4 {
            assert!(display.pixel(x, 0), "x = {x}");
        }
        assert_eq!(display.lit(), 8);
    }

    #[test]
    fn sprite_wraps_vertically_per_row() {
        let mut display = Display::new();
        display.draw(0, 30, &[0x80, 0x80, 0x80, 0x80]);
        assert!(display.pixel(0, 30));
        assert!(display.pixel(0, 31));
        assert!(display.pixel(0, 0));
        assert!(display.pixel(0, 1));
        assert_eq!(display.lit(), 4);
    }

    #[test]
    fn sprite_wraps_across_corner() {
        let mut display = Display::new();
        display.draw(62, 31, &[0xC0, 0xC0]);
        for (x, y) in [(62, 31), (63, 31), (62, 0), (63, 0)] {
            assert!(display.pixel(x, y), "({x}, {y})");
        }
        assert_eq!(display.lit(), 4);
    }

    #[test]
    fn empty_sprite_changes_nothing() {
        let mut display = Display::new();
        assert_eq!(display.draw(5, 5, &[0x00, 0x00]), Blit::default());
        assert_eq!(display.draw(5, 5, &[]), Blit::default());
    }

    #[test]
    fn clear_switches_everything_off() {
        let mut display = Display::new();
        display.draw(0, 0, &[0xFF; 15]);
        display.clear();
        assert_eq!(display, Display::new());
    }
}
