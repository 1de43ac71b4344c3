use super::{DISPLAY_X, DISPLAY_Y, Display};

/// 64x32 monochrome frame. Sprites are XORed in and wrap around both edges.
#[derive(Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    pixels: Display<bool>,
}

impl DisplayBuffer {
    pub fn new() -> Self {
        DisplayBuffer {
            pixels: [[false; DISPLAY_X]; DISPLAY_Y],
        }
    }

    pub fn clear(&mut self) {
        self.pixels = [[false; DISPLAY_X]; DISPLAY_Y];
    }

    /// XORs `sprite` (one byte per row, MSB leftmost) onto the display at (x, y).
    ///
    /// Returns true if any pixel went from set to unset.
    pub fn draw_sprite(&mut self, sprite: &[u8], x: u8, y: u8) -> bool {
        let mut any_erased = false;

        for (row, sprite_byte) in sprite.iter().enumerate() {
            let y_pos = (usize::from(y) + row) % DISPLAY_Y;

            for col in 0..8 {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let x_pos = (usize::from(x) + col) % DISPLAY_X;
                    let pixel = &mut self.pixels[y_pos][x_pos];

                    // Flip the pixel
                    *pixel ^= true;

                    if !*pixel {
                        any_erased = true;
                    }
                }
            }
        }

        any_erased
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn pixel(&self, y: usize, x: usize) -> bool {
        self.pixels[y][x]
    }

    pub fn pixels(&self) -> &Display<bool> {
        &self.pixels
    }
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DisplayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.pixels {
            let line: String = row.iter().map(|&p| if p { '#' } else { '.' }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
