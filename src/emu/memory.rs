use super::{
    Chip8Error, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, MAX_ROM_SIZE, MEMORY_SIZE,
    ROM_START_ADDRESS,
};

/// 4KB of byte-addressable memory with the font table seeded at address 0.
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
}

impl Memory {
    pub fn new() -> Self {
        let mut memory = Memory {
            bytes: [0; MEMORY_SIZE],
        };
        memory.seed_font();
        memory
    }

    /// Copies `rom` to the program region. Font and interpreter space are untouched.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            });
        }

        self.bytes[ROM_START_ADDRESS..ROM_START_ADDRESS + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    /// Zeroes everything, then puts the font back.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.seed_font();
    }

    pub fn read(&self, address: usize) -> Result<u8, Chip8Error> {
        self.bytes
            .get(address)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address })
    }

    pub fn write(&mut self, address: usize, value: u8) -> Result<(), Chip8Error> {
        let byte = self
            .bytes
            .get_mut(address)
            .ok_or(Chip8Error::MemoryOutOfBounds { address })?;
        *byte = value;
        Ok(())
    }

    /// Bounds checked view of `len` bytes starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> Result<&[u8], Chip8Error> {
        let end = start + len;
        // Report the first address that does not exist
        self.bytes.get(start..end).ok_or(Chip8Error::MemoryOutOfBounds {
            address: start.max(MEMORY_SIZE),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn seed_font(&mut self) {
        self.bytes[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
