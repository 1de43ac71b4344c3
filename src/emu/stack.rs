use super::{Chip8Error, STACK_DEPTH};

/// Fixed-depth return address stack. `sp` is the number of occupied frames.
pub struct CallStack {
    frames: [u16; STACK_DEPTH],
    sp: usize,
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: [0; STACK_DEPTH],
            sp: 0,
        }
    }

    pub fn push(&mut self, address: u16) -> Result<(), Chip8Error> {
        let frame = self
            .frames
            .get_mut(self.sp)
            .ok_or(Chip8Error::StackOverflow)?;
        *frame = address;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, Chip8Error> {
        self.sp = self.sp.checked_sub(1).ok_or(Chip8Error::StackUnderflow)?;
        Ok(self.frames[self.sp])
    }

    pub fn clear(&mut self) {
        self.frames = [0; STACK_DEPTH];
        self.sp = 0;
    }

    pub fn pointer(&self) -> usize {
        self.sp
    }

    /// Occupied frames, oldest first.
    pub fn frames(&self) -> &[u16] {
        &self.frames[..self.sp]
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}
