/// Delay and sound countdown timers, decremented once per step and saturating at 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timers {
    /// Delay timer: readable by programs through Fx07
    pub delay: u8,
    /// Sound timer: beeps while non-zero
    pub sound: u8,
}

impl Timers {
    pub fn tick_delay(&mut self) {
        self.delay = self.delay.saturating_sub(1);
    }

    pub fn tick_sound(&mut self) {
        self.sound = self.sound.saturating_sub(1);
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.sound > 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
