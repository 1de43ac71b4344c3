use std::sync::atomic::{AtomicBool, Ordering};

use super::KEY_COUNT;

/// Keypad state: 16 keys mapped as booleans (true = pressed).
///
/// Written by host input threads while the execution thread reads it, so each
/// key is its own atomic flag.
#[derive(Debug, Default)]
pub struct Keypad {
    keys: [AtomicBool; KEY_COUNT],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` pressed. Indices outside 0..16 (negative included) are ignored.
    pub fn press<K: TryInto<usize>>(&self, key: K) {
        self.set(key, true);
    }

    /// Marks `key` released. Indices outside 0..16 (negative included) are ignored.
    pub fn release<K: TryInto<usize>>(&self, key: K) {
        self.set(key, false);
    }

    pub fn set<K: TryInto<usize>>(&self, key: K, pressed: bool) {
        if let Some(flag) = key.try_into().ok().and_then(|idx| self.keys.get(idx)) {
            flag.store(pressed, Ordering::Release);
        }
    }

    /// Out of range keys read as not pressed.
    pub fn is_pressed(&self, key: usize) -> bool {
        self.keys
            .get(key)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Lowest pressed key, if any.
    pub fn first_pressed(&self) -> Option<u8> {
        (0..KEY_COUNT)
            .find(|&key| self.is_pressed(key))
            .map(|key| key as u8)
    }

    pub fn release_all(&self) {
        for flag in &self.keys {
            flag.store(false, Ordering::Release);
        }
    }

    pub fn snapshot(&self) -> [bool; KEY_COUNT] {
        std::array::from_fn(|key| self.is_pressed(key))
    }
}
