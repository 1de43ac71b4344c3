//! A CHIP-8 virtual machine core.
//!
//! [`Machine`] holds the architectural state and executes one instruction per
//! [`Machine::step`]. [`Chip8Vm`] drives a machine on a background thread at a
//! fixed tick rate and pushes frames and beeps to a host supplied [`Renderer`].

pub mod emu;
mod nibble;

pub use emu::*;
pub use nibble::u4;
