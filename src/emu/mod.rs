mod config;
mod controller;
mod display;
mod execute;
mod font;
mod keypad;
mod machine;
mod memory;
mod opcode;
mod renderer;
mod stack;
mod timers;
mod types;

pub use config::*;
pub use controller::*;
pub use display::*;
pub use font::*;
pub use keypad::*;
pub use machine::*;
pub use memory::*;
pub use opcode::*;
pub use renderer::*;
pub use stack::*;
pub use timers::*;
pub use types::*;
