// The constants are fixed by the CHIP-8 architecture
pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
pub const KEY_COUNT: usize = 16;
pub const REGISTER_COUNT: usize = 16;
pub const STACK_DEPTH: usize = 16;
pub const MEMORY_SIZE: usize = 4096;
pub const ROM_START_ADDRESS: usize = 0x200;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;

/// Ticks per second of the execution loop unless configured otherwise.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("Program counter out of bounds at {pc:#06X}")]
    ProgramCounterOutOfBounds { pc: u16 },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },

    #[error("Unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },

    #[error("Stack overflow: more than 16 nested subroutine calls")]
    StackOverflow,

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,

    #[error("Renderer failed")]
    Renderer(#[source] anyhow::Error),
}
