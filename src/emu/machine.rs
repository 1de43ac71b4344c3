use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};

use super::{
    CallStack, Chip8Error, Config, DisplayBuffer, Keypad, Memory, Opcode, REGISTER_COUNT,
    ROM_START_ADDRESS, RawOpcode, Renderer, Timers,
};
use crate::u4;

/// CHIP-8 virtual machine state
pub struct Machine {
    /// 4KB memory, font at 0x000, program at 0x200
    pub(crate) memory: Memory,
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: DisplayBuffer,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; REGISTER_COUNT],
    /// Call stack for subroutine returns
    pub(crate) stack: CallStack,
    pub(crate) timers: Timers,

    /// Tracks which key is waiting to be released for the FX0A instruction
    pub(crate) wait_release_key: Option<u8>,
    /// Shared with host input threads
    pub(crate) keypad: Arc<Keypad>,

    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) rng: StdRng,
    rng_seed: Option<u64>,
}

impl Machine {
    pub fn new(renderer: impl Renderer + 'static) -> Self {
        Self::with_config(renderer, &Config::default())
    }

    pub fn with_config(renderer: impl Renderer + 'static, config: &Config) -> Self {
        Machine {
            memory: Memory::new(),
            display: DisplayBuffer::new(),
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; REGISTER_COUNT],
            stack: CallStack::new(),
            timers: Timers::default(),
            wait_release_key: None,
            keypad: Arc::new(Keypad::new()),
            renderer: Box::new(renderer),
            rng: make_rng(config.rng_seed),
            rng_seed: config.rng_seed,
        }
    }

    /// Copies a ROM into program memory. Registers and pc are left alone.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load_program(rom)?;
        tracing::debug!(size = rom.len(), "program loaded");
        Ok(())
    }

    /// Executes one step: fetch, decode, execute, then tick the timers.
    ///
    /// The first error aborts the rest of the step.
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        let pc = self.pc;
        let raw = self.fetch()?;
        let opcode = Opcode::decode(raw);
        tracing::trace!(pc, %raw, ?opcode, "execute");

        self.execute(opcode)?;

        self.timers.tick_delay();
        if self.timers.should_beep() {
            self.renderer.beep().map_err(Chip8Error::Renderer)?;
            self.timers.tick_sound();
        }

        Ok(())
    }

    /// Puts every piece of state back to its construction-time value and
    /// pushes the cleared display to the renderer.
    pub fn reset(&mut self) -> Result<(), Chip8Error> {
        self.memory.reset();
        self.display.clear();
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; REGISTER_COUNT];
        self.stack.clear();
        self.timers.clear();
        self.wait_release_key = None;
        self.keypad.release_all();
        self.rng = make_rng(self.rng_seed);

        self.render()
    }

    /// Reads the big endian word at pc and advances pc past it.
    pub fn fetch(&mut self) -> Result<RawOpcode, Chip8Error> {
        let pc = self.pc;
        let word = self
            .memory
            .slice(usize::from(pc), 2)
            .map_err(|_| Chip8Error::ProgramCounterOutOfBounds { pc })?;
        let raw = RawOpcode(u16::from_be_bytes([word[0], word[1]]));

        self.pc = pc.wrapping_add(2);
        Ok(raw)
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// The address register I.
    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.v
    }

    pub fn register(&self, x: u4) -> u8 {
        self.v[x]
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound
    }

    pub fn display(&self) -> &DisplayBuffer {
        &self.display
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn keypad(&self) -> &Arc<Keypad> {
        &self.keypad
    }

    pub(crate) fn render(&mut self) -> Result<(), Chip8Error> {
        self.renderer
            .render(&self.display)
            .map_err(Chip8Error::Renderer)
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
