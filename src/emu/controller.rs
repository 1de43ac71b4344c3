use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{Chip8Error, Config, Keypad, Machine, Renderer};

/// What the execution loop is doing, as seen from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chip8Status {
    Idle,
    Running,
    /// The loop ended on an error that has not been collected by `stop` or `reset` yet.
    Halted,
}

enum RunState {
    Idle,
    Running(Worker),
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<Result<(), Chip8Error>>,
}

/// Drives a [`Machine`] on a background thread at a fixed tick rate.
///
/// `start`, `stop` and `reset` may be called from any thread. None of them may
/// be called from inside the [`Renderer`], which runs on the execution thread.
pub struct Chip8Vm {
    machine: Arc<Mutex<Machine>>,
    keypad: Arc<Keypad>,
    state: Mutex<RunState>,
    tick_period: Duration,
}

impl Chip8Vm {
    pub fn new(renderer: impl Renderer + 'static) -> Self {
        Self::with_config(renderer, Config::default())
    }

    pub fn with_config(renderer: impl Renderer + 'static, config: Config) -> Self {
        let machine = Machine::with_config(renderer, &config);
        let keypad = machine.keypad().clone();

        Chip8Vm {
            machine: Arc::new(Mutex::new(machine)),
            keypad,
            state: Mutex::new(RunState::Idle),
            tick_period: config.tick_period(),
        }
    }

    /// Copies a ROM into program memory. A rejected ROM leaves the machine untouched.
    pub fn load_program(&self, rom: &[u8]) -> Result<(), Chip8Error> {
        lock(&self.machine).load_program(rom)
    }

    /// Spawns the execution loop. No-op if it is already running or halted.
    pub fn start(&self) {
        let mut state = lock(&self.state);
        if let RunState::Running(_) = *state {
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let machine = Arc::clone(&self.machine);
        let tick_period = self.tick_period;
        let handle = thread::spawn(move || run_loop(&machine, &stop_rx, tick_period));

        tracing::debug!(?tick_period, "execution loop started");
        *state = RunState::Running(Worker { stop_tx, handle });
    }

    /// Signals the loop to stop and waits for it to exit. No-op if idle.
    ///
    /// Returns the error that ended the run if it terminated abnormally.
    pub fn stop(&self) -> Result<(), Chip8Error> {
        stop_worker(&mut lock(&self.state))
    }

    /// Stops the loop and restores every piece of machine state to its
    /// construction-time value. The controller is idle afterwards.
    ///
    /// A fault from the stopped run is discarded. The returned error, if any,
    /// comes from rendering the cleared display.
    pub fn reset(&self) -> Result<(), Chip8Error> {
        // Held until the reset is done so a concurrent start cannot slip in
        let mut state = lock(&self.state);
        if let Err(e) = stop_worker(&mut state) {
            tracing::warn!(error = %e, "discarding fault of previous run on reset");
        }

        tracing::debug!("machine reset");
        lock(&self.machine).reset()
    }

    /// Executes a single step while idle. Does nothing while the loop is running.
    pub fn step(&self) -> Result<(), Chip8Error> {
        let state = lock(&self.state);
        if let RunState::Running(_) = *state {
            return Ok(());
        }

        lock(&self.machine).step()
    }

    pub fn status(&self) -> Chip8Status {
        match &*lock(&self.state) {
            RunState::Idle => Chip8Status::Idle,
            RunState::Running(worker) if worker.handle.is_finished() => Chip8Status::Halted,
            RunState::Running(_) => Chip8Status::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == Chip8Status::Running
    }

    /// Indices outside 0..16 are ignored.
    pub fn press_key<K: TryInto<usize>>(&self, key: K) {
        self.keypad.press(key);
    }

    /// Indices outside 0..16 are ignored.
    pub fn release_key<K: TryInto<usize>>(&self, key: K) {
        self.keypad.release(key);
    }

    pub fn keypad(&self) -> &Arc<Keypad> {
        &self.keypad
    }

    /// Runs `f` with read access to the machine. Blocks for at most one step.
    pub fn inspect<T>(&self, f: impl FnOnce(&Machine) -> T) -> T {
        f(&lock(&self.machine))
    }
}

impl Drop for Chip8Vm {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "execution loop had failed before drop");
        }
    }
}

fn stop_worker(state: &mut RunState) -> Result<(), Chip8Error> {
    let RunState::Running(worker) = std::mem::replace(state, RunState::Idle) else {
        return Ok(());
    };

    // The receiver is gone if the loop already ended on an error
    let _ = worker.stop_tx.send(());
    let result = worker.handle.join().unwrap_or_else(|panic| {
        tracing::error!("execution thread panicked");
        std::panic::resume_unwind(panic)
    });

    tracing::debug!("execution loop stopped");
    result
}

/// Waits for either the next tick or a stop signal, whichever comes first.
fn run_loop(
    machine: &Mutex<Machine>,
    stop_rx: &mpsc::Receiver<()>,
    tick_period: Duration,
) -> Result<(), Chip8Error> {
    let mut next_tick = Instant::now() + tick_period;

    loop {
        match stop_rx.recv_timeout(next_tick.saturating_duration_since(Instant::now())) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Err(e) = lock(machine).step() {
            tracing::error!(error = %e, "execution loop terminated");
            return Err(e);
        }

        // Drop ticks we are too late for instead of bursting to catch up
        next_tick += tick_period;
        let now = Instant::now();
        if next_tick < now {
            next_tick = now + tick_period;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
