#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use anyhow::bail;
use chip8_vm::{DisplayBuffer, Renderer};

#[derive(Default)]
pub struct Recording {
    pub frames: usize,
    pub beeps: usize,
    pub last_frame: Option<DisplayBuffer>,
    pub fail_render: bool,
    pub fail_beep: bool,
}

/// Renderer that records what it was asked to do, shared with the test body.
#[derive(Clone, Default)]
pub struct RecordingRenderer(pub Arc<Mutex<Recording>>);

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> usize {
        self.0.lock().unwrap().frames
    }

    pub fn beeps(&self) -> usize {
        self.0.lock().unwrap().beeps
    }

    pub fn last_frame(&self) -> Option<DisplayBuffer> {
        self.0.lock().unwrap().last_frame.clone()
    }

    pub fn fail_render(&self) {
        self.0.lock().unwrap().fail_render = true;
    }

    pub fn fail_beep(&self) {
        self.0.lock().unwrap().fail_beep = true;
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, display: &DisplayBuffer) -> anyhow::Result<()> {
        let mut rec = self.0.lock().unwrap();
        if rec.fail_render {
            bail!("render target lost");
        }
        rec.frames += 1;
        rec.last_frame = Some(display.clone());
        Ok(())
    }

    fn beep(&mut self) -> anyhow::Result<()> {
        let mut rec = self.0.lock().unwrap();
        if rec.fail_beep {
            bail!("audio device gone");
        }
        rec.beeps += 1;
        Ok(())
    }
}

/// Flattens opcodes into big endian ROM bytes.
pub fn rom(opcodes: &[u16]) -> Vec<u8> {
    opcodes.iter().flat_map(|op| op.to_be_bytes()).collect()
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
