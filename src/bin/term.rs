use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Paragraph, Widget},
};

use chip8_vm::{
    Chip8Status, Chip8Vm, Config, DEFAULT_TICK_RATE, DISPLAY_X, DISPLAY_Y, Display,
    DisplayBuffer, KEY_COUNT, REGISTER_COUNT, Renderer,
};

const KEY_MAP: [KeyCode; 16] = [
    KeyCode::Char('x'), // 0x0
    KeyCode::Char('1'), // 0x1
    KeyCode::Char('2'), // 0x2
    KeyCode::Char('3'), // 0x3
    KeyCode::Char('q'), // 0x4
    KeyCode::Char('w'), // 0x5
    KeyCode::Char('e'), // 0x6
    KeyCode::Char('a'), // 0x7
    KeyCode::Char('s'), // 0x8
    KeyCode::Char('d'), // 0x9
    KeyCode::Char('z'), // 0xA
    KeyCode::Char('c'), // 0xB
    KeyCode::Char('4'), // 0xC
    KeyCode::Char('r'), // 0xD
    KeyCode::Char('f'), // 0xE
    KeyCode::Char('v'), // 0xF
];

// Key release events are not fired in terminals on Linux.
// To handle this, we implement a timeout after which we consider a key released.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(50);

/// Frames are read back through `Chip8Vm::inspect`, so only beeps need recording.
struct TermRenderer {
    beeping: Arc<AtomicBool>,
}

impl Renderer for TermRenderer {
    fn render(&mut self, _display: &DisplayBuffer) -> anyhow::Result<()> {
        Ok(())
    }

    fn beep(&mut self) -> anyhow::Result<()> {
        self.beeping.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Copy of the machine taken once per redraw.
struct View {
    status: Chip8Status,
    display: Display<bool>,
    pc: u16,
    i: u16,
    v: [u8; REGISTER_COUNT],
    stack: Vec<u16>,
    delay_timer: u8,
    sound_timer: u8,
    keypad: [bool; KEY_COUNT],
}

struct App {
    vm: Chip8Vm,
    rom: Vec<u8>,
    beeping: Arc<AtomicBool>,
    output: String,
    should_quit: bool,
    key_press_times: [Option<Instant>; 16],
}

impl App {
    fn new(rom: Vec<u8>, config: Config) -> anyhow::Result<Self> {
        let beeping = Arc::new(AtomicBool::new(false));
        let vm = Chip8Vm::with_config(
            TermRenderer {
                beeping: beeping.clone(),
            },
            config,
        );
        vm.load_program(&rom)
            .context("Failed to load ROM into CHIP-8 memory")?;

        Ok(Self {
            vm,
            rom,
            beeping,
            output: "F5 run/pause, F10 step, F9 reset, Esc quit".to_string(),
            should_quit: false,
            key_press_times: [None; 16],
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        self.vm.start();

        while !self.should_quit {
            if self.vm.status() == Chip8Status::Halted
                && let Err(e) = self.vm.stop()
            {
                self.output = format!("Halted: {e}");
            }

            let view = self.view();
            terminal.draw(|frame| self.draw(frame, &view))?;

            self.check_key_timeout();

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key);
                }
            }
        }

        self.vm.stop().context("Chip8 Execution error")
    }

    fn view(&self) -> View {
        let status = self.vm.status();
        self.vm.inspect(|m| View {
            status,
            display: *m.display().pixels(),
            pc: m.pc(),
            i: m.index(),
            v: *m.registers(),
            stack: m.stack().frames().to_vec(),
            delay_timer: m.delay_timer(),
            sound_timer: m.sound_timer(),
            keypad: m.keypad().snapshot(),
        })
    }

    fn draw(&self, frame: &mut Frame, view: &View) {
        frame.render_widget(Screen { app: self, view }, frame.area());
    }

    fn check_key_timeout(&mut self) {
        let now = Instant::now();

        for (idx, press_time) in self.key_press_times.iter_mut().enumerate() {
            if let Some(time) = press_time
                && now.duration_since(*time) > KEY_RELEASE_TIMEOUT
            {
                *press_time = None;
                self.vm.release_key(idx);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        // Handle Ctrl+C globally
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::F(5) => self.toggle_run(),
            KeyCode::F(9) => self.reset(),
            KeyCode::F(10) => {
                self.output = match self.vm.step() {
                    Ok(()) => "Stepped".to_string(),
                    Err(e) => e.to_string(),
                };
            }
            _ => {
                if let Some(idx) = KEY_MAP.iter().position(|&k| k == key.code) {
                    self.vm.press_key(idx);
                    self.key_press_times[idx] = Some(Instant::now());
                }
            }
        }
    }

    fn toggle_run(&mut self) {
        if self.vm.status() == Chip8Status::Idle {
            self.vm.start();
            self.output = "Running".to_string();
        } else {
            self.output = match self.vm.stop() {
                Ok(()) => "Paused".to_string(),
                Err(e) => format!("Halted: {e}"),
            };
        }
    }

    fn reset(&mut self) {
        let result = self
            .vm
            .reset()
            .and_then(|()| self.vm.load_program(&self.rom));

        self.key_press_times = [None; 16];
        self.output = match result {
            Ok(()) => "Reset, paused".to_string(),
            Err(e) => e.to_string(),
        };
    }
}

struct Screen<'a> {
    app: &'a App,
    view: &'a View,
}

impl Widget for Screen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Check if we have enough space
        const MIN_WIDTH: u16 = DISPLAY_X as u16 + 2 + 15 + 2;
        const MIN_HEIGHT: u16 = DISPLAY_Y as u16 + 2 + 1 + 2;
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            let center = area.centered(Constraint::Length(45), Constraint::Length(3));

            Paragraph::new(format!(
                "Terminal is too small ({}x{} min)",
                MIN_WIDTH, MIN_HEIGHT
            ))
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .block(Block::bordered())
            .render(center, buf);

            return;
        }

        let [left, right] = Layout::horizontal([
            Constraint::Min(DISPLAY_X as u16 + 2),
            Constraint::Length(15 + 2),
        ])
        .areas(area);

        let [display, output] = Layout::vertical([
            Constraint::Length(DISPLAY_Y as u16 + 2),
            Constraint::Min(1 + 2),
        ])
        .areas(left);

        let [state, registers, keypad, stack] = Layout::vertical([
            Constraint::Length(1 + 2),
            Constraint::Length(11 + 2),
            Constraint::Length(4 + 2),
            Constraint::Min(1 + 2),
        ])
        .areas(right);

        self.render_display(display, buf);
        self.render_state(state, buf);
        self.render_registers(registers, buf);
        self.render_keypad(keypad, buf);
        self.render_stack(stack, buf);
        self.render_output(output, buf);
    }
}

impl Screen<'_> {
    fn render_display(&self, area: Rect, buf: &mut Buffer) {
        let text: Vec<Line> = self
            .view
            .display
            .iter()
            .map(|row| {
                row.iter()
                    .map(|pixel| {
                        Span::styled(if *pixel { "█" } else { " " }, Style::default().green())
                    })
                    .collect()
            })
            .collect();

        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Display "))
            .render(area, buf);
    }

    fn render_registers(&self, area: Rect, buf: &mut Buffer) {
        let view = self.view;
        let mut lines = vec![
            Line::from(format!("PC: {:03X}  I: {:03X}", view.pc, view.i)),
            Line::from(format!(
                "DT: {:02X}   ST: {:02X}",
                view.delay_timer, view.sound_timer
            )),
            Line::from(""),
        ];

        for idx in 0..8 {
            lines.push(Line::from(format!(
                "V{:X}: {:02X}   V{:X}: {:02X}",
                idx,
                view.v[idx],
                idx + 8,
                view.v[idx + 8]
            )));
        }

        Paragraph::new(lines)
            .block(Block::bordered().title(" Registers "))
            .render(area, buf);
    }

    fn render_stack(&self, area: Rect, buf: &mut Buffer) {
        let max_lines = area.height.saturating_sub(2) as usize;

        let mut lines: Vec<Line> = self
            .view
            .stack
            .iter()
            .enumerate()
            .map(|(i, val)| Line::from(format!("{:02}: {:03X}", i, val)))
            .collect();

        if lines.is_empty() {
            lines.push(Line::from("Empty"));
        }

        if lines.len() > max_lines && max_lines > 0 {
            // Display only the last `max_lines - 1` items with "..." at the top
            lines = std::iter::once(Line::from("..."))
                .chain(lines.into_iter().rev().take(max_lines - 1).rev())
                .collect();
        }

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Stack "))
            .render(area, buf);
    }

    fn render_output(&self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.app.output.as_str())
            .block(Block::bordered().title(" Output "))
            .render(area, buf);
    }

    fn render_state(&self, area: Rect, buf: &mut Buffer) {
        let (text, color) = match self.view.status {
            Chip8Status::Running if self.app.beeping.swap(false, Ordering::Relaxed) => {
                ("BEEP", Color::Magenta)
            }
            Chip8Status::Running => ("RUNNING", Color::Green),
            Chip8Status::Idle => ("PAUSED", Color::Yellow),
            Chip8Status::Halted => ("HALTED", Color::Red),
        };

        Paragraph::new(Text::styled(text, Style::default().fg(color)))
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" State "))
            .render(area, buf);
    }

    fn render_keypad(&self, area: Rect, buf: &mut Buffer) {
        let keypad = &self.view.keypad;
        let layout: [[usize; 4]; 4] = [
            [0x1, 0x2, 0x3, 0xC],
            [0x4, 0x5, 0x6, 0xD],
            [0x7, 0x8, 0x9, 0xE],
            [0xA, 0x0, 0xB, 0xF],
        ];

        let lines = layout
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&key| {
                        Span::styled(
                            format!("{:X}", key),
                            if keypad[key] {
                                Style::default().fg(Color::Black).bg(Color::White)
                            } else {
                                Style::default()
                            },
                        )
                    })
                    .flat_map(|s| [s, Span::raw(" ")])
                    .take(row.len() * 2 - 1)
                    .collect()
            })
            .collect::<Vec<Line>>();

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" Keypad "))
            .render(area, buf);
    }
}

/// Terminal front end for the CHIP-8 virtual machine
#[derive(Parser)]
struct Args {
    /// Path to the ROM file to load
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_TICK_RATE, value_parser = tick_rate)]
    tick_rate: u32,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,
}

fn tick_rate(s: &str) -> Result<u32, String> {
    clap_num::number_range(s, 1, 10_000)
}

fn main() -> anyhow::Result<()> {
    // Logging would draw over the TUI, so it is opt-in through RUST_LOG
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;
    let mut config = Config::default().with_tick_rate(args.tick_rate);
    config.rng_seed = args.seed;

    let mut app = App::new(rom, config).context("Failed to initialize application")?;

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    app_result
}
