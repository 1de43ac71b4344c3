mod common;

use std::{thread, time::Duration};

use chip8_vm::{Chip8Error, Chip8Status, Chip8Vm, Config, MAX_ROM_SIZE, ROM_START_ADDRESS, u4};
use common::{RecordingRenderer, rom, wait_until};

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_vm(program: &[u16]) -> (Chip8Vm, RecordingRenderer) {
    let renderer = RecordingRenderer::new();
    let vm = Chip8Vm::with_config(renderer.clone(), Config::default().with_tick_rate(1000));
    vm.load_program(&rom(program)).unwrap();
    (vm, renderer)
}

fn register(vm: &Chip8Vm, x: u8) -> u8 {
    vm.inspect(|m| m.register(u4::new(x)))
}

#[test]
fn start_and_stop_are_idempotent() {
    let (vm, _) = fast_vm(&[0x1200]);

    assert!(vm.stop().is_ok());
    assert_eq!(vm.status(), Chip8Status::Idle);

    vm.start();
    vm.start();
    assert_eq!(vm.status(), Chip8Status::Running);

    assert!(vm.stop().is_ok());
    assert!(vm.stop().is_ok());
    assert_eq!(vm.status(), Chip8Status::Idle);
}

#[test]
fn loop_executes_steps_until_stopped() {
    let (vm, _) = fast_vm(&[0x7001, 0x1200]);

    vm.start();
    assert!(wait_until(TIMEOUT, || register(&vm, 0) >= 3));
    vm.stop().unwrap();

    let frozen = register(&vm, 0);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(register(&vm, 0), frozen);
}

#[test]
fn restart_continues_from_current_state() {
    let (vm, _) = fast_vm(&[0x7001, 0x1200]);

    vm.start();
    assert!(wait_until(TIMEOUT, || register(&vm, 0) >= 2));
    vm.stop().unwrap();
    let before = register(&vm, 0);

    vm.start();
    assert!(wait_until(TIMEOUT, || register(&vm, 0) > before));
    vm.stop().unwrap();
}

#[test]
fn fault_halts_the_loop_and_is_reported_by_stop() {
    let (vm, _) = fast_vm(&[0x6001, 0x0123]);

    vm.start();
    assert!(wait_until(TIMEOUT, || vm.status() == Chip8Status::Halted));

    // Still halted: start does not silently restart a faulted run
    vm.start();
    assert_eq!(vm.status(), Chip8Status::Halted);

    let err = vm.stop().unwrap_err();
    assert!(matches!(err, Chip8Error::UnknownOpcode { opcode: 0x0123 }));
    assert_eq!(vm.status(), Chip8Status::Idle);
    assert_eq!(register(&vm, 0), 1);
}

#[test]
fn renderer_failure_is_fatal_to_the_run() {
    let (vm, renderer) = fast_vm(&[0x00E0, 0x1200]);
    renderer.fail_render();

    vm.start();
    assert!(wait_until(TIMEOUT, || vm.status() == Chip8Status::Halted));

    assert!(matches!(vm.stop(), Err(Chip8Error::Renderer(_))));
}

#[test]
fn reset_stops_and_reinitializes() {
    let (vm, renderer) = fast_vm(&[0x7001, 0x6503, 0xF515, 0x1200]);
    vm.press_key(4);

    vm.start();
    assert!(wait_until(TIMEOUT, || register(&vm, 0) >= 2));
    vm.reset().unwrap();

    assert_eq!(vm.status(), Chip8Status::Idle);
    vm.inspect(|m| {
        assert_eq!(m.pc(), ROM_START_ADDRESS as u16);
        assert_eq!(m.registers(), &[0; 16]);
        assert_eq!(m.delay_timer(), 0);
        assert!(m.memory().as_slice()[ROM_START_ADDRESS..].iter().all(|&b| b == 0));
    });
    assert!(!vm.keypad().is_pressed(4));
    assert_eq!(renderer.frames(), 1);
}

#[test]
fn reset_clears_a_halted_run() {
    let (vm, _) = fast_vm(&[0x00EE]);

    vm.start();
    assert!(wait_until(TIMEOUT, || vm.status() == Chip8Status::Halted));
    vm.reset().unwrap();

    assert_eq!(vm.status(), Chip8Status::Idle);
    vm.load_program(&rom(&[0x7001, 0x1200])).unwrap();
    vm.start();
    assert!(wait_until(TIMEOUT, || register(&vm, 0) >= 1));
    vm.stop().unwrap();
}

#[test]
fn out_of_range_keys_are_ignored() {
    let (vm, _) = fast_vm(&[0x1200]);

    vm.press_key(20);
    vm.release_key(-1);

    assert!((0..16).all(|k| !vm.keypad().is_pressed(k)));
}

#[test]
fn key_press_is_seen_by_running_program() {
    // 0x200 skip-if-key-0, 0x202 loop back, 0x204 V1 = 1, 0x206 park
    let (vm, _) = fast_vm(&[0xE09E, 0x1200, 0x6101, 0x1206]);

    vm.start();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(register(&vm, 1), 0);

    vm.press_key(0);
    assert!(wait_until(TIMEOUT, || register(&vm, 1) == 1));
    vm.stop().unwrap();
}

#[test]
fn wait_for_key_blocks_until_release() {
    let (vm, _) = fast_vm(&[0xF30A, 0x1202]);

    vm.start();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(vm.inspect(|m| m.pc()), 0x200);

    vm.press_key(7);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(vm.inspect(|m| m.pc()), 0x200);

    vm.release_key(7);
    assert!(wait_until(TIMEOUT, || vm.inspect(|m| m.pc()) == 0x202));
    assert_eq!(register(&vm, 3), 7);
    vm.stop().unwrap();
}

#[test]
fn single_step_only_while_idle() {
    let (vm, _) = fast_vm(&[0x7001, 0x1200]);

    vm.step().unwrap();
    assert_eq!(register(&vm, 0), 1);
    assert_eq!(vm.inspect(|m| m.pc()), 0x202);

    vm.start();
    vm.step().unwrap();
    vm.stop().unwrap();
}

#[test]
fn rejected_load_does_not_disturb_a_running_program() {
    let (vm, _) = fast_vm(&[0x7001, 0x1200]);

    vm.start();
    let err = vm.load_program(&vec![0xFF; MAX_ROM_SIZE + 1]).unwrap_err();
    assert!(matches!(err, Chip8Error::RomTooLarge { .. }));

    assert!(wait_until(TIMEOUT, || register(&vm, 0) >= 2));
    assert_eq!(vm.status(), Chip8Status::Running);
    vm.stop().unwrap();
}

#[test]
fn controls_work_from_other_threads() {
    let (vm, _) = fast_vm(&[0x7001, 0x1200]);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                vm.start();
                vm.press_key(1);
                vm.stop().unwrap();
                vm.start();
            });
        }
    });

    assert_eq!(vm.status(), Chip8Status::Running);
    vm.stop().unwrap();
    assert_eq!(vm.status(), Chip8Status::Idle);
}
