use rand::Rng;

use super::{Chip8Error, Machine, Opcode, OpcodeALU, glyph_address};
use crate::u4;

impl Machine {
    /// Applies a decoded instruction. pc already points past it.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<(), Chip8Error> {
        match opcode {
            Opcode::ClearDisplay => {
                self.display.clear();
                self.render()?;
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                self.stack.push(self.pc)?;
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.stack.pop()?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n)?;
            }
            Opcode::SkipIfPressed { x } => {
                self.skip_if(self.keypad.is_pressed(self.v[x].into()));
            }
            Opcode::SkipIfNotPressed { x } => {
                self.skip_if(!self.keypad.is_pressed(self.v[x].into()));
            }
            Opcode::WaitForKey { x } => {
                self.execute_wait_for_key(x);
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.timers.delay;
            }
            Opcode::SetDelayTimer { x } => {
                self.timers.delay = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.timers.sound = self.v[x];
            }
            Opcode::FontChar { x } => {
                self.i = glyph_address(self.v[x]);
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                let addr = usize::from(self.i);
                self.memory.write(addr, value / 100)?;
                self.memory.write(addr + 1, (value / 10) % 10)?;
                self.memory.write(addr + 2, value % 10)?;
            }
            Opcode::StoreRegs { x } => {
                // V0..Vx exclusive; I ends one past the last byte written
                for reg_index in 0..usize::from(x) {
                    self.memory.write(usize::from(self.i), self.v[reg_index])?;
                    self.i = self.i.wrapping_add(1);
                }
            }
            Opcode::LoadRegs { x } => {
                for reg_index in 0..usize::from(x) {
                    self.v[reg_index] = self.memory.read(usize::from(self.i))?;
                    self.i = self.i.wrapping_add(1);
                }
            }
            Opcode::Unknown(opcode) => {
                return Err(Chip8Error::UnknownOpcode { opcode });
            }
        };

        Ok(())
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[u4::F] = u8::from(overflow);
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[u4::F] = u8::from(!borrow); // Notice that borrow is inverted
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[u4::F] = u8::from(!borrow);
            }
            // Shifts read Vy and write the result back to both Vy and Vx
            OpcodeALU::ShiftRight => {
                self.v[u4::F] = self.v[y] & 1;
                self.v[y] >>= 1;
                self.v[x] = self.v[y];
            }
            OpcodeALU::ShiftLeft => {
                self.v[u4::F] = self.v[y] >> 7;
                self.v[y] <<= 1;
                self.v[x] = self.v[y];
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<(), Chip8Error> {
        let sprite = self.memory.slice(usize::from(self.i), usize::from(n))?;
        let any_erased = self.display.draw_sprite(sprite, self.v[x], self.v[y]);

        self.v[u4::F] = u8::from(any_erased);
        self.render()
    }

    fn execute_wait_for_key(&mut self, x: u4) {
        if let Some(key) = self.wait_release_key
            && !self.keypad.is_pressed(key.into())
        {
            // The key we were waiting for has been released
            self.v[x] = key;
            self.wait_release_key = None;
            return;
        }

        if self.wait_release_key.is_none() {
            self.wait_release_key = self.keypad.first_pressed();
        }

        // Repeat this instruction on the next step until a key is released
        self.pc = self.pc.wrapping_sub(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::{NullRenderer, ROM_START_ADDRESS};

    fn machine() -> Machine {
        Machine::new(NullRenderer)
    }

    fn run(machine: &mut Machine, opcode: u16) -> Result<(), Chip8Error> {
        machine.execute(Opcode::decode(opcode.into()))
    }

    #[test]
    fn add_immediate_wraps_without_touching_vf() {
        let mut m = machine();
        m.v[0xA] = 0xFF;
        m.v[0xF] = 7;

        run(&mut m, 0x7A02).unwrap();

        assert_eq!(m.v[0xA], 0x01);
        assert_eq!(m.v[0xF], 7);
    }

    #[test]
    fn add_registers_sets_carry() {
        let mut m = machine();
        m.v[1] = 250;
        m.v[2] = 10;
        run(&mut m, 0x8124).unwrap();
        assert_eq!((m.v[1], m.v[0xF]), (4, 1));

        m.v[1] = 10;
        m.v[2] = 10;
        run(&mut m, 0x8124).unwrap();
        assert_eq!((m.v[1], m.v[0xF]), (20, 0));
    }

    #[test]
    fn subtract_sets_not_borrow() {
        let mut m = machine();
        m.v[1] = 5;
        m.v[2] = 10;
        run(&mut m, 0x8125).unwrap();
        assert_eq!((m.v[1], m.v[0xF]), (251, 0));

        m.v[1] = 10;
        m.v[2] = 5;
        run(&mut m, 0x8125).unwrap();
        assert_eq!((m.v[1], m.v[0xF]), (5, 1));
    }

    #[test]
    fn reverse_subtract_sets_not_borrow() {
        let mut m = machine();
        m.v[1] = 10;
        m.v[2] = 5;
        run(&mut m, 0x8127).unwrap();
        assert_eq!((m.v[1], m.v[0xF]), (251, 0));

        m.v[1] = 5;
        m.v[2] = 10;
        run(&mut m, 0x8127).unwrap();
        assert_eq!((m.v[1], m.v[0xF]), (5, 1));
    }

    #[test]
    fn bitwise_ops_leave_vf_alone() {
        let mut m = machine();
        m.v[1] = 0b1100;
        m.v[2] = 0b1010;
        m.v[0xF] = 9;

        run(&mut m, 0x8121).unwrap();
        assert_eq!(m.v[1], 0b1110);
        m.v[1] = 0b1100;
        run(&mut m, 0x8122).unwrap();
        assert_eq!(m.v[1], 0b1000);
        m.v[1] = 0b1100;
        run(&mut m, 0x8123).unwrap();
        assert_eq!(m.v[1], 0b0110);
        assert_eq!(m.v[0xF], 9);
    }

    #[test]
    fn shift_right_reads_vy_and_writes_both() {
        let mut m = machine();
        m.v[1] = 0xFF;
        m.v[2] = 0b0000_0101;

        run(&mut m, 0x8126).unwrap();

        assert_eq!(m.v[0xF], 1);
        assert_eq!(m.v[2], 0b0000_0010);
        assert_eq!(m.v[1], 0b0000_0010);
    }

    #[test]
    fn shift_left_reads_vy_and_writes_both() {
        let mut m = machine();
        m.v[1] = 0x00;
        m.v[2] = 0b1000_0001;

        run(&mut m, 0x812E).unwrap();

        assert_eq!(m.v[0xF], 1);
        assert_eq!(m.v[2], 0b0000_0010);
        assert_eq!(m.v[1], 0b0000_0010);
    }

    #[test]
    fn skips_advance_pc_by_one_instruction() {
        let mut m = machine();
        let start = m.pc;
        m.v[3] = 0x42;
        m.v[4] = 0x42;

        run(&mut m, 0x3342).unwrap();
        assert_eq!(m.pc, start + 2);
        run(&mut m, 0x4342).unwrap();
        assert_eq!(m.pc, start + 2);
        run(&mut m, 0x5340).unwrap();
        assert_eq!(m.pc, start + 4);
        run(&mut m, 0x9340).unwrap();
        assert_eq!(m.pc, start + 4);
    }

    #[test]
    fn jump_with_offset_adds_v0() {
        let mut m = machine();
        m.v[0] = 0x10;
        run(&mut m, 0xB300).unwrap();
        assert_eq!(m.pc, 0x310);
    }

    #[test]
    fn random_is_masked() {
        let mut m = machine();
        for _ in 0..32 {
            run(&mut m, 0xC50F).unwrap();
            assert_eq!(m.v[5] & 0xF0, 0);
        }
        run(&mut m, 0xC500).unwrap();
        assert_eq!(m.v[5], 0);
    }

    #[test]
    fn font_char_points_at_glyph() {
        let mut m = machine();
        m.v[2] = 0xA;
        run(&mut m, 0xF229).unwrap();
        assert_eq!(m.i, 50);
    }

    #[test]
    fn bcd_writes_three_digits() {
        let mut m = machine();
        m.v[7] = 254;
        m.i = 0x300;

        run(&mut m, 0xF733).unwrap();

        assert_eq!(&m.memory.as_slice()[0x300..0x303], &[2, 5, 4]);
        assert_eq!(m.i, 0x300);
    }

    #[test]
    fn bcd_past_end_of_memory_fails() {
        let mut m = machine();
        m.i = 0xFFE;
        assert!(matches!(
            run(&mut m, 0xF033),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        ));
    }

    #[test]
    fn store_and_load_registers_exclude_vx() {
        let mut m = machine();
        m.v[..4].copy_from_slice(&[1, 2, 3, 4]);
        m.i = 0x400;

        run(&mut m, 0xF355).unwrap();

        assert_eq!(&m.memory.as_slice()[0x400..0x404], &[1, 2, 3, 0]);
        assert_eq!(m.i, 0x403);

        m.v = [0; 16];
        m.i = 0x400;
        run(&mut m, 0xF365).unwrap();

        assert_eq!(&m.v[..4], &[1, 2, 3, 0]);
        assert_eq!(m.i, 0x403);
    }

    #[test]
    fn draw_sets_collision_flag() {
        let mut m = machine();
        m.i = 0x300;
        m.memory.write(0x300, 0xF0).unwrap();

        run(&mut m, 0xD011).unwrap();
        assert_eq!(m.v[0xF], 0);
        assert!(m.display.pixel(0, 3));

        run(&mut m, 0xD011).unwrap();
        assert_eq!(m.v[0xF], 1);
        assert!(!m.display.pixel(0, 3));
    }

    #[test]
    fn wait_for_key_latches_press_and_completes_on_release() {
        let mut m = machine();
        let keypad = m.keypad.clone();
        m.pc = ROM_START_ADDRESS as u16 + 2;

        run(&mut m, 0xF40A).unwrap();
        assert_eq!(m.pc, ROM_START_ADDRESS as u16);

        keypad.press(0xB);
        m.pc += 2;
        run(&mut m, 0xF40A).unwrap();
        assert_eq!(m.pc, ROM_START_ADDRESS as u16);
        assert_eq!(m.wait_release_key, Some(0xB));

        keypad.release(0xB);
        m.pc += 2;
        run(&mut m, 0xF40A).unwrap();
        assert_eq!(m.pc, ROM_START_ADDRESS as u16 + 2);
        assert_eq!(m.v[4], 0xB);
        assert_eq!(m.wait_release_key, None);
    }

    #[test]
    fn key_skips_treat_large_values_as_released() {
        let mut m = machine();
        let start = m.pc;
        m.v[1] = 0x42;

        run(&mut m, 0xE19E).unwrap();
        assert_eq!(m.pc, start);
        run(&mut m, 0xE1A1).unwrap();
        assert_eq!(m.pc, start + 2);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let mut m = machine();
        assert!(matches!(
            run(&mut m, 0x0123),
            Err(Chip8Error::UnknownOpcode { opcode: 0x0123 })
        ));
    }
}
