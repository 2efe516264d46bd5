use super::decode::{CbOp, Cond, Indirect, Instr, Op, Operand, RotOp};
use super::{Cpu, Flag};
use crate::error::EmuError;
use crate::machine::Bus;

/// Extra T-cycles charged when a conditional branch is taken.
const JR_TAKEN_EXTRA: u32 = 4;
const JP_TAKEN_EXTRA: u32 = 4;
const CALL_TAKEN_EXTRA: u32 = 12;
const RET_TAKEN_EXTRA: u32 = 12;

impl Cpu {
    /// Interpret one operation descriptor against the register file and the
    /// bus. `imm` is the already-fetched immediate operand (low byte for
    /// one-byte immediates). Returns the instruction's full cycle cost.
    pub(super) fn execute(
        &mut self,
        bus: &mut Bus,
        instr: &Instr,
        imm: u16,
    ) -> Result<u32, EmuError> {
        let mut cycles = instr.cycles;

        match instr.op {
            Op::Nop => {}
            Op::Halt => self.halted = true,
            // STOP waits for a joypad line on hardware; without a joypad in
            // scope it behaves like HALT here.
            Op::Stop => self.halted = true,
            Op::Di => bus.interrupts.ime = false,
            Op::Ei => bus.interrupts.ime = true,

            Op::Ld { dst, src } => {
                let value = self.read_operand(bus, src, imm)?;
                self.write_operand(bus, dst, value);
            }
            Op::LdAFromInd(ind) => {
                let addr = self.indirect_addr(ind);
                self.regs.a = bus.read(addr)?;
            }
            Op::LdIndFromA(ind) => {
                let addr = self.indirect_addr(ind);
                bus.write(addr, self.regs.a);
            }
            Op::LdAFromAbs => self.regs.a = bus.read(imm)?,
            Op::LdAbsFromA => bus.write(imm, self.regs.a),
            Op::LdhAFromImm => self.regs.a = bus.read(0xFF00 | imm)?,
            Op::LdhImmFromA => bus.write(0xFF00 | imm, self.regs.a),
            Op::LdhAFromC => self.regs.a = bus.read(0xFF00 | self.regs.c as u16)?,
            Op::LdhCFromA => bus.write(0xFF00 | self.regs.c as u16, self.regs.a),

            Op::Ld16Imm(rr) => self.regs.set16(rr, imm),
            Op::LdSpHl => self.regs.sp = self.regs.hl(),
            Op::LdAbsSp => {
                let [lo, hi] = self.regs.sp.to_le_bytes();
                bus.write(imm, lo);
                bus.write(imm.wrapping_add(1), hi);
            }
            Op::LdHlSpOffset => {
                let result = self.alu_add16_signed(self.regs.sp, imm as u8);
                self.regs.set_hl(result);
            }
            Op::Push(rr) => {
                let value = self.regs.get16(rr);
                self.push16(bus, value);
            }
            Op::Pop(rr) => {
                let value = self.pop16(bus)?;
                self.regs.set16(rr, value);
            }

            Op::Alu(op, src) => {
                let value = self.read_operand(bus, src, imm)?;
                self.alu(op, value);
            }
            Op::Inc(dst) => {
                let value = self.read_operand(bus, dst, imm)?;
                let result = self.alu_inc8(value);
                self.write_operand(bus, dst, result);
            }
            Op::Dec(dst) => {
                let value = self.read_operand(bus, dst, imm)?;
                let result = self.alu_dec8(value);
                self.write_operand(bus, dst, result);
            }
            Op::AddHl(rr) => {
                let value = self.regs.get16(rr);
                self.alu_add16_hl(value);
            }
            // 16-bit INC/DEC touch no flags.
            Op::Inc16(rr) => {
                let value = self.regs.get16(rr).wrapping_add(1);
                self.regs.set16(rr, value);
            }
            Op::Dec16(rr) => {
                let value = self.regs.get16(rr).wrapping_sub(1);
                self.regs.set16(rr, value);
            }
            Op::AddSpImm => self.regs.sp = self.alu_add16_signed(self.regs.sp, imm as u8),
            Op::Daa => self.alu_daa(),
            Op::Cpl => {
                self.regs.a = !self.regs.a;
                self.set_flag(Flag::N, true);
                self.set_flag(Flag::H, true);
            }
            Op::Scf => {
                self.set_flag(Flag::N, false);
                self.set_flag(Flag::H, false);
                self.set_flag(Flag::C, true);
            }
            Op::Ccf => {
                let carry = self.get_flag(Flag::C);
                self.set_flag(Flag::N, false);
                self.set_flag(Flag::H, false);
                self.set_flag(Flag::C, !carry);
            }
            Op::RotA(op) => {
                self.regs.a = self.alu_rotate(op, self.regs.a, false);
            }

            Op::Jr(cond) => {
                if self.cond_met(cond) {
                    let offset = imm as u8 as i8;
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                    cycles += JR_TAKEN_EXTRA;
                }
            }
            Op::Jp(cond) => {
                if self.cond_met(cond) {
                    self.regs.pc = imm;
                    cycles += JP_TAKEN_EXTRA;
                }
            }
            Op::JpHl => self.regs.pc = self.regs.hl(),
            Op::Call(cond) => {
                if self.cond_met(cond) {
                    let ret_addr = self.regs.pc;
                    self.push16(bus, ret_addr);
                    self.regs.pc = imm;
                    cycles += CALL_TAKEN_EXTRA;
                }
            }
            Op::Ret(cond) => {
                if self.cond_met(cond) {
                    self.regs.pc = self.pop16(bus)?;
                    if cond != Cond::Always {
                        cycles += RET_TAKEN_EXTRA;
                    }
                }
            }
            Op::Reti => {
                self.regs.pc = self.pop16(bus)?;
                bus.interrupts.ime = true;
            }
            Op::Rst(vector) => {
                let ret_addr = self.regs.pc;
                self.push16(bus, ret_addr);
                self.regs.pc = vector as u16;
            }

            Op::Cb(op, operand) => {
                let value = self.read_operand(bus, operand, imm)?;
                match op {
                    CbOp::Rlc => {
                        let result = self.alu_rotate(RotOp::Rlc, value, true);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Rrc => {
                        let result = self.alu_rotate(RotOp::Rrc, value, true);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Rl => {
                        let result = self.alu_rotate(RotOp::Rl, value, true);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Rr => {
                        let result = self.alu_rotate(RotOp::Rr, value, true);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Sla => {
                        let result = self.alu_sla(value);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Sra => {
                        let result = self.alu_sra(value);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Swap => {
                        let result = self.alu_swap(value);
                        self.write_operand(bus, operand, result);
                    }
                    CbOp::Srl => {
                        let result = self.alu_srl(value);
                        self.write_operand(bus, operand, result);
                    }
                    // BIT only reads; C is left untouched.
                    CbOp::Bit(n) => {
                        self.set_flag(Flag::Z, value & (1 << n) == 0);
                        self.set_flag(Flag::N, false);
                        self.set_flag(Flag::H, true);
                    }
                    CbOp::Res(n) => self.write_operand(bus, operand, value & !(1 << n)),
                    CbOp::Set(n) => self.write_operand(bus, operand, value | (1 << n)),
                }
            }
        }

        Ok(cycles)
    }

    fn read_operand(&mut self, bus: &mut Bus, operand: Operand, imm: u16) -> Result<u8, EmuError> {
        match operand {
            Operand::Reg(r) => Ok(self.regs.get8(r)),
            Operand::HlInd => bus.read(self.regs.hl()),
            Operand::Imm8 => Ok(imm as u8),
        }
    }

    fn write_operand(&mut self, bus: &mut Bus, operand: Operand, value: u8) {
        match operand {
            Operand::Reg(r) => self.regs.set8(r, value),
            Operand::HlInd => bus.write(self.regs.hl(), value),
            // The decoder never emits an immediate destination.
            Operand::Imm8 => unreachable!("immediate operand as destination"),
        }
    }

    /// Resolve a register-pair indirection, applying the HL post-increment
    /// or post-decrement where the addressing mode calls for it.
    fn indirect_addr(&mut self, ind: Indirect) -> u16 {
        match ind {
            Indirect::Bc => self.regs.bc(),
            Indirect::De => self.regs.de(),
            Indirect::HlInc => {
                let addr = self.regs.hl();
                self.regs.set_hl(addr.wrapping_add(1));
                addr
            }
            Indirect::HlDec => {
                let addr = self.regs.hl();
                self.regs.set_hl(addr.wrapping_sub(1));
                addr
            }
        }
    }

    fn cond_met(&self, cond: Cond) -> bool {
        match cond {
            Cond::Always => true,
            Cond::Z => self.get_flag(Flag::Z),
            Cond::Nz => !self.get_flag(Flag::Z),
            Cond::C => self.get_flag(Flag::C),
            Cond::Nc => !self.get_flag(Flag::C),
        }
    }

    /// Push a 16-bit value: high byte first, SP decrementing by one for
    /// each byte. Shared with interrupt entry in the orchestrator.
    pub(crate) fn push16(&mut self, bus: &mut Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    fn pop16(&mut self, bus: &mut Bus) -> Result<u16, EmuError> {
        let lo = bus.read(self.regs.sp)?;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp)?;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        Ok(u16::from_le_bytes([lo, hi]))
    }
}
