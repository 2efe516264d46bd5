mod alu;
mod decode;
mod exec;
mod regs;


pub use decode::{decode, decode_prefixed, AluOp, CbOp, Cond, Indirect, Instr, Op, Operand, RotOp};
pub use regs::{Flag, Reg16, Reg8, Registers};

use crate::error::EmuError;
use crate::machine::Bus;

/// Game Boy CPU core (SM83 / LR35902).
///
/// Holds only the register file and the halt latch. The interrupt masks and
/// the master-enable flag live on the interrupt controller inside the bus;
/// interrupt dispatch itself is driven by the orchestrator, so stepping the
/// CPU here never services interrupts on its own.
#[derive(Clone, Debug, Default)]
pub struct Cpu {
    pub regs: Registers,
    /// Set by HALT (and by STOP, which this core treats the same way);
    /// cleared by the orchestrator when an interrupt becomes pending.
    pub halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::power_on(),
            halted: false,
        }
    }

    pub fn reset(&mut self) {
        self.regs = Registers::power_on();
        self.halted = false;
    }

    #[inline]
    pub fn get_flag(&self, flag: Flag) -> bool {
        (self.regs.f & (1 << flag as u8)) != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        let bit = flag as u8;
        if value {
            self.regs.f |= 1 << bit;
        } else {
            self.regs.f &= !(1 << bit);
        }
    }

    #[inline]
    pub(crate) fn clear_flags(&mut self) {
        self.regs.f = 0;
    }

    /// Fetch, decode, and execute one instruction.
    ///
    /// Returns the number of T-cycles the instruction consumed, including
    /// the extra cycles of taken conditional jumps/calls/returns. Opcode
    /// holes and reads from unmapped addresses surface as errors with the
    /// faulting address attached.
    pub fn step(&mut self, bus: &mut Bus) -> Result<u32, EmuError> {
        let pc = self.regs.pc;
        let opcode = bus.read(pc)?;
        self.regs.pc = pc.wrapping_add(1);

        let instr = if opcode == 0xCB {
            let cb_opcode = bus.read(self.regs.pc)?;
            self.regs.pc = self.regs.pc.wrapping_add(1);
            decode_prefixed(cb_opcode)
        } else {
            decode(pc, opcode)?
        };

        let imm = self.fetch_imm(bus, instr.imm_bytes)?;
        self.execute(bus, &instr, imm)
    }

    /// Read the instruction's immediate operand (0, 1, or 2 bytes) at PC
    /// and advance PC past it. Two-byte immediates are little-endian.
    fn fetch_imm(&mut self, bus: &mut Bus, imm_bytes: u8) -> Result<u16, EmuError> {
        match imm_bytes {
            0 => Ok(0),
            1 => {
                let lo = bus.read(self.regs.pc)?;
                self.regs.pc = self.regs.pc.wrapping_add(1);
                Ok(lo as u16)
            }
            _ => {
                let lo = bus.read(self.regs.pc)?;
                let hi = bus.read(self.regs.pc.wrapping_add(1))?;
                self.regs.pc = self.regs.pc.wrapping_add(2);
                Ok(u16::from_le_bytes([lo, hi]))
            }
        }
    }
}
