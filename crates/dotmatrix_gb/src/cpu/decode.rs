use std::fmt;

use super::regs::{Reg16, Reg8};
use crate::error::EmuError;

/// An 8-bit operand slot: a register, memory at HL, or an immediate byte.
///
/// This covers the "r" position of the regular opcode groups (LD r,r /
/// ALU / INC / DEC / CB); the irregular addressing modes get their own
/// `Op` variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg8),
    HlInd,
    Imm8,
}

/// Indirect addressing through a register pair, with optional HL
/// post-increment/decrement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indirect {
    Bc,
    De,
    HlInc,
    HlDec,
}

/// Branch condition for jumps, calls, and returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    Always,
    Z,
    Nz,
    C,
    Nc,
}

impl Cond {
    /// Mnemonic suffix, e.g. `Some("NZ")`; `None` for the unconditional form.
    fn suffix(self) -> Option<&'static str> {
        match self {
            Cond::Always => None,
            Cond::Z => Some("Z"),
            Cond::Nz => Some("NZ"),
            Cond::C => Some("C"),
            Cond::Nc => Some("NC"),
        }
    }
}

/// 8-bit accumulator ALU operation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// Accumulator rotate selector for the unprefixed RLCA/RLA/RRCA/RRA forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rl,
    Rrc,
    Rr,
}

/// CB-prefixed operation selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CbOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit(u8),
    Res(u8),
    Set(u8),
}

/// The effect of one decoded instruction.
///
/// Each variant carries its operand selectors; a single generic executor in
/// `exec.rs` interprets them against the register file and the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Nop,
    Halt,
    Stop,
    Di,
    Ei,

    // 8-bit loads.
    Ld { dst: Operand, src: Operand },
    LdAFromInd(Indirect),
    LdIndFromA(Indirect),
    LdAFromAbs,
    LdAbsFromA,
    LdhAFromImm,
    LdhImmFromA,
    LdhAFromC,
    LdhCFromA,

    // 16-bit loads and stack.
    Ld16Imm(Reg16),
    LdSpHl,
    LdAbsSp,
    LdHlSpOffset,
    Push(Reg16),
    Pop(Reg16),

    // Arithmetic and logic.
    Alu(AluOp, Operand),
    Inc(Operand),
    Dec(Operand),
    AddHl(Reg16),
    Inc16(Reg16),
    Dec16(Reg16),
    AddSpImm,
    Daa,
    Cpl,
    Scf,
    Ccf,
    RotA(RotOp),

    // Control flow.
    Jr(Cond),
    Jp(Cond),
    JpHl,
    Call(Cond),
    Ret(Cond),
    Reti,
    Rst(u8),

    // CB-prefixed bit operations.
    Cb(CbOp, Operand),
}

/// Immutable operation descriptor produced by decoding an opcode.
///
/// `cycles` is the base T-cycle cost; conditional jumps/calls/returns add
/// their taken-branch surcharge in the executor. `imm_bytes` is the width
/// of the immediate operand (0, 1, or 2) and determines how far PC advances
/// past the opcode. The human-readable mnemonic is available through
/// `fmt::Display`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instr {
    pub op: Op,
    pub cycles: u32,
    pub imm_bytes: u8,
}

impl Instr {
    const fn new(op: Op, cycles: u32, imm_bytes: u8) -> Self {
        Self {
            op,
            cycles,
            imm_bytes,
        }
    }
}

/// The 8-bit operand encoded in the low three bits of the regular opcode
/// groups: B, C, D, E, H, L, (HL), A.
fn operand_from_bits(bits: u8) -> Operand {
    match bits & 0x07 {
        0 => Operand::Reg(Reg8::B),
        1 => Operand::Reg(Reg8::C),
        2 => Operand::Reg(Reg8::D),
        3 => Operand::Reg(Reg8::E),
        4 => Operand::Reg(Reg8::H),
        5 => Operand::Reg(Reg8::L),
        6 => Operand::HlInd,
        _ => Operand::Reg(Reg8::A),
    }
}

fn alu_from_bits(bits: u8) -> AluOp {
    match bits & 0x07 {
        0 => AluOp::Add,
        1 => AluOp::Adc,
        2 => AluOp::Sub,
        3 => AluOp::Sbc,
        4 => AluOp::And,
        5 => AluOp::Xor,
        6 => AluOp::Or,
        _ => AluOp::Cp,
    }
}

/// Decode an unprefixed opcode into its operation descriptor.
///
/// Total over the defined opcode space; the eleven documented opcode holes
/// return `EmuError::IllegalOpcode` with `addr` identifying where the byte
/// was fetched from. The 0xCB prefix byte itself is not handled here — the
/// caller fetches the second byte and uses `decode_prefixed`.
pub fn decode(addr: u16, opcode: u8) -> Result<Instr, EmuError> {
    use Op::*;

    let instr = match opcode {
        0x00 => Instr::new(Nop, 4, 0),
        0x10 => Instr::new(Stop, 4, 1), // STOP skips its padding byte
        0x76 => Instr::new(Halt, 4, 0),
        0xF3 => Instr::new(Di, 4, 0),
        0xFB => Instr::new(Ei, 4, 0),

        // LD rr,d16
        0x01 => Instr::new(Ld16Imm(Reg16::Bc), 12, 2),
        0x11 => Instr::new(Ld16Imm(Reg16::De), 12, 2),
        0x21 => Instr::new(Ld16Imm(Reg16::Hl), 12, 2),
        0x31 => Instr::new(Ld16Imm(Reg16::Sp), 12, 2),

        // LD (rr),A and LD A,(rr) with HL post-inc/dec.
        0x02 => Instr::new(LdIndFromA(Indirect::Bc), 8, 0),
        0x12 => Instr::new(LdIndFromA(Indirect::De), 8, 0),
        0x22 => Instr::new(LdIndFromA(Indirect::HlInc), 8, 0),
        0x32 => Instr::new(LdIndFromA(Indirect::HlDec), 8, 0),
        0x0A => Instr::new(LdAFromInd(Indirect::Bc), 8, 0),
        0x1A => Instr::new(LdAFromInd(Indirect::De), 8, 0),
        0x2A => Instr::new(LdAFromInd(Indirect::HlInc), 8, 0),
        0x3A => Instr::new(LdAFromInd(Indirect::HlDec), 8, 0),

        // LD (a16),SP
        0x08 => Instr::new(LdAbsSp, 20, 2),

        // 16-bit INC/DEC.
        0x03 => Instr::new(Inc16(Reg16::Bc), 8, 0),
        0x13 => Instr::new(Inc16(Reg16::De), 8, 0),
        0x23 => Instr::new(Inc16(Reg16::Hl), 8, 0),
        0x33 => Instr::new(Inc16(Reg16::Sp), 8, 0),
        0x0B => Instr::new(Dec16(Reg16::Bc), 8, 0),
        0x1B => Instr::new(Dec16(Reg16::De), 8, 0),
        0x2B => Instr::new(Dec16(Reg16::Hl), 8, 0),
        0x3B => Instr::new(Dec16(Reg16::Sp), 8, 0),

        // 8-bit INC/DEC (dst encoded in bits 3-5).
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
            let dst = operand_from_bits(opcode >> 3);
            let cycles = if dst == Operand::HlInd { 12 } else { 4 };
            Instr::new(Inc(dst), cycles, 0)
        }
        0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
            let dst = operand_from_bits(opcode >> 3);
            let cycles = if dst == Operand::HlInd { 12 } else { 4 };
            Instr::new(Dec(dst), cycles, 0)
        }

        // LD r,d8 and LD (HL),d8.
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            let dst = operand_from_bits(opcode >> 3);
            let cycles = if dst == Operand::HlInd { 12 } else { 8 };
            Instr::new(
                Ld {
                    dst,
                    src: Operand::Imm8,
                },
                cycles,
                1,
            )
        }

        // Accumulator rotates.
        0x07 => Instr::new(RotA(RotOp::Rlc), 4, 0),
        0x0F => Instr::new(RotA(RotOp::Rrc), 4, 0),
        0x17 => Instr::new(RotA(RotOp::Rl), 4, 0),
        0x1F => Instr::new(RotA(RotOp::Rr), 4, 0),

        // ADD HL,rr
        0x09 => Instr::new(AddHl(Reg16::Bc), 8, 0),
        0x19 => Instr::new(AddHl(Reg16::De), 8, 0),
        0x29 => Instr::new(AddHl(Reg16::Hl), 8, 0),
        0x39 => Instr::new(AddHl(Reg16::Sp), 8, 0),

        // Relative jumps.
        0x18 => Instr::new(Jr(Cond::Always), 8, 1),
        0x20 => Instr::new(Jr(Cond::Nz), 8, 1),
        0x28 => Instr::new(Jr(Cond::Z), 8, 1),
        0x30 => Instr::new(Jr(Cond::Nc), 8, 1),
        0x38 => Instr::new(Jr(Cond::C), 8, 1),

        0x27 => Instr::new(Daa, 4, 0),
        0x2F => Instr::new(Cpl, 4, 0),
        0x37 => Instr::new(Scf, 4, 0),
        0x3F => Instr::new(Ccf, 4, 0),

        // LD r,r block (0x76 HALT is carved out above).
        0x40..=0x7F => {
            let dst = operand_from_bits(opcode >> 3);
            let src = operand_from_bits(opcode);
            let cycles = if dst == Operand::HlInd || src == Operand::HlInd {
                8
            } else {
                4
            };
            Instr::new(Ld { dst, src }, cycles, 0)
        }

        // ALU on A against a register or (HL).
        0x80..=0xBF => {
            let src = operand_from_bits(opcode);
            let cycles = if src == Operand::HlInd { 8 } else { 4 };
            Instr::new(Alu(alu_from_bits(opcode >> 3), src), cycles, 0)
        }

        // ALU on A against an immediate.
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            Instr::new(Alu(alu_from_bits(opcode >> 3), Operand::Imm8), 8, 1)
        }

        // Returns.
        0xC0 => Instr::new(Ret(Cond::Nz), 8, 0),
        0xC8 => Instr::new(Ret(Cond::Z), 8, 0),
        0xD0 => Instr::new(Ret(Cond::Nc), 8, 0),
        0xD8 => Instr::new(Ret(Cond::C), 8, 0),
        0xC9 => Instr::new(Ret(Cond::Always), 16, 0),
        0xD9 => Instr::new(Reti, 16, 0),

        // Stack.
        0xC1 => Instr::new(Pop(Reg16::Bc), 12, 0),
        0xD1 => Instr::new(Pop(Reg16::De), 12, 0),
        0xE1 => Instr::new(Pop(Reg16::Hl), 12, 0),
        0xF1 => Instr::new(Pop(Reg16::Af), 12, 0),
        0xC5 => Instr::new(Push(Reg16::Bc), 16, 0),
        0xD5 => Instr::new(Push(Reg16::De), 16, 0),
        0xE5 => Instr::new(Push(Reg16::Hl), 16, 0),
        0xF5 => Instr::new(Push(Reg16::Af), 16, 0),

        // Absolute jumps and calls.
        0xC3 => Instr::new(Jp(Cond::Always), 12, 2),
        0xC2 => Instr::new(Jp(Cond::Nz), 12, 2),
        0xCA => Instr::new(Jp(Cond::Z), 12, 2),
        0xD2 => Instr::new(Jp(Cond::Nc), 12, 2),
        0xDA => Instr::new(Jp(Cond::C), 12, 2),
        0xE9 => Instr::new(JpHl, 4, 0),
        0xCD => Instr::new(Call(Cond::Always), 12, 2),
        0xC4 => Instr::new(Call(Cond::Nz), 12, 2),
        0xCC => Instr::new(Call(Cond::Z), 12, 2),
        0xD4 => Instr::new(Call(Cond::Nc), 12, 2),
        0xDC => Instr::new(Call(Cond::C), 12, 2),

        // Fixed-vector restarts: vector encoded in bits 3-5.
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            Instr::new(Rst(opcode & 0x38), 16, 0)
        }

        // High-page and absolute accumulator loads.
        0xE0 => Instr::new(LdhImmFromA, 12, 1),
        0xF0 => Instr::new(LdhAFromImm, 12, 1),
        0xE2 => Instr::new(LdhCFromA, 8, 0),
        0xF2 => Instr::new(LdhAFromC, 8, 0),
        0xEA => Instr::new(LdAbsFromA, 16, 2),
        0xFA => Instr::new(LdAFromAbs, 16, 2),

        // SP arithmetic.
        0xE8 => Instr::new(AddSpImm, 16, 1),
        0xF8 => Instr::new(LdHlSpOffset, 12, 1),
        0xF9 => Instr::new(LdSpHl, 8, 0),

        // Opcode holes: D3, DB, DD, E3, E4, EB, EC, ED, F4, FC, FD
        // (and anything else unhandled) hard-lock the machine.
        _ => return Err(EmuError::IllegalOpcode { addr, opcode }),
    };

    Ok(instr)
}

/// Decode the second byte of a 0xCB-prefixed instruction.
///
/// Unlike the unprefixed space this is a total function: all 256 values are
/// defined. `cycles` includes the 4 cycles of the prefix fetch.
pub fn decode_prefixed(opcode: u8) -> Instr {
    let operand = operand_from_bits(opcode);
    let bit = (opcode >> 3) & 0x07;

    let cb_op = match opcode >> 6 {
        0 => match (opcode >> 3) & 0x07 {
            0 => CbOp::Rlc,
            1 => CbOp::Rrc,
            2 => CbOp::Rl,
            3 => CbOp::Rr,
            4 => CbOp::Sla,
            5 => CbOp::Sra,
            6 => CbOp::Swap,
            _ => CbOp::Srl,
        },
        1 => CbOp::Bit(bit),
        2 => CbOp::Res(bit),
        _ => CbOp::Set(bit),
    };

    let cycles = match (cb_op, operand) {
        // BIT n,(HL) only reads memory, so it is 4 cycles cheaper than the
        // read-modify-write forms.
        (CbOp::Bit(_), Operand::HlInd) => 12,
        (_, Operand::HlInd) => 16,
        _ => 8,
    };

    Instr::new(Op::Cb(cb_op, operand), cycles, 0)
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r:?}"),
            Operand::HlInd => write!(f, "(HL)"),
            Operand::Imm8 => write!(f, "d8"),
        }
    }
}

impl fmt::Display for Instr {
    /// Conventional assembler mnemonic, e.g. `LD B,d8` or `JR NZ,r8`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Op::*;

        match self.op {
            Nop => write!(f, "NOP"),
            Halt => write!(f, "HALT"),
            Stop => write!(f, "STOP"),
            Di => write!(f, "DI"),
            Ei => write!(f, "EI"),
            Ld { dst, src } => write!(f, "LD {dst},{src}"),
            LdAFromInd(ind) => write!(f, "LD A,({})", indirect_name(ind)),
            LdIndFromA(ind) => write!(f, "LD ({}),A", indirect_name(ind)),
            LdAFromAbs => write!(f, "LD A,(a16)"),
            LdAbsFromA => write!(f, "LD (a16),A"),
            LdhAFromImm => write!(f, "LDH A,(a8)"),
            LdhImmFromA => write!(f, "LDH (a8),A"),
            LdhAFromC => write!(f, "LD A,(C)"),
            LdhCFromA => write!(f, "LD (C),A"),
            Ld16Imm(rr) => write!(f, "LD {},d16", pair_name(rr)),
            LdSpHl => write!(f, "LD SP,HL"),
            LdAbsSp => write!(f, "LD (a16),SP"),
            LdHlSpOffset => write!(f, "LD HL,SP+r8"),
            Push(rr) => write!(f, "PUSH {}", pair_name(rr)),
            Pop(rr) => write!(f, "POP {}", pair_name(rr)),
            Alu(op, src) => {
                let name = match op {
                    AluOp::Add => "ADD A,",
                    AluOp::Adc => "ADC A,",
                    AluOp::Sub => "SUB ",
                    AluOp::Sbc => "SBC A,",
                    AluOp::And => "AND ",
                    AluOp::Xor => "XOR ",
                    AluOp::Or => "OR ",
                    AluOp::Cp => "CP ",
                };
                write!(f, "{name}{src}")
            }
            Inc(dst) => write!(f, "INC {dst}"),
            Dec(dst) => write!(f, "DEC {dst}"),
            AddHl(rr) => write!(f, "ADD HL,{}", pair_name(rr)),
            Inc16(rr) => write!(f, "INC {}", pair_name(rr)),
            Dec16(rr) => write!(f, "DEC {}", pair_name(rr)),
            AddSpImm => write!(f, "ADD SP,r8"),
            Daa => write!(f, "DAA"),
            Cpl => write!(f, "CPL"),
            Scf => write!(f, "SCF"),
            Ccf => write!(f, "CCF"),
            RotA(RotOp::Rlc) => write!(f, "RLCA"),
            RotA(RotOp::Rl) => write!(f, "RLA"),
            RotA(RotOp::Rrc) => write!(f, "RRCA"),
            RotA(RotOp::Rr) => write!(f, "RRA"),
            Jr(cond) => match cond.suffix() {
                Some(s) => write!(f, "JR {s},r8"),
                None => write!(f, "JR r8"),
            },
            Jp(cond) => match cond.suffix() {
                Some(s) => write!(f, "JP {s},a16"),
                None => write!(f, "JP a16"),
            },
            JpHl => write!(f, "JP (HL)"),
            Call(cond) => match cond.suffix() {
                Some(s) => write!(f, "CALL {s},a16"),
                None => write!(f, "CALL a16"),
            },
            Ret(cond) => match cond.suffix() {
                Some(s) => write!(f, "RET {s}"),
                None => write!(f, "RET"),
            },
            Reti => write!(f, "RETI"),
            Rst(vector) => write!(f, "RST {vector:02X}H"),
            Cb(op, operand) => match op {
                CbOp::Rlc => write!(f, "RLC {operand}"),
                CbOp::Rrc => write!(f, "RRC {operand}"),
                CbOp::Rl => write!(f, "RL {operand}"),
                CbOp::Rr => write!(f, "RR {operand}"),
                CbOp::Sla => write!(f, "SLA {operand}"),
                CbOp::Sra => write!(f, "SRA {operand}"),
                CbOp::Swap => write!(f, "SWAP {operand}"),
                CbOp::Srl => write!(f, "SRL {operand}"),
                CbOp::Bit(n) => write!(f, "BIT {n},{operand}"),
                CbOp::Res(n) => write!(f, "RES {n},{operand}"),
                CbOp::Set(n) => write!(f, "SET {n},{operand}"),
            },
        }
    }
}

fn indirect_name(ind: Indirect) -> &'static str {
    match ind {
        Indirect::Bc => "BC",
        Indirect::De => "DE",
        Indirect::HlInc => "HL+",
        Indirect::HlDec => "HL-",
    }
}

fn pair_name(rr: Reg16) -> &'static str {
    match rr {
        Reg16::Af => "AF",
        Reg16::Bc => "BC",
        Reg16::De => "DE",
        Reg16::Hl => "HL",
        Reg16::Sp => "SP",
    }
}
