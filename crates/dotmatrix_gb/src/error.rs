use thiserror::Error;

/// Errors that abort an emulation run.
///
/// Every operation in the core is deterministic, so none of these are
/// transient: once one is returned the run cannot meaningfully continue
/// until the machine is reset or the caller inspects state. Each variant
/// carries enough context (program counter, opcode, address) to reproduce
/// the failure in a test.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuError {
    /// The fetched opcode has no defined descriptor.
    ///
    /// The unprefixed opcode space has eleven holes (D3, DB, DD, E3, E4,
    /// EB, EC, ED, F4, FC, FD) that hard-lock the CPU on real hardware.
    #[error("illegal opcode {opcode:#04X} at {addr:#06X}")]
    IllegalOpcode { addr: u16, opcode: u8 },

    /// A read hit an address no decoded region serves.
    ///
    /// The unusable range 0xFEA0-0xFEFF and I/O addresses with no backing
    /// register fall here. Writes to the same addresses are ignored, as on
    /// hardware; only reads are treated as a core defect.
    #[error("read from unmapped address {addr:#06X}")]
    UnmappedRead { addr: u16 },
}
