/// One of the five interrupt sources, in fixed priority order (VBlank
/// highest). The discriminant is the bit index shared by the IE and IF
/// registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntSource {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl IntSource {
    /// Fixed handler address for this source.
    pub fn vector(self) -> u16 {
        0x0040 + (self as u16) * 8
    }

    pub fn from_bit(bit: u8) -> Option<IntSource> {
        match bit {
            0 => Some(IntSource::VBlank),
            1 => Some(IntSource::LcdStat),
            2 => Some(IntSource::Timer),
            3 => Some(IntSource::Serial),
            4 => Some(IntSource::Joypad),
            _ => None,
        }
    }
}

/// Interrupt enable/request masks plus the master-enable flag.
///
/// `request` only ever sets bits; clearing a request bit happens exactly
/// once per dispatched interrupt, in the orchestrator. An interrupt is
/// *deliverable* when its bit is set in both masks and `ime` is set;
/// *pending* (both masks, regardless of `ime`) is enough to wake a halted
/// CPU. The Timer, Serial, and Joypad bits exist but nothing in this core
/// raises them.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterruptController {
    /// IE (0xFFFF): per-source enable mask.
    pub ie: u8,
    /// IF (0xFF0F): per-source request mask.
    pub iflags: u8,
    /// Master enable. Cleared on dispatch, restored by EI or RETI.
    pub ime: bool,
}

impl InterruptController {
    pub fn request(&mut self, source: IntSource) {
        self.iflags |= 1 << source as u8;
    }

    /// Sources set in both masks, ignoring the master enable.
    #[inline]
    pub fn pending(&self) -> u8 {
        self.ie & self.iflags & 0x1F
    }

    /// Highest-priority deliverable source, if any.
    pub fn next_deliverable(&self) -> Option<IntSource> {
        if !self.ime {
            return None;
        }
        let pending = self.pending();
        if pending == 0 {
            return None;
        }
        // Lowest set bit is the highest-priority source.
        IntSource::from_bit(pending.trailing_zeros() as u8)
    }

    /// Begin dispatching `source`: clear the master enable and only that
    /// source's request bit.
    pub fn acknowledge(&mut self, source: IntSource) {
        self.ime = false;
        self.iflags &= !(1 << source as u8);
    }
}
