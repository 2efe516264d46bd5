/// Cartridge image with the single banking controller this core supports
/// (MBC1-style ROM banking plus enable-gated external RAM).
///
/// Bank 0 is always visible at 0x0000-0x3FFF; 0x4000-0x7FFF is a window
/// onto the bank selected by the 5-bit low register and the 2-bit high
/// register. Writes into the ROM address space never modify ROM bytes;
/// they only move these latches. Battery persistence is not modelled.
pub(super) struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    num_rom_banks: u16,
    rom_bank_low5: u8,
    rom_bank_high2: u8,
    ram_enable: bool,
    banking_mode: u8,
}

/// Fill value returned for reads that hit disabled RAM or fall outside the
/// ROM image.
const OPEN_BUS: u8 = 0xFF;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_SIZE: usize = 0x2000;

impl Cartridge {
    /// Wrap a verbatim ROM byte sequence. Images shorter than the header
    /// area are padded so the boot sequence can still read (and the loader
    /// seed) the logo region.
    pub(super) fn new(rom: &[u8]) -> Self {
        let mut rom = rom.to_vec();
        if rom.len() < 0x0150 {
            rom.resize(0x0150, 0);
        }
        let num_rom_banks = (rom.len() / ROM_BANK_SIZE).max(1) as u16;

        Self {
            rom,
            ram: vec![OPEN_BUS; RAM_SIZE],
            num_rom_banks,
            rom_bank_low5: 1, // bank 1 by default
            rom_bank_high2: 0,
            ram_enable: false,
            banking_mode: 0,
        }
    }

    /// Overwrite part of the cartridge image; used by the loader to seed
    /// the header logo for the boot sequence.
    pub(super) fn patch(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if end <= self.rom.len() {
            self.rom[offset..end].copy_from_slice(bytes);
        }
    }

    /// Effective ROM bank for the given address: 0 below the switchable
    /// window, otherwise the combined bank registers (with the 0 -> 1
    /// promotion already applied to the low register), wrapped to the
    /// image size.
    fn effective_rom_bank(&self, addr: u16) -> u16 {
        if addr < 0x4000 {
            return 0;
        }

        let mut bank = (self.rom_bank_low5 & 0x1F) as u16;
        if bank == 0 {
            bank = 1;
        }
        bank |= ((self.rom_bank_high2 & 0x03) as u16) << 5;

        if bank >= self.num_rom_banks {
            bank % self.num_rom_banks
        } else {
            bank
        }
    }

    pub(super) fn rom_read(&self, addr: u16) -> u8 {
        let bank = self.effective_rom_bank(addr);
        let offset = (addr & 0x3FFF) as usize;
        let index = (bank as usize) * ROM_BANK_SIZE + offset;
        self.rom.get(index).copied().unwrap_or(OPEN_BUS)
    }

    /// Bank-latch writes. These are side-effect-only: no ROM byte changes,
    /// but subsequent reads of the switchable window resolve differently.
    pub(super) fn rom_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => {
                // RAM enable: lower 4 bits must be the 0x0A magic value.
                self.ram_enable = (value & 0x0F) == 0x0A;
            }
            0x2000..=0x3FFF => {
                self.rom_bank_low5 = value & 0x1F;
                if self.rom_bank_low5 == 0 {
                    self.rom_bank_low5 = 1;
                }
            }
            0x4000..=0x5FFF => {
                self.rom_bank_high2 = value & 0x03;
            }
            0x6000..=0x7FFF => {
                // Recorded but not acted on; ROM access always behaves as
                // banking mode 0.
                self.banking_mode = value & 0x01;
            }
            _ => {}
        }
    }

    pub(super) fn ram_read(&self, addr: u16) -> u8 {
        if !self.ram_enable {
            return OPEN_BUS;
        }
        let offset = (addr as usize - 0xA000) & (RAM_SIZE - 1);
        self.ram[offset]
    }

    pub(super) fn ram_write(&mut self, addr: u16, value: u8) {
        if !self.ram_enable {
            // Matches hardware: disabled external RAM swallows the write.
            return;
        }
        let offset = (addr as usize - 0xA000) & (RAM_SIZE - 1);
        self.ram[offset] = value;
    }
}
