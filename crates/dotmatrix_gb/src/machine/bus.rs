use super::bootrom::BOOT_ROM;
use super::cartridge::Cartridge;
use super::interrupt::InterruptController;
use super::ppu::Ppu;
use crate::error::EmuError;

/// A registered write trigger: fires on any write to `addr`, optionally
/// narrowed to writes of one specific value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Watch {
    pub addr: u16,
    pub value: Option<u8>,
}

/// The most recent watch trigger: where, what was written, and what the
/// address held before.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchHit {
    pub addr: u16,
    pub value: u8,
    pub prev: u8,
}

/// The memory arbiter: owns every byte-addressable storage region and
/// routes the reserved I/O page to the interrupt controller and the PPU.
///
/// Exactly one region serves each address. Dispatch is pure range matching
/// with no per-call allocation.
pub struct Bus {
    /// While set, 0x0000-0x00FF resolves to the boot ROM. Cleared (forever)
    /// by a non-zero write to 0xFF50.
    boot_enabled: bool,
    cartridge: Cartridge,
    vram: [u8; 0x2000],
    wram: [u8; 0x2000],
    oam: [u8; 0xA0],
    hram: [u8; 0x7F],
    pub interrupts: InterruptController,
    pub ppu: Ppu,

    watch: Option<Watch>,
    watch_hit: Option<WatchHit>,
}

/// Start of the tile map area within VRAM; bytes below this are tile data
/// and feed the PPU's decoded tile cache.
const TILE_DATA_END: usize = 0x1800;

impl Bus {
    /// Build a bus around a verbatim cartridge image. `boot_enabled`
    /// decides whether the boot ROM is mapped over the first page.
    pub(super) fn new(rom: &[u8], boot_enabled: bool) -> Self {
        Self {
            boot_enabled,
            cartridge: Cartridge::new(rom),
            vram: [0; 0x2000],
            wram: [0; 0x2000],
            oam: [0; 0xA0],
            hram: [0; 0x7F],
            interrupts: InterruptController::default(),
            ppu: Ppu::new(),
            watch: None,
            watch_hit: None,
        }
    }

    pub(super) fn patch_cartridge(&mut self, offset: usize, bytes: &[u8]) {
        self.cartridge.patch(offset, bytes);
    }

    /// Advance the PPU by `cycles`, letting it read tile-map bytes from
    /// VRAM and raise interrupts.
    pub fn tick_ppu(&mut self, cycles: u32) {
        self.ppu.step(cycles, &self.vram, &mut self.interrupts);
    }

    /// Read one byte.
    ///
    /// Reads of the unusable range 0xFEA0-0xFEFF or of an I/O address with
    /// no backing register fail with `UnmappedRead`; everything else is
    /// covered by exactly one region.
    pub fn read(&self, addr: u16) -> Result<u8, EmuError> {
        match addr {
            0x0000..=0x00FF if self.boot_enabled => Ok(BOOT_ROM[addr as usize]),
            0x0000..=0x7FFF => Ok(self.cartridge.rom_read(addr)),
            0x8000..=0x9FFF => Ok(self.vram[(addr - 0x8000) as usize]),
            0xA000..=0xBFFF => Ok(self.cartridge.ram_read(addr)),
            0xC000..=0xDFFF => Ok(self.wram[(addr - 0xC000) as usize]),
            // Echo RAM mirrors work RAM.
            0xE000..=0xFDFF => Ok(self.wram[(addr - 0xE000) as usize]),
            0xFE00..=0xFE9F => Ok(self.oam[(addr - 0xFE00) as usize]),
            0xFEA0..=0xFEFF => Err(EmuError::UnmappedRead { addr }),
            0xFF00..=0xFF7F => self.io_read(addr),
            0xFF80..=0xFFFE => Ok(self.hram[(addr - 0xFF80) as usize]),
            0xFFFF => Ok(self.interrupts.ie),
        }
    }

    /// Non-failing read for tooling (tracing, introspection, watch
    /// previous-value capture). Returns 0xFF where `read` would fail.
    pub fn peek(&self, addr: u16) -> u8 {
        self.read(addr).unwrap_or(0xFF)
    }

    /// Write one byte.
    ///
    /// Writes below 0x8000 are bank-latch writes and never modify ROM.
    /// Writes to unmapped addresses are ignored with a warning, matching
    /// hardware's permissive behaviour. Every write is checked against the
    /// registered memory watch.
    pub fn write(&mut self, addr: u16, value: u8) {
        // Capture the previous contents only for a matching watch, so the
        // common write path stays a single dispatch.
        let hit = self
            .watch
            .filter(|w| w.addr == addr && w.value.map_or(true, |v| v == value))
            .map(|_| WatchHit {
                addr,
                value,
                prev: self.peek(addr),
            });

        match addr {
            0x0000..=0x7FFF => self.cartridge.rom_write(addr, value),
            0x8000..=0x9FFF => {
                let offset = (addr - 0x8000) as usize;
                self.vram[offset] = value;
                if offset < TILE_DATA_END {
                    // Keep the decoded tile cache in sync: re-decode the
                    // row from both of its backing bytes.
                    let row = offset & !1;
                    self.ppu
                        .refresh_tile_row(row, self.vram[row], self.vram[row + 1]);
                }
            }
            0xA000..=0xBFFF => self.cartridge.ram_write(addr, value),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = value,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = value,
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = value,
            0xFEA0..=0xFEFF => {
                log::warn!("ignoring write of {value:#04X} to unusable address {addr:#06X}");
            }
            0xFF00..=0xFF7F => self.io_write(addr, value),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = value,
            0xFFFF => self.interrupts.ie = value,
        }

        if hit.is_some() {
            self.watch_hit = hit;
        }
    }

    /// I/O page reads. The two interrupt addresses route to the interrupt
    /// controller, the video registers to the PPU; nothing else is backed
    /// by storage.
    fn io_read(&self, addr: u16) -> Result<u8, EmuError> {
        match addr {
            0xFF0F => Ok(self.interrupts.iflags),
            0xFF40..=0xFF4B => self
                .ppu
                .read_reg(addr)
                .ok_or(EmuError::UnmappedRead { addr }),
            _ => Err(EmuError::UnmappedRead { addr }),
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        match addr {
            0xFF0F => self.interrupts.iflags = value & 0x1F,
            0xFF40..=0xFF4B => {
                if !self.ppu.write_reg(addr, value) {
                    log::warn!("ignoring write of {value:#04X} to I/O address {addr:#06X}");
                }
            }
            0xFF50 => {
                // One-way: once unmapped, the boot ROM never comes back,
                // even if zero is written afterwards.
                if value != 0 {
                    self.boot_enabled = false;
                }
            }
            _ => {
                log::warn!("ignoring write of {value:#04X} to I/O address {addr:#06X}");
            }
        }
    }

    pub fn set_watch(&mut self, addr: u16, value: Option<u8>) {
        self.watch = Some(Watch { addr, value });
    }

    /// Remove the watch if it is registered on `addr`.
    pub fn clear_watch(&mut self, addr: u16) {
        if self.watch.map_or(false, |w| w.addr == addr) {
            self.watch = None;
        }
    }

    /// The most recent watch trigger, clearing it.
    pub fn take_watch_hit(&mut self) -> Option<WatchHit> {
        self.watch_hit.take()
    }

    pub(super) fn watch_hit(&self) -> Option<WatchHit> {
        self.watch_hit
    }

    pub(super) fn boot_enabled(&self) -> bool {
        self.boot_enabled
    }
}
