use super::interrupt::{IntSource, InterruptController};
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// LCD controller mode, encoded in the low two bits of STAT.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    PixelTransfer = 3,
}

/// Per-mode T-cycle budgets. One visible line is 80 + 172 + 204 = 456
/// cycles; one V-blank line is 456 as well, giving the 70224-cycle frame.
const OAM_SCAN_CYCLES: u32 = 80;
const PIXEL_TRANSFER_CYCLES: u32 = 172;
const HBLANK_CYCLES: u32 = 204;
const VBLANK_LINE_CYCLES: u32 = 456;

/// First V-blank line and the wrap point back to line 0.
const VBLANK_START_LINE: u8 = 144;
const LINES_PER_FRAME: u8 = 154;

const TILE_COUNT: usize = 384;
const TILE_PIXELS: usize = 64;
const TILE_BYTES: usize = 16;

/// STAT interrupt source enable bits (bits 3-6 of the register).
const STAT_HBLANK_ENABLE: u8 = 1 << 3;
const STAT_VBLANK_ENABLE: u8 = 1 << 4;
const STAT_OAM_ENABLE: u8 = 1 << 5;
const STAT_LYC_ENABLE: u8 = 1 << 6;

/// DMG shades for palette outputs 0-3, brightest first.
const SHADES: [u8; 4] = [0xFF, 0xC0, 0x60, 0x00];

/// Picture-processing unit: mode/scanline state machine, video registers,
/// the decoded tile cache, and the rendered framebuffer.
///
/// The PPU owns no raw memory; the bus passes it a VRAM view when timing
/// advances and pushes decoded tile rows into the cache on every VRAM
/// tile-data write, so the render path never re-derives pixels from raw
/// bytes.
pub struct Ppu {
    mode: Mode,
    line: u8,
    /// Cycle progress within the current mode.
    mode_clock: u32,

    /// LCDC (0xFF40).
    lcdc: u8,
    /// STAT bits 3-6 as last written; bits 0-2 are derived on read.
    stat_enables: u8,
    /// SCY/SCX (0xFF42/0xFF43).
    scy: u8,
    scx: u8,
    /// LYC (0xFF45).
    lyc: u8,
    /// BGP (0xFF47).
    bgp: u8,

    /// Latched LY == LYC state, used to edge-detect the coincidence
    /// interrupt.
    coincidence: bool,

    /// 384 tiles x 64 pixels, each entry a 2-bit colour index. Kept in
    /// sync with VRAM by `refresh_tile_row`.
    tile_cache: Box<[u8; TILE_COUNT * TILE_PIXELS]>,
    /// 160x144 RGBA output.
    framebuffer: Box<[u8; SCREEN_WIDTH * SCREEN_HEIGHT * 4]>,
}

impl Default for Ppu {
    fn default() -> Self {
        Self {
            mode: Mode::OamScan,
            line: 0,
            mode_clock: 0,
            // Post-boot defaults: LCD and background enabled.
            lcdc: 0x91,
            stat_enables: 0,
            scy: 0,
            scx: 0,
            lyc: 0,
            bgp: 0xFC,
            coincidence: false,
            tile_cache: Box::new([0; TILE_COUNT * TILE_PIXELS]),
            framebuffer: Box::new([0; SCREEN_WIDTH * SCREEN_HEIGHT * 4]),
        }
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer[..]
    }

    /// Colour index (0-3) of one pixel in the decoded tile cache, or
    /// `None` when `tile`/`row`/`col` fall outside the 384 tiles of 8x8.
    pub fn tile_pixel(&self, tile: usize, row: usize, col: usize) -> Option<u8> {
        if tile >= TILE_COUNT || row >= 8 || col >= 8 {
            return None;
        }
        Some(self.tile_cache[tile * TILE_PIXELS + row * 8 + col])
    }

    /// Advance the timing state machine by the cycles the just-executed
    /// instruction consumed.
    ///
    /// Mode and line transitions, V-blank and STAT interrupt raises, and
    /// scanline rendering all happen here. STAT sources are edge-triggered:
    /// each fires once at its transition, never again while the condition
    /// merely persists across calls.
    pub fn step(&mut self, cycles: u32, vram: &[u8], interrupts: &mut InterruptController) {
        self.mode_clock += cycles;

        // LYC may have been rewritten since the last advance; refresh the
        // coincidence latch even when no mode boundary is crossed.
        self.update_coincidence(interrupts);

        loop {
            let budget = match self.mode {
                Mode::OamScan => OAM_SCAN_CYCLES,
                Mode::PixelTransfer => PIXEL_TRANSFER_CYCLES,
                Mode::HBlank => HBLANK_CYCLES,
                Mode::VBlank => VBLANK_LINE_CYCLES,
            };
            if self.mode_clock < budget {
                break;
            }
            self.mode_clock -= budget;

            match self.mode {
                Mode::OamScan => self.enter_mode(Mode::PixelTransfer, interrupts),
                Mode::PixelTransfer => {
                    // End of pixel transfer: the line is complete.
                    self.render_scanline(vram);
                    self.enter_mode(Mode::HBlank, interrupts);
                }
                Mode::HBlank => {
                    self.line += 1;
                    if self.line == VBLANK_START_LINE {
                        interrupts.request(IntSource::VBlank);
                        self.enter_mode(Mode::VBlank, interrupts);
                    } else {
                        self.enter_mode(Mode::OamScan, interrupts);
                    }
                }
                Mode::VBlank => {
                    self.line += 1;
                    if self.line == LINES_PER_FRAME {
                        self.line = 0;
                        self.enter_mode(Mode::OamScan, interrupts);
                    }
                    // Otherwise stay in V-blank for the next line.
                }
            }

            self.update_coincidence(interrupts);
        }
    }

    fn enter_mode(&mut self, mode: Mode, interrupts: &mut InterruptController) {
        self.mode = mode;
        let enable_bit = match mode {
            Mode::HBlank => STAT_HBLANK_ENABLE,
            Mode::VBlank => STAT_VBLANK_ENABLE,
            Mode::OamScan => STAT_OAM_ENABLE,
            Mode::PixelTransfer => return,
        };
        if self.stat_enables & enable_bit != 0 {
            interrupts.request(IntSource::LcdStat);
        }
    }

    /// Re-derive LY == LYC, raising the STAT interrupt only on the
    /// false -> true edge.
    fn update_coincidence(&mut self, interrupts: &mut InterruptController) {
        let now = self.line == self.lyc;
        if now && !self.coincidence && self.stat_enables & STAT_LYC_ENABLE != 0 {
            interrupts.request(IntSource::LcdStat);
        }
        self.coincidence = now;
    }

    /// Decode one tile row from its two backing VRAM bytes into the cache.
    ///
    /// `offset` is the byte's offset into VRAM (anywhere within the 16-byte
    /// tile record); both bytes of the affected row are re-read so the
    /// cache stays a pure function of VRAM contents.
    pub fn refresh_tile_row(&mut self, offset: usize, lo: u8, hi: u8) {
        let tile = offset / TILE_BYTES;
        let row = (offset >> 1) & 7;
        let base = tile * TILE_PIXELS + row * 8;
        for x in 0..8 {
            let bit = 7 - x;
            let pixel = ((lo >> bit) & 1) | (((hi >> bit) & 1) << 1);
            self.tile_cache[base + x] = pixel;
        }
    }

    /// Render the current scanline into the framebuffer.
    ///
    /// Screen coordinates map through SCY/SCX into the 256x256 background
    /// space; the covering tile comes from the active tile map, its pixels
    /// from the decoded cache, and the final shade from BGP.
    fn render_scanline(&mut self, vram: &[u8]) {
        let y = self.line;
        if y as usize >= SCREEN_HEIGHT {
            return;
        }

        // LCD or background disabled: the line stays blank (white).
        if self.lcdc & 0x80 == 0 || self.lcdc & 0x01 == 0 {
            let start = y as usize * SCREEN_WIDTH * 4;
            for pixel in self.framebuffer[start..start + SCREEN_WIDTH * 4].chunks_exact_mut(4) {
                pixel.copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
            }
            return;
        }

        // Tile map base as a VRAM offset (0x9800 or 0x9C00).
        let map_base: usize = if self.lcdc & 0x08 != 0 { 0x1C00 } else { 0x1800 };
        // LCDC bit 4 selects unsigned 0x8000-based or signed 0x9000-based
        // tile addressing; in cache terms, tile 0 or tile 256 as origin.
        let unsigned_addressing = self.lcdc & 0x10 != 0;

        let bg_y = y.wrapping_add(self.scy);
        let tile_row = (bg_y / 8) as usize;
        let fine_y = (bg_y & 7) as usize;

        let line_base = y as usize * SCREEN_WIDTH * 4;
        for x in 0..SCREEN_WIDTH {
            let bg_x = (x as u8).wrapping_add(self.scx);
            let tile_col = (bg_x / 8) as usize;
            let fine_x = (bg_x & 7) as usize;

            let tile_index = vram[map_base + tile_row * 32 + tile_col];
            let tile = if unsigned_addressing {
                tile_index as usize
            } else {
                (256 + tile_index as i8 as i32) as usize
            };

            let colour = self.tile_cache[tile * TILE_PIXELS + fine_y * 8 + fine_x];
            let shade = SHADES[((self.bgp >> (colour * 2)) & 0x03) as usize];

            let idx = line_base + x * 4;
            self.framebuffer[idx] = shade;
            self.framebuffer[idx + 1] = shade;
            self.framebuffer[idx + 2] = shade;
            self.framebuffer[idx + 3] = 0xFF;
        }
    }

    /// Read one of the video registers in 0xFF40-0xFF47. Returns `None`
    /// for addresses outside the implemented set.
    pub(super) fn read_reg(&self, addr: u16) -> Option<u8> {
        match addr {
            0xFF40 => Some(self.lcdc),
            0xFF41 => Some(self.stat()),
            0xFF42 => Some(self.scy),
            0xFF43 => Some(self.scx),
            0xFF44 => Some(self.line),
            0xFF45 => Some(self.lyc),
            0xFF47 => Some(self.bgp),
            _ => None,
        }
    }

    /// Write one of the video registers. Returns `false` when the address
    /// is not an implemented register (the bus logs and ignores those).
    pub(super) fn write_reg(&mut self, addr: u16, value: u8) -> bool {
        match addr {
            0xFF40 => self.lcdc = value,
            // Only the interrupt-enable bits of STAT are writable; mode and
            // coincidence are derived state.
            0xFF41 => self.stat_enables = value & 0x78,
            0xFF42 => self.scy = value,
            0xFF43 => self.scx = value,
            0xFF44 => {
                // LY is read-only from software.
                log::warn!("ignoring write of {value:#04X} to read-only LY");
            }
            0xFF45 => self.lyc = value,
            0xFF47 => self.bgp = value,
            _ => return false,
        }
        true
    }

    /// STAT (0xFF41): current mode in bits 0-1, coincidence in bit 2, the
    /// writable enable bits above, and bit 7 always set as on hardware.
    fn stat(&self) -> u8 {
        0x80 | self.stat_enables | ((self.coincidence as u8) << 2) | self.mode as u8
    }
}
