use std::collections::VecDeque;

use super::bootrom::{HEADER_LOGO, HEADER_LOGO_OFFSET};
use super::bus::{Bus, WatchHit};
use super::interrupt::InterruptController;
use crate::cpu::{Cpu, Flag};
use crate::error::EmuError;

/// T-cycles in one rendered frame (154 lines x 456 cycles).
pub const CYCLES_PER_FRAME: u32 = 70_224;

/// How many per-instruction trace lines the ring buffer retains.
const TRACE_LINES: usize = 50;

/// PPU cycles charged per iteration while the CPU is halted.
const HALT_TICK_CYCLES: u32 = 4;

/// Why a bounded run returned before exhausting its budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStop {
    /// The instruction or cycle budget ran out.
    BudgetExhausted,
    /// The breakpoint address was about to execute.
    Breakpoint(u16),
    /// A registered memory watch fired.
    Watch(WatchHit),
}

/// The complete machine: CPU plus bus (which owns the cartridge, RAM
/// regions, PPU, and interrupt controller).
///
/// This is the only writable handle to any core state; subsystems receive
/// mutable borrows for the duration of one call and retain nothing. All
/// stepping entry points are bounded so a cooperative driver can interleave
/// emulation with its own work.
pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: Bus,
    trace: VecDeque<String>,
}

impl GameBoy {
    /// Initialise a fresh machine around a cartridge image.
    ///
    /// With `use_boot_sequence` the boot ROM is mapped over the first page
    /// and the header logo it expects is seeded into the cartridge image;
    /// otherwise execution starts directly in cartridge ROM. PC starts at
    /// 0 either way.
    pub fn load(rom: &[u8], use_boot_sequence: bool) -> Self {
        let mut bus = Bus::new(rom, use_boot_sequence);
        if use_boot_sequence {
            bus.patch_cartridge(HEADER_LOGO_OFFSET, &HEADER_LOGO);
        }
        Self {
            cpu: Cpu::new(),
            bus,
            trace: VecDeque::with_capacity(TRACE_LINES),
        }
    }

    /// Execute one tick of the orchestrator loop:
    ///
    /// 1. wake a halted CPU when an interrupt is pending (even with the
    ///    master enable cleared),
    /// 2. dispatch the highest-priority deliverable interrupt,
    /// 3. burn a minimal PPU tick if still halted,
    /// 4. otherwise fetch/decode/execute one instruction and advance the
    ///    PPU by its cycle cost.
    ///
    /// Returns the number of T-cycles consumed.
    pub fn tick(&mut self) -> Result<u32, EmuError> {
        if self.cpu.halted && self.bus.interrupts.pending() != 0 {
            self.cpu.halted = false;
        }

        if let Some(cycles) = self.service_interrupt() {
            self.bus.tick_ppu(cycles);
            return Ok(cycles);
        }

        if self.cpu.halted {
            self.bus.tick_ppu(HALT_TICK_CYCLES);
            return Ok(HALT_TICK_CYCLES);
        }

        self.record_trace();
        let cycles = match self.cpu.step(&mut self.bus) {
            Ok(cycles) => cycles,
            Err(err) => {
                log::error!("run aborted at PC={:#06X}: {err}", self.cpu.regs.pc);
                return Err(err);
            }
        };
        self.bus.tick_ppu(cycles);
        Ok(cycles)
    }

    /// Dispatch the highest-priority deliverable interrupt, if any.
    ///
    /// Clears the master enable and only the taken source's request bit,
    /// pushes PC (high byte first), and jumps to the source's vector.
    fn service_interrupt(&mut self) -> Option<u32> {
        let source = self.bus.interrupts.next_deliverable()?;
        self.bus.interrupts.acknowledge(source);
        self.cpu.halted = false;

        let pc = self.cpu.regs.pc;
        self.cpu.push16(&mut self.bus, pc);
        self.cpu.regs.pc = source.vector();

        log::debug!(
            "interrupt {source:?} taken: pc={pc:#06X} -> {:#06X}",
            source.vector()
        );
        Some(20)
    }

    /// Run up to `budget` instructions, stopping early at a breakpoint
    /// (checked *before* the instruction at that address executes) or when
    /// the memory watch fires. Returns the trace tail, at most the last 50
    /// per-instruction register dumps.
    pub fn step(&mut self, budget: u32, breakpoint: Option<u16>) -> Result<String, EmuError> {
        for _ in 0..budget {
            if breakpoint == Some(self.cpu.regs.pc) && !self.cpu.halted {
                break;
            }
            self.tick()?;
            if self.bus.watch_hit().is_some() {
                break;
            }
        }
        Ok(self.trace_text())
    }

    /// Run roughly one frame's worth of cycles, honouring the breakpoint
    /// and watch the same way `step` does.
    pub fn run_frame(&mut self, breakpoint: Option<u16>) -> Result<RunStop, EmuError> {
        let mut elapsed = 0u32;
        while elapsed < CYCLES_PER_FRAME {
            if let Some(bp) = breakpoint {
                if bp == self.cpu.regs.pc && !self.cpu.halted {
                    return Ok(RunStop::Breakpoint(bp));
                }
            }
            elapsed += self.tick()?;
            if let Some(hit) = self.bus.watch_hit() {
                return Ok(RunStop::Watch(hit));
            }
        }
        Ok(RunStop::BudgetExhausted)
    }

    /// Rebuild power-on state, dropping cartridge and RAM contents.
    pub fn reset(&mut self, rom: &[u8], use_boot_sequence: bool) {
        *self = GameBoy::load(rom, use_boot_sequence);
    }

    /// The 160x144 RGBA framebuffer maintained by the PPU.
    pub fn framebuffer(&self) -> &[u8] {
        self.bus.ppu.framebuffer()
    }

    /// Read-only introspection: a single byte, never failing (unmapped
    /// addresses read as 0xFF).
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    pub fn registers(&self) -> &crate::cpu::Registers {
        &self.cpu.regs
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.cpu.get_flag(flag)
    }

    /// Snapshot of the interrupt masks and master enable.
    pub fn interrupt_snapshot(&self) -> InterruptController {
        self.bus.interrupts
    }

    pub fn set_watch(&mut self, addr: u16, value: Option<u8>) {
        self.bus.set_watch(addr, value);
    }

    pub fn clear_watch(&mut self, addr: u16) {
        self.bus.clear_watch(addr);
    }

    /// The most recent watch trigger, clearing it so the next run starts
    /// clean.
    pub fn take_watch_hit(&mut self) -> Option<WatchHit> {
        self.bus.take_watch_hit()
    }

    /// The retained trace lines, oldest first.
    pub fn trace(&self) -> impl Iterator<Item = &str> {
        self.trace.iter().map(String::as_str)
    }

    pub fn trace_text(&self) -> String {
        let mut text = String::new();
        for line in &self.trace {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Append one fixed-format register dump for the instruction about to
    /// execute. PCMEM is the four bytes starting at PC.
    fn record_trace(&mut self) {
        let r = &self.cpu.regs;
        let pc = r.pc;
        let line = format!(
            "LY:{:02X} A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} \
             SP:{:04X} PC:{:04X} PCMEM:{:02X},{:02X},{:02X},{:02X}",
            self.bus.ppu.line(),
            r.a,
            r.f,
            r.b,
            r.c,
            r.d,
            r.e,
            r.h,
            r.l,
            r.sp,
            pc,
            self.bus.peek(pc),
            self.bus.peek(pc.wrapping_add(1)),
            self.bus.peek(pc.wrapping_add(2)),
            self.bus.peek(pc.wrapping_add(3)),
        );

        if self.trace.len() == TRACE_LINES {
            self.trace.pop_front();
        }
        self.trace.push_back(line);
    }
}
