mod bootrom;
mod bus;
mod cartridge;
mod gameboy;
mod interrupt;
mod ppu;

pub use bus::{Bus, Watch, WatchHit};
pub use gameboy::{GameBoy, RunStop, CYCLES_PER_FRAME};
pub use interrupt::{IntSource, InterruptController};
pub use ppu::{Mode, Ppu};

#[cfg(test)]
mod tests;
