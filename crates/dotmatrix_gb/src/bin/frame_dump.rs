use std::path::PathBuf;

use anyhow::Context;

use dotmatrix_gb::machine::RunStop;
use dotmatrix_gb::{GameBoy, SCREEN_HEIGHT, SCREEN_WIDTH};

fn usage() -> ! {
    eprintln!(
        "Usage: frame_dump <rom_path> <out_rgba_path> [frames] [--boot] [--trace] [--break=ADDR]"
    );
    std::process::exit(2);
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut rom_path: Option<PathBuf> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut frames: u32 = 120;
    let mut use_boot = false;
    let mut print_trace = false;
    let mut breakpoint: Option<u16> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--boot" => use_boot = true,
            "--trace" => print_trace = true,
            _ if arg.starts_with("--break=") => {
                let hex = arg.trim_start_matches("--break=");
                breakpoint = Some(u16::from_str_radix(hex, 16).unwrap_or_else(|_| {
                    eprintln!("Invalid breakpoint address '{hex}' (expected hex).");
                    usage()
                }));
            }
            _ if rom_path.is_none() => rom_path = Some(PathBuf::from(arg)),
            _ if out_path.is_none() => out_path = Some(PathBuf::from(arg)),
            _ => {
                frames = arg.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid frame count '{arg}'.");
                    usage()
                })
            }
        }
    }

    let (rom_path, out_path) = match (rom_path, out_path) {
        (Some(rom), Some(out)) => (rom, out),
        _ => usage(),
    };

    let rom = std::fs::read(&rom_path)
        .with_context(|| format!("failed to read ROM '{}'", rom_path.display()))?;

    let mut gb = GameBoy::load(&rom, use_boot);
    let mut ran = 0;
    for _ in 0..frames {
        let stop = gb
            .run_frame(breakpoint)
            .with_context(|| "emulation aborted".to_string())?;
        ran += 1;
        if let RunStop::Breakpoint(addr) = stop {
            println!("Stopped at breakpoint {addr:#06X} after {ran} frames.");
            break;
        }
    }

    if print_trace {
        print!("{}", gb.trace_text());
    }

    let buffer = gb.framebuffer();
    std::fs::write(&out_path, buffer)
        .with_context(|| format!("failed to write '{}'", out_path.display()))?;

    println!(
        "Wrote {} bytes ({}x{} rgba) after {} frames to '{}'",
        buffer.len(),
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        ran,
        out_path.display()
    );

    Ok(())
}
