//! Build script for duty-station: places the board's `memory.x` where the linker finds it.

use std::{env, fs, io, path::PathBuf};

fn main() -> io::Result<()> {
    println!("cargo:rustc-check-cfg=cfg(rust_analyzer)");
    println!("cargo:rerun-if-changed=build.rs");

    let target = env::var("TARGET").map_err(io::Error::other)?;
    let memory_file = if target.starts_with("thumbv8m") {
        // Pico 2 W (RP2350, ARM core)
        "memory-pico2.x"
    } else if target.starts_with("thumbv6m") {
        // Pico 1 W (RP2040)
        "memory-pico1w.x"
    } else {
        // Host builds (tests, docs) don't link a firmware image
        return Ok(());
    };

    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(io::Error::other)?);
    fs::write(out_dir.join("memory.x"), fs::read_to_string(memory_file)?)?;
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed={memory_file}");
    Ok(())
}
