use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use artifex_archive::format::{self, FormatTag};
use clap::Args;
use tracing::debug;

#[derive(Args, Clone, Debug)]
pub struct DetectArg {
    #[arg(help = "File name or path")]
    name: PathBuf,
}

/// Judge by name; fall back to the leading bytes when the file exists.
pub fn run(arg: DetectArg) -> Result<()> {
    let name = arg.name.to_string_lossy();
    let mut tag = format::detect(&name);

    if tag == FormatTag::Unknown && arg.name.is_file() {
        debug!(name = %name, "no match by name, reading magic bytes");
        let mut file =
            File::open(&arg.name).with_context(|| format!("Failed to open {}", arg.name.display()))?;
        tag = format::detect_from_reader(&mut file)
            .with_context(|| format!("Failed to read {}", arg.name.display()))?
            .unwrap_or(FormatTag::Unknown);
    }

    println!("{tag}");
    Ok(())
}
