use std::path::PathBuf;

use anyhow::{Context, Result};
use artifex_archive::{PackOptions, Settings, pack_to_file};
use clap::Args;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct PackArg {
    #[arg(help = "Zip file to create")]
    output: PathBuf,
    #[arg(required = true, help = "Files and directories to pack")]
    sources: Vec<PathBuf>,
    #[arg(long = "mode", value_parser = parse_mode, help = "Unix mode for an entry, as PATH=OCTAL")]
    pub modes: Vec<(String, u32)>,
    #[arg(long, help = "Mark every .sh file executable")]
    pub mark_sh: bool,
}

pub fn run(arg: PackArg) -> Result<()> {
    let options = PackOptions::from_settings(&Settings::from_env())
        .unix_modes(arg.modes.into_iter().collect())
        .mark_executable_scripts(arg.mark_sh);
    pack_to_file(arg.sources.as_slice(), &arg.output, &options)
        .with_context(|| format!("Failed to pack {}", arg.output.display()))?;
    info!(output = %arg.output.display(), sources = arg.sources.len(), "packed");
    Ok(())
}

fn parse_mode(raw: &str) -> Result<(String, u32), String> {
    let (path, mode) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected PATH=OCTAL, got '{raw}'"))?;
    let mode = u32::from_str_radix(mode, 8).map_err(|e| format!("bad mode '{mode}': {e}"))?;
    Ok((path.to_string(), mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!(parse_mode("bin/run=100755"), Ok(("bin/run".to_string(), 0o100755)));
        assert!(parse_mode("bin/run").is_err());
        assert!(parse_mode("bin/run=9").is_err());
    }
}
