use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use artifex_archive::{FileDescriptor, Settings};
use clap::Args;
use tracing::debug;

#[derive(Args, Clone, Debug)]
pub struct CatArg {
    #[arg(help = "Archive file")]
    archive: PathBuf,
    #[arg(help = "Entry path, e.g. inner.tar.gz!/data/file.txt")]
    path: String,
}

pub fn run(arg: CatArg) -> Result<()> {
    let resolver = super::resolver(&Settings::from_env());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut copied = Ok(0);
    resolver.with_entry(&FileDescriptor::new(&arg.archive), &arg.path, |_, reader| {
        copied = io::copy(reader, &mut out);
        Ok(())
    })?;
    let bytes = copied.context("Failed to write entry to stdout")?;
    debug!(path = %arg.path, bytes, "entry written");
    out.flush()?;
    Ok(())
}
