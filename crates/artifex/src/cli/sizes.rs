use std::path::PathBuf;

use anyhow::Result;
use artifex_archive::{FileDescriptor, Settings, entry_sizes};
use clap::Args;

#[derive(Args, Clone, Debug)]
pub struct SizesArg {
    #[arg(help = "Archive file")]
    archive: PathBuf,
}

pub fn run(arg: SizesArg) -> Result<()> {
    let resolver = super::resolver(&Settings::from_env());
    for (name, size) in entry_sizes(&resolver, &FileDescriptor::new(&arg.archive))? {
        println!("{size}\t{name}");
    }
    Ok(())
}
