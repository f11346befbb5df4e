use std::path::PathBuf;

use anyhow::Result;
use artifex_archive::{FileDescriptor, SIZE_UNKNOWN, Settings};
use clap::Args;
use tracing::debug;

#[derive(Args, Clone, Debug)]
pub struct LsArg {
    #[arg(help = "Archive file")]
    archive: PathBuf,
    #[arg(default_value = "", help = "Folder inside the archive, e.g. inner.tar.gz!/lib")]
    folder: String,
}

pub fn run(arg: LsArg) -> Result<()> {
    let resolver = super::resolver(&Settings::from_env());
    let infos = resolver.list_folder(&FileDescriptor::new(&arg.archive), &arg.folder)?;
    debug!(folder = %arg.folder, children = infos.len(), "listed");

    for info in infos {
        let kind = if info.is_directory { 'd' } else { '-' };
        let size = if info.size == SIZE_UNKNOWN {
            "-".to_string()
        } else {
            info.size.to_string()
        };
        println!("{kind} {size:>12} {}", info.name);
    }
    Ok(())
}
