use std::path::PathBuf;

use anyhow::{Context, Result};
use artifex_archive::{
    ExtractOptions, FileDescriptor, PermissionStrategy, Settings, SymlinkPolicy, TargetMode, extract_all,
};
use clap::Args;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ExtractArg {
    #[arg(help = "Archive file")]
    archive: PathBuf,
    #[arg(help = "Target directory")]
    target: PathBuf,
    #[arg(long, default_value = "", help = "Only extract entries under this compound prefix")]
    pub prefix: String,
    #[arg(long, help = "Delete the target first and again on failure")]
    pub clean: bool,
    #[arg(long, help = "Fail on entries escaping the target instead of skipping them")]
    pub strict: bool,
    #[arg(long, help = "Create real symlinks for link entries")]
    symlinks: bool,
    #[arg(long, help = "Apply Unix modes recorded in the archive")]
    preserve_permissions: bool,
}

pub fn run(arg: ExtractArg) -> Result<()> {
    let settings = Settings::from_env();
    let resolver = super::resolver(&settings);

    let mut options = ExtractOptions::from_settings(&settings);
    if arg.strict {
        options = options.strict();
    }
    if arg.symlinks {
        options = options.symlinks(SymlinkPolicy::Create);
    }
    if arg.preserve_permissions {
        options = options.permission_strategy(PermissionStrategy::Preserve);
    }
    let mode = if arg.clean { TargetMode::Clean } else { TargetMode::Merge };

    let report = extract_all(
        &resolver,
        &FileDescriptor::new(&arg.archive),
        &arg.target,
        &arg.prefix,
        mode,
        &options,
    )
    .with_context(|| format!("Failed to extract {}", arg.archive.display()))?;

    info!(
        archive = %arg.archive.display(),
        target = %arg.target.display(),
        files = report.files,
        rejected = report.rejected.len(),
        "extracted"
    );
    println!(
        "{} files, {} directories, {} bytes",
        report.files, report.directories, report.bytes
    );
    for name in &report.rejected {
        println!("skipped {name}");
    }
    Ok(())
}
