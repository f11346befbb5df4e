use clap::{Parser, Subcommand};

use super::{cat, detect, extract, ls, pack, sizes};

#[derive(Clone, Debug, Parser)]
#[command(name = "artifex", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[arg(short, long, global = true, help = "Log at debug level")]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(name = "detect", about = "Print the archive type of a file name")]
    Detect(detect::DetectArg),
    #[command(alias = "list", name = "ls", about = "List a folder inside an archive")]
    List(ls::LsArg),
    #[command(name = "cat", about = "Write an archive entry to stdout")]
    Cat(cat::CatArg),
    #[command(alias = "x", name = "extract", about = "Extract an archive into a directory")]
    Extract(extract::ExtractArg),
    #[command(name = "pack", about = "Pack files and directories into a zip")]
    Pack(pack::PackArg),
    #[command(name = "sizes", about = "Print the size of every entry")]
    Sizes(sizes::SizesArg),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        App::command().debug_assert();
    }

    #[test]
    fn parses_extract_flags() {
        let app = App::try_parse_from([
            "artifex", "extract", "a.zip", "out", "--prefix", "lib/", "--clean", "--strict",
        ])
        .unwrap();
        let Commands::Extract(arg) = app.cmd else {
            panic!("expected extract");
        };
        assert_eq!(arg.prefix, "lib/");
        assert!(arg.clean);
        assert!(arg.strict);
    }

    #[test]
    fn parses_pack_modes() {
        let app = App::try_parse_from([
            "artifex", "-v", "pack", "out.zip", "src", "--mode", "bin/tool=755", "--mark-sh",
        ])
        .unwrap();
        assert!(app.verbose);
        let Commands::Pack(arg) = app.cmd else {
            panic!("expected pack");
        };
        assert_eq!(arg.modes, [("bin/tool".to_string(), 0o755)]);
        assert!(arg.mark_sh);
    }
}
