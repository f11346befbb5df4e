use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::app::{App, Commands};

mod cli;

const LOG_ENV: &str = "ARTIFEX_LOG";

fn main() -> anyhow::Result<()> {
    let app = App::parse();
    init_tracing(app.verbose);
    debug!(command = ?app.cmd, "starting");

    match app.cmd {
        Commands::Detect(arg) => cli::detect::run(arg),
        Commands::List(arg) => cli::ls::run(arg),
        Commands::Cat(arg) => cli::cat::run(arg),
        Commands::Extract(arg) => cli::extract::run(arg),
        Commands::Pack(arg) => cli::pack::run(arg),
        Commands::Sizes(arg) => cli::sizes::run(arg),
    }
}

fn init_tracing(verbose: bool) {
    let directives = std::env::var(LOG_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();
}

/// `-v` wins over `ARTIFEX_LOG`; unparsable directives fall back to `warn`.
fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    match directives {
        _ if verbose => EnvFilter::new("debug"),
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("warn")),
        None => EnvFilter::new("warn"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_env() {
        assert_eq!(log_filter(true, Some("trace")).to_string(), "debug");
    }

    #[test]
    fn env_directives_apply() {
        assert_eq!(
            log_filter(false, Some("artifex_archive=trace")).to_string(),
            "artifex_archive=trace"
        );
        assert_eq!(log_filter(false, None).to_string(), "warn");
    }
}
