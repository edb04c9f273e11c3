// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::WatchMode;

/// Command-line arguments for `filetrigger`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "filetrigger",
    version,
    about = "Run a script once for every real change to a set of watched files.",
    long_about = None
)]
pub struct CliArgs {
    /// Files to watch. Overrides `[watch].files` from the config file.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Script passed to the interpreter for every confirmed change.
    #[arg(long, short = 's', value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Optional config file (TOML). Command-line values take precedence.
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Change detection strategy.
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<WatchMode>,

    /// Tick interval for the polling strategy, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Interpreter binary used to run the script.
    #[arg(long, value_name = "PROGRAM")]
    pub interpreter: Option<String>,

    /// Kill the script if it runs longer than this many seconds.
    ///
    /// Without this flag a hung script blocks all further detection.
    #[arg(long, value_name = "SECS")]
    pub script_timeout_secs: Option<u64>,

    /// Do not run the script for files as found at startup.
    #[arg(long)]
    pub no_initial_dispatch: bool,

    /// Run the startup check once and exit, without watching.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FILETRIGGER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the configuration and print it, but don't watch anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_and_files() {
        let args = CliArgs::try_parse_from([
            "filetrigger",
            "--script",
            "send.sh",
            "--mode",
            "notify",
            "a.xml",
            "b.xml",
        ])
        .unwrap();

        assert_eq!(args.script, Some(PathBuf::from("send.sh")));
        assert_eq!(args.mode, Some(WatchMode::Notify));
        assert_eq!(args.files, vec![PathBuf::from("a.xml"), PathBuf::from("b.xml")]);
        assert!(!args.once);
    }
}
