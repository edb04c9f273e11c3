// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::WatchMode;

/// Default polling tick.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// mode = "notify"
/// poll_interval_ms = 500
/// files = ["/srv/exchange/prices.xml", "/srv/exchange/stock.xml"]
///
/// [dispatch]
/// script = "/srv/scripts/send.sh"
/// interpreter = "sh"
/// args = ["{script}", "{file}"]
/// timeout_secs = 300
/// ```
///
/// All sections are optional in the file itself; the script and at least one
/// file may come from the command line instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub dispatch: DispatchSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// `"polling"` (default) or `"notify"`.
    #[serde(default)]
    pub mode: WatchMode,

    /// Tick interval for the polling strategy.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Files to watch, in registration order.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Run the script once for every readable file at startup.
    #[serde(default = "default_true")]
    pub dispatch_on_startup: bool,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            mode: WatchMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            files: Vec::new(),
            dispatch_on_startup: true,
        }
    }
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchSection {
    /// Script handed to the interpreter. Required (here or on the CLI).
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Interpreter binary; platform default when absent.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Interpreter arguments. `{script}` and `{file}` are substituted.
    #[serde(default)]
    pub args: Option<Vec<String>>,

    /// Kill the script after this many seconds. No limit when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, which checks
/// the invariants the engine relies on.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub mode: WatchMode,
    pub poll_interval: Duration,
    pub files: Vec<PathBuf>,
    pub dispatch_on_startup: bool,
    pub script: PathBuf,
    pub interpreter: String,
    pub args: Vec<String>,
    pub script_timeout: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, script: PathBuf) -> Self {
        let (interpreter, args) = resolve_interpreter(&raw.dispatch);
        Self {
            mode: raw.watch.mode,
            poll_interval: Duration::from_millis(raw.watch.poll_interval_ms),
            files: raw.watch.files,
            dispatch_on_startup: raw.watch.dispatch_on_startup,
            script,
            interpreter,
            args,
            script_timeout: raw.dispatch.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Interpreter and argument template, falling back to the platform default.
///
/// A custom interpreter without explicit `args` gets `["{script}", "{file}"]`.
pub(crate) fn resolve_interpreter(dispatch: &DispatchSection) -> (String, Vec<String>) {
    let (default_interpreter, default_args) = platform_default_command();
    match (&dispatch.interpreter, &dispatch.args) {
        (Some(interp), Some(args)) => (interp.clone(), args.clone()),
        (Some(interp), None) => (interp.clone(), plain_args()),
        (None, Some(args)) => (default_interpreter, args.clone()),
        (None, None) => (default_interpreter, default_args),
    }
}

fn plain_args() -> Vec<String> {
    vec!["{script}".to_string(), "{file}".to_string()]
}

#[cfg(windows)]
fn platform_default_command() -> (String, Vec<String>) {
    (
        r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe".to_string(),
        ["-File", "{script}", "-FileName", "{file}"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

#[cfg(not(windows))]
fn platform_default_command() -> (String, Vec<String>) {
    ("sh".to_string(), plain_args())
}
