#![allow(dead_code)]

use std::path::PathBuf;

use filetrigger::config::{ConfigFile, RawConfigFile};
use filetrigger::types::WatchMode;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts with a script (`send.sh`) and no files.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.dispatch.script = Some(PathBuf::from("send.sh"));
        Self { config }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.watch.files.push(path.into());
        self
    }

    pub fn with_files(mut self, count: usize, dir: &str) -> Self {
        for i in 0..count {
            self.config
                .watch
                .files
                .push(PathBuf::from(format!("{dir}/file{i}.xml")));
        }
        self
    }

    pub fn mode(mut self, mode: WatchMode) -> Self {
        self.config.watch.mode = mode;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.watch.poll_interval_ms = ms;
        self
    }

    pub fn dispatch_on_startup(mut self, val: bool) -> Self {
        self.config.watch.dispatch_on_startup = val;
        self
    }

    pub fn script(mut self, script: Option<&str>) -> Self {
        self.config.dispatch.script = script.map(PathBuf::from);
        self
    }

    pub fn interpreter(mut self, interpreter: &str, args: &[&str]) -> Self {
        self.config.dispatch.interpreter = Some(interpreter.to_string());
        self.config.dispatch.args = Some(args.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.dispatch.timeout_secs = Some(secs);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
