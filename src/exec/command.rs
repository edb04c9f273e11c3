// src/exec/command.rs

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ConfigFile;

const SCRIPT_PLACEHOLDER: &str = "{script}";
const FILE_PLACEHOLDER: &str = "{file}";

/// Interpreter invocation with `{script}` / `{file}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub interpreter: String,
    pub args: Vec<String>,
    pub script: PathBuf,
}

impl CommandTemplate {
    pub fn new(interpreter: impl Into<String>, args: Vec<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            args,
            script: script.into(),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.interpreter.clone(), cfg.args.clone(), cfg.script.clone())
    }

    /// Arguments for one invocation.
    ///
    /// An argument that is exactly a placeholder becomes the path itself, so
    /// non-UTF-8 paths pass through untouched.
    pub fn render(&self, file: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| match arg.as_str() {
                SCRIPT_PLACEHOLDER => self.script.clone().into_os_string(),
                FILE_PLACEHOLDER => file.as_os_str().to_os_string(),
                other => other
                    .replace(SCRIPT_PLACEHOLDER, &self.script.to_string_lossy())
                    .replace(FILE_PLACEHOLDER, &file.to_string_lossy())
                    .into(),
            })
            .collect()
    }

    /// Human-readable command line, for logs.
    pub fn display_line(&self, file: &Path) -> String {
        let mut line = quote(&self.interpreter);
        for arg in self.render(file) {
            line.push(' ');
            line.push_str(&quote(&arg.to_string_lossy()));
        }
        line
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("\"{s}\"")
    } else {
        s.to_string()
    }
}
