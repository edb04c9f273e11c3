use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// How watched files are checked for changes.
///
/// - `Polling`: hash every watched file on a fixed tick and compare digests.
/// - `Notify`: subscribe to change notifications on each file's directory and
///   confirm candidates against the file's modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    Polling,
    #[serde(alias = "notification")]
    #[value(alias = "notification")]
    Notify,
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::Polling
    }
}

impl FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "polling" | "poll" => Ok(WatchMode::Polling),
            "notify" | "notification" => Ok(WatchMode::Notify),
            other => Err(format!(
                "invalid watch mode: {other} (expected \"polling\" or \"notify\")"
            )),
        }
    }
}

impl std::fmt::Display for WatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchMode::Polling => f.write_str("polling"),
            WatchMode::Notify => f.write_str("notify"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_names() {
        assert_eq!("polling".parse::<WatchMode>(), Ok(WatchMode::Polling));
        assert_eq!(" Notify ".parse::<WatchMode>(), Ok(WatchMode::Notify));
        assert_eq!("notification".parse::<WatchMode>(), Ok(WatchMode::Notify));
        assert!("inotify".parse::<WatchMode>().is_err());
    }
}
