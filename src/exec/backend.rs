// src/exec/backend.rs

//! Pluggable dispatcher abstraction.
//!
//! The runtime talks to a `Dispatcher` instead of spawning processes itself.
//! This makes it easy to swap in a recording fake in tests while keeping the
//! production implementation here.
//!
//! - `ScriptDispatcher` is the default implementation used by `filetrigger`.
//!   It runs the configured interpreter once per request and waits for it.
//! - Tests can provide their own `Dispatcher` that, for example, records
//!   which files were dispatched and holds a call open to exercise shutdown.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::engine::DispatchRequest;
use crate::logging::EventSink;

use super::command::CommandTemplate;

/// How one script invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    /// Non-zero exit status (`-1` when terminated by a signal).
    Exited(i32),
    /// The process could not be started or waited on.
    Failed(String),
    /// Killed after exceeding the configured timeout.
    TimedOut,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success)
    }
}

/// Trait abstracting how confirmed changes are acted upon.
///
/// The runtime awaits every call before doing anything else, so
/// implementations never see two requests at once.
pub trait Dispatcher: Send {
    fn dispatch(
        &mut self,
        request: DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = DispatchOutcome> + Send + '_>>;
}

/// Runs the configured script through its interpreter.
pub struct ScriptDispatcher {
    template: CommandTemplate,
    timeout: Option<Duration>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ScriptDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptDispatcher")
            .field("template", &self.template)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ScriptDispatcher {
    pub fn new(template: CommandTemplate, timeout: Option<Duration>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            template,
            timeout,
            sink,
        }
    }

    pub fn from_config(cfg: &ConfigFile, sink: Arc<dyn EventSink>) -> Self {
        Self::new(CommandTemplate::from_config(cfg), cfg.script_timeout, sink)
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    async fn run(&self, request: DispatchRequest) -> DispatchOutcome {
        let file = request.triggering_path;
        self.sink.information(format!(
            "Command line is {}",
            self.template.display_line(&file)
        ));

        let mut cmd = Command::new(&self.template.interpreter);
        cmd.args(self.template.render(&file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.sink.error(format!(
                    "Failed to start '{}' for '{}': {}",
                    self.template.interpreter,
                    file.display(),
                    err
                ));
                return DispatchOutcome::Failed(err.to_string());
            }
        };

        match child.id() {
            Some(pid) => self.sink.success(format!("Process {pid} started for '{}'", file.display())),
            None => self.sink.success(format!("Process started for '{}'", file.display())),
        }

        // Keep the pipe drained so a chatty script cannot block on it.
        if let Some(stderr) = child.stderr.take() {
            let watch_id = request.watch_id;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(%watch_id, "stderr: {}", line);
                }
            });
        }

        let waited = match self.timeout {
            Some(limit) => {
                let result = tokio::time::timeout(limit, child.wait()).await;
                match result {
                    Ok(waited) => waited,
                    Err(_) => {
                        if let Err(err) = child.kill().await {
                            debug!(error = %err, "kill after timeout failed");
                        }
                        self.sink.warning(format!(
                            "Script for '{}' ran longer than {:?} and was killed",
                            file.display(),
                            limit
                        ));
                        return DispatchOutcome::TimedOut;
                    }
                }
            }
            None => child.wait().await,
        };

        match waited {
            Ok(status) if status.success() => {
                info!(watch_id = %request.watch_id, exit_code = 0, "script finished");
                self.sink
                    .success(format!("Script for '{}' exited with code 0", file.display()));
                DispatchOutcome::Success
            }
            Ok(status) => {
                let code = status.code().unwrap_or(-1);
                self.sink.warning(format!(
                    "Script for '{}' exited with code {}",
                    file.display(),
                    code
                ));
                DispatchOutcome::Exited(code)
            }
            Err(err) => {
                self.sink.error(format!(
                    "Waiting for the script for '{}' failed: {}",
                    file.display(),
                    err
                ));
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }
}

impl Dispatcher for ScriptDispatcher {
    fn dispatch(
        &mut self,
        request: DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = DispatchOutcome> + Send + '_>> {
        Box::pin(self.run(request))
    }
}
