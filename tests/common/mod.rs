#![allow(dead_code)]

use std::sync::Arc;

use filetrigger::engine::{Runtime, RuntimeOptions};
use filetrigger::exec::Dispatcher;
use filetrigger::fs::FileSystem;
use filetrigger::logging::{EventSink, MemorySink};
use filetrigger::types::WatchMode;
use filetrigger::watch::{DetectionStrategy, Registry};

pub use filetrigger_test_utils::{init_tracing, with_timeout, MockFileSystem};

/// Registry over `paths` on the mock filesystem.
pub fn registry(fs: &MockFileSystem, mode: WatchMode, paths: &[&str]) -> Registry {
    let mut registry = Registry::new(mode);
    for path in paths {
        registry.register(fs, path).expect("register watched file");
    }
    registry
}

/// Runtime wired to the mock filesystem and an in-memory sink.
pub fn runtime<S, D>(
    fs: &MockFileSystem,
    registry: Registry,
    strategy: S,
    dispatcher: D,
    options: RuntimeOptions,
) -> (Runtime<S, D>, MemorySink)
where
    S: DetectionStrategy,
    D: Dispatcher,
{
    let sink = MemorySink::new();
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let events: Arc<dyn EventSink> = Arc::new(sink.clone());
    (
        Runtime::new(registry, strategy, dispatcher, fs, events, options),
        sink,
    )
}

pub fn watch_only() -> RuntimeOptions {
    RuntimeOptions {
        dispatch_on_startup: false,
        exit_after_startup: false,
    }
}
