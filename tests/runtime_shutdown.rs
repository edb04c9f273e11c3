// tests/runtime_shutdown.rs

mod common;
use crate::common::{init_tracing, registry, runtime, watch_only, with_timeout, MockFileSystem};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use filetrigger::engine::{ChangeEvent, ChangeKind, RuntimeOptions};
use filetrigger::errors::FileTriggerError;
use filetrigger::exec::DispatchOutcome;
use filetrigger::logging::Severity;
use filetrigger::types::WatchMode;
use filetrigger::watch::PollingStrategy;
use filetrigger_test_utils::fake_dispatcher::RecordingDispatcher;
use filetrigger_test_utils::fake_strategy::ScriptedStrategy;

/// Let the spawned runtime finish its startup check.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn one_file() -> (MockFileSystem, filetrigger::watch::Registry) {
    let fs = MockFileSystem::new();
    fs.add_file("/data/A.txt", b"v1".to_vec());
    let reg = registry(&fs, WatchMode::Polling, &["/data/A.txt"]);
    (fs, reg)
}

#[tokio::test]
async fn running_dispatch_finishes_before_shutdown() {
    init_tracing();

    let (fs, reg) = one_file();
    let id = reg.ids()[0];
    let (strategy, script) = ScriptedStrategy::new(WatchMode::Polling);
    let (dispatcher, log) = RecordingDispatcher::new();
    let (dispatcher, gate) = dispatcher.gated();
    let (rt, sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    let token = CancellationToken::new();
    let handle = tokio::spawn(rt.run(token.clone()));
    settle().await;

    script.ready(id, vec![ChangeEvent::new(id, ChangeKind::ContentDiffers)]);
    log.wait_for_calls(1).await;

    token.cancel();
    script.ready(id, vec![ChangeEvent::new(id, ChangeKind::ContentDiffers)]);
    settle().await;
    assert!(!handle.is_finished());
    assert_eq!(log.finished(), 0);

    gate.notify_one();
    let stats = with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(stats.dispatches, 1);
    assert_eq!(log.finished(), 1);
    assert_eq!(log.len(), 1);
    assert!(sink.contains(Severity::Warning, "Stopping"));
}

#[tokio::test]
async fn shutdown_during_wait_returns_promptly() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/data/A.txt", b"v1".to_vec());
    let reg = registry(&fs, WatchMode::Polling, &["/data/A.txt"]);
    let strategy = PollingStrategy::new(Arc::new(fs.clone()), Duration::from_secs(3600));
    let (dispatcher, log) = RecordingDispatcher::new();
    let (rt, _sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    let token = CancellationToken::new();
    let handle = tokio::spawn(rt.run(token.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    token.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("runtime did not stop within 1 second")
        .unwrap()
        .unwrap();
    assert_eq!(stats.dispatches, 0);
    assert!(log.is_empty());
}

#[tokio::test]
async fn shutdown_before_startup_dispatch_skips_it() {
    init_tracing();

    let (fs, reg) = one_file();
    let id = reg.ids()[0];
    let (strategy, script) = ScriptedStrategy::new(WatchMode::Polling);
    script.preload(vec![ChangeEvent::new(id, ChangeKind::ContentDiffers)]);
    let (dispatcher, log) = RecordingDispatcher::new();
    let (rt, sink) = runtime(&fs, reg, strategy, dispatcher, RuntimeOptions::default());

    let token = CancellationToken::new();
    token.cancel();
    let stats = with_timeout(rt.run(token)).await.unwrap();

    assert_eq!(stats.dispatches, 0);
    assert!(log.is_empty());
    assert!(sink.contains(Severity::Warning, "Not running the script"));
}

#[tokio::test]
async fn several_candidates_in_one_wake_dispatch_once() {
    init_tracing();

    let (fs, reg) = one_file();
    let id = reg.ids()[0];
    let (strategy, script) = ScriptedStrategy::new(WatchMode::Polling);
    let (dispatcher, log) = RecordingDispatcher::new();
    let dispatcher = dispatcher.with_outcome(DispatchOutcome::Exited(2));
    let (rt, _sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    let token = CancellationToken::new();
    let handle = tokio::spawn(rt.run(token.clone()));
    settle().await;

    script.tick(vec![
        ChangeEvent::new(id, ChangeKind::ContentDiffers),
        ChangeEvent::new(id, ChangeKind::ContentDiffers),
    ]);
    log.wait_for_calls(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    token.cancel();
    let stats = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(stats.dispatches, 1);
    assert_eq!(stats.failed_dispatches, 1);
    assert_eq!(log.paths(), vec![PathBuf::from("/data/A.txt")]);
}

#[tokio::test]
async fn rearm_failure_is_fatal() {
    init_tracing();

    let (fs, reg) = one_file();
    let id = reg.ids()[0];
    let (strategy, script) = ScriptedStrategy::new(WatchMode::Polling);
    let (dispatcher, _log) = RecordingDispatcher::new();
    let (rt, _sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    script.fail_rearm(id);
    script.ready(id, Vec::new());

    let result = with_timeout(rt.run(CancellationToken::new())).await;
    match result {
        Err(FileTriggerError::RearmFailed { directory, reason }) => {
            assert_eq!(directory, PathBuf::from("/data"));
            assert_eq!(reason, "scripted failure");
        }
        other => panic!("expected RearmFailed, got {other:?}"),
    }
    assert_eq!(script.armed(), vec![id]);
}

#[tokio::test]
async fn ready_files_are_rearmed_after_each_cycle() {
    init_tracing();

    let (fs, reg) = one_file();
    let id = reg.ids()[0];
    let (strategy, script) = ScriptedStrategy::new(WatchMode::Polling);
    let (dispatcher, log) = RecordingDispatcher::new();
    let (rt, _sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    let token = CancellationToken::new();
    let handle = tokio::spawn(rt.run(token.clone()));
    settle().await;

    script.ready(id, Vec::new());
    script.ready(id, vec![ChangeEvent::new(id, ChangeKind::ContentDiffers)]);
    log.wait_for_calls(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    token.cancel();
    with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(script.rearmed(), vec![id, id]);
}

#[tokio::test]
async fn closed_sources_end_the_runtime_with_an_error() {
    init_tracing();

    let (fs, reg) = one_file();
    let (strategy, script) = ScriptedStrategy::new(WatchMode::Polling);
    let (dispatcher, _log) = RecordingDispatcher::new();
    let (rt, _sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    drop(script);
    let result = with_timeout(rt.run(CancellationToken::new())).await;
    assert!(matches!(result, Err(FileTriggerError::Other(_))));
}

#[tokio::test]
async fn strategy_must_match_registry_mode() {
    init_tracing();

    let (fs, reg) = one_file();
    let (strategy, _script) = ScriptedStrategy::new(WatchMode::Notify);
    let (dispatcher, _log) = RecordingDispatcher::new();
    let (rt, _sink) = runtime(&fs, reg, strategy, dispatcher, watch_only());

    let result = rt.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(FileTriggerError::ConfigError(_))));
}
