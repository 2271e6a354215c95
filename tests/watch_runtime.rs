// tests/watch_runtime.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sitepipe::config::ConfigFile;
use sitepipe::graph::Pipeline;
use sitepipe::server::ReloadHandle;
use sitepipe::watch::{
    compile_rules, spawn_watcher, WatchCore, WatchEvent, WatchOptions, WatchRule, WatchRuntime,
};
use sitepipe_test_utils::builders::{node, ConfigFileBuilder, TaskConfigBuilder};
use sitepipe_test_utils::fake_runner::{FakeRunner, RunRecord};
use sitepipe_test_utils::{init_tracing, with_timeout};

/// Rule 0: `*.html` -> `html` with reload. Rule 1: `less/*.less` -> `styles`.
fn config(queue_length: usize) -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("html", TaskConfigBuilder::new("*.html").build())
        .with_task("styles", TaskConfigBuilder::new("less/*.less").dest("css").build())
        .with_watch(&["*.html"], node("html"), true)
        .with_watch(&["less/*.less"], node("styles"), false)
        .queue_length(queue_length)
        .build()
}

fn rules(cfg: &ConfigFile) -> Vec<WatchRule> {
    let pipeline = Pipeline::from_config(cfg).expect("pipeline");
    compile_rules(cfg, &pipeline).expect("rules")
}

fn trigger(rule: usize) -> WatchEvent {
    WatchEvent::RuleTriggered {
        rule,
        path: "changed".to_string(),
    }
}

/// Queue `events`, then run the runtime until every rule is idle.
async fn run_until_idle(
    queue_length: usize,
    runner: &FakeRunner,
    reload: Option<ReloadHandle>,
    events: Vec<WatchEvent>,
) {
    let cfg = config(queue_length);
    let rules = rules(&cfg);
    let (tx, rx) = mpsc::channel(64);
    for event in events {
        tx.send(event).await.unwrap();
    }

    let flags: Vec<bool> = rules.iter().map(|r| r.reload).collect();
    let core = WatchCore::new(&flags, queue_length, WatchOptions { exit_when_idle: true });
    let runtime = WatchRuntime::new(core, &rules, Arc::new(runner.clone()), reload, tx, rx);

    with_timeout(runtime.run()).await;
}

#[tokio::test]
async fn rapid_events_on_one_rule_run_twice_without_overlap() {
    init_tracing();
    let runner = FakeRunner::new().with_delay(Duration::from_millis(30));

    run_until_idle(1, &runner, None, vec![trigger(0), trigger(0)]).await;

    assert_eq!(
        runner.records(),
        vec![
            RunRecord::Started("html".into()),
            RunRecord::Finished("html".into()),
            RunRecord::Started("html".into()),
            RunRecord::Finished("html".into()),
        ]
    );
    assert_eq!(runner.max_overlap("html"), 1);
}

#[tokio::test]
async fn events_beyond_queue_length_coalesce() {
    init_tracing();
    let runner = FakeRunner::new().with_delay(Duration::from_millis(20));

    run_until_idle(1, &runner, None, vec![trigger(0), trigger(0), trigger(0), trigger(0)]).await;
    assert_eq!(runner.finished("html"), 2);

    let runner = FakeRunner::new().with_delay(Duration::from_millis(20));
    run_until_idle(2, &runner, None, vec![trigger(0), trigger(0), trigger(0), trigger(0)]).await;
    assert_eq!(runner.finished("html"), 3);
    assert_eq!(runner.max_overlap("html"), 1);
}

#[tokio::test]
async fn distinct_rules_run_concurrently() {
    init_tracing();
    let runner = FakeRunner::new().with_delay(Duration::from_millis(50));

    run_until_idle(1, &runner, None, vec![trigger(0), trigger(1)]).await;

    let records = runner.records();
    assert_eq!(records.len(), 4);
    assert!(matches!(records[0], RunRecord::Started(_)));
    assert!(matches!(records[1], RunRecord::Started(_)));
    assert_eq!(runner.finished("html"), 1);
    assert_eq!(runner.finished("styles"), 1);
}

#[tokio::test]
async fn successful_run_with_reload_broadcasts() {
    init_tracing();
    let runner = FakeRunner::new();
    let reload = ReloadHandle::new();
    let mut rx = reload.subscribe();

    run_until_idle(1, &runner, Some(reload.clone()), vec![trigger(1)]).await;
    assert!(rx.try_recv().is_err(), "styles rule has no reload");

    run_until_idle(1, &runner, Some(reload), vec![trigger(0)]).await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn failed_run_neither_reloads_nor_stops_the_rule() {
    init_tracing();
    let runner = FakeRunner::new()
        .with_delay(Duration::from_millis(20))
        .failing("html");
    let reload = ReloadHandle::new();
    let mut rx = reload.subscribe();

    run_until_idle(1, &runner, Some(reload), vec![trigger(0), trigger(0)]).await;

    assert_eq!(runner.finished("html"), 2);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn shutdown_stops_a_busy_runtime() {
    init_tracing();
    let cfg = config(1);
    let rules = rules(&cfg);
    let (tx, rx) = mpsc::channel(8);
    let runner = FakeRunner::new().with_delay(Duration::from_millis(10));

    let flags: Vec<bool> = rules.iter().map(|r| r.reload).collect();
    let core = WatchCore::new(&flags, 1, WatchOptions::default());
    let runtime = WatchRuntime::new(core, &rules, Arc::new(runner.clone()), None, tx.clone(), rx);
    let handle = tokio::spawn(runtime.run());

    tx.send(trigger(1)).await.unwrap();
    tx.send(WatchEvent::ShutdownRequested).await.unwrap();

    with_timeout(handle).await.unwrap();
}

#[tokio::test]
async fn file_changes_on_disk_trigger_matching_rules() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("less")).unwrap();

    let cfg = config(1);
    let (tx, mut rx) = mpsc::channel(64);
    let _watcher = spawn_watcher(dir.path(), rules(&cfg), tx).unwrap();

    // Give the OS watcher a moment to register.
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(dir.path().join("less/site.less"), "a { color: red }").unwrap();

    let event = with_timeout(rx.recv()).await.unwrap();
    assert_eq!(
        event,
        WatchEvent::RuleTriggered {
            rule: 1,
            path: "less/site.less".to_string()
        }
    );
}
