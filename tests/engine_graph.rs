// tests/engine_graph.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sitepipe::config::ConfigFile;
use sitepipe::errors::BuildError;
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::fs::FileSystem;
use sitepipe::graph::{Engine, Pipeline};
use sitepipe_test_utils::builders::{par, seq, ConfigFileBuilder, TaskConfigBuilder};
use sitepipe_test_utils::{init_tracing, with_timeout};

fn engine(fs: &MockFileSystem) -> Engine {
    Engine::new(
        Arc::new(fs.clone()),
        PathBuf::from("./source"),
        PathBuf::from("./build"),
    )
}

fn pipeline(cfg: &ConfigFile) -> Pipeline {
    Pipeline::from_config(cfg).expect("pipeline")
}

/// `gen` copies `data.txt` into `build/gen/`; `post` reads it back from the
/// output root.
fn producer_consumer() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("gen", TaskConfigBuilder::new("data.txt").dest("gen").build())
        .with_task(
            "post",
            TaskConfigBuilder::new("gen/data.txt")
                .base("gen")
                .from_output()
                .dest("post")
                .build(),
        )
        .with_graph("both", seq(&["gen", "post"]))
        .build()
}

#[tokio::test]
async fn sequence_feeds_output_of_one_step_into_the_next() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/data.txt", "payload");
    let cfg = producer_consumer();
    let p = pipeline(&cfg);

    let summary = with_timeout(engine(&fs).run(&p.target("both").unwrap()))
        .await
        .unwrap();

    let order: Vec<&str> = summary.reports.iter().map(|r| r.task.as_str()).collect();
    assert_eq!(order, vec!["gen", "post"]);
    assert_eq!(fs.read(Path::new("./build/post/data.txt")).unwrap(), b"payload");
}

#[tokio::test]
async fn consumer_without_its_producer_fails() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/data.txt", "payload");
    let cfg = producer_consumer();
    let p = pipeline(&cfg);

    let err = with_timeout(engine(&fs).run(&p.target("post").unwrap()))
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Filesystem { ref task, .. } if task == "post"));
}

#[tokio::test]
async fn first_failure_stops_a_sequence() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/b.txt", "b");
    let cfg = ConfigFileBuilder::new()
        .with_task("missing", TaskConfigBuilder::new("a.txt").build())
        .with_task("b", TaskConfigBuilder::new("b.txt").build())
        .with_graph("run", seq(&["missing", "b"]))
        .build();
    let p = pipeline(&cfg);

    let err = with_timeout(engine(&fs).run(&p.target("run").unwrap()))
        .await
        .unwrap_err();

    assert_eq!(err.failed_tasks(), vec!["missing"]);
    assert!(!fs.exists(Path::new("./build/b.txt")));
}

#[tokio::test]
async fn parallel_failure_does_not_stop_siblings() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/js/app.js", "function f(a){return a+1}");
    fs.add_file("./source/img/broken.svg", "<svg><g></svg>");
    fs.add_file("./source/fonts/a.woff2", "font");
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "scripts",
            TaskConfigBuilder::new("js/*.js")
                .dest("js")
                .transform(sitepipe::config::TransformConfig::ScriptMinify)
                .build(),
        )
        .with_task(
            "svg",
            TaskConfigBuilder::new("img/*.svg")
                .dest("img")
                .transform(sitepipe::config::TransformConfig::VectorOptimize)
                .build(),
        )
        .with_task("fonts", TaskConfigBuilder::new("fonts/*").base(".").build())
        .with_graph("assets", par(&["scripts", "svg", "fonts"]))
        .build();
    let p = pipeline(&cfg);

    let err = with_timeout(engine(&fs).run(&p.target("assets").unwrap()))
        .await
        .unwrap_err();

    match &err {
        BuildError::Parallel { total, failures } => {
            assert_eq!(*total, 3);
            assert_eq!(failures.len(), 1);
        }
        other => panic!("expected parallel failure, got {other:?}"),
    }
    assert_eq!(err.failed_tasks(), vec!["svg"]);
    assert!(fs.exists(Path::new("./build/js/app.js")));
    assert!(fs.exists(Path::new("./build/fonts/a.woff2")));
    assert!(!fs.exists(Path::new("./build/img/broken.svg")));
}

#[tokio::test]
async fn two_tasks_writing_one_path_conflict() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/a.txt", "first");
    fs.add_file("./source/other/a.txt", "second");
    let cfg = ConfigFileBuilder::new()
        .with_task("one", TaskConfigBuilder::new("a.txt").build())
        .with_task("two", TaskConfigBuilder::new("other/a.txt").base("other").build())
        .with_graph("seq", seq(&["one", "two"]))
        .with_graph("par", par(&["one", "two"]))
        .build();
    let p = pipeline(&cfg);

    let err = with_timeout(engine(&fs).run(&p.target("seq").unwrap()))
        .await
        .unwrap_err();
    match err {
        BuildError::OutputConflict { task, owner, path } => {
            assert_eq!(task, "two");
            assert_eq!(owner, "one");
            assert_eq!(path, PathBuf::from("./build/a.txt"));
        }
        other => panic!("expected output conflict, got {other:?}"),
    }
    assert_eq!(fs.read(Path::new("./build/a.txt")).unwrap(), b"first");

    // Order inside a parallel group is not fixed, but exactly one side loses.
    let err = with_timeout(engine(&fs).run(&p.target("par").unwrap()))
        .await
        .unwrap_err();
    match err {
        BuildError::Parallel { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0], BuildError::OutputConflict { .. }));
        }
        other => panic!("expected parallel failure, got {other:?}"),
    }
}

#[tokio::test]
async fn rerunning_a_task_may_rewrite_its_own_outputs() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/a.txt", "a");
    let cfg = ConfigFileBuilder::new()
        .with_task("one", TaskConfigBuilder::new("a.txt").build())
        .with_graph("twice", seq(&["one", "one"]))
        .build();
    let p = pipeline(&cfg);

    let summary = with_timeout(engine(&fs).run(&p.target("twice").unwrap()))
        .await
        .unwrap();
    assert_eq!(summary.reports.len(), 2);
}

#[tokio::test]
async fn clean_wipes_stale_files_before_writes() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/a.txt", "a");
    fs.add_file("./build/stale.txt", "old");
    let cfg = ConfigFileBuilder::new()
        .with_task("one", TaskConfigBuilder::new("a.txt").build())
        .with_graph("build", seq(&["clean", "one"]))
        .build();
    let p = pipeline(&cfg);

    with_timeout(engine(&fs).run(&p.target("build").unwrap()))
        .await
        .unwrap();

    assert!(!fs.exists(Path::new("./build/stale.txt")));
    assert_eq!(fs.read(Path::new("./build/a.txt")).unwrap(), b"a");
}

#[tokio::test]
async fn failed_clean_stops_the_build_before_any_writer() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("./source/a.txt", "a");
    fs.add_file("./source/b.txt", "b");
    fs.add_file("./build/stale.txt", "old");
    fs.fail_remove("./build");
    let cfg = ConfigFileBuilder::new()
        .with_task("one", TaskConfigBuilder::new("a.txt").build())
        .with_task("two", TaskConfigBuilder::new("b.txt").build())
        .with_graph("writers", par(&["one", "two"]))
        .with_graph("build", seq(&["clean", "writers"]))
        .build();
    let p = pipeline(&cfg);

    let err = with_timeout(engine(&fs).run(&p.target("build").unwrap()))
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Clean { ref path, .. } if path == Path::new("./build")));
    assert!(err.is_fatal());
    assert_eq!(err.failed_tasks(), vec!["clean"]);
    assert_eq!(
        fs.file_paths(),
        vec![
            PathBuf::from("./build/stale.txt"),
            PathBuf::from("./source/a.txt"),
            PathBuf::from("./source/b.txt"),
        ]
    );
}
