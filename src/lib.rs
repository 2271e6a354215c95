// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fileset;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod server;
pub mod task;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{resolve_config, LoadedConfig};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{BuildSummary, Engine, Pipeline};
use crate::server::{DevServer, ServerOptions};
use crate::watch::{compile_rules, spawn_watcher, WatchCore, WatchEvent, WatchOptions, WatchRuntime};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let loaded = resolve_config(args.config.as_deref().map(Path::new), &cwd)?;
    let pipeline = Pipeline::from_config(&loaded.config)?;

    match args.command() {
        Command::Build => run_target(&loaded, &pipeline, "build").await.map(|_| ()),
        Command::Run { name } => run_target(&loaded, &pipeline, &name).await.map(|_| ()),
        Command::Dev => run_dev(&loaded, &pipeline).await,
        Command::Graph => {
            print_graph(&loaded, &pipeline)?;
            Ok(())
        }
    }
}

fn engine_for(loaded: &LoadedConfig) -> Engine {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    Engine::new(fs, loaded.source_root(), loaded.output_root())
}

/// Run one named graph or task to completion.
async fn run_target(loaded: &LoadedConfig, pipeline: &Pipeline, name: &str) -> Result<BuildSummary> {
    let target = pipeline.target(name)?;
    let engine = engine_for(loaded);

    info!(target = name, graph = %target, "running");
    let summary = engine
        .run(&target)
        .await
        .with_context(|| format!("`{name}` failed"))?;

    info!(
        target = name,
        tasks = summary.reports.len(),
        outputs = summary.output_count(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "done"
    );
    Ok(summary)
}

/// Initial `dev` build, then dev server and watch rules until Ctrl-C.
async fn run_dev(loaded: &LoadedConfig, pipeline: &Pipeline) -> Result<()> {
    let engine = Arc::new(engine_for(loaded));

    let dev = pipeline.target("dev")?;
    if let Err(err) = engine.run(&dev).await {
        error!(error = %err, "initial dev build failed; serving and watching anyway");
    }

    let server = DevServer::start(
        &ServerOptions::from(&loaded.config.server),
        loaded.output_root(),
    )
    .await?;

    let rules = compile_rules(&loaded.config, pipeline)?;
    let (tx, rx) = mpsc::channel::<WatchEvent>(64);

    let _watcher = spawn_watcher(loaded.source_root(), rules.clone(), tx.clone())?;

    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; shutting down");
            let _ = tx.send(WatchEvent::ShutdownRequested).await;
        });
    }

    let reload_flags: Vec<bool> = rules.iter().map(|r| r.reload).collect();
    let core = WatchCore::new(
        &reload_flags,
        loaded.config.config.queue_length,
        WatchOptions::default(),
    );
    let runtime = WatchRuntime::new(
        core,
        &rules,
        engine,
        Some(server.reload_handle()),
        tx,
        rx,
    );
    runtime.run().await;

    server.stop().await
}

/// Dry run: print tasks, graphs and watch rules.
fn print_graph(loaded: &LoadedConfig, pipeline: &Pipeline) -> Result<()> {
    let cfg = &loaded.config;

    println!("sitepipe graph");
    match &loaded.path {
        Some(path) => println!("  config = {}", path.display()),
        None => println!("  config = <built-in>"),
    }
    println!("  source = {}", loaded.source_root().display());
    println!("  output = {}", loaded.output_root().display());
    println!("  queue_length = {}", cfg.config.queue_length);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in &cfg.task {
        println!("  - {name}");
        println!("      src: {:?}", task.src);
        if !task.exclude.is_empty() {
            println!("      exclude: {:?}", task.exclude);
        }
        if let Some(base) = &task.base {
            println!("      base: {base}");
        }
        println!("      from: {:?}", task.from);
        println!("      dest: {}", task.dest);
        let kinds: Vec<&str> = task.transforms.iter().map(|t| t.kind().as_str()).collect();
        if !kinds.is_empty() {
            println!("      transforms: {}", kinds.join(" -> "));
        }
    }
    println!();

    println!("graphs:");
    for (name, node) in pipeline.graphs() {
        println!("  {name} = {node}");
    }
    println!();

    let rules = compile_rules(cfg, pipeline)?;
    println!("watch ({}):", rules.len());
    for rule in &rules {
        let mut flags = Vec::new();
        if rule.reload {
            flags.push("reload");
        }
        if rule.use_hash {
            flags.push("use_hash");
        }
        println!(
            "  {:?} -> {}{}",
            rule.patterns,
            rule.graph,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            }
        );
    }

    Ok(())
}
