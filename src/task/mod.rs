// src/task/mod.rs

//! Tasks: a file selection, an ordered transform chain and a destination.
//!
//! Running a task resolves its selection fresh, pushes the files through the
//! transforms in memory and only then writes the results. If a transform
//! fails, nothing of that task reaches the output root.

mod ledger;

pub use ledger::OutputLedger;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info};

use crate::config::model::TaskConfig;
use crate::errors::BuildError;
use crate::fileset::FileSelection;
use crate::fs::FileSystem;
use crate::transform::{self, Artifact, Transform};
use crate::types::{InputShape, SourceRoot, TaskName, CLEAN_TASK};

/// A named unit of work, created once at startup.
#[derive(Debug)]
pub struct Task {
    pub name: TaskName,
    pub action: TaskAction,
}

#[derive(Debug)]
pub enum TaskAction {
    /// Remove the output root.
    Clean,
    Process(ProcessSpec),
}

#[derive(Debug)]
pub struct ProcessSpec {
    pub selection: FileSelection,
    pub from: SourceRoot,
    pub transforms: Vec<Box<dyn Transform>>,
    /// Directory under the output root.
    pub destination: PathBuf,
}

impl Task {
    pub fn clean() -> Self {
        Self {
            name: CLEAN_TASK.to_string(),
            action: TaskAction::Clean,
        }
    }

    pub fn from_config(name: &str, cfg: &TaskConfig) -> anyhow::Result<Self> {
        let selection = FileSelection::new(&cfg.src, &cfg.exclude, cfg.base.as_deref())
            .with_context(|| format!("task '{name}'"))?;
        let transforms = cfg
            .transforms
            .iter()
            .map(transform::from_config)
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("task '{name}'"))?;

        Ok(Self {
            name: name.to_string(),
            action: TaskAction::Process(ProcessSpec {
                selection,
                from: cfg.from,
                transforms,
                destination: PathBuf::from(cfg.dest.trim_matches('/')),
            }),
        })
    }

    pub fn is_clean(&self) -> bool {
        matches!(self.action, TaskAction::Clean)
    }
}

/// Everything a task needs from the invocation running it.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub fs: Arc<dyn FileSystem>,
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub ledger: Arc<OutputLedger>,
}

impl BuildContext {
    pub fn new(fs: Arc<dyn FileSystem>, source_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            fs,
            source_root,
            output_root,
            ledger: Arc::new(OutputLedger::default()),
        }
    }

    fn root(&self, from: SourceRoot) -> &Path {
        match from {
            SourceRoot::Source => &self.source_root,
            SourceRoot::Output => &self.output_root,
        }
    }
}

/// Outcome of a successful task run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskName,
    pub inputs: usize,
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Run one task to completion.
pub async fn run_task(task: &Task, ctx: &BuildContext) -> Result<TaskReport, BuildError> {
    let started = Instant::now();
    info!(task = %task.name, "task started");

    let (inputs, outputs) = match &task.action {
        TaskAction::Clean => {
            clean(ctx).await?;
            (0, Vec::new())
        }
        TaskAction::Process(spec) => process(&task.name, spec, ctx).await?,
    };

    let elapsed = started.elapsed();
    info!(
        task = %task.name,
        inputs,
        outputs = outputs.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "task finished"
    );

    Ok(TaskReport {
        task: task.name.clone(),
        inputs,
        outputs,
        elapsed,
    })
}

async fn clean(ctx: &BuildContext) -> Result<(), BuildError> {
    let fs = ctx.fs.clone();
    let root = ctx.output_root.clone();
    let result = tokio::task::spawn_blocking(move || fs.remove_dir_all(&root))
        .await
        .map_err(|e| anyhow::anyhow!("clean worker panicked: {e}"))
        .and_then(|r| r);

    result.map_err(|source| BuildError::Clean {
        path: ctx.output_root.clone(),
        source,
    })?;

    // Whatever was written before is gone, so are its claims.
    ctx.ledger.clear();
    Ok(())
}

async fn process(
    name: &str,
    spec: &ProcessSpec,
    ctx: &BuildContext,
) -> Result<(usize, Vec<PathBuf>), BuildError> {
    let fs_error = |source: anyhow::Error| BuildError::Filesystem {
        task: name.to_string(),
        source,
    };

    let mut artifacts = read_inputs(&spec.selection, ctx.root(spec.from), ctx)
        .await
        .map_err(fs_error)?;
    let inputs = artifacts.len();
    debug!(task = %name, files = inputs, "selection resolved");

    for transform in &spec.transforms {
        if transform.input_shape() == InputShape::Single && artifacts.len() != 1 {
            return Err(BuildError::Transform {
                task: name.to_string(),
                transform: transform.kind(),
                source: anyhow::anyhow!(
                    "expects exactly one input file, selection matched {}",
                    artifacts.len()
                ),
            });
        }
        artifacts = transform
            .apply(artifacts)
            .await
            .map_err(|source| BuildError::Transform {
                task: name.to_string(),
                transform: transform.kind(),
                source,
            })?;
    }

    let dest_root = ctx.output_root.join(&spec.destination);
    let writes: Vec<(PathBuf, Vec<u8>)> = artifacts
        .into_iter()
        .map(|a| (dest_root.join(&a.relative), a.contents))
        .collect();

    for (path, _) in &writes {
        ctx.ledger.claim(name, path)?;
    }

    // Commits are atomic per file only. A write error part-way through
    // leaves the files already written by this batch in place.
    let fs = ctx.fs.clone();
    let written = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(writes.len());
        for (path, contents) in writes {
            fs.write(&path, &contents)?;
            written.push(path);
        }
        Ok(written)
    })
    .await
    .map_err(|e| anyhow::anyhow!("write worker panicked: {e}"))
    .and_then(|r| r)
    .map_err(fs_error)?;

    Ok((inputs, written))
}

async fn read_inputs(
    selection: &FileSelection,
    root: &Path,
    ctx: &BuildContext,
) -> anyhow::Result<Vec<Artifact>> {
    let fs = ctx.fs.clone();
    let selection = selection.clone();
    let root = root.to_path_buf();

    tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Artifact>> {
        let set = selection.resolve(fs.as_ref(), &root)?;
        set.into_entries()
            .into_iter()
            .map(|entry| {
                let contents = fs.read(&entry.path)?;
                Ok(Artifact::new(entry.path, entry.relative, contents))
            })
            .collect()
    })
    .await
    .map_err(|e| anyhow::anyhow!("read worker panicked: {e}"))?
}
