// src/graph/engine.rs

//! Graph interpreter.
//!
//! The whole walk of one invocation runs inside a single async task:
//! `Parallel` children are polled together with `join_all`, and the CPU-bound
//! parts of each task go to the blocking pool from inside the transforms.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use tracing::{error, info};

use crate::errors::BuildError;
use crate::fs::FileSystem;
use crate::task::{run_task, BuildContext, TaskReport};

use super::GraphNode;

/// Result of a successful graph invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// One report per task, in completion order within each sequence.
    pub reports: Vec<TaskReport>,
    pub elapsed: Duration,
}

impl BuildSummary {
    pub fn output_count(&self) -> usize {
        self.reports.iter().map(|r| r.outputs.len()).sum()
    }
}

/// Trait abstracting how a graph invocation is carried out.
///
/// The watch runtime talks to a `GraphRunner` so tests can substitute a fake
/// that records calls instead of touching the filesystem.
pub trait GraphRunner: Send + Sync + 'static {
    fn run_graph(&self, graph: Arc<GraphNode>) -> BoxFuture<'_, Result<(), BuildError>>;
}

/// Runs graphs against a filesystem.
#[derive(Debug, Clone)]
pub struct Engine {
    fs: Arc<dyn FileSystem>,
    source_root: PathBuf,
    output_root: PathBuf,
}

impl Engine {
    pub fn new(fs: Arc<dyn FileSystem>, source_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            fs,
            source_root,
            output_root,
        }
    }

    pub fn source_root(&self) -> &std::path::Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &std::path::Path {
        &self.output_root
    }

    /// Run `node` to completion with a fresh output ledger.
    pub async fn run(&self, node: &GraphNode) -> Result<BuildSummary, BuildError> {
        let started = Instant::now();
        let ctx = BuildContext::new(
            self.fs.clone(),
            self.source_root.clone(),
            self.output_root.clone(),
        );

        let result = eval(node, &ctx).await;
        let elapsed = started.elapsed();

        match result {
            Ok(reports) => {
                let summary = BuildSummary { reports, elapsed };
                info!(
                    tasks = summary.reports.len(),
                    outputs = summary.output_count(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "graph finished"
                );
                Ok(summary)
            }
            Err(err) => {
                error!(
                    failed = ?err.failed_tasks(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "graph failed"
                );
                Err(err)
            }
        }
    }
}

impl GraphRunner for Engine {
    fn run_graph(&self, graph: Arc<GraphNode>) -> BoxFuture<'_, Result<(), BuildError>> {
        Box::pin(async move { self.run(&graph).await.map(|_| ()) })
    }
}

fn eval<'a>(
    node: &'a GraphNode,
    ctx: &'a BuildContext,
) -> BoxFuture<'a, Result<Vec<TaskReport>, BuildError>> {
    Box::pin(async move {
        match node {
            GraphNode::Leaf(task) => Ok(vec![run_task(task, ctx).await?]),
            GraphNode::Sequence(children) => {
                let mut reports = Vec::new();
                for child in children {
                    reports.extend(eval(child, ctx).await?);
                }
                Ok(reports)
            }
            GraphNode::Parallel(children) => {
                let results = join_all(children.iter().map(|child| eval(child, ctx))).await;

                let mut reports = Vec::new();
                let mut failures = Vec::new();
                for result in results {
                    match result {
                        Ok(r) => reports.extend(r),
                        Err(e) => failures.push(e),
                    }
                }

                if failures.is_empty() {
                    Ok(reports)
                } else {
                    Err(BuildError::Parallel {
                        total: children.len(),
                        failures,
                    })
                }
            }
        }
    })
}
