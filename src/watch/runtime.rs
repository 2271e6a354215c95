// src/watch/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::graph::{GraphNode, GraphRunner};
use crate::server::ReloadHandle;

use super::core::{WatchCommand, WatchCore};
use super::rules::WatchRule;
use super::{RuleId, WatchEvent};

/// Drives [`WatchCore`] from a channel of [`WatchEvent`]s and hands graph
/// runs to a [`GraphRunner`].
///
/// Runs execute on their own Tokio tasks and report back through the same
/// channel as [`WatchEvent::RunFinished`], so a slow rule never blocks
/// triggers for the others.
pub struct WatchRuntime<R: GraphRunner> {
    core: WatchCore,
    event_rx: mpsc::Receiver<WatchEvent>,
    event_tx: mpsc::Sender<WatchEvent>,
    runner: Arc<R>,
    graphs: Vec<Arc<GraphNode>>,
    reload: Option<ReloadHandle>,
}

impl<R: GraphRunner> fmt::Debug for WatchRuntime<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .field("rules", &self.graphs.len())
            .finish_non_exhaustive()
    }
}

impl<R: GraphRunner> WatchRuntime<R> {
    /// `rules` must be indexed by their id, as produced by
    /// [`compile_rules`](super::rules::compile_rules).
    pub fn new(
        core: WatchCore,
        rules: &[WatchRule],
        runner: Arc<R>,
        reload: Option<ReloadHandle>,
        event_tx: mpsc::Sender<WatchEvent>,
        event_rx: mpsc::Receiver<WatchEvent>,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            runner,
            graphs: rules.iter().map(|rule| rule.graph.clone()).collect(),
            reload,
        }
    }

    /// Main event loop. Returns on shutdown, or when idle if the core was
    /// built with `exit_when_idle`.
    pub async fn run(mut self) {
        info!(rules = self.graphs.len(), "watch runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "watch runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute(command);
            }

            if !step.keep_running {
                break;
            }
        }

        info!("watch runtime exiting");
    }

    fn execute(&self, command: WatchCommand) {
        match command {
            WatchCommand::StartRun { rule } => self.start_run(rule),
            WatchCommand::Reload => match &self.reload {
                Some(handle) => {
                    handle.reload();
                }
                None => debug!("reload requested without a dev server"),
            },
        }
    }

    fn start_run(&self, rule: RuleId) {
        let Some(graph) = self.graphs.get(rule).cloned() else {
            error!(rule, "no graph for watch rule");
            return;
        };
        let runner = Arc::clone(&self.runner);
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            debug!(rule, graph = %graph, "watch run starting");
            let ok = match runner.run_graph(graph).await {
                Ok(()) => true,
                Err(err) => {
                    error!(rule, error = %err, "watch run failed; still watching");
                    false
                }
            };
            let _ = tx.send(WatchEvent::RunFinished { rule, ok }).await;
        });
    }
}
