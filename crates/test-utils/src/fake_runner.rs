use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use sitepipe::errors::BuildError;
use sitepipe::graph::{GraphNode, GraphRunner};

/// One entry of the fake runner's log. Graphs are identified by their
/// `Display` form (`"styles"`, `"clean -> copy"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRecord {
    Started(String),
    Finished(String),
}

/// A fake `GraphRunner` that:
/// - records when each graph run starts and ends
/// - optionally sleeps to simulate work
/// - fails runs of graphs marked as failing.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    log: Arc<Mutex<Vec<RunRecord>>>,
    delay: Duration,
    failing: HashSet<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, graph: &str) -> Self {
        self.failing.insert(graph.to_string());
        self
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.log.lock().unwrap().clone()
    }

    /// How many runs of `graph` finished.
    pub fn finished(&self, graph: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| matches!(r, RunRecord::Finished(g) if g == graph))
            .count()
    }

    /// Highest number of simultaneously running invocations of `graph`.
    pub fn max_overlap(&self, graph: &str) -> usize {
        let mut current = 0usize;
        let mut max = 0usize;
        for record in self.records() {
            match record {
                RunRecord::Started(g) if g == graph => {
                    current += 1;
                    max = max.max(current);
                }
                RunRecord::Finished(g) if g == graph => current -= 1,
                _ => {}
            }
        }
        max
    }
}

impl GraphRunner for FakeRunner {
    fn run_graph(&self, graph: Arc<GraphNode>) -> BoxFuture<'_, Result<(), BuildError>> {
        Box::pin(async move {
            let name = graph.to_string();
            self.log.lock().unwrap().push(RunRecord::Started(name.clone()));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.log.lock().unwrap().push(RunRecord::Finished(name.clone()));

            if self.failing.contains(&name) {
                return Err(BuildError::Filesystem {
                    task: name,
                    source: anyhow::anyhow!("fake failure"),
                });
            }
            Ok(())
        })
    }
}
