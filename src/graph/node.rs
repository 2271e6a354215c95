// src/graph/node.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::model::{ConfigFile, GraphExpr};
use crate::errors::{Result, SitepipeError};
use crate::task::Task;
use crate::types::CLEAN_TASK;

/// Composition tree walked by the engine. Immutable once built.
#[derive(Debug, Clone)]
pub enum GraphNode {
    Leaf(Arc<Task>),
    /// Children run one after another; the first failure stops the rest.
    Sequence(Vec<GraphNode>),
    /// Children start together; the node completes when all have.
    Parallel(Vec<GraphNode>),
}

impl GraphNode {
    /// Task names in the order a sequential walk would reach them.
    pub fn task_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            GraphNode::Leaf(task) => out.push(task.name.as_str()),
            GraphNode::Sequence(children) | GraphNode::Parallel(children) => {
                for child in children {
                    child.collect_names(out);
                }
            }
        }
    }
}

/// Compact rendering: `clean -> copy -> (styles | html)`.
impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[GraphNode], sep: &str) -> fmt::Result {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                match child {
                    GraphNode::Leaf(_) => write!(f, "{child}")?,
                    _ if children.len() == 1 => write!(f, "{child}")?,
                    _ => write!(f, "({child})")?,
                }
            }
            Ok(())
        }

        match self {
            GraphNode::Leaf(task) => f.write_str(&task.name),
            GraphNode::Sequence(children) => join(f, children, " -> "),
            GraphNode::Parallel(children) => join(f, children, " | "),
        }
    }
}

/// Every task and graph of a config, instantiated.
#[derive(Debug)]
pub struct Pipeline {
    tasks: BTreeMap<String, Arc<Task>>,
    graphs: BTreeMap<String, Arc<GraphNode>>,
    clean: Arc<Task>,
}

impl Pipeline {
    /// Build tasks and resolve every graph expression.
    ///
    /// The config must have passed validation: references are assumed to
    /// resolve and graph references to be acyclic.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut tasks = BTreeMap::new();
        for (name, task_cfg) in &cfg.task {
            let task = Task::from_config(name, task_cfg)?;
            tasks.insert(name.clone(), Arc::new(task));
        }

        let mut pipeline = Self {
            tasks,
            graphs: BTreeMap::new(),
            clean: Arc::new(Task::clean()),
        };

        let mut graphs = BTreeMap::new();
        for (name, expr) in &cfg.graph {
            let node = pipeline.build(cfg, expr)?;
            graphs.insert(name.clone(), Arc::new(node));
        }
        pipeline.graphs = graphs;

        Ok(pipeline)
    }

    /// Turn a graph expression into a node, inlining referenced graphs.
    pub fn build(&self, cfg: &ConfigFile, expr: &GraphExpr) -> Result<GraphNode> {
        match expr {
            GraphExpr::Ref(name) => self.resolve_ref(cfg, name),
            GraphExpr::Sequence { sequence } => Ok(GraphNode::Sequence(
                sequence
                    .iter()
                    .map(|e| self.build(cfg, e))
                    .collect::<Result<_>>()?,
            )),
            GraphExpr::Parallel { parallel } => Ok(GraphNode::Parallel(
                parallel
                    .iter()
                    .map(|e| self.build(cfg, e))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    fn resolve_ref(&self, cfg: &ConfigFile, name: &str) -> Result<GraphNode> {
        if name == CLEAN_TASK {
            return Ok(GraphNode::Leaf(self.clean.clone()));
        }
        if let Some(task) = self.tasks.get(name) {
            return Ok(GraphNode::Leaf(task.clone()));
        }
        if let Some(node) = self.graphs.get(name) {
            return Ok(node.as_ref().clone());
        }
        match cfg.graph.get(name) {
            Some(expr) => self.build(cfg, expr),
            None => Err(SitepipeError::TaskNotFound(name.to_string())),
        }
    }

    /// Look up a runnable target: a graph, a task, or `clean`.
    pub fn target(&self, name: &str) -> Result<Arc<GraphNode>> {
        if let Some(graph) = self.graphs.get(name) {
            return Ok(graph.clone());
        }
        if name == CLEAN_TASK {
            return Ok(Arc::new(GraphNode::Leaf(self.clean.clone())));
        }
        self.tasks
            .get(name)
            .map(|task| Arc::new(GraphNode::Leaf(task.clone())))
            .ok_or_else(|| SitepipeError::TaskNotFound(name.to_string()))
    }

    pub fn graphs(&self) -> impl Iterator<Item = (&str, &Arc<GraphNode>)> {
        self.graphs.iter().map(|(name, node)| (name.as_str(), node))
    }
}
