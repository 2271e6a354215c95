// src/config/validate.rs

use std::path::{Component, Path};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, GraphExpr, RawConfigFile, TransformConfig};
use crate::errors::{Result, SitepipeError};
use crate::fileset::{build_globset, FileSelection};
use crate::types::CLEAN_TASK;

/// Graphs that wipe the output root first.
pub const ENTRY_GRAPHS: &[&str] = &["build", "dev"];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    validate_tasks(cfg)?;
    validate_graphs(cfg)?;
    validate_watch_rules(cfg)?;
    validate_graph_references(cfg)?;
    validate_entry_graphs(cfg)?;
    validate_clean_placement(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> SitepipeError {
    SitepipeError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(config_error("[config].queue_length must be >= 1 (got 0)"));
    }
    if cfg.config.source_dir == cfg.config.output_dir {
        return Err(config_error(format!(
            "[config].source_dir and output_dir are both {:?}",
            cfg.config.output_dir
        )));
    }
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.contains_key(CLEAN_TASK) || cfg.graph.contains_key(CLEAN_TASK) {
        return Err(config_error(format!(
            "'{CLEAN_TASK}' is built in and cannot be redefined"
        )));
    }
    if let Some(name) = cfg.task.keys().find(|name| cfg.graph.contains_key(*name)) {
        return Err(config_error(format!(
            "'{name}' is defined both as a task and as a graph"
        )));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in &cfg.task {
        if task.src.is_empty() {
            return Err(config_error(format!("task '{name}' has an empty `src`")));
        }
        if let Some(pattern) = task.src.iter().find(|p| !stays_inside_root(p)) {
            return Err(config_error(format!(
                "task '{name}': src pattern {pattern:?} must be relative and must not contain '..'"
            )));
        }
        if let Some(base) = task.base.as_deref().filter(|b| !stays_inside_root(b)) {
            return Err(config_error(format!(
                "task '{name}': base {base:?} must be relative and must not contain '..'"
            )));
        }
        if !stays_inside_root(&task.dest) {
            return Err(config_error(format!(
                "task '{name}': dest {:?} must stay inside the output root",
                task.dest
            )));
        }
        FileSelection::new(&task.src, &task.exclude, task.base.as_deref())
            .map_err(|e| config_error(format!("task '{name}': {e:#}")))?;

        for transform in &task.transforms {
            validate_transform(name, transform)?;
            crate::transform::from_config(transform)
                .map_err(|e| config_error(format!("task '{name}': {e:#}")))?;
        }
    }
    Ok(())
}

fn validate_transform(task: &str, transform: &TransformConfig) -> Result<()> {
    match transform {
        TransformConfig::ImageRecompress { quality, .. } if !(1..=100).contains(quality) => {
            Err(config_error(format!(
                "task '{task}': image quality must be within 1..=100 (got {quality})"
            )))
        }
        TransformConfig::VectorSprite { filename, .. } if filename.trim().is_empty() => Err(
            config_error(format!("task '{task}': sprite filename is empty")),
        ),
        TransformConfig::VectorSprite { filename, .. } if !stays_inside_root(filename) => {
            Err(config_error(format!(
                "task '{task}': sprite filename {filename:?} must stay inside the output root"
            )))
        }
        TransformConfig::StyleCompile {
            rename: Some(name), ..
        } if name.trim().is_empty() || name.contains('/') => Err(config_error(format!(
            "task '{task}': style rename must be a plain file name (got {name:?})"
        ))),
        _ => Ok(()),
    }
}

/// Relative, and no component climbs out of the directory it is joined to.
fn stays_inside_root(path: &str) -> bool {
    let path = Path::new(path);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate_graphs(cfg: &RawConfigFile) -> Result<()> {
    for (name, expr) in &cfg.graph {
        validate_expr(cfg, &format!("graph '{name}'"), expr)?;
    }
    Ok(())
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    for (idx, rule) in cfg.watch.iter().enumerate() {
        let label = format!("watch rule #{}", idx + 1);
        if rule.paths.is_empty() {
            return Err(config_error(format!("{label} has no `paths`")));
        }
        build_globset(&rule.paths).map_err(|e| config_error(format!("{label}: {e:#}")))?;
        validate_expr(cfg, &label, &rule.run)?;
    }
    Ok(())
}

fn validate_expr(cfg: &RawConfigFile, owner: &str, expr: &GraphExpr) -> Result<()> {
    match expr {
        GraphExpr::Ref(name) => {
            let known = name == CLEAN_TASK
                || cfg.task.contains_key(name)
                || cfg.graph.contains_key(name);
            if !known {
                return Err(SitepipeError::TaskNotFound(format!(
                    "{owner} refers to unknown task or graph '{name}'"
                )));
            }
            Ok(())
        }
        GraphExpr::Sequence { sequence: items } | GraphExpr::Parallel { parallel: items } => {
            if items.is_empty() {
                return Err(config_error(format!("{owner} contains an empty group")));
            }
            items
                .iter()
                .try_for_each(|item| validate_expr(cfg, owner, item))
        }
    }
}

fn validate_graph_references(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: referenced graph -> referencing graph.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.graph.keys() {
        graph.add_node(name.as_str());
    }

    for (name, expr) in &cfg.graph {
        for reference in expr.references() {
            if reference == name {
                return Err(SitepipeError::GraphCycle(format!(
                    "graph '{name}' refers to itself"
                )));
            }
            if cfg.graph.contains_key(reference) {
                graph.add_edge(reference, name.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SitepipeError::GraphCycle(format!(
            "cycle detected in graph references involving graph '{}'",
            cycle.node_id()
        ))),
    }
}

/// Name of the first task an expression executes, if that is deterministic.
///
/// Must only be called after reference validation (graph refs are followed).
pub fn first_step<'a>(cfg: &'a RawConfigFile, expr: &'a GraphExpr) -> Option<&'a str> {
    match expr {
        GraphExpr::Ref(name) => match cfg.graph.get(name) {
            Some(inner) => first_step(cfg, inner),
            None => Some(name.as_str()),
        },
        GraphExpr::Sequence { sequence } => sequence.first().and_then(|e| first_step(cfg, e)),
        GraphExpr::Parallel { parallel } if parallel.len() == 1 => first_step(cfg, &parallel[0]),
        GraphExpr::Parallel { .. } => None,
    }
}

fn validate_entry_graphs(cfg: &RawConfigFile) -> Result<()> {
    for entry in ENTRY_GRAPHS {
        let Some(expr) = cfg.graph.get(*entry) else {
            continue;
        };
        if first_step(cfg, expr) != Some(CLEAN_TASK) {
            return Err(config_error(format!(
                "graph '{entry}' must start with '{CLEAN_TASK}'"
            )));
        }
    }
    Ok(())
}

/// `clean` may only be the deterministic first step of whatever runs it:
/// never after another step, never beside one in a parallel group.
fn validate_clean_placement(cfg: &RawConfigFile) -> Result<()> {
    for (name, expr) in &cfg.graph {
        check_clean_placement(cfg, &format!("graph '{name}'"), expr, true)?;
    }
    for (idx, rule) in cfg.watch.iter().enumerate() {
        check_clean_placement(cfg, &format!("watch rule #{}", idx + 1), &rule.run, true)?;
    }
    Ok(())
}

// Graph refs are followed; cycles were rejected earlier.
fn check_clean_placement(
    cfg: &RawConfigFile,
    owner: &str,
    expr: &GraphExpr,
    runs_first: bool,
) -> Result<()> {
    match expr {
        GraphExpr::Ref(name) if name == CLEAN_TASK => {
            if runs_first {
                Ok(())
            } else {
                Err(config_error(format!(
                    "{owner} runs '{CLEAN_TASK}' after or alongside other steps; it may only run first"
                )))
            }
        }
        GraphExpr::Ref(name) => match cfg.graph.get(name) {
            Some(inner) => check_clean_placement(cfg, owner, inner, runs_first),
            None => Ok(()),
        },
        GraphExpr::Sequence { sequence } => {
            sequence.iter().enumerate().try_for_each(|(idx, item)| {
                check_clean_placement(cfg, owner, item, runs_first && idx == 0)
            })
        }
        GraphExpr::Parallel { parallel } => {
            let alone = parallel.len() == 1;
            parallel
                .iter()
                .try_for_each(|item| check_clean_placement(cfg, owner, item, runs_first && alone))
        }
    }
}
