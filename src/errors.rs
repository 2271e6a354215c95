// src/errors.rs

//! Crate-wide error types.
//!
//! - [`SitepipeError`] covers everything that can go wrong *before* a build
//!   starts: reading and validating the config, resolving targets.
//! - [`BuildError`] covers graph execution and is what the engine, the CLI
//!   and the watch runtime pass around.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{TaskName, TransformKind};

#[derive(Error, Debug)]
pub enum SitepipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown task or graph: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in graph references: {0}")]
    GraphCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SitepipeError>;

/// Failure of a graph invocation.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A codec/compiler rejected its input.
    #[error("task '{task}': {transform} failed: {source:#}")]
    Transform {
        task: TaskName,
        transform: TransformKind,
        #[source]
        source: anyhow::Error,
    },

    /// Missing source path, unreadable file, permission denial on write.
    #[error("task '{task}': filesystem error: {source:#}")]
    Filesystem {
        task: TaskName,
        #[source]
        source: anyhow::Error,
    },

    /// Wiping the output root failed. Nothing else may run after this.
    #[error("clean of {path:?} failed: {source:#}")]
    Clean {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Two different tasks tried to write the same output path in one build.
    #[error("task '{task}' would overwrite {path:?}, already written by task '{owner}'")]
    OutputConflict {
        task: TaskName,
        owner: TaskName,
        path: PathBuf,
    },

    /// One or more children of a parallel group failed. All children were
    /// awaited before this was reported.
    #[error("{} of {total} parallel steps failed; first: {}", .failures.len(), first_cause(.failures))]
    Parallel {
        total: usize,
        failures: Vec<BuildError>,
    },
}

impl BuildError {
    /// Clean failures abort the whole build.
    pub fn is_fatal(&self) -> bool {
        match self {
            BuildError::Clean { .. } => true,
            BuildError::Parallel { failures, .. } => failures.iter().any(BuildError::is_fatal),
            _ => false,
        }
    }

    /// Names of all tasks that failed, flattened through parallel groups.
    pub fn failed_tasks(&self) -> Vec<&str> {
        match self {
            BuildError::Transform { task, .. }
            | BuildError::Filesystem { task, .. }
            | BuildError::OutputConflict { task, .. } => vec![task.as_str()],
            BuildError::Clean { .. } => vec![crate::types::CLEAN_TASK],
            BuildError::Parallel { failures, .. } => {
                failures.iter().flat_map(BuildError::failed_tasks).collect()
            }
        }
    }
}

fn first_cause(failures: &[BuildError]) -> String {
    failures
        .first()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "none".to_string())
}
