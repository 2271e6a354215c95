use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::BuildError;
use crate::types::TaskName;

/// Which task wrote which output path during one graph invocation.
#[derive(Debug, Default)]
pub struct OutputLedger {
    claims: Mutex<HashMap<PathBuf, TaskName>>,
}

impl OutputLedger {
    /// Record that `task` writes `path`. A task may rewrite its own outputs;
    /// a path already claimed by another task is a conflict.
    pub fn claim(&self, task: &str, path: &Path) -> Result<(), BuildError> {
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        match claims.get(path) {
            Some(owner) if owner != task => Err(BuildError::OutputConflict {
                task: task.to_string(),
                owner: owner.clone(),
                path: path.to_path_buf(),
            }),
            Some(_) => Ok(()),
            None => {
                claims.insert(path.to_path_buf(), task.to_string());
                Ok(())
            }
        }
    }

    pub fn clear(&self) {
        self.claims.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.claims.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
