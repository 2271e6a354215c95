// src/watch/rules.rs

use std::fmt;
use std::sync::Arc;

use globset::GlobSet;

use crate::config::model::ConfigFile;
use crate::errors::Result;
use crate::fileset::build_globset;
use crate::graph::{GraphNode, Pipeline};

use super::RuleId;

/// A compiled `[[watch]]` entry.
#[derive(Clone)]
pub struct WatchRule {
    pub id: RuleId,
    /// Patterns as written, for logs and `sitepipe graph`.
    pub patterns: Vec<String>,
    paths: GlobSet,
    pub graph: Arc<GraphNode>,
    pub reload: bool,
    pub use_hash: bool,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("id", &self.id)
            .field("patterns", &self.patterns)
            .field("graph", &self.graph.to_string())
            .field("reload", &self.reload)
            .field("use_hash", &self.use_hash)
            .finish()
    }
}

impl WatchRule {
    pub fn new(
        id: RuleId,
        patterns: Vec<String>,
        graph: Arc<GraphNode>,
        reload: bool,
        use_hash: bool,
    ) -> Result<Self> {
        let paths = build_globset(&patterns)?;
        Ok(Self {
            id,
            patterns,
            paths,
            graph,
            reload,
            use_hash,
        })
    }

    /// `rel_path` is relative to the source root, with `/` separators.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.paths.is_match(rel_path)
    }
}

/// Compile every `[[watch]]` entry against the instantiated pipeline.
pub fn compile_rules(cfg: &ConfigFile, pipeline: &Pipeline) -> Result<Vec<WatchRule>> {
    cfg.watch
        .iter()
        .enumerate()
        .map(|(id, rule)| {
            let graph = Arc::new(pipeline.build(cfg, &rule.run)?);
            WatchRule::new(id, rule.paths.clone(), graph, rule.reload, rule.use_hash)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_builtin;

    #[test]
    fn builtin_rules_bind_sources_to_their_tasks() {
        let cfg = load_builtin().unwrap();
        let pipeline = Pipeline::from_config(&cfg).unwrap();
        let rules = compile_rules(&cfg, &pipeline).unwrap();

        let hits = |rel: &str| -> Vec<String> {
            rules
                .iter()
                .filter(|r| r.matches(rel))
                .map(|r| r.graph.to_string())
                .collect()
        };

        assert_eq!(hits("less/blocks/header.less"), vec!["styles"]);
        assert_eq!(hits("js/scripts.js"), vec!["scripts"]);
        assert!(hits("js/vendor.js").is_empty());
        assert_eq!(hits("index.html"), vec!["html"]);
        assert!(hits("pages/index.html").is_empty());
        assert!(rules[2].reload && !rules[0].reload);
    }
}
