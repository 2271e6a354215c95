#![allow(dead_code)]

use std::collections::BTreeMap;

use sitepipe::config::{
    ConfigFile, ConfigSection, GraphExpr, RawConfigFile, ServerSection, TaskConfig,
    TransformConfig, WatchConfig,
};
use sitepipe::errors::Result;
use sitepipe::types::SourceRoot;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                server: ServerSection::default(),
                task: BTreeMap::new(),
                graph: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_graph(mut self, name: &str, expr: GraphExpr) -> Self {
        self.config.graph.insert(name.to_string(), expr);
        self
    }

    pub fn with_watch(mut self, paths: &[&str], run: GraphExpr, reload: bool) -> Self {
        self.config.watch.push(WatchConfig {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            run,
            reload,
            use_hash: false,
        });
        self
    }

    pub fn queue_length(mut self, n: usize) -> Self {
        self.config.config.queue_length = n;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(src: &str) -> Self {
        Self {
            task: TaskConfig {
                src: vec![src.to_string()],
                exclude: Vec::new(),
                base: None,
                from: SourceRoot::Source,
                dest: String::new(),
                transforms: Vec::new(),
            },
        }
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.task.base = Some(base.to_string());
        self
    }

    pub fn from_output(mut self) -> Self {
        self.task.from = SourceRoot::Output;
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = dest.to_string();
        self
    }

    pub fn transform(mut self, transform: TransformConfig) -> Self {
        self.task.transforms.push(transform);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// `"name"` as a graph reference.
pub fn node(name: &str) -> GraphExpr {
    GraphExpr::Ref(name.to_string())
}

pub fn seq(names: &[&str]) -> GraphExpr {
    GraphExpr::Sequence {
        sequence: names.iter().map(|n| node(n)).collect(),
    }
}

pub fn par(names: &[&str]) -> GraphExpr {
    GraphExpr::Parallel {
        parallel: names.iter().map(|n| node(n)).collect(),
    }
}

/// A `style-compile` step that runs `cat` instead of a real preprocessor.
pub fn cat_style(rename: Option<&str>) -> TransformConfig {
    TransformConfig::StyleCompile {
        compiler: "cat {input}".to_string(),
        targets: "defaults".to_string(),
        minify: true,
        rename: rename.map(str::to_string),
        source_map: true,
    }
}
