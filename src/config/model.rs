// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{ImageTarget, SourceRoot, TransformKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// source_dir = "source"
/// output_dir = "build"
///
/// [task.scripts]
/// src = ["js/*.js"]
/// dest = "js"
/// transforms = [{ kind = "script-minify" }]
///
/// [graph.build]
/// sequence = ["clean", "scripts"]
///
/// [[watch]]
/// paths = ["js/scripts.js"]
/// run = "scripts"
/// ```
///
/// This is the unvalidated form; see [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub server: ServerSection,

    /// Tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Graphs from `[graph.<name>]`, keyed by graph name.
    #[serde(default)]
    pub graph: BTreeMap<String, GraphExpr>,

    /// `[[watch]]` rules, in declaration order.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holding one means
/// every reference resolves and no graph refers to itself.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub server: ServerSection,
    pub task: BTreeMap<String, TaskConfig>,
    pub graph: BTreeMap<String, GraphExpr>,
    pub watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            task: raw.task,
            graph: raw.graph,
            watch: raw.watch,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root the tasks' `src` patterns are matched against.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Root every task writes into. `clean` removes it.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum number of runs a watch rule remembers while it is busy.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("source")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_queue_length() -> usize {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            queue_length: default_queue_length(),
        }
    }
}

/// `[server]` section for `sitepipe dev`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: true,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Include globs, relative to the task's root.
    pub src: Vec<String>,

    /// Exclude globs, applied to what `src` matched.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Overrides the directory output paths are made relative to.
    /// Without it every pattern uses its own static prefix.
    #[serde(default)]
    pub base: Option<String>,

    #[serde(default)]
    pub from: SourceRoot,

    /// Directory under the output root. Empty means the output root itself.
    #[serde(default)]
    pub dest: String,

    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

/// One entry of a task's `transforms` list, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformConfig {
    StyleCompile {
        /// Shell command printing CSS on stdout; `{input}` is replaced by
        /// the entry file.
        #[serde(default = "default_compiler")]
        compiler: String,
        /// Browserslist query for vendor prefixing.
        #[serde(default = "default_targets")]
        targets: String,
        #[serde(default = "default_true")]
        minify: bool,
        #[serde(default)]
        rename: Option<String>,
        #[serde(default = "default_true")]
        source_map: bool,
    },
    MarkupMinify {
        #[serde(default = "default_true")]
        collapse_whitespace: bool,
    },
    ScriptMinify,
    ImageRecompress {
        #[serde(default)]
        format: ImageTarget,
        #[serde(default = "default_quality")]
        quality: u8,
    },
    VectorOptimize,
    VectorSprite {
        #[serde(default = "default_true")]
        inline: bool,
        #[serde(default = "default_sprite_filename")]
        filename: String,
    },
    PassthroughCopy,
}

impl TransformConfig {
    pub fn kind(&self) -> TransformKind {
        match self {
            TransformConfig::StyleCompile { .. } => TransformKind::StyleCompile,
            TransformConfig::MarkupMinify { .. } => TransformKind::MarkupMinify,
            TransformConfig::ScriptMinify => TransformKind::ScriptMinify,
            TransformConfig::ImageRecompress { .. } => TransformKind::ImageRecompress,
            TransformConfig::VectorOptimize => TransformKind::VectorOptimize,
            TransformConfig::VectorSprite { .. } => TransformKind::VectorSprite,
            TransformConfig::PassthroughCopy => TransformKind::PassthroughCopy,
        }
    }
}

fn default_compiler() -> String {
    "lessc {input}".to_string()
}

fn default_targets() -> String {
    "defaults".to_string()
}

fn default_quality() -> u8 {
    80
}

fn default_sprite_filename() -> String {
    "sprite.svg".to_string()
}

/// A graph expression: a reference to a task/graph by name, or an inline
/// sequence or parallel group.
///
/// ```toml
/// [graph.assets]
/// parallel = ["styles", "html", { sequence = ["svg", "sprite"] }]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GraphExpr {
    Ref(String),
    Sequence { sequence: Vec<GraphExpr> },
    Parallel { parallel: Vec<GraphExpr> },
}

impl GraphExpr {
    /// Every name this expression refers to, depth first.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            GraphExpr::Ref(name) => out.push(name.as_str()),
            GraphExpr::Sequence { sequence: items } | GraphExpr::Parallel { parallel: items } => {
                for item in items {
                    item.collect_references(out);
                }
            }
        }
    }
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Globs relative to the source root.
    pub paths: Vec<String>,

    /// What to run when a matching file changes.
    pub run: GraphExpr,

    /// Broadcast a browser reload after a successful run.
    #[serde(default)]
    pub reload: bool,

    /// Ignore events whose file content did not change.
    #[serde(default)]
    pub use_hash: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_are_tagged_by_kind_with_defaults() {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [task.styles]
            src = ["less/style.less"]
            dest = "css"
            transforms = [
                { kind = "style-compile", rename = "style.min.css" },
                { kind = "image-recompress", format = "webp" },
                { kind = "script-minify" },
            ]
            "#,
        )
        .unwrap();

        let task = &raw.task["styles"];
        assert_eq!(task.from, SourceRoot::Source);
        assert_eq!(
            task.transforms[0],
            TransformConfig::StyleCompile {
                compiler: "lessc {input}".into(),
                targets: "defaults".into(),
                minify: true,
                rename: Some("style.min.css".into()),
                source_map: true,
            }
        );
        assert_eq!(
            task.transforms[1],
            TransformConfig::ImageRecompress {
                format: ImageTarget::Webp,
                quality: 80,
            }
        );
        assert_eq!(task.transforms[2], TransformConfig::ScriptMinify);
        assert_eq!(raw.config.queue_length, 1);
        assert_eq!(raw.server.port, 3000);
    }

    #[test]
    fn graph_expressions_nest() {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [graph.build]
            sequence = ["clean", { parallel = ["a", { sequence = ["b", "c"] }] }]

            [[watch]]
            paths = ["*.html"]
            run = "html"
            reload = true
            "#,
        )
        .unwrap();

        assert_eq!(raw.graph["build"].references(), vec!["clean", "a", "b", "c"]);
        assert_eq!(raw.watch[0].run, GraphExpr::Ref("html".into()));
        assert!(raw.watch[0].reload);
        assert!(!raw.watch[0].use_hash);
    }

    #[test]
    fn unknown_transform_kind_is_rejected() {
        let err = toml::from_str::<RawConfigFile>(
            r#"
            [task.x]
            src = ["*.txt"]
            transforms = [{ kind = "rot13" }]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("rot13"));
    }
}
