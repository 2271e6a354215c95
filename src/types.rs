use std::fmt;

use serde::Deserialize;

/// Canonical task name type used throughout the pipeline.
pub type TaskName = String;

/// Name of the built-in task that wipes the output root.
pub const CLEAN_TASK: &str = "clean";

/// Which root a task's `src` patterns are evaluated against.
///
/// - `Source` (default): the project's source tree (`source/`).
/// - `Output`: the build output (`build/`), for steps that post-process what
///   an earlier step in the same sequence produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceRoot {
    #[default]
    Source,
    Output,
}

/// Target format for `image-recompress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageTarget {
    /// Re-encode in the input's own format.
    #[default]
    Keep,
    /// Write a WebP sibling (`photo.jpg` -> `photo.webp`).
    Webp,
}

/// Shape of the input a transform expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// Exactly one aggregate entry file (e.g. `style.less` importing partials).
    Single,
    /// Any number of independent files.
    Many,
}

/// Every transform kind the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    StyleCompile,
    MarkupMinify,
    ScriptMinify,
    ImageRecompress,
    VectorOptimize,
    VectorSprite,
    PassthroughCopy,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::StyleCompile => "style-compile",
            TransformKind::MarkupMinify => "markup-minify",
            TransformKind::ScriptMinify => "script-minify",
            TransformKind::ImageRecompress => "image-recompress",
            TransformKind::VectorOptimize => "vector-optimize",
            TransformKind::VectorSprite => "vector-sprite",
            TransformKind::PassthroughCopy => "passthrough-copy",
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
