// src/transform/mod.rs

//! File transforms.
//!
//! A transform turns a batch of in-memory [`Artifact`]s into a new batch.
//! Transforms never touch the output directory: the task runner writes the
//! final batch only after every transform of the task succeeded, so a
//! rejected input leaves no partial output behind.
//!
//! - [`style`]: external preprocessor + `lightningcss` prefixing/minification.
//! - [`markup`]: `minify-html`.
//! - [`script`]: `minify-js`.
//! - [`image`]: `image` re-encoding (same format or WebP).
//! - [`svg`]: `roxmltree`-based optimizer and symbol sprite builder.
//! - [`copy`]: identity, for plain relocation.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Result;

use crate::config::model::TransformConfig;
use crate::types::{InputShape, TransformKind};

pub mod copy;
pub mod image;
pub mod markup;
pub mod script;
pub mod style;
pub mod svg;

/// A file travelling through a task's transform chain.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File the artifact was read from. Kept through renames so transforms
    /// that need the original location (the style compiler resolves imports
    /// relative to it) can find it.
    pub origin: PathBuf,
    /// Destination-relative path.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("origin", &self.origin)
            .field("relative", &self.relative)
            .field("len", &self.contents.len())
            .finish()
    }
}

impl Artifact {
    pub fn new(origin: impl Into<PathBuf>, relative: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            relative: relative.into(),
            contents,
        }
    }

    /// Same artifact with new contents.
    pub fn with_contents(&self, contents: Vec<u8>) -> Self {
        Self {
            origin: self.origin.clone(),
            relative: self.relative.clone(),
            contents,
        }
    }

    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| anyhow::anyhow!("{:?} is not valid UTF-8: {e}", self.relative))
    }
}

pub type TransformFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Artifact>>> + Send + 'a>>;

/// A stateless "artifacts in, artifacts out" step.
pub trait Transform: Send + Sync + fmt::Debug {
    fn kind(&self) -> TransformKind;

    /// What the transform expects as input. The task runner checks this
    /// before calling [`Transform::apply`].
    fn input_shape(&self) -> InputShape {
        InputShape::Many
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_>;
}

/// Instantiate the transform described by a config entry.
pub fn from_config(cfg: &TransformConfig) -> Result<Box<dyn Transform>> {
    let transform: Box<dyn Transform> = match cfg {
        TransformConfig::StyleCompile {
            compiler,
            targets,
            minify,
            rename,
            source_map,
        } => Box::new(style::StyleCompile::new(
            compiler.clone(),
            targets,
            *minify,
            rename.clone(),
            *source_map,
        )?),
        TransformConfig::MarkupMinify {
            collapse_whitespace,
        } => Box::new(markup::MarkupMinify::new(*collapse_whitespace)),
        TransformConfig::ScriptMinify => Box::new(script::ScriptMinify),
        TransformConfig::ImageRecompress { format, quality } => {
            Box::new(image::ImageRecompress::new(*format, *quality))
        }
        TransformConfig::VectorOptimize => Box::new(svg::VectorOptimize),
        TransformConfig::VectorSprite { inline, filename } => {
            Box::new(svg::VectorSprite::new(*inline, filename.clone()))
        }
        TransformConfig::PassthroughCopy => Box::new(copy::PassthroughCopy),
    };
    Ok(transform)
}

/// Run CPU-bound work for a whole batch on the blocking pool.
pub(crate) async fn map_blocking<F>(inputs: Vec<Artifact>, f: F) -> Result<Vec<Artifact>>
where
    F: Fn(&Artifact) -> Result<Artifact> + Send + 'static,
{
    tokio::task::spawn_blocking(move || inputs.iter().map(&f).collect::<Result<Vec<_>>>())
        .await
        .map_err(|e| anyhow::anyhow!("transform worker panicked: {e}"))?
}

/// Replace the extension of a relative path.
pub(crate) fn with_extension(path: &std::path::Path, ext: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    out.set_extension(ext);
    out
}
