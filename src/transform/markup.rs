use minify_html::{minify, Cfg};
use tracing::debug;

use super::{map_blocking, Artifact, Transform, TransformFuture};
use crate::types::TransformKind;

/// HTML minification via `minify-html`.
///
/// With `collapse_whitespace = false` markup is passed through untouched.
#[derive(Debug, Clone, Copy)]
pub struct MarkupMinify {
    collapse_whitespace: bool,
}

impl MarkupMinify {
    pub fn new(collapse_whitespace: bool) -> Self {
        Self {
            collapse_whitespace,
        }
    }
}

fn minify_cfg() -> Cfg {
    let mut cfg = Cfg::new();
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg
}

impl Transform for MarkupMinify {
    fn kind(&self) -> TransformKind {
        TransformKind::MarkupMinify
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        let collapse = self.collapse_whitespace;
        Box::pin(async move {
            if !collapse {
                debug!(files = inputs.len(), "markup-minify: whitespace collapsing off");
                return Ok(inputs);
            }
            map_blocking(inputs, |artifact| {
                let out = minify(&artifact.contents, &minify_cfg());
                Ok(artifact.with_contents(out))
            })
            .await
        })
    }
}
