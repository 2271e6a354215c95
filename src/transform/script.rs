use anyhow::anyhow;
use minify_js::{minify, Session, TopLevelMode};

use super::{map_blocking, Artifact, Transform, TransformFuture};
use crate::types::TransformKind;

/// JavaScript minification via `minify-js`. A syntax error fails the task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptMinify;

fn minify_script(artifact: &Artifact) -> anyhow::Result<Artifact> {
    let session = Session::new();
    let mut out = Vec::with_capacity(artifact.contents.len());
    minify(&session, TopLevelMode::Global, &artifact.contents, &mut out)
        .map_err(|e| anyhow!("{}: {e:?}", artifact.relative.display()))?;
    Ok(artifact.with_contents(out))
}

impl Transform for ScriptMinify {
    fn kind(&self) -> TransformKind {
        TransformKind::ScriptMinify
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        Box::pin(map_blocking(inputs, minify_script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shrinks_valid_script() {
        let src = b"function greet(name) {\n    var message = 'hello ' + name;\n    return message;\n}\ngreet('x');\n";
        let input = Artifact::new("/s/js/scripts.js", "scripts.js", src.to_vec());

        let out = ScriptMinify.apply(vec![input]).await.unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].contents.len() < src.len());
    }

    #[tokio::test]
    async fn syntax_error_fails() {
        let input = Artifact::new("/s/js/bad.js", "bad.js", b"function (".to_vec());
        let err = ScriptMinify.apply(vec![input]).await.unwrap_err();
        assert!(err.to_string().contains("bad.js"));
    }
}
