use super::{Artifact, Transform, TransformFuture};
use crate::types::TransformKind;

/// Relocate files unchanged. Base-path handling happens in the file
/// selection, so there is nothing left to do here.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCopy;

impl Transform for PassthroughCopy {
    fn kind(&self) -> TransformKind {
        TransformKind::PassthroughCopy
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        Box::pin(async move { Ok(inputs) })
    }
}
