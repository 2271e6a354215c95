use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::debug;

use super::{map_blocking, with_extension, Artifact, Transform, TransformFuture};
use crate::types::{ImageTarget, TransformKind};

/// Raster image optimization.
///
/// `keep`: JPEG is re-encoded at `quality`, PNG with the best deflate level;
/// whichever of the original and re-encoded bytes is smaller wins. Other
/// formats are copied through.
///
/// `webp`: every input is decoded and written as a lossless WebP with the
/// same stem.
#[derive(Debug, Clone, Copy)]
pub struct ImageRecompress {
    target: ImageTarget,
    quality: u8,
}

impl ImageRecompress {
    pub fn new(target: ImageTarget, quality: u8) -> Self {
        Self {
            target,
            quality: quality.clamp(1, 100),
        }
    }
}

impl Transform for ImageRecompress {
    fn kind(&self) -> TransformKind {
        TransformKind::ImageRecompress
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        let target = self.target;
        let quality = self.quality;
        Box::pin(map_blocking(inputs, move |artifact| match target {
            ImageTarget::Keep => recompress(artifact, quality),
            ImageTarget::Webp => to_webp(artifact),
        }))
    }
}

fn decode(artifact: &Artifact) -> Result<(ImageFormat, DynamicImage)> {
    let reader = ImageReader::new(Cursor::new(&artifact.contents))
        .with_guessed_format()
        .context("reading image header")?;
    let format = reader
        .format()
        .ok_or_else(|| anyhow!("{}: unrecognized image format", artifact.relative.display()))?;
    let image = reader
        .decode()
        .with_context(|| format!("decoding {}", artifact.relative.display()))?;
    Ok((format, image))
}

fn recompress(artifact: &Artifact, quality: u8) -> Result<Artifact> {
    let (format, image) = decode(artifact)?;

    let mut encoded = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, quality))
                .with_context(|| format!("encoding {}", artifact.relative.display()))?;
        }
        ImageFormat::Png => {
            image
                .write_with_encoder(PngEncoder::new_with_quality(
                    &mut encoded,
                    CompressionType::Best,
                    FilterType::Adaptive,
                ))
                .with_context(|| format!("encoding {}", artifact.relative.display()))?;
        }
        other => {
            debug!(file = %artifact.relative.display(), format = ?other, "image kept as is");
            return Ok(artifact.clone());
        }
    }

    if encoded.len() < artifact.contents.len() {
        debug!(
            file = %artifact.relative.display(),
            before = artifact.contents.len(),
            after = encoded.len(),
            "image recompressed"
        );
        Ok(artifact.with_contents(encoded))
    } else {
        Ok(artifact.clone())
    }
}

fn to_webp(artifact: &Artifact) -> Result<Artifact> {
    let (_, image) = decode(artifact)?;
    let rgba = DynamicImage::ImageRgba8(image.to_rgba8());

    let mut encoded = Vec::new();
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut encoded))
        .with_context(|| format!("encoding {} as webp", artifact.relative.display()))?;

    Ok(Artifact::new(
        artifact.origin.clone(),
        with_extension(&artifact.relative, "webp"),
        encoded,
    ))
}
