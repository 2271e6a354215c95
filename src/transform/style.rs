// src/transform/style.rs

//! Stylesheet compilation.
//!
//! The preprocessor is an external command (LESS by default) whose stdout is
//! the compiled CSS. The CSS is then vendor-prefixed for the configured
//! browserslist targets and optionally minified with `lightningcss`, which
//! also emits the source map.
//!
//! The map is one level deep: it points from the emitted CSS back into the
//! compiler's CSS output, embedded as `sourcesContent`. Maps the compiler
//! itself might produce for the `.less` sources are not chained.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tokio::process::Command;
use tracing::debug;

use super::{Artifact, Transform, TransformFuture};
use crate::types::{InputShape, TransformKind};

pub const INPUT_PLACEHOLDER: &str = "{input}";

#[derive(Debug, Clone)]
pub struct StyleCompile {
    compiler: String,
    browsers: Option<Browsers>,
    minify: bool,
    rename: Option<String>,
    source_map: bool,
}

impl StyleCompile {
    pub fn new(
        compiler: String,
        targets: &str,
        minify: bool,
        rename: Option<String>,
        source_map: bool,
    ) -> Result<Self> {
        if compiler.trim().is_empty() {
            bail!("style-compile: compiler command is empty");
        }
        let browsers = Browsers::from_browserslist([targets])
            .map_err(|e| anyhow!("style-compile: invalid targets {targets:?}: {e}"))?;
        Ok(Self {
            compiler,
            browsers,
            minify,
            rename,
            source_map,
        })
    }

    fn targets(&self) -> Targets {
        self.browsers.map(Targets::from).unwrap_or_default()
    }

    async fn compile(&self, input: Artifact) -> Result<Vec<Artifact>> {
        let css = run_compiler(&self.compiler, &input.origin).await?;

        let relative = compiled_path(&input.relative, self.rename.as_deref());
        let name = file_name(&relative);

        let targets = self.targets();
        let minify = self.minify;
        let with_map = self.source_map;
        let (mut code, map) = tokio::task::spawn_blocking(move || {
            process_css(&css, &name, targets, minify, with_map)
        })
        .await
        .map_err(|e| anyhow!("style worker panicked: {e}"))??;

        let mut outputs = Vec::with_capacity(2);
        if let Some(map) = map {
            let map_name = format!("{}.map", file_name(&relative));
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&format!("/*# sourceMappingURL={map_name} */\n"));
            outputs.push(Artifact::new(
                input.origin.clone(),
                relative.with_file_name(&map_name),
                map.into_bytes(),
            ));
        }
        outputs.insert(0, Artifact::new(input.origin, relative, code.into_bytes()));
        Ok(outputs)
    }
}

impl Transform for StyleCompile {
    fn kind(&self) -> TransformKind {
        TransformKind::StyleCompile
    }

    fn input_shape(&self) -> InputShape {
        InputShape::Single
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        Box::pin(async move {
            let mut inputs = inputs.into_iter();
            let (Some(input), None) = (inputs.next(), inputs.next()) else {
                bail!("style-compile expects exactly one entry stylesheet");
            };
            self.compile(input).await
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Quote a path for `sh -c`.
fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Expand the compiler command for `input` and run it; stdout is the CSS.
async fn run_compiler(template: &str, input: &Path) -> Result<String> {
    // The compiler runs inside the entry's directory so relative imports
    // resolve, which means the path handed to it must be absolute.
    let input = &std::path::absolute(input)
        .with_context(|| format!("resolving style entry {input:?}"))?;
    let command_line = if template.contains(INPUT_PLACEHOLDER) {
        template.replace(INPUT_PLACEHOLDER, &shell_quote(input))
    } else {
        format!("{template} {}", shell_quote(input))
    };

    debug!(cmd = %command_line, "running style compiler");

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = input.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    let output = cmd
        .output()
        .await
        .with_context(|| format!("spawning style compiler `{command_line}`"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "style compiler exited with {} for {:?}: {}",
            output.status,
            input,
            stderr.trim()
        );
    }

    String::from_utf8(output.stdout).context("style compiler produced non UTF-8 output")
}

/// Prefix/minify `css` and optionally produce a JSON source map whose only
/// source is `css` itself, listed under `filename`.
fn process_css(
    css: &str,
    filename: &str,
    targets: Targets,
    minify: bool,
    with_map: bool,
) -> Result<(String, Option<String>)> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("parsing compiled CSS: {e}"))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("optimizing CSS: {e}"))?;

    let mut source_map = if with_map {
        let mut map = SourceMap::new("/");
        map.add_source(filename);
        map.set_source_content(0, css)
            .map_err(|e| anyhow!("source map: {e:?}"))?;
        Some(map)
    } else {
        None
    };

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            source_map: source_map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("printing CSS: {e}"))?;

    let map_json = match source_map.as_mut() {
        Some(map) => Some(
            map.to_json(None)
                .map_err(|e| anyhow!("serializing source map: {e:?}"))?,
        ),
        None => None,
    };

    Ok((printed.code, map_json))
}

/// Destination-relative path of the compiled stylesheet for `relative`.
pub fn compiled_path(relative: &Path, rename: Option<&str>) -> PathBuf {
    match rename {
        Some(name) => relative.with_file_name(name),
        None => super::with_extension(relative, "css"),
    }
}
