// src/transform/svg.rs

//! SVG optimization and sprite building on top of `roxmltree`.
//!
//! The optimizer parses each document and re-serializes it without the
//! parts browsers never look at: comments, processing instructions, the
//! doctype, `<metadata>`, editor namespaces and whitespace-only text.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use roxmltree::{Document, Node, ParsingOptions};

use super::{map_blocking, Artifact, Transform, TransformFuture};
use crate::types::TransformKind;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespaces written by drawing tools (Inkscape, Sodipodi, RDF metadata).
const EDITOR_NAMESPACES: &[&str] = &[
    "http://www.inkscape.org/namespaces/inkscape",
    "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd",
    "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
    "http://creativecommons.org/ns#",
    "http://web.resource.org/cc/",
    "http://purl.org/dc/elements/1.1/",
];

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const SVG11_DOCTYPE: &str = "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n";

/// Per-file optimization.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorOptimize;

impl Transform for VectorOptimize {
    fn kind(&self) -> TransformKind {
        TransformKind::VectorOptimize
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        Box::pin(map_blocking(inputs, |artifact| {
            let text = artifact.text()?;
            let doc = parse(text)
                .with_context(|| format!("parsing {}", artifact.relative.display()))?;
            let mut out = String::with_capacity(text.len());
            write_node(doc.root_element(), &Scope::default(), &mut out);
            Ok(artifact.with_contents(out.into_bytes()))
        }))
    }
}

/// Combine every input into one `<symbol>` sprite.
#[derive(Debug, Clone)]
pub struct VectorSprite {
    inline: bool,
    filename: String,
}

impl VectorSprite {
    pub fn new(inline: bool, filename: String) -> Self {
        Self { inline, filename }
    }

    fn build(&self, inputs: &[Artifact]) -> Result<String> {
        let mut symbols: BTreeMap<String, String> = BTreeMap::new();
        let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();

        for artifact in inputs {
            let id = artifact
                .relative
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .with_context(|| format!("{} has no file stem", artifact.relative.display()))?;

            if let Some(previous) = sources.get(&id) {
                bail!(
                    "duplicate sprite id {id:?} from {} and {}",
                    previous.display(),
                    artifact.relative.display()
                );
            }

            let text = artifact.text()?;
            let doc = parse(text)
                .with_context(|| format!("parsing {}", artifact.relative.display()))?;
            symbols.insert(id.clone(), symbol(&id, doc.root_element())?);
            sources.insert(id, artifact.relative.clone());
        }

        let mut out = String::new();
        if !self.inline {
            out.push_str(XML_DECLARATION);
            out.push_str(SVG11_DOCTYPE);
        }
        out.push_str(&format!("<svg xmlns=\"{SVG_NS}\" xmlns:xlink=\"{XLINK_NS}\">"));
        for body in symbols.values() {
            out.push_str(body);
        }
        out.push_str("</svg>");
        Ok(out)
    }
}

impl Transform for VectorSprite {
    fn kind(&self) -> TransformKind {
        TransformKind::VectorSprite
    }

    fn apply(&self, inputs: Vec<Artifact>) -> TransformFuture<'_> {
        Box::pin(async move {
            if inputs.is_empty() {
                return Ok(Vec::new());
            }
            let this = self.clone();
            let origin = inputs[0].origin.clone();
            let sprite = tokio::task::spawn_blocking(move || this.build(&inputs))
                .await
                .map_err(|e| anyhow::anyhow!("sprite worker panicked: {e}"))??;
            Ok(vec![Artifact::new(
                origin,
                PathBuf::from(&self.filename),
                sprite.into_bytes(),
            )])
        })
    }
}

fn parse(text: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(text, options)?)
}

fn symbol(id: &str, root: Node<'_, '_>) -> Result<String> {
    if root.tag_name().name() != "svg" {
        bail!("root element is <{}>, expected <svg>", root.tag_name().name());
    }

    let mut out = format!("<symbol id=\"{}\"", escape_attr(id));
    for name in ["viewBox", "preserveAspectRatio"] {
        if let Some(value) = root.attribute(name) {
            out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
        }
    }
    out.push('>');

    let scope = Scope(vec![
        (None, SVG_NS.to_string()),
        (Some("xlink".to_string()), XLINK_NS.to_string()),
    ]);
    for child in root.children() {
        write_node(child, &scope, &mut out);
    }
    out.push_str("</symbol>");
    Ok(out)
}

/// Namespace declarations already written by an ancestor.
#[derive(Debug, Clone, Default)]
struct Scope(Vec<(Option<String>, String)>);

impl Scope {
    fn declares(&self, prefix: Option<&str>, uri: &str) -> bool {
        self.0
            .iter()
            .any(|(p, u)| p.as_deref() == prefix && u == uri)
    }
}

fn is_editor_ns(uri: Option<&str>) -> bool {
    uri.is_some_and(|uri| EDITOR_NAMESPACES.contains(&uri))
}

fn keep_element(node: Node<'_, '_>) -> bool {
    let tag = node.tag_name();
    if is_editor_ns(tag.namespace()) {
        return false;
    }
    !(tag.name() == "metadata" && matches!(tag.namespace(), None | Some(SVG_NS)))
}

fn keep_node(node: Node<'_, '_>) -> bool {
    if node.is_element() {
        keep_element(node)
    } else if node.is_text() {
        node.text().is_some_and(|t| !t.trim().is_empty())
    } else {
        false
    }
}

fn qualified(node: Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    match namespace {
        None => local.to_string(),
        Some(XML_NS) => format!("xml:{local}"),
        Some(uri) => match node.lookup_prefix(uri) {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        },
    }
}

fn write_node(node: Node<'_, '_>, scope: &Scope, out: &mut String) {
    if !keep_node(node) {
        return;
    }
    if node.is_text() {
        if let Some(text) = node.text() {
            out.push_str(&escape_text(text));
        }
        return;
    }

    let tag = node.tag_name();
    let name = qualified(node, tag.namespace(), tag.name());
    out.push('<');
    out.push_str(&name);

    let mut inner = scope.clone();
    for ns in node.namespaces() {
        if ns.name() == Some("xml") || EDITOR_NAMESPACES.contains(&ns.uri()) {
            continue;
        }
        if inner.declares(ns.name(), ns.uri()) {
            continue;
        }
        match ns.name() {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape_attr(ns.uri()))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape_attr(ns.uri()))),
        }
        inner
            .0
            .push((ns.name().map(str::to_string), ns.uri().to_string()));
    }

    for attr in node.attributes() {
        if is_editor_ns(attr.namespace()) {
            continue;
        }
        let attr_name = qualified(node, attr.namespace(), attr.name());
        out.push_str(&format!(" {attr_name}=\"{}\"", escape_attr(attr.value())));
    }

    if !node.children().any(keep_node) {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in node.children() {
        write_node(child, &inner, out);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
