// src/fileset.rs

//! File selection: include globs, exclude globs and a base directory.
//!
//! A [`FileSelection`] is compiled once at startup and resolved into a
//! [`FileSet`] every time its task runs, so a selection never holds on to
//! paths that an earlier `clean` removed.
//!
//! Patterns are relative to a root directory and use `/` separators. `*`
//! does not cross directory boundaries; use `**` for that.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// One include pattern together with the directory its matches are
/// relativized against.
#[derive(Clone)]
struct IncludePattern {
    pattern: String,
    matcher: GlobMatcher,
    /// Static directory prefix of the pattern (`img` for `img/**/*.png`).
    base: PathBuf,
    literal: bool,
}

/// Compiled include/exclude patterns of a task.
#[derive(Clone)]
pub struct FileSelection {
    include: Vec<IncludePattern>,
    exclude: Option<GlobSet>,
    base_override: Option<PathBuf>,
}

impl fmt::Debug for FileSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<&str> = self.include.iter().map(|p| p.pattern.as_str()).collect();
        f.debug_struct("FileSelection")
            .field("include", &patterns)
            .field("base_override", &self.base_override)
            .finish_non_exhaustive()
    }
}

/// A file picked by a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path on the filesystem (`root` joined with the matched path).
    pub path: PathBuf,
    /// Path relative to the selection base; this is what lands under the
    /// task's destination.
    pub relative: PathBuf,
}

/// Ordered result of resolving a [`FileSelection`]. Sorted by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    entries: Vec<FileEntry>,
}

impl FileSet {
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }
}

impl FileSelection {
    /// Compile a selection.
    ///
    /// `base` overrides the per-pattern base; `"."` or `""` means the root
    /// itself (so `fonts/a.woff2` keeps its `fonts/` prefix).
    pub fn new(include: &[String], exclude: &[String], base: Option<&str>) -> Result<Self> {
        if include.is_empty() {
            bail!("a file selection needs at least one include pattern");
        }

        let include = include
            .iter()
            .map(|pat| compile_include(pat))
            .collect::<Result<Vec<_>>>()?;

        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        let base_override = base.map(normalize_base);

        Ok(Self {
            include,
            exclude,
            base_override,
        })
    }

    /// Walk `root` and collect every matching file.
    ///
    /// Includes are matched first; excludes are then applied to the matched
    /// set. A literal pattern (no glob characters) that matches nothing is an
    /// error, a glob matching nothing just contributes no files.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<FileSet> {
        let mut matched: BTreeMap<String, (PathBuf, &IncludePattern)> = BTreeMap::new();

        for include in &self.include {
            let start = if include.base.as_os_str().is_empty() {
                root.to_path_buf()
            } else {
                root.join(&include.base)
            };
            if !fs.is_dir(&start) {
                if include.literal {
                    bail!("source file not found: {:?}", root.join(&include.pattern));
                }
                continue;
            }

            let mut hits = 0usize;
            for path in walk_files(fs, &start)? {
                let Some(rel_str) = relative_slash_path(root, &path) else {
                    continue;
                };
                if include.matcher.is_match(&rel_str) {
                    hits += 1;
                    matched.entry(rel_str).or_insert((path, include));
                }
            }

            if include.literal && hits == 0 {
                bail!("source file not found: {:?}", root.join(&include.pattern));
            }
        }

        let mut entries = Vec::with_capacity(matched.len());
        for (rel_str, (path, include)) in matched {
            if let Some(exclude) = &self.exclude {
                if exclude.is_match(&rel_str) {
                    continue;
                }
            }

            let base = self.base_override.as_ref().unwrap_or(&include.base);
            let rel = Path::new(&rel_str);
            let relative = rel
                .strip_prefix(base)
                .with_context(|| format!("{rel_str} is not under base {:?}", base))?
                .to_path_buf();

            entries.push(FileEntry { path, relative });
        }

        entries.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(FileSet { entries })
    }
}

fn compile_include(pattern: &str) -> Result<IncludePattern> {
    let pattern = pattern.trim_start_matches("./");
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?
        .compile_matcher();
    let literal = !pattern.contains(GLOB_META);
    Ok(IncludePattern {
        pattern: pattern.to_string(),
        matcher,
        base: glob_base(pattern),
        literal,
    })
}

/// Static directory prefix of a pattern.
///
/// - `img/**/*.png` -> `img`
/// - `*.html` -> ``
/// - `less/style.less` -> `less` (a literal file's base is its directory)
pub fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
    let literal_prefix = parts
        .iter()
        .take_while(|part| !part.contains(GLOB_META))
        .count();

    let dirs = if literal_prefix == parts.len() {
        // Fully literal: the last component is the file itself.
        literal_prefix.saturating_sub(1)
    } else {
        literal_prefix
    };

    parts[..dirs]
        .iter()
        .filter(|p| **p != ".")
        .collect::<PathBuf>()
}

fn normalize_base(base: &str) -> PathBuf {
    Path::new(base)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat.trim_start_matches("./"))
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// All files under `dir`, depth first.
fn walk_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// `path` relative to `root` with forward slashes, or `None` if it is not
/// under `root`.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}
