#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sitepipe::config::{load_builtin, ConfigFile};
use tempfile::TempDir;

use crate::builders::cat_style;

/// A scratch project directory with `source/` and `build/` under it.
pub struct SiteFixture {
    dir: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// The project layout the built-in pipeline expects, minus raster images.
    pub fn standard() -> Self {
        let site = Self::new();
        site.write_source(
            "index.html",
            "<!doctype html>\n<html>\n  <body>\n    <p>  Hello   world  </p>\n  </body>\n</html>\n",
        );
        site.write_source("about.html", "<html><body>\n\n<p>About</p>\n\n</body></html>\n");
        site.write_source(
            "less/style.less",
            "body {\n  color: #ff0000;\n  margin: 0px;\n}\n\n.box {\n  display: flex;\n}\n",
        );
        site.write_source(
            "js/scripts.js",
            "function greet(name) {\n  var message = 'hello ' + name;\n  return message;\n}\ngreet('x');\n",
        );
        site.write_source(
            "img/logo.svg",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 10 10\"><!-- c --><rect width=\"10\" height=\"10\"/></svg>",
        );
        site.write_source(
            "img/icons/arrow.svg",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 24 24\"><path d=\"M0 0L24 12L0 24z\"/></svg>",
        );
        site.write_source(
            "img/icons/close.svg",
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 16 16\"><path d=\"M0 0L16 16\"/></svg>",
        );
        site.write_source("fonts/body.woff2", [0u8, 1, 2, 3].as_slice());
        site.write_source("favicon.ico", [0u8, 0, 1, 0].as_slice());
        site
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("build")
    }

    pub fn write_source(&self, rel: &str, contents: impl AsRef<[u8]>) {
        write_file(&self.source().join(rel), contents.as_ref());
    }

    pub fn write_output(&self, rel: &str, contents: impl AsRef<[u8]>) {
        write_file(&self.output().join(rel), contents.as_ref());
    }

    pub fn remove_source(&self, rel: &str) {
        fs::remove_file(self.source().join(rel)).expect("remove source file");
    }

    pub fn read_output(&self, rel: &str) -> Option<Vec<u8>> {
        fs::read(self.output().join(rel)).ok()
    }

    /// Every file under `build/`, relative and sorted, with its contents.
    pub fn output_tree(&self) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        collect(&self.output(), &self.output(), &mut out);
        out.sort();
        out
    }
}

impl Default for SiteFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in pipeline with the LESS compiler swapped for `cat`, so the
/// style task runs without external tools.
pub fn builtin_with_cat_styles() -> ConfigFile {
    let mut cfg = load_builtin().expect("built-in config is valid");
    if let Some(styles) = cfg.task.get_mut("styles") {
        styles.transforms = vec![cat_style(Some("style.min.css"))];
    }
    cfg
}

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write fixture file");
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path
                .strip_prefix(root)
                .expect("path under root")
                .to_string_lossy()
                .replace('\\', "/");
            out.push((rel, fs::read(&path).expect("read output file")));
        }
    }
}
