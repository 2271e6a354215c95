// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SitepipeError};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "Sitepipe.toml";

/// The pipeline used when no config file exists.
const BUILTIN_CONFIG: &str = include_str!("default.toml");

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        SitepipeError::ConfigError(format!("cannot read {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// The built-in pipeline, validated.
pub fn load_builtin() -> Result<ConfigFile> {
    let raw: RawConfigFile = toml::from_str(BUILTIN_CONFIG)?;
    ConfigFile::try_from(raw)
}

/// A loaded config together with the directory its relative paths are
/// resolved against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ConfigFile,
    /// Directory containing the config file, or the working directory for
    /// the built-in pipeline.
    pub project_root: PathBuf,
    /// `None` when the built-in pipeline is in use.
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    pub fn source_root(&self) -> PathBuf {
        self.project_root.join(&self.config.config.source_dir)
    }

    pub fn output_root(&self) -> PathBuf {
        self.project_root.join(&self.config.config.output_dir)
    }
}

/// Resolve the config to use.
///
/// - an explicit path must exist;
/// - otherwise `Sitepipe.toml` in `cwd` is used when present;
/// - otherwise the built-in pipeline, rooted at `cwd`.
pub fn resolve_config(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig> {
    let candidate = match explicit {
        Some(path) => Some(cwd.join(path)),
        None => {
            let path = cwd.join(DEFAULT_CONFIG_FILE);
            path.is_file().then_some(path)
        }
    };

    match candidate {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            let config = load_and_validate(&path)?;
            let project_root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.to_path_buf());
            Ok(LoadedConfig {
                config,
                project_root,
                path: Some(path),
            })
        }
        None => {
            debug!("no {DEFAULT_CONFIG_FILE} found, using built-in pipeline");
            Ok(LoadedConfig {
                config: load_builtin()?,
                project_root: cwd.to_path_buf(),
                path: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_pipeline_is_valid() {
        let cfg = load_builtin().unwrap();
        assert_eq!(cfg.task.len(), 9);
        assert!(cfg.graph.contains_key("build"));
        assert!(cfg.graph.contains_key("dev"));
        assert_eq!(cfg.watch.len(), 3);
        assert!(cfg.watch[2].reload);
    }

    #[test]
    fn falls_back_to_builtin_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = resolve_config(None, dir.path()).unwrap();
        assert!(loaded.path.is_none());
        assert_eq!(loaded.source_root(), dir.path().join("source"));
        assert_eq!(loaded.output_root(), dir.path().join("build"));
    }

    #[test]
    fn project_root_is_the_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("site");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("pipe.toml"),
            "[config]\nsource_dir = \"src\"\n\n[task.html]\nsrc = [\"*.html\"]\n",
        )
        .unwrap();

        let loaded = resolve_config(Some(Path::new("site/pipe.toml")), dir.path()).unwrap();
        assert_eq!(loaded.project_root, nested);
        assert_eq!(loaded.source_root(), nested.join("src"));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_config(Some(Path::new("nope.toml")), dir.path()).unwrap_err();
        assert!(matches!(err, SitepipeError::ConfigError(_)));
    }
}
