// src/config/mod.rs

//! Configuration loading and validation for sitepipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to the built-in pipeline
//!   (`loader.rs`, `default.toml`).
//! - Validate references, graph cycles and entry graphs (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_builtin, load_from_path, resolve_config, LoadedConfig};
pub use model::{
    ConfigFile, ConfigSection, GraphExpr, RawConfigFile, ServerSection, TaskConfig,
    TransformConfig, WatchConfig,
};
