// src/watch/mod.rs

//! Watch rules and the dev-session event loop.
//!
//! - `rules.rs` compiles `[[watch]]` entries against the pipeline.
//! - `watcher.rs` and `event_handler.rs` turn `notify` events into
//!   [`WatchEvent::RuleTriggered`], optionally filtered by content hash
//!   (`hash.rs`).
//! - `core.rs` holds the per-rule state machine and `runtime.rs` the async
//!   shell that runs graphs and broadcasts reloads.

pub mod core;
pub mod event_handler;
pub mod hash;
pub mod rules;
pub mod runtime;
pub mod watcher;

pub use self::core::{WatchCommand, WatchCore, WatchOptions, WatchStep};
pub use hash::ContentFilter;
pub use rules::{compile_rules, WatchRule};
pub use runtime::WatchRuntime;
pub use watcher::{spawn_watcher, WatcherHandle};

/// Index of a rule in the config's `[[watch]]` list.
pub type RuleId = usize;

/// Everything the watch runtime reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A changed file matched rule `rule`. `path` is relative to the source
    /// root.
    RuleTriggered { rule: RuleId, path: String },
    /// A run of `rule` completed.
    RunFinished { rule: RuleId, ok: bool },
    ShutdownRequested,
}
