// src/graph/mod.rs

//! Task graphs: construction from config (`node.rs`) and execution
//! (`engine.rs`).

pub mod engine;
pub mod node;

pub use engine::{BuildSummary, Engine, GraphRunner};
pub use node::{GraphNode, Pipeline};
