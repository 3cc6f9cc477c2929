//! Workflow execution runtime
//!
//! This crate provides the graph view, the static validator, the node
//! registry and the wavefront orchestrator that runs workflow documents.

mod executor;
pub mod graph;
mod registry;
mod runtime;
pub mod validation;

pub use executor::{ExecutionResult, WorkflowExecutor};
pub use graph::WorkflowGraph;
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry};
pub use runtime::{Engine, EngineConfig};
pub use validation::validate;
