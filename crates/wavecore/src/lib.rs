//! Core abstractions for the wave workflow engine
//!
//! This crate provides the document model, the per-run variable store and
//! the traits that the runtime and the node library build on.

pub mod capability;
mod context;
mod error;
mod node;
mod outcome;
mod workflow;

pub use capability::{
    AgentService, Capabilities, CompletionRequest, HttpBody, HttpClient, HttpRequest, HttpResponse,
    LlmClient, ToolService,
};
pub use context::{display_value, ExecutionContext};
pub use error::{CapabilityError, EngineError, NodeError, WorkflowError};
pub use node::{NodeExecutor, NodeOutput};
pub use outcome::{NodeCompletionHandler, NodeOutcome, NodeStatus, RunId};
pub use workflow::{Edge, NodeSpec, NodeType, WorkflowDocument};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
