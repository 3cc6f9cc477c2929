use thiserror::Error;

/// Errors that stop a run before any node executes.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Failure of a single node attempt. Isolated to that node's branch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Node {node_id} execution timed out after {seconds}s")]
    Timeout { node_id: String, seconds: f64 },
}

impl NodeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, NodeError::Timeout { .. })
    }
}

/// Errors raised by the injected external capabilities.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    #[error("LLM provider error: {0}")]
    Llm(String),

    #[error("HTTP call failed: {0}")]
    Http(String),

    #[error("Agent service error: {0}")]
    Agent(String),

    #[error("Tool service error: {0}")]
    Tool(String),

    #[error("Capability not configured: {0}")]
    NotConfigured(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Invalid workflow: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Start node not found")]
    StartNodeNotFound,
}
