use crate::{registry::NodeRegistry, validation, ExecutionResult, WorkflowExecutor};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use wavecore::{NodeCompletionHandler, Result, WorkflowDocument};

/// Entry point for validating and running workflow documents.
///
/// The registry is fixed at construction; every run gets its own context.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    executor: WorkflowExecutor,
}

impl Engine {
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: NodeRegistry, config: EngineConfig) -> Self {
        let registry = Arc::new(registry);
        let executor = WorkflowExecutor::new(registry.clone(), config);
        Self { registry, executor }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Structural errors of `document`; empty means it may run.
    pub fn validate(&self, document: &WorkflowDocument) -> Vec<String> {
        validation::validate(document)
    }

    pub async fn run(
        &self,
        document: &WorkflowDocument,
        inputs: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        self.executor.run(document, inputs).await
    }

    pub async fn run_with_handler(
        &self,
        document: &WorkflowDocument,
        inputs: Map<String, Value>,
        handler: &dyn NodeCompletionHandler,
    ) -> Result<ExecutionResult> {
        self.executor
            .run_with_handler(document, inputs, handler)
            .await
    }
}

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Applied to nodes without their own `timeout`.
    pub default_node_timeout: Duration,
    /// Refuse documents that fail validation.
    pub validate_before_run: bool,
}

impl EngineConfig {
    pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn with_default_node_timeout(mut self, timeout: Duration) -> Self {
        self.default_node_timeout = timeout;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_before_run = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_node_timeout: Self::DEFAULT_NODE_TIMEOUT,
            validate_before_run: true,
        }
    }
}
