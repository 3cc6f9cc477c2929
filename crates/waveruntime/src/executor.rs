use crate::graph::WorkflowGraph;
use crate::registry::NodeRegistry;
use crate::runtime::EngineConfig;
use crate::validation;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use wavecore::{
    ExecutionContext, NodeCompletionHandler, NodeOutcome, NodeSpec, NodeStatus, NodeType, Result,
    RunId, WorkflowDocument, WorkflowError,
};

/// Drives a workflow document from its start node, one wavefront at a time.
///
/// Nodes inside a wavefront run one after another. A failing node ends its
/// own branch only; the rest of the wavefront carries on.
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
    config: EngineConfig,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(
        &self,
        document: &WorkflowDocument,
        inputs: Map<String, Value>,
    ) -> Result<ExecutionResult> {
        self.execute(document, inputs, None).await
    }

    /// Like [`run`](Self::run), awaiting `handler` after every attempted node.
    pub async fn run_with_handler(
        &self,
        document: &WorkflowDocument,
        inputs: Map<String, Value>,
        handler: &dyn NodeCompletionHandler,
    ) -> Result<ExecutionResult> {
        self.execute(document, inputs, Some(handler)).await
    }

    async fn execute(
        &self,
        document: &WorkflowDocument,
        inputs: Map<String, Value>,
        handler: Option<&dyn NodeCompletionHandler>,
    ) -> Result<ExecutionResult> {
        if self.config.validate_before_run {
            let errors = validation::validate(document);
            if !errors.is_empty() {
                return Err(WorkflowError::Invalid(errors).into());
            }
        }

        let start = document
            .start_node()
            .ok_or(WorkflowError::StartNodeNotFound)?;

        let mut ctx = ExecutionContext::new();
        for (name, value) in inputs {
            ctx.set(start.reference_key(), &name, value);
        }

        let run_id = RunId::new_v4();
        let span = tracing::info_span!("workflow_run", %run_id);
        self.execute_waves(document, start, ctx, run_id, handler)
            .instrument(span)
            .await
    }

    async fn execute_waves(
        &self,
        document: &WorkflowDocument,
        start: &NodeSpec,
        mut ctx: ExecutionContext,
        run_id: RunId,
        handler: Option<&dyn NodeCompletionHandler>,
    ) -> Result<ExecutionResult> {
        let started = Instant::now();
        tracing::info!("Starting workflow run with {} nodes", document.nodes.len());

        let graph = WorkflowGraph::new(document);
        let mut executed: HashSet<&str> = HashSet::new();
        let mut wavefront: Vec<&str> = vec![start.id.as_str()];
        let mut result = ExecutionResult::new(run_id);

        while !wavefront.is_empty() {
            let mut successors = Vec::new();

            for node_id in wavefront {
                if executed.contains(node_id) {
                    continue;
                }
                let Some(node) = graph.node(node_id) else {
                    continue;
                };
                executed.insert(node_id);

                let Some(created) = self.registry.create(node) else {
                    tracing::warn!(
                        "No executor registered for node type '{}', skipping node {}",
                        node.node_type,
                        node_id
                    );
                    result.skipped_nodes += 1;
                    successors.extend(graph.next_nodes(node_id, None));
                    continue;
                };

                let attempt_start = Instant::now();
                let input = ctx.resolve_deep(&Value::Object(node.data.clone()));
                let timeout = node.timeout().unwrap_or(self.config.default_node_timeout);

                let attempt = match created {
                    Ok(executor) => executor.execute_with_timeout(&ctx, timeout).await,
                    Err(e) => Err(e),
                };
                let duration_ms = attempt_start.elapsed().as_millis() as u64;

                let outcome = match attempt {
                    Ok(output) => {
                        tracing::info!("Node {} ({}) completed in {}ms", node_id, node.node_type, duration_ms);
                        ctx.set_outputs(node.reference_key(), &output.outputs);
                        if node.node_type == NodeType::End {
                            result.output = output.get("result").filter(|v| !v.is_null()).cloned();
                        }
                        successors.extend(graph.next_nodes(node_id, output.handle.as_deref()));
                        result.completed_nodes += 1;
                        NodeOutcome {
                            run_id,
                            node_id: node_id.to_string(),
                            node_type: node.node_type.clone(),
                            status: NodeStatus::Completed,
                            input,
                            output: output.outputs,
                            error: None,
                            duration_ms,
                            finished_at: Utc::now(),
                        }
                    }
                    Err(e) => {
                        tracing::error!("Node {} ({}) failed: {}", node_id, node.node_type, e);
                        result.failed_nodes += 1;
                        NodeOutcome {
                            run_id,
                            node_id: node_id.to_string(),
                            node_type: node.node_type.clone(),
                            status: NodeStatus::Failed,
                            input,
                            output: Map::new(),
                            error: Some(e.to_string()),
                            duration_ms,
                            finished_at: Utc::now(),
                        }
                    }
                };

                if let Some(handler) = handler {
                    handler.on_node_complete(&outcome).await;
                }
            }

            let mut seen = HashSet::new();
            wavefront = successors
                .into_iter()
                .filter(|id| seen.insert(*id))
                .collect();
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Workflow run finished in {}ms: {} completed, {} failed, {} skipped",
            result.duration_ms,
            result.completed_nodes,
            result.failed_nodes,
            result.skipped_nodes
        );
        Ok(result)
    }
}

/// Result of workflow execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: RunId,
    /// `result` of the last End node reached, if any.
    pub output: Option<Value>,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    pub skipped_nodes: usize,
    pub duration_ms: u64,
}

impl ExecutionResult {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            output: None,
            completed_nodes: 0,
            failed_nodes: 0,
            skipped_nodes: 0,
            duration_ms: 0,
        }
    }
}
