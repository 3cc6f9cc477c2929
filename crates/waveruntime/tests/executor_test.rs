use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wavecore::{
    EngineError, ExecutionContext, NodeError, NodeExecutor, NodeOutcome, NodeOutput, NodeSpec,
    NodeStatus, NodeType, WorkflowDocument, WorkflowError,
};
use waveruntime::{Engine, EngineConfig, NodeFactory, NodeRegistry};

/// Executor driven entirely by its node's `data`:
/// `emit` (outputs), `handle`, `fail` (error message), `sleep_ms`.
struct ScriptedNode {
    spec: NodeSpec,
}

#[async_trait]
impl NodeExecutor for ScriptedNode {
    fn node_id(&self) -> &str {
        &self.spec.id
    }

    fn node_type(&self) -> NodeType {
        self.spec.node_type.clone()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        if let Some(ms) = self.spec.data.get("sleep_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(message) = self.spec.data.get("fail").and_then(Value::as_str) {
            return Err(NodeError::ExecutionFailed(message.to_string()));
        }

        let mut output = NodeOutput::new();
        if let Some(Value::Object(emit)) = self.spec.data.get("emit") {
            for (name, value) in emit {
                output = output.with_output(name.clone(), ctx.resolve_deep(value));
            }
        }
        if let Some(handle) = self.spec.data.get("handle").and_then(Value::as_str) {
            output = output.with_handle(handle);
        }
        Ok(output)
    }
}

struct ScriptedFactory(NodeType);

impl NodeFactory for ScriptedFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        if spec.data.contains_key("bad_config") {
            return Err(NodeError::Configuration("bad_config is set".to_string()));
        }
        Ok(Box::new(ScriptedNode { spec: spec.clone() }))
    }

    fn node_type(&self) -> NodeType {
        self.0.clone()
    }
}

fn engine(config: EngineConfig) -> Engine {
    let mut registry = NodeRegistry::new();
    for node_type in [NodeType::Start, NodeType::End, NodeType::Llm, NodeType::Condition] {
        registry.register(Arc::new(ScriptedFactory(node_type)));
    }
    Engine::with_config(registry, config)
}

fn node(id: &str, node_type: NodeType, data: Value) -> NodeSpec {
    let mut spec = NodeSpec::new(id, node_type).with_reference_key(id);
    if let Value::Object(map) = data {
        spec.data.extend(map);
    }
    spec
}

fn inputs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Recorder {
    outcomes: Mutex<Vec<NodeOutcome>>,
}

#[async_trait]
impl wavecore::NodeCompletionHandler for Recorder {
    async fn on_node_complete(&self, outcome: &NodeOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

impl Recorder {
    fn order(&self) -> Vec<(String, NodeStatus)> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .map(|o| (o.node_id.clone(), o.status))
            .collect()
    }
}

#[tokio::test]
async fn inputs_are_namespaced_under_start_reference_key() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({"emit": {"echo": "{{start.text}}"}})));
    doc.add_node(node("end", NodeType::End, json!({"emit": {"result": "got {{start.echo}}"}})));
    doc.connect("start", "end");

    let result = engine(EngineConfig::default())
        .run(&doc, inputs(json!({"text": "hi"})))
        .await
        .unwrap();

    assert_eq!(result.output, Some(json!("got hi")));
    assert_eq!(result.completed_nodes, 2);
    assert_eq!(result.failed_nodes, 0);
}

#[tokio::test]
async fn handle_selects_branch() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("cond", NodeType::Condition, json!({"handle": "false"})));
    doc.add_node(node("yes", NodeType::End, json!({"emit": {"result": "yes"}})));
    doc.add_node(node("no", NodeType::End, json!({"emit": {"result": "no"}})));
    doc.connect("start", "cond");
    doc.connect_handle("cond", "true", "yes");
    doc.connect_handle("cond", "false", "no");

    let recorder = Recorder::default();
    let result = engine(EngineConfig::default())
        .run_with_handler(&doc, Map::new(), &recorder)
        .await
        .unwrap();

    assert_eq!(result.output, Some(json!("no")));
    let visited: Vec<String> = recorder.order().into_iter().map(|(id, _)| id).collect();
    assert_eq!(visited, vec!["start", "cond", "no"]);
}

#[tokio::test]
async fn failure_ends_only_its_own_branch() {
    init_tracing();
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("broken", NodeType::Llm, json!({"fail": "provider down"})));
    doc.add_node(node("fine", NodeType::Llm, json!({"emit": {"text": "ok"}})));
    doc.add_node(node("end_a", NodeType::End, json!({"emit": {"result": "from broken"}})));
    doc.add_node(node("end_b", NodeType::End, json!({"emit": {"result": "{{fine.text}}"}})));
    doc.connect("start", "broken");
    doc.connect("start", "fine");
    doc.connect("broken", "end_a");
    doc.connect("fine", "end_b");

    let recorder = Recorder::default();
    let result = engine(EngineConfig::default())
        .run_with_handler(&doc, Map::new(), &recorder)
        .await
        .unwrap();

    assert_eq!(result.output, Some(json!("ok")));
    assert_eq!(result.failed_nodes, 1);
    assert_eq!(
        recorder.order(),
        vec![
            ("start".to_string(), NodeStatus::Completed),
            ("broken".to_string(), NodeStatus::Failed),
            ("fine".to_string(), NodeStatus::Completed),
            ("end_b".to_string(), NodeStatus::Completed),
        ]
    );

    let outcomes = recorder.outcomes.lock().unwrap();
    let broken = &outcomes[1];
    assert_eq!(broken.error.as_deref(), Some("Execution failed: provider down"));
    assert!(broken.output.is_empty());
}

#[tokio::test]
async fn timeout_is_reported_with_configured_seconds() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("slow", NodeType::Llm, json!({"sleep_ms": 5000, "timeout": 0.05})));
    doc.add_node(node("end", NodeType::End, json!({"emit": {"result": "done"}})));
    doc.connect("start", "slow");
    doc.connect("slow", "end");

    let recorder = Recorder::default();
    let result = engine(EngineConfig::default())
        .run_with_handler(&doc, Map::new(), &recorder)
        .await
        .unwrap();

    assert_eq!(result.output, None);
    let outcomes = recorder.outcomes.lock().unwrap();
    let slow = outcomes.iter().find(|o| o.node_id == "slow").unwrap();
    assert_eq!(slow.status, NodeStatus::Failed);
    assert_eq!(
        slow.error.as_deref(),
        Some("Node slow execution timed out after 0.05s")
    );
    assert_eq!(outcomes.len(), 2);
}

#[tokio::test]
async fn default_timeout_comes_from_config() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("slow", NodeType::Llm, json!({"sleep_ms": 5000})));
    doc.add_node(node("end", NodeType::End, json!({})));
    doc.connect("start", "slow");
    doc.connect("slow", "end");

    let config = EngineConfig::default().with_default_node_timeout(Duration::from_millis(30));
    let result = engine(config).run(&doc, Map::new()).await.unwrap();

    assert_eq!(result.failed_nodes, 1);
    assert_eq!(result.output, None);
}

#[tokio::test]
async fn unregistered_node_type_passes_through() {
    init_tracing();
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("hook", NodeType::Other("webhook".into()), json!({})));
    doc.add_node(node("end", NodeType::End, json!({"emit": {"result": "reached"}})));
    doc.connect("start", "hook");
    doc.connect("hook", "end");

    let recorder = Recorder::default();
    let result = engine(EngineConfig::default())
        .run_with_handler(&doc, Map::new(), &recorder)
        .await
        .unwrap();

    assert_eq!(result.output, Some(json!("reached")));
    assert_eq!(result.skipped_nodes, 1);
    let visited: Vec<String> = recorder.order().into_iter().map(|(id, _)| id).collect();
    assert_eq!(visited, vec!["start", "end"]);
}

#[tokio::test]
async fn factory_errors_fail_the_node() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("llm", NodeType::Llm, json!({"bad_config": true})));
    doc.add_node(node("end", NodeType::End, json!({"emit": {"result": "x"}})));
    doc.connect("start", "llm");
    doc.connect("llm", "end");

    let recorder = Recorder::default();
    let result = engine(EngineConfig::default())
        .run_with_handler(&doc, Map::new(), &recorder)
        .await
        .unwrap();

    assert_eq!(result.output, None);
    assert_eq!(
        recorder.order(),
        vec![
            ("start".to_string(), NodeStatus::Completed),
            ("llm".to_string(), NodeStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn join_node_runs_once_and_last_end_wins() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("a", NodeType::Llm, json!({})));
    doc.add_node(node("b", NodeType::Llm, json!({})));
    doc.add_node(node("join", NodeType::Llm, json!({})));
    doc.add_node(node("end_first", NodeType::End, json!({"emit": {"result": "first"}})));
    doc.add_node(node("end_last", NodeType::End, json!({"emit": {"result": "last"}})));
    doc.connect("start", "a");
    doc.connect("start", "b");
    doc.connect("a", "join");
    doc.connect("b", "join");
    doc.connect("join", "end_first");
    doc.connect("join", "end_last");

    let recorder = Recorder::default();
    let result = engine(EngineConfig::default())
        .run_with_handler(&doc, Map::new(), &recorder)
        .await
        .unwrap();

    let visited: Vec<String> = recorder.order().into_iter().map(|(id, _)| id).collect();
    assert_eq!(visited, vec!["start", "a", "b", "join", "end_first", "end_last"]);
    assert_eq!(result.output, Some(json!("last")));
}

#[tokio::test]
async fn closure_handler_sees_resolved_input() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));
    doc.add_node(node("end", NodeType::End, json!({"note": "for {{start.who}}"})));
    doc.connect("start", "end");

    let seen = Mutex::new(Vec::new());
    let handler = |outcome: &NodeOutcome| {
        seen.lock().unwrap().push(outcome.input["note"].clone());
    };
    engine(EngineConfig::default())
        .run_with_handler(&doc, inputs(json!({"who": "bob"})), &handler)
        .await
        .unwrap();

    assert_eq!(seen.into_inner().unwrap(), vec![Value::Null, json!("for bob")]);
}

#[tokio::test]
async fn invalid_documents_are_refused() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({})));

    let err = engine(EngineConfig::default())
        .run(&doc, Map::new())
        .await
        .unwrap_err();

    match err {
        EngineError::Workflow(WorkflowError::Invalid(errors)) => {
            assert!(errors.contains(&"Workflow must have at least one end node".to_string()));
            assert!(errors.contains(&"Node 'start' cannot reach any end node".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn validation_can_be_disabled() {
    let mut doc = WorkflowDocument::new();
    doc.add_node(node("start", NodeType::Start, json!({"emit": {"x": 1}})));

    let result = engine(EngineConfig::default().with_validation(false))
        .run(&doc, Map::new())
        .await
        .unwrap();

    assert_eq!(result.completed_nodes, 1);
    assert_eq!(result.output, None);
}
