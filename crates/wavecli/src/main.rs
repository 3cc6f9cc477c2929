// crates/wavecli/src/main.rs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wavecore::{
    AgentService, Capabilities, CapabilityError, NodeOutcome, NodeSpec, NodeStatus, NodeType,
    ToolService, WorkflowDocument,
};
use waveruntime::{Engine, EngineConfig};
use wavenodes::ReqwestHttpClient;

#[derive(Parser)]
#[command(name = "wave")]
#[command(about = "Wave workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow document
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Run inputs as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Timeout for nodes without their own `timeout`, in seconds
        #[arg(long, env = "WAVE_NODE_TIMEOUT_SECS", default_value_t = 60.0)]
        timeout_secs: f64,

        /// Timeout for outgoing HTTP requests, in seconds
        #[arg(long, env = "WAVE_HTTP_TIMEOUT_SECS", default_value_t = 30.0)]
        http_timeout_secs: f64,

        /// Run even if the document fails validation
        #[arg(long)]
        skip_validation: bool,
    },

    /// Validate a workflow document
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

/// Agent service used until a real one is wired in.
struct MockAgents;

#[async_trait]
impl AgentService for MockAgents {
    async fn run(&self, agent_id: &str, _inputs: Map<String, Value>) -> Result<String, CapabilityError> {
        Ok(format!("[Mocked Agent {} Response]", agent_id))
    }
}

/// Tool service used until a real one is wired in.
struct MockTools;

#[async_trait]
impl ToolService for MockTools {
    async fn invoke(
        &self,
        tool_id: &str,
        _config: Map<String, Value>,
        _inputs: Map<String, Value>,
    ) -> Result<Value, CapabilityError> {
        Ok(Value::String(format!("[Mocked Tool {} Result]", tool_id)))
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("--{} must be a positive number of seconds, got {}", flag, value);
    }
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("--{} is too large: {}", flag, value))
}

fn capabilities(http_timeout: Duration) -> Result<Capabilities> {
    let http = ReqwestHttpClient::with_timeout(http_timeout)?;
    Ok(Capabilities::unconfigured()
        .with_http(Arc::new(http))
        .with_agents(Arc::new(MockAgents))
        .with_tools(Arc::new(MockTools)))
}

fn load_document(file: &Path) -> Result<WorkflowDocument> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document: WorkflowDocument = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", file.display()))?;
    tracing::debug!(
        "Loaded {} with {} nodes and {} edges",
        file.display(),
        document.nodes.len(),
        document.edges.len()
    );
    Ok(document)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            timeout_secs,
            http_timeout_secs,
            skip_validation,
        } => {
            init_logging(verbose);
            let config = EngineConfig::default()
                .with_default_node_timeout(seconds(timeout_secs, "timeout-secs")?)
                .with_validation(!skip_validation);
            let capabilities = capabilities(seconds(http_timeout_secs, "http-timeout-secs")?)?;
            run_workflow(&file, input, config, capabilities).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: &Path,
    input: Option<String>,
    config: EngineConfig,
    capabilities: Capabilities,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    let document = load_document(file)?;
    println!("   Nodes: {}", document.nodes.len());
    println!("   Edges: {}", document.edges.len());
    println!();

    let inputs = match input {
        Some(text) => match serde_json::from_str::<Value>(&text).context("failed to parse --input")? {
            Value::Object(map) => map,
            _ => bail!("Input must be a JSON object"),
        },
        None => Map::new(),
    };

    tracing::debug!(?config, "Building engine");
    let engine = Engine::with_config(wavenodes::standard_registry(&capabilities), config);

    let print_outcome = |outcome: &NodeOutcome| match outcome.status {
        NodeStatus::Completed => println!(
            "  ✅ Node {} ({}) completed in {}ms",
            outcome.node_id, outcome.node_type, outcome.duration_ms
        ),
        NodeStatus::Failed => println!(
            "  ❌ Node {} ({}) failed: {}",
            outcome.node_id,
            outcome.node_type,
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    };

    println!("▶️  Workflow started");
    let result = engine
        .run_with_handler(&document, inputs, &print_outcome)
        .await?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", result.run_id);
    println!(
        "   Completed: {}, failed: {}, skipped: {} ({}ms)",
        result.completed_nodes, result.failed_nodes, result.skipped_nodes, result.duration_ms
    );

    println!();
    match result.output {
        Some(output) => {
            println!("📤 Output:");
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        None => println!("📤 No end node produced an output"),
    }

    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());
    let document = load_document(file)?;

    let errors = waveruntime::validate(&document);
    if !errors.is_empty() {
        for error in &errors {
            println!("  ❌ {}", error);
        }
        bail!("workflow has {} validation error(s)", errors.len());
    }

    println!("✅ Workflow is valid:");
    println!("   Nodes: {}", document.nodes.len());
    println!("   Edges: {}", document.edges.len());
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = wavenodes::standard_registry(&Capabilities::unconfigured());
    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn example_document() -> WorkflowDocument {
    let mut document = WorkflowDocument::new();

    let start = document.add_node(
        NodeSpec::new("start", NodeType::Start)
            .with_reference_key("start")
            .with_label("Start")
            .with_config("input_variables", json!([{"name": "text", "type": "string"}])),
    );
    let check = document.add_node(
        NodeSpec::new("has_text", NodeType::Condition)
            .with_reference_key("has_text")
            .with_label("Has text?")
            .with_config("variable", "start.text")
            .with_config("operator", "isNotEmpty"),
    );
    let processed = document.add_node(
        NodeSpec::new("processed", NodeType::End)
            .with_reference_key("processed")
            .with_config("output_type", "template")
            .with_config("output_template", "Processed: {{start.text}}"),
    );
    let empty = document.add_node(
        NodeSpec::new("empty", NodeType::End)
            .with_reference_key("empty")
            .with_config("output_type", "template")
            .with_config("output_template", "Nothing to process"),
    );

    document.connect(start, check.clone());
    document.connect_handle(check.clone(), "true", processed);
    document.connect_handle(check, "false", empty);
    document
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&example_document())?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  wave run --file {} --input '{{\"text\": \"hello\"}}'", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_document_is_valid() {
        assert!(waveruntime::validate(&example_document()).is_empty());
    }

    #[tokio::test]
    async fn example_document_runs() {
        let engine = Engine::new(wavenodes::standard_registry(&Capabilities::unconfigured()));
        let document = example_document();

        let mut inputs = Map::new();
        inputs.insert("text".to_string(), json!("hello"));
        let result = engine.run(&document, inputs).await.unwrap();
        assert_eq!(result.output, Some(json!("Processed: hello")));

        let result = engine.run(&document, Map::new()).await.unwrap();
        assert_eq!(result.output, Some(json!("Nothing to process")));
    }

    #[tokio::test]
    async fn mock_services_echo_their_ids() {
        assert_eq!(
            MockAgents.run("helper", Map::new()).await.unwrap(),
            "[Mocked Agent helper Response]"
        );
        assert_eq!(
            MockTools.invoke("search", Map::new(), Map::new()).await.unwrap(),
            json!("[Mocked Tool search Result]")
        );
    }

    #[test]
    fn rejects_non_positive_timeouts() {
        assert!(seconds(0.0, "timeout-secs").is_err());
        assert!(seconds(-1.0, "timeout-secs").is_err());
        assert_eq!(seconds(1.5, "timeout-secs").unwrap(), Duration::from_millis(1500));
        assert!(seconds(1e20, "timeout-secs").is_err());
    }
}
