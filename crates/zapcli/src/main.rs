use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zapapps::Simulation;
use zapcore::{
    Execution, ExecutionEvent, ExecutionId, StepDescriptor, StepEvent, Value, WorkflowDefinition,
};
use zapruntime::{EngineConfig, ErrorHandling, ExecutionEngine, HandlerRegistry};

#[derive(Parser)]
#[command(name = "zap")]
#[command(about = "Run linear trigger/action workflows", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data for the trigger as a JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// What to do after a step fails
        #[arg(long, value_enum, default_value_t = OnError::Stop)]
        on_error: OnError,

        /// Fail a step that runs longer than this
        #[arg(long)]
        step_timeout_ms: Option<u64>,

        /// Probability that a simulated app call fails
        #[arg(long, default_value_t = 0.0)]
        failure_rate: f64,

        #[arg(long, default_value_t = 500)]
        min_latency_ms: u64,

        #[arg(long, default_value_t = 1500)]
        max_latency_ms: u64,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List apps with a dedicated handler
    Apps,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    Stop,
    Skip,
    Continue,
}

impl From<OnError> for ErrorHandling {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Stop => ErrorHandling::StopWorkflow,
            OnError::Skip => ErrorHandling::SkipRemaining,
            OnError::Continue => ErrorHandling::ContinueOnError,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            file,
            input,
            on_error,
            step_timeout_ms,
            failure_rate,
            min_latency_ms,
            max_latency_ms,
        } => {
            let config = EngineConfig {
                on_error: on_error.into(),
                step_timeout: step_timeout_ms.map(Duration::from_millis),
                ..EngineConfig::default()
            };
            let simulation = Simulation::default()
                .with_latency(
                    Duration::from_millis(min_latency_ms),
                    Duration::from_millis(max_latency_ms),
                )
                .with_failure_rate(failure_rate);

            run_workflow(&file, input, config, simulation).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Apps => {
            list_apps();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` picks debug over info.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_workflow(file: &Path) -> Result<WorkflowDefinition> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let workflow: WorkflowDefinition = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", file.display()))?;
    tracing::debug!(workflow_id = %workflow.id, steps = workflow.steps.len(), "Loaded workflow");
    Ok(workflow)
}

fn parse_input(input: Option<String>) -> Result<Option<Value>> {
    let Some(raw) = input else {
        return Ok(None);
    };
    let json: serde_json::Value = serde_json::from_str(&raw).context("--input is not valid JSON")?;
    if !json.is_object() {
        bail!("Input must be a JSON object");
    }
    Ok(Some(Value::from_plain_json(json)))
}

fn build_registry(simulation: &Simulation) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    zapapps::register_all(&mut registry, simulation);
    registry
}

async fn run_workflow(
    file: &Path,
    input: Option<String>,
    config: EngineConfig,
    simulation: Simulation,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    let workflow = load_workflow(file)?;
    let input = parse_input(input)?;

    println!("📋 Workflow: {} ({} steps)", workflow.name, workflow.steps.len());
    println!();

    let engine = ExecutionEngine::with_registry(Arc::new(build_registry(&simulation)), config);
    let mut events = engine.subscribe_events();

    let handle = engine
        .start_workflow(workflow.id.clone(), workflow.steps.clone(), input)
        .await?;
    let execution_id = handle.execution_id;
    let control = handle.control().clone();

    let steps = workflow.steps.clone();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event.execution_id() != execution_id {
                continue;
            }
            let done = matches!(event, ExecutionEvent::Notification { .. });
            print_event(&event, &steps);
            if done {
                break;
            }
        }
    });

    let wait = handle.wait();
    tokio::pin!(wait);
    let execution = tokio::select! {
        result = &mut wait => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("⏹️  Stopping...");
            control.stop();
            wait.await?
        }
    };

    // The notification is the last event of a run; give the printer a
    // moment to reach it.
    let _ = tokio::time::timeout(Duration::from_millis(500), event_task).await;

    print_summary(execution_id, &execution);
    Ok(())
}

fn print_event(event: &ExecutionEvent, steps: &[StepDescriptor]) {
    match event {
        ExecutionEvent::RunStarted { total_steps, .. } => {
            println!("▶️  Run started ({} steps)", total_steps);
        }
        ExecutionEvent::StepStatusChanged {
            step_id, status, ..
        } => {
            let name = steps
                .iter()
                .find(|s| &s.id == step_id)
                .map(|s| format!("{} / {}", s.app_id, s.display_name()))
                .unwrap_or_else(|| step_id.clone());
            println!("  • {} [{}]", name, status.view().label);
        }
        ExecutionEvent::Progress { percent, .. } => {
            println!("  📊 {:.0}%", percent);
        }
        ExecutionEvent::StepEvent { step_id, event, .. } => match event {
            StepEvent::Info { message } => println!("     ℹ️  [{}] {}", step_id, message),
            StepEvent::Warning { message } => println!("     ⚠️  [{}] {}", step_id, message),
        },
        ExecutionEvent::RunPaused { .. } => println!("⏸️  Paused"),
        ExecutionEvent::RunResumed { .. } => println!("▶️  Resumed"),
        ExecutionEvent::RunStopped { .. } => println!("⏹️  Stopped"),
        ExecutionEvent::RunCompleted { duration_ms, .. } => {
            println!("✨ Run completed in {}ms", duration_ms);
        }
        ExecutionEvent::RunFailed {
            error, duration_ms, ..
        } => {
            println!("💥 Run failed after {}ms: {}", duration_ms, error);
        }
        ExecutionEvent::Notification { notification, .. } => {
            println!();
            println!("🔔 {}: {}", notification.title, notification.description);
        }
    }
}

fn print_summary(execution_id: ExecutionId, execution: &Execution) {
    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution_id);
    println!("   Status: {}", execution.status.view().label);
    println!(
        "   Processed: {}/{} steps",
        execution.processed_steps(),
        execution.total_steps
    );

    for result in &execution.steps {
        match (&result.error, &result.data) {
            (Some(error), _) => println!("   {} ✗ {}", result.step_id, error),
            (None, Some(data)) => println!("   {} ✓ {:?}", result.step_id, data),
            (None, None) => println!("   {} - {}", result.step_id, result.status.as_str()),
        }
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    workflow.validate()?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    if let Some(trigger) = workflow.trigger() {
        println!("   Trigger: {} / {}", trigger.app_id, trigger.display_name());
    }
    println!("   Actions: {}", workflow.actions().len());

    let registry = build_registry(&Simulation::instant());
    for step in &workflow.steps {
        if !registry.is_registered(&step.app_id) {
            println!(
                "   ⚠️  '{}' has no dedicated handler; step {} uses the generic one",
                step.app_id, step.id
            );
        }
    }

    Ok(())
}

fn list_apps() {
    println!("📦 Available Apps:");
    println!();

    let registry = build_registry(&Simulation::default());
    for app_id in registry.list_app_ids() {
        if let Some(metadata) = registry.get_metadata(&app_id) {
            println!("  • {} ({})", app_id, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", app_id);
        }
    }

    let fallback = registry.fallback_metadata();
    println!();
    println!("  Any other app: {}", fallback.description);
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = WorkflowDefinition::new("zap-example", "Email to Slack")
        .with_step(
            StepDescriptor::new("trigger", "gmail")
                .with_action("New Email")
                .with_config("subject", "Server down"),
        )
        .with_step(
            StepDescriptor::new("notify", "slack")
                .with_action("Send Message")
                .with_config("channel", "#alerts"),
        )
        .with_step(
            StepDescriptor::new("log", "sheets")
                .with_action("Add Row")
                .with_config("spreadsheetId", "incident-log")
                .with_config("sheet", "Incidents"),
        );
    workflow.description = Some("Posts new emails to Slack and logs them".to_string());

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  zap run --file {}", output.display());

    Ok(())
}
