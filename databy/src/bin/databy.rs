//! Command-line runner for databy pipelines.
//!
//! Usage:
//!   databy --input data.json                       # Profile, describe and type a dataset
//!   databy --input data.json --mock                # Same, with a scripted model
//!   databy --input data.json --missing mean        # Resolve missing values first
//!   databy --list-pipelines
//!   databy --list-tools

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use databy::api::{ErrorResponse, SessionReport};
use databy::config::Settings;
use databy::context::{RunContext, SessionRecord};
use databy::core::{Cell, DataTable};
use databy::events::LoggingEventSink;
use databy::llm::{ChatClient, OllamaClient};
use databy::observability::init_logging;
use databy::pipeline::{run_pipeline, PipelineRegistry, DATA_EXPLORER};
use databy::testing::explorer_client;
use databy::tools::{handle_missing_values, register_missing_value_tools, ToolRegistry, MISSING_VAL_RESOLVER};

#[derive(Parser)]
#[command(name = "databy")]
#[command(about = "Run a data exploration pipeline over a JSON dataset")]
struct Args {
    /// Dataset as JSON: an object of columns or an array of records
    #[arg(short = 'i', long, required_unless_present_any = ["list_pipelines", "list_tools"])]
    input: Option<PathBuf>,

    /// YAML settings file
    #[arg(short = 'c', long, env = "DATABY_CONFIG")]
    config: Option<PathBuf>,

    /// Pipeline to run
    #[arg(short = 'p', long, default_value = DATA_EXPLORER)]
    pipeline: String,

    /// Answer every prompt with a scripted model instead of calling Ollama
    #[arg(long)]
    mock: bool,

    /// Abandon the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Resolve missing values before the run (drop, mean, median, mode, fill)
    #[arg(long)]
    missing: Option<String>,

    /// Constant used by `--missing fill`
    #[arg(long, requires = "missing")]
    fill_value: Option<String>,

    /// Free-form tags stored on the session
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// What a model trained on this data should do
    #[arg(long)]
    objective: Option<String>,

    /// List registered pipelines and exit
    #[arg(long)]
    list_pipelines: bool,

    /// Print the missing-value tool schemas and exit
    #[arg(long)]
    list_tools: bool,
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => Settings::from_yaml_file(path)?,
        None => Settings::default(),
    };
    settings.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(settings)
}

fn load_table(path: &PathBuf) -> Result<DataTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading dataset {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing dataset {}", path.display()))?;

    let table = if value.is_array() {
        DataTable::from_json_records(&value)?
    } else {
        DataTable::from_json_columns(&value)?
    };
    Ok(table)
}

fn fill_cell(raw: &str) -> Cell {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| Cell::from_json(&v).ok())
        .unwrap_or_else(|| Cell::from(raw))
}

async fn run(args: Args) -> Result<ExitCode> {
    let settings = load_settings(args.config.as_ref())?;
    init_logging(&settings.logging)?;

    let registry = PipelineRegistry::with_defaults(&settings)?;
    if args.list_pipelines {
        for name in registry.list() {
            let descriptor = registry.describe(name)?;
            println!("{name}: {}", descriptor.stages.join(" -> "));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut tools = ToolRegistry::new();
    register_missing_value_tools(&mut tools);
    if args.list_tools {
        let schemas = tools.tool_schemas(MISSING_VAL_RESOLVER)?;
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(input) = args.input.as_ref() else {
        bail!("--input is required");
    };
    let mut table = load_table(input)?;
    if let Some(strategy) = args.missing.as_deref() {
        let fill = args.fill_value.as_deref().map(fill_cell);
        table = handle_missing_values(table, strategy, fill.as_ref())?;
        info!(strategy, rows = table.row_count(), "resolved missing values");
    }

    let mut session = SessionRecord::new(table);
    if !args.tags.is_empty() {
        session = session.with_user_input_tags(args.tags.clone());
    }
    if let Some(objective) = args.objective.as_deref() {
        session = session.with_model_objective(objective);
    }

    let client: Arc<dyn ChatClient> = if args.mock {
        Arc::new(explorer_client())
    } else {
        Arc::new(OllamaClient::from_config(&settings.llm)?)
    };
    let ctx = RunContext::new(client).with_event_sink(Arc::new(LoggingEventSink::debug()));

    let timeout = args
        .timeout_secs
        .or(settings.pipeline.timeout_secs)
        .map(Duration::from_secs);

    match run_pipeline(&registry, &args.pipeline, &ctx, session, timeout).await {
        Ok(session) => {
            let report = SessionReport::from(&session);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let body = ErrorResponse::from_error(&err);
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
