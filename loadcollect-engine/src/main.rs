use clap::{Parser, Subcommand};
use loadcollect_engine::config::{
    CollectorConfig, PartialResultPolicy, DEADLINE_MARGIN, DEFAULT_LOADGEN, DEFAULT_QPS, DEFAULT_TIME,
};
use loadcollect_engine::context::{ExecutionContext, ExperimentRef};
use loadcollect_engine::orchestrator::Collector;
use loadcollect_engine::registry::{register_collect, TaskRegistry, TaskSpec};
use loadcollect_engine::store::FileStore;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "loadcollect", about = "Run experiment actions that collect load-test metrics")]
struct Cli {
    /// Log filter used when RUST_LOG is unset, e.g. "info" or "loadcollect_engine=debug"
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute every task of an action in order; stop at the first failure
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// JSON file holding the action: an array of {"task": ..., "with": {...}}
    #[arg(long)]
    action: PathBuf,

    /// Experiment the action belongs to
    #[arg(long)]
    experiment: String,

    #[arg(long, default_value = "default")]
    namespace: String,

    /// Directory holding each experiment's stored results
    #[arg(long)]
    state_dir: PathBuf,

    /// Tag substituted into task inputs, as key=value (repeatable)
    #[arg(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,

    /// Load generator executable
    #[arg(long, default_value = DEFAULT_LOADGEN)]
    loadgen: PathBuf,

    /// Run duration for tasks that do not set one
    #[arg(long, default_value = DEFAULT_TIME)]
    default_time: String,

    /// Requests per second for versions that do not set one
    #[arg(long, default_value_t = DEFAULT_QPS)]
    default_qps: f64,

    /// Seconds allowed on top of the run duration before giving up
    #[arg(long, default_value_t = DEADLINE_MARGIN.as_secs())]
    deadline_margin: u64,

    /// Store results merged before a failure instead of discarding them
    #[arg(long)]
    persist_partial: bool,
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Command::Run(args) = cli.command;
    process::exit(run(args).await);
}

async fn run(args: RunArgs) -> i32 {
    let specs: Vec<TaskSpec> = match std::fs::read_to_string(&args.action)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(specs) => specs,
        Err(e) => {
            eprintln!("Cannot read action {}: {e}", args.action.display());
            return 2;
        }
    };

    let span = tracing::info_span!("action", experiment = %args.experiment, namespace = %args.namespace);
    let config = CollectorConfig {
        default_time: args.default_time,
        default_qps: args.default_qps,
        deadline_margin: Duration::from_secs(args.deadline_margin),
        loadgen: args.loadgen,
        partial_results: if args.persist_partial {
            PartialResultPolicy::Persist
        } else {
            PartialResultPolicy::Discard
        },
        ..CollectorConfig::default()
    };
    let store = Arc::new(FileStore::new(args.state_dir));
    let collector = match Collector::new(config, store, span.clone()) {
        Ok(collector) => Arc::new(collector),
        Err(e) => {
            eprintln!("Cannot start collector: {e}");
            return 2;
        }
    };

    let mut registry = TaskRegistry::new();
    let action = match register_collect(&mut registry, collector)
        .and_then(|_| registry.build_action(&specs, span.clone()))
    {
        Ok(action) => action,
        Err(e) => {
            eprintln!("Invalid action {}: {e}", args.action.display());
            return 2;
        }
    };

    let mut ctx = ExecutionContext::new(ExperimentRef::new(args.namespace, args.experiment));
    ctx.tags.extend(args.tags);

    tracing::info!(parent: &span, tasks = action.len(), "Running action");
    match action.run(&ctx).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Action failed: {e}");
            1
        }
    }
}
