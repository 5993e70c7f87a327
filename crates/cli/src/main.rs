//! vecsched CLI - route vector search tasks between CPU and GPUs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vecsched_config::{ConfigSnapshot, ConfigSource, FileConfigSource, InMemoryConfigStore};
use vecsched_core::{IndexKind, TaskDescriptor};
use vecsched_execution::{GpuLimits, PassPipeline, SelectionPolicy};
use vecsched_resource::InMemoryRegistry;

#[derive(Parser)]
#[command(name = "vecsched")]
#[command(about = "GPU/CPU routing for vector search tasks", long_about = None)]
struct Cli {
    /// Config file (JSON)
    #[arg(long, global = true, default_value = "vecsched.json")]
    config: PathBuf,

    /// Largest topk allowed on GPU
    #[arg(long, global = true, default_value_t = vecsched_execution::limits::DEFAULT_MAX_TOPK)]
    max_topk: i64,

    /// Largest nprobe allowed on GPU
    #[arg(long, global = true, default_value_t = vecsched_execution::limits::DEFAULT_MAX_NPROBE)]
    max_nprobe: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config and show the effective GPU settings
    Check,
    /// Route tasks from a JSON file
    Route {
        /// JSON array of tasks
        #[arg(long)]
        tasks: PathBuf,
    },
    /// Follow config file changes and reload the search threshold
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },
}

/// Config store and initialized pipeline for one run.
struct Scheduler {
    store: Arc<InMemoryConfigStore>,
    pipeline: PassPipeline,
    snapshot: ConfigSnapshot,
}

async fn start(source: &FileConfigSource, limits: GpuLimits) -> Result<Scheduler> {
    let document = source
        .load()
        .await
        .with_context(|| format!("loading {}", source.path().display()))?;

    let store = Arc::new(InMemoryConfigStore::from_config(&document.gpu));
    let devices = ConfigSnapshot::from_config(&document.gpu)?.search_devices;
    let registry = Arc::new(InMemoryRegistry::with_devices(&devices));

    let policy = SelectionPolicy::new(IndexKind::IvfSq8h, store.clone(), registry, limits);
    let mut pipeline = PassPipeline::new().with_pass(Box::new(policy));
    let snapshot = pipeline.load(store.as_ref())?;

    Ok(Scheduler { store, pipeline, snapshot })
}

async fn load_tasks(path: &Path) -> Result<Vec<TaskDescriptor>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let tasks = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(tasks)
}

fn format_assignment(task: &TaskDescriptor) -> String {
    let resource = task
        .assigned_resource
        .as_ref()
        .map_or("unclaimed", |h| h.name());
    format!("{}  {:<9}  hybrid={}", task.id, resource, task.hybrid)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let source = FileConfigSource::new(&cli.config);
    let limits = GpuLimits::new()
        .with_max_topk(cli.max_topk)
        .with_max_nprobe(cli.max_nprobe);

    match cli.command {
        Commands::Check => {
            let scheduler = start(&source, limits).await?;
            let snapshot = &scheduler.snapshot;
            let devices: Vec<String> = snapshot
                .search_devices
                .iter()
                .map(|d| format!("gpu{}", d))
                .collect();

            println!("Config OK: {}", source.path().display());
            println!("  GPU enabled: {}", snapshot.gpu_enabled);
            println!("  Search threshold: {}", snapshot.gpu_search_threshold);
            println!("  Search devices: {}", devices.join(", "));
            println!("  Max topk / nprobe: {} / {}", limits.max_topk, limits.max_nprobe);
        }
        Commands::Route { tasks } => {
            let scheduler = start(&source, limits).await?;
            let mut tasks = load_tasks(&tasks).await?;

            for task in &mut tasks {
                scheduler.pipeline.dispatch(task)?;
                println!("{}", format_assignment(task));
            }
            info!(tasks = tasks.len(), "routing complete");
        }
        Commands::Watch { interval_ms } => {
            let scheduler = start(&source, limits).await?;
            let initial = scheduler.snapshot.clone();
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            info!(path = %source.path().display(), interval_ms, "watching config");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("stopping config watch");
                        break;
                    }
                    _ = ticker.tick() => {
                        let document = match source.load().await {
                            Ok(document) => document,
                            Err(e) => {
                                warn!(error = %e, "failed to reload config, keeping previous");
                                continue;
                            }
                        };
                        if document.gpu.enable != initial.gpu_enabled
                            || ConfigSnapshot::from_config(&document.gpu)
                                .map(|s| s.search_devices != initial.search_devices)
                                .unwrap_or(true)
                        {
                            warn!("gpu.enable and gpu.search_devices only apply after a restart");
                        }
                        scheduler.store.apply(&document.gpu);
                    }
                }
            }
        }
    }

    Ok(())
}
