//! Rewardflow CLI (rewardctl)
//!
//! Host-surface entry points for the reward-assignment pipeline. The
//! production deployment invokes the dispatcher on a singleton timer and
//! delivers worker payloads over its own transport; `rewardctl` provides
//! the same two entry points for operation and debugging, running workers
//! in-process.
//!
//! ```bash
//! export RECORDS_BUCKET=s3://training-records
//! export RUST_LOG=info
//!
//! # one dispatcher tick over every project
//! rewardctl --config customization.json dispatch
//!
//! # process one shard directly
//! rewardctl --config customization.json assign-rewards --project messenger --shard 0
//! ```
//!
//! ## Store resolution
//!
//! `RECORDS_BUCKET` (or `--bucket`) selects the object store:
//! - `s3://bucket` — Amazon S3, credentials and region from the ambient
//!   AWS environment
//! - any other value — a local filesystem root (useful for inspection and
//!   integration testing)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;

use rewardflow_core::{CustomizationConfig, IdentityHooks};
use rewardflow_dispatcher::{DispatchEvent, Dispatcher};
use rewardflow_engine::{
    LogOnlyReshardLauncher, RewardAssignmentWorker, SpawnWorkerLauncher, WorkerPayload,
};
use rewardflow_storage::{RecordStore, RuntimeConfig};

#[derive(Parser)]
#[command(name = "rewardctl")]
#[command(about = "Reward-assignment pipeline control tool", long_about = None)]
struct Cli {
    /// Path to the customization config (JSON)
    #[arg(short, long, env = "REWARDFLOW_CONFIG")]
    config: PathBuf,

    /// Object-store root; overrides RECORDS_BUCKET
    #[arg(long)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one dispatcher tick over all projects
    Dispatch {
        /// Ignore worker budget, cool-downs and resharding suppression
        #[arg(long)]
        force_processing: bool,

        /// Ask the reshard subsystem to continue unfinished splits
        #[arg(long)]
        force_continue_reshard: bool,
    },
    /// Run one reward-assignment pass for a single shard
    AssignRewards {
        /// Project name
        #[arg(short, long)]
        project: String,

        /// Shard id
        #[arg(short, long)]
        shard: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let raw_config = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading customization config {:?}", cli.config))?;
    let customization = Arc::new(CustomizationConfig::from_json(&raw_config)?);

    let runtime = RuntimeConfig::from_env()?;
    let bucket = cli
        .bucket
        .clone()
        .or_else(|| runtime.records_bucket.clone())
        .context("no object store configured: set RECORDS_BUCKET or pass --bucket")?;
    let store = RecordStore::new(build_store(&bucket)?);

    let hooks = Arc::new(IdentityHooks);
    let reshard = Arc::new(LogOnlyReshardLauncher);
    let worker = Arc::new(RewardAssignmentWorker::new(
        store.clone(),
        hooks,
        customization.clone(),
        runtime.clone(),
        reshard.clone(),
    ));

    match cli.command {
        Commands::Dispatch {
            force_processing,
            force_continue_reshard,
        } => {
            let dispatcher = Dispatcher::new(
                store,
                customization,
                runtime,
                Arc::new(SpawnWorkerLauncher::new(worker)),
                reshard,
            );
            let event = DispatchEvent {
                force_processing,
                force_continue_reshard,
            };
            let stats = dispatcher.dispatch_reward_assignment_workers(&event).await?;
            println!(
                "projects: {} (failed: {}), workers dispatched: {}",
                stats.projects, stats.failed_projects, stats.workers_dispatched
            );
        }
        Commands::AssignRewards { project, shard } => {
            let summary = worker
                .assign_rewards(&WorkerPayload::new(project, shard))
                .await?;
            if summary.resharded {
                println!("shard escalated to resharding; nothing written");
            } else if summary.no_op {
                println!("no incoming markers; nothing to do");
            } else {
                let stats = summary.write_stats.unwrap_or_default();
                println!(
                    "records: {} (duplicates: {}), groups: {} (failed: {}), \
                     emitted: {} (rewarded: {}, max: {:?}, mean: {:?})",
                    summary.records,
                    summary.duplicates,
                    summary.groups,
                    summary.failed_groups,
                    stats.total,
                    stats.rewarded,
                    stats.max_reward,
                    stats.mean_reward,
                );
            }
        }
    }

    Ok(())
}

fn build_store(bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    if let Some(name) = bucket.strip_prefix("s3://") {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(name.trim_end_matches('/'))
            .build()
            .with_context(|| format!("building S3 store for bucket {name:?}"))?;
        return Ok(Arc::new(store));
    }
    std::fs::create_dir_all(bucket)
        .with_context(|| format!("creating local store root {bucket:?}"))?;
    let store = LocalFileSystem::new_with_prefix(bucket)
        .with_context(|| format!("opening local store root {bucket:?}"))?;
    Ok(Arc::new(store))
}
