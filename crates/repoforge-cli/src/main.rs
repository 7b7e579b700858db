//! repoforge - package repository build pipeline CLI
//!
//! ## Commands
//!
//! - `run`: execute one add/remove job against a filesystem object store
//! - `classify`: show the component each package basename would land in
//! - `keys`: print the object-store keys used for an account

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use repoforge_core::{
    artifact_key, config_key, Classifier, Job, PipelineConfig, RepositoryPipeline, METRICS,
};
use repoforge_store::{FsObjectStore, ARCHIVE_EXTENSION};
use repoforge_tools::{CommandGenerator, CommandSigner, GeneratorConfig, SignerConfig};
use serde::Deserialize;
use tracing::{info, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "repoforge")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and publish package repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job file against an object store
    Run(RunArgs),

    /// Classify package basenames as stable or unstable
    Classify {
        /// Package basenames (or keys) to classify
        #[arg(required = true)]
        names: Vec<String>,

        /// Config file providing `prerelease_markers`
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the definition and archive keys for an account
    Keys {
        #[arg(short, long, env = "REPOFORGE_ACCOUNT", default_value = "default")]
        account: String,

        /// Package system, e.g. deb or rpm
        #[arg(short, long)]
        system: String,

        /// Archive file name (default: `<system>.tar.gz`)
        #[arg(long)]
        archive: Option<String>,

        /// Unix timestamp (default: now)
        #[arg(long)]
        timestamp: Option<i64>,
    },
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Job document (JSON)
    #[arg(short, long)]
    job: PathBuf,

    /// Root directory of the object store
    #[arg(short, long)]
    store: PathBuf,

    /// Config file (TOML) with `[pipeline]`, `[signer]` and `[generator]` tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the finished job here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Root for per-job workspaces
    #[arg(long, env = "REPOFORGE_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Signing key used when the job carries none
    #[arg(long, env = "REPOFORGE_SIGNING_KEY")]
    signing_key: Option<String>,

    /// Account used when the job names none
    #[arg(long, env = "REPOFORGE_ACCOUNT")]
    account: Option<String>,
}

/// On-disk CLI configuration.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    signer: Option<SignerConfig>,

    #[serde(default)]
    generator: Option<GeneratorConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    repoforge_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Classify { names, config } => cmd_classify(&names, config.as_deref()),
        Commands::Keys {
            account,
            system,
            archive,
            timestamp,
        } => {
            for line in key_lines(&account, &system, archive.as_deref(), timestamp) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

fn read_job(path: &Path) -> Result<Job> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job {}", path.display()))?;
    let mut job: Job = serde_json::from_str(&content)
        .with_context(|| format!("Invalid job document {}", path.display()))?;
    if job.id.trim().is_empty() {
        job.id = Uuid::new_v4().to_string();
    }
    Ok(job)
}

/// Build a pipeline from config and flags, run the job and emit it with its result.
async fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(workdir) = args.workdir {
        config.pipeline.working_directory = workdir;
    }
    if let Some(key) = args.signing_key {
        config.pipeline.signing_key = Some(key);
    }
    if let Some(account) = args.account {
        config.pipeline.default_account = account;
    }

    let generator = config
        .generator
        .context("No [generator] configured; pass --config with a [generator] table")?;
    let store = FsObjectStore::new(&args.store)
        .with_context(|| format!("Failed to open store {}", args.store.display()))?;

    let mut pipeline = RepositoryPipeline::new(
        config.pipeline,
        Arc::new(store),
        Arc::new(CommandGenerator::from(generator)),
    )?;
    if let Some(signer) = config.signer {
        pipeline = pipeline.with_signer(Arc::new(CommandSigner::from(signer)));
    }

    let mut job = read_job(&args.job)?;
    info!(job_id = %job.id, "running job");
    let outcome = pipeline.run(&mut job).await;
    METRICS.flush();
    outcome.with_context(|| format!("Job {} failed", job.id))?;

    let rendered = serde_json::to_string_pretty(&job)?;
    match args.output {
        Some(path) => std::fs::write(&path, format!("{rendered}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn classify_lines(classifier: &Classifier, names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let basename = name.rsplit('/').next().unwrap_or(name);
            format!("{}\t{}", classifier.classify(basename), name)
        })
        .collect()
}

fn cmd_classify(names: &[String], config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let classifier = config.pipeline.classifier()?;
    for line in classify_lines(&classifier, names) {
        println!("{line}");
    }
    Ok(())
}

fn key_lines(
    account: &str,
    system: &str,
    archive: Option<&str>,
    timestamp: Option<i64>,
) -> Vec<String> {
    let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
    let archive = archive
        .map(str::to_string)
        .unwrap_or_else(|| format!("{system}.{ARCHIVE_EXTENSION}"));
    vec![
        format!("definition: {}", config_key(account)),
        format!("archive:    {}", artifact_key(account, system, timestamp, &archive)),
    ]
}
