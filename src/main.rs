// opsdiag CLI - collect a diagnostics bundle from this host

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use opsdiag::agent::{print_summary, Agent, AgentConfig};
use opsdiag::product::{self, Product};
use opsdiag::redact;
use opsdiag::runner::{DockerLog, JournaldLog};

#[derive(Parser)]
#[command(
    name = "opsdiag",
    about = "Collect, redact, and bundle operational diagnostics",
    version
)]
struct Cli {
    /// Directory to create the bundle in
    #[arg(long, default_value = ".")]
    dest: PathBuf,

    /// Run products one at a time, each as an abort-on-failure sequence
    #[arg(long)]
    serial: bool,

    /// Only run runners whose ID matches one of these globs
    #[arg(short = 'i', long = "include")]
    includes: Vec<String>,

    /// Skip runners whose ID matches one of these globs
    #[arg(short = 'e', long = "exclude")]
    excludes: Vec<String>,

    /// Extra redaction patterns applied to all collected output
    #[arg(long = "redact")]
    redactions: Vec<String>,

    /// How far back log extraction reaches, in hours
    #[arg(long, default_value_t = 72)]
    since_hours: u64,

    /// Per-product deadline in seconds (serial mode)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Also extract logs for these docker containers
    #[arg(long = "docker")]
    docker: Vec<String>,

    /// Also extract journals for these systemd units
    #[arg(long = "journald")]
    journald: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, canceling collection");
            interrupt.cancel();
        }
    });

    let mut redactions =
        redact::chain(&cli.redactions).context("compiling redaction patterns")?;
    redactions.extend(redact::defaults());

    let dest = cli
        .dest
        .join(format!("opsdiag-{}", Utc::now().format("%Y%m%d-%H%M%S")));
    let since = Utc::now() - chrono::Duration::hours(cli.since_hours as i64);

    let host = product::host(&dest, &redactions, &cancel)
        .context("building host product")?
        .with_selects(cli.includes.clone())
        .with_excludes(cli.excludes.clone());
    let mut products = vec![host];

    if !cli.docker.is_empty() || !cli.journald.is_empty() {
        let mut logs = Product::new("logs")
            .with_selects(cli.includes)
            .with_excludes(cli.excludes);
        for container in &cli.docker {
            let runner = DockerLog::new(
                container,
                dest.join("logs"),
                Some(since),
                redactions.clone(),
                cancel.clone(),
            )
            .context("building docker log runner")?;
            logs = logs.with_runner(Arc::new(runner));
        }
        for unit in &cli.journald {
            let runner = JournaldLog::new(
                unit,
                dest.join("logs"),
                Some(since),
                None,
                redactions.clone(),
                cancel.clone(),
            )
            .context("building journald runner")?;
            logs = logs.with_runner(Arc::new(runner));
        }
        products.push(logs);
    }

    let config = AgentConfig {
        dest: dest.clone(),
        serial: cli.serial,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    };

    info!(dest = %dest.display(), products = products.len(), "starting collection");
    let mut agent = Agent::new(config, products, cancel);
    let manifest = agent.run().await?;
    print_summary(&manifest);
    Ok(())
}
