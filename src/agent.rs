// Agent - orchestrates products, aggregates results, writes the bundle

use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use colored::Colorize;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CollectError;
use crate::op::{Op, Status, StatusCounts};
use crate::product::Product;
use crate::runner::{Do, Seq};

/// How a run executes and where it lands.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Directory the results and manifest files are written into
    pub dest: PathBuf,
    /// Run products one at a time, each as an abort-on-failure sequence
    pub serial: bool,
    /// Deadline per product in serial mode
    pub timeout: Option<Duration>,
}

/// Reduced, content-free view of a runner's outcome. Safe to ship in a
/// summary: no collected output can leak through it.
#[derive(Debug, Serialize)]
pub struct ManifestEntry {
    pub id: String,
    pub status: Status,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ProductManifest {
    pub name: String,
    pub counts: StatusCounts,
    pub runners: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub version: String,
    pub started: DateTime<Utc>,
    pub completed: DateTime<Utc>,
    pub products: Vec<ProductManifest>,
    /// Run-level problems: products excluded before execution, serial
    /// sequences that aborted, and similar
    pub errors: Vec<String>,
}

/// Top-level orchestrator. Owns the products for one run and the shared
/// results map; products execute concurrently by default, so every merge
/// into the map happens under the lock.
///
/// Redaction order is fixed across the engine: a runner's own rules apply
/// first, then any agent-wide rules appended after them at construction.
pub struct Agent {
    config: AgentConfig,
    products: Vec<Product>,
    cancel: CancellationToken,
    results: Arc<Mutex<HashMap<String, HashMap<String, Op>>>>,
}

impl Agent {
    pub fn new(config: AgentConfig, products: Vec<Product>, cancel: CancellationToken) -> Self {
        Agent {
            config,
            products,
            cancel,
            results: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Execute every product, write `results.json` and `manifest.json`
    /// into the destination, and return the manifest.
    pub async fn run(&mut self) -> Result<Manifest, CollectError> {
        let started = Utc::now();
        tokio::fs::create_dir_all(&self.config.dest)
            .await
            .map_err(|source| CollectError::CreateDir {
                path: self.config.dest.clone(),
                source,
            })?;

        let mut errors = Vec::new();
        let ready = self.filter_products(&mut errors);

        if self.config.serial {
            self.run_serial(ready, &mut errors).await;
        } else {
            self.run_concurrent(ready).await;
        }

        let (results_bytes, manifest) = {
            let results = self.results.lock();
            let bytes = serde_json::to_vec_pretty(&*results)?;
            (bytes, build_manifest(&results, started, errors))
        };
        tokio::fs::write(self.config.dest.join("results.json"), results_bytes).await?;
        tokio::fs::write(
            self.config.dest.join("manifest.json"),
            serde_json::to_vec_pretty(&manifest)?,
        )
        .await?;
        info!(dest = %self.config.dest.display(), "bundle written");
        Ok(manifest)
    }

    /// A product whose filters fail to compile is excluded from the run
    /// entirely - never partially executed - and reported as a run-level
    /// error.
    fn filter_products(&mut self, errors: &mut Vec<String>) -> Vec<Product> {
        let mut ready = Vec::new();
        for product in std::mem::take(&mut self.products) {
            let name = product.name.clone();
            match product.filtered() {
                Ok(product) => ready.push(product),
                Err(err) => {
                    warn!(product = %name, error = %err, "excluding product from run");
                    errors.push(format!("product '{name}' excluded: {err}"));
                }
            }
        }
        ready
    }

    async fn run_concurrent(&self, products: Vec<Product>) {
        let mut handles = Vec::with_capacity(products.len());
        for product in products {
            let results = Arc::clone(&self.results);
            handles.push(tokio::spawn(async move {
                let name = product.name;
                info!(product = %name, runners = product.runners.len(), "collecting");
                let ops = Do::new(name.clone(), product.runners).run_all().await;
                results.lock().insert(name, ops);
            }));
        }
        join_all(handles).await;
    }

    async fn run_serial(&self, products: Vec<Product>, errors: &mut Vec<String>) {
        for product in products {
            let name = product.name;
            info!(product = %name, runners = product.runners.len(), "collecting serially");
            let mut seq = Seq::new(name.clone(), product.runners, self.cancel.clone());
            if let Some(timeout) = self.config.timeout {
                seq = seq.with_timeout(timeout);
            }
            let (ops, status, error) = seq.run_seq().await;
            if let Some(error) = error {
                errors.push(format!("product '{name}': {error}"));
            }
            self.results.lock().insert(name, ops);
            if status == Status::Canceled {
                break;
            }
        }
    }
}

fn build_manifest(
    results: &HashMap<String, HashMap<String, Op>>,
    started: DateTime<Utc>,
    errors: Vec<String>,
) -> Manifest {
    let mut products: Vec<ProductManifest> = results
        .iter()
        .map(|(name, ops)| {
            let mut runners: Vec<ManifestEntry> = ops
                .values()
                .map(|op| ManifestEntry {
                    id: op.id.clone(),
                    status: op.status,
                    error: op.err_string.clone(),
                })
                .collect();
            runners.sort_by(|a, b| a.id.cmp(&b.id));
            ProductManifest {
                name: name.clone(),
                counts: StatusCounts::tally(ops),
                runners,
            }
        })
        .collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));

    Manifest {
        version: crate::VERSION.to_string(),
        started,
        completed: Utc::now(),
        products,
        errors,
    }
}

fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    std::io::stdout().is_terminal()
}

/// Print the per-product recap to stdout.
pub fn print_summary(manifest: &Manifest) {
    if !should_use_colors() {
        colored::control::set_override(false);
    }

    println!();
    for product in &manifest.products {
        let c = &product.counts;
        println!(
            "{:<12} {} : {} : {} : {} : {} : {}",
            product.name.bold(),
            format!("success={}", c.success).green(),
            format!("fail={}", c.fail).red(),
            format!("unknown={}", c.unknown).yellow(),
            format!("skip={}", c.skip).dimmed(),
            format!("timeout={}", c.timeout).red(),
            format!("canceled={}", c.canceled).dimmed(),
        );
        for runner in &product.runners {
            if runner.status != Status::Success {
                println!("  {:<9} {} ({})", runner.status.to_string(), runner.id, runner.error);
            }
        }
    }
    for error in &manifest.errors {
        println!("{}: {}", "RUN ERROR".red().bold(), error);
    }
    println!();
}
