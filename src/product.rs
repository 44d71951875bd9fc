// Products - named bundles of runners with their own filters

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::CollectError;
use crate::filter;
use crate::redact::Redact;
use crate::runner::{Command, Copy, OutputFormat, Runner};

/// A named bundle of runners plus its select/exclude globs. Built before a
/// run, filtered once, executed once, then discarded after its Ops are
/// merged into the aggregate.
#[derive(Debug)]
pub struct Product {
    pub name: String,
    pub runners: Vec<Arc<dyn Runner>>,
    pub selects: Vec<String>,
    pub excludes: Vec<String>,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Product {
            name: name.into(),
            runners: Vec::new(),
            selects: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runners.push(runner);
        self
    }

    pub fn with_selects(mut self, selects: Vec<String>) -> Self {
        self.selects = selects;
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }

    /// Apply this product's filters to its own runner list.
    pub fn filtered(mut self) -> Result<Self, CollectError> {
        self.runners = filter::apply(&self.selects, &self.excludes, self.runners)?;
        Ok(self)
    }
}

/// Baseline commands worth having in any bundle, regardless of which
/// cluster products are configured.
const HOST_COMMANDS: &[&str] = &[
    "uname -a",
    "hostname",
    "uptime",
    "df -h",
    "free -m",
    "ps aux",
];

/// The built-in host product: general OS state plus a copy of /etc/hosts.
pub fn host(
    dest: &Path,
    redactions: &[Redact],
    cancel: &CancellationToken,
) -> Result<Product, CollectError> {
    let mut product = Product::new("host");
    for line in HOST_COMMANDS {
        let runner = Command::new(
            *line,
            OutputFormat::String,
            redactions.to_vec(),
            cancel.clone(),
        )?;
        product = product.with_runner(Arc::new(runner));
    }
    let hosts_file = Copy::new(
        "/etc/hosts",
        dest.join("host"),
        None,
        None,
        redactions.to_vec(),
        cancel.clone(),
    )?;
    Ok(product.with_runner(Arc::new(hosts_file)))
}
