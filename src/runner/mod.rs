// Runner module - the unit-of-work abstraction

use async_trait::async_trait;
use serde_json::Value;

use crate::op::Op;

pub mod command;
pub mod copy;
pub mod docker;
pub(crate) mod exec;
pub mod http;
pub mod journald;
pub mod parallel;
pub mod sequential;
pub mod shell;

pub use command::{Command, OutputFormat};
pub use copy::Copy;
pub use docker::DockerLog;
pub use http::HttpGet;
pub use journald::JournaldLog;
pub use parallel::Do;
pub use sequential::Seq;
pub use shell::Shell;

/// Common trait for every unit of work, leaf or composite.
///
/// Implementations must not panic from `run()`; every failure mode becomes
/// a status plus error inside the returned [`Op`]. Long-running variants
/// are constructed with a `CancellationToken` and react to it both before
/// starting and mid-flight.
#[async_trait]
pub trait Runner: Send + Sync + std::fmt::Debug {
    /// Stable identifier: the results-map key and the filter target.
    fn id(&self) -> String;

    /// Execute the unit of work and freeze the outcome into an [`Op`].
    async fn run(&self) -> Op;

    /// Snapshot of the public configuration, kept on the Op for audit.
    fn params(&self) -> Value;
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};

    use crate::error::CollectError;
    use crate::op::{Op, Status};

    use super::Runner;

    /// A runner with a scripted outcome, optional delay, and a side-effect
    /// flag so tests can assert it did (or did not) execute.
    #[derive(Debug)]
    pub struct FixedRunner {
        pub id: String,
        pub status: Status,
        pub delay: Duration,
        pub touched: Option<Arc<AtomicBool>>,
    }

    impl FixedRunner {
        pub fn ok(id: &str) -> Self {
            FixedRunner {
                id: id.to_string(),
                status: Status::Success,
                delay: Duration::ZERO,
                touched: None,
            }
        }

        pub fn failing(id: &str) -> Self {
            FixedRunner {
                status: Status::Fail,
                ..FixedRunner::ok(id)
            }
        }

        pub fn sleeping(id: &str, delay: Duration) -> Self {
            FixedRunner {
                delay,
                ..FixedRunner::ok(id)
            }
        }

        pub fn tracked(id: &str, flag: Arc<AtomicBool>) -> Self {
            FixedRunner {
                touched: Some(flag),
                ..FixedRunner::ok(id)
            }
        }
    }

    #[async_trait]
    impl Runner for FixedRunner {
        fn id(&self) -> String {
            self.id.clone()
        }

        async fn run(&self) -> Op {
            let start = Utc::now();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(flag) = &self.touched {
                flag.store(true, Ordering::SeqCst);
            }
            match self.status {
                Status::Success => {
                    Op::success(self.id(), Some(json!("ok")), self.params(), start)
                }
                Status::Fail => Op::fail(
                    self.id(),
                    None,
                    CollectError::CommandExit { code: 1 },
                    self.params(),
                    start,
                ),
                Status::Unknown => Op::unknown(
                    self.id(),
                    None,
                    CollectError::CommandExit { code: 1 },
                    self.params(),
                    start,
                ),
                Status::Skip => Op::skip(
                    self.id(),
                    CollectError::BinaryNotFound(self.id()),
                    self.params(),
                    start,
                ),
                Status::Timeout => Op::timeout(self.id(), self.params(), start),
                Status::Canceled => Op::canceled(self.id(), self.params(), start),
            }
        }

        fn params(&self) -> Value {
            json!({ "id": self.id })
        }
    }
}
