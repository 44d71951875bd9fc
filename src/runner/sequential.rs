// Seq composite - run children in order, stop at the first non-success

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Runner;
use crate::error::CollectError;
use crate::op::{Op, Status};

/// Sequential composite. Children run strictly in list order on one task;
/// the first child that does not come back `Success` stops the walk and
/// fails the composite, carrying every Op produced up to and including the
/// failure. An optional deadline and the cancellation token are raced
/// against the walk; leaf runners hold the same token, so cancellation
/// reaches in-flight subprocesses rather than stopping at this boundary.
#[derive(Debug)]
pub struct Seq {
    id: String,
    runners: Vec<Arc<dyn Runner>>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Seq {
    pub fn new(
        id: impl Into<String>,
        runners: Vec<Arc<dyn Runner>>,
        cancel: CancellationToken,
    ) -> Self {
        Seq {
            id: id.into(),
            runners,
            timeout: None,
            cancel,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn walk(&self) -> (HashMap<String, Op>, Option<CollectError>) {
        let mut ops = HashMap::new();
        for runner in &self.runners {
            let op = runner.run().await;
            let child = op.id.clone();
            let status = op.status;
            let reason = op.err_string.clone();
            ops.insert(child.clone(), op);
            if status != Status::Success {
                warn!(parent = %self.id, %child, %status, "aborting sequence");
                let err = CollectError::ChildFailed {
                    parent: self.id.clone(),
                    child,
                    reason,
                };
                return (ops, Some(err));
            }
        }
        (ops, None)
    }

    /// Walk the children under the deadline/cancellation race. Used by the
    /// agent's serial mode as well as the `Runner` impl.
    pub async fn run_seq(&self) -> (HashMap<String, Op>, Status, Option<CollectError>) {
        debug!(id = %self.id, children = self.runners.len(), "running in sequence");
        let walk = self.walk();
        tokio::pin!(walk);

        let outcome = if let Some(timeout) = self.timeout {
            tokio::select! {
                outcome = &mut walk => Some(outcome),
                () = self.cancel.cancelled() => None,
                () = tokio::time::sleep(timeout) => {
                    return (HashMap::new(), Status::Timeout, Some(CollectError::DeadlineExceeded));
                }
            }
        } else {
            tokio::select! {
                outcome = &mut walk => Some(outcome),
                () = self.cancel.cancelled() => None,
            }
        };

        match outcome {
            Some((ops, None)) => (ops, Status::Success, None),
            Some((ops, Some(err))) => (ops, Status::Fail, Some(err)),
            None => (HashMap::new(), Status::Canceled, Some(CollectError::Canceled)),
        }
    }
}

#[async_trait]
impl Runner for Seq {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        let (ops, status, error) = self.run_seq().await;
        let result = if ops.is_empty() {
            None
        } else {
            serde_json::to_value(&ops).ok()
        };
        match status {
            Status::Success => Op::success(self.id(), result, self.params(), start),
            Status::Timeout => Op::timeout(self.id(), self.params(), start),
            Status::Canceled => Op::canceled(self.id(), self.params(), start),
            _ => {
                let err = error.unwrap_or(CollectError::ChildFailed {
                    parent: self.id.clone(),
                    child: String::new(),
                    reason: "unknown child failure".to_string(),
                });
                Op::fail(self.id(), result, err, self.params(), start)
            }
        }
    }

    fn params(&self) -> Value {
        json!({
            "runners": self.runners.iter().map(|r| r.id()).collect::<Vec<_>>(),
            "timeout_ms": self.timeout.map(|t| t.as_millis() as u64),
        })
    }
}
