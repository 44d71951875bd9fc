// Do composite - run every child concurrently, join them all

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::debug;

use super::Runner;
use crate::error::CollectError;
use crate::op::Op;

/// Concurrent fan-out over child runners. Each child gets its own task;
/// the composite blocks until every one has been joined - there is no
/// early abort, so a failing child costs only its own entry. The
/// composite's own status is `Success` once the join completes; per-child
/// outcomes live in the nested map.
#[derive(Debug)]
pub struct Do {
    id: String,
    runners: Vec<Arc<dyn Runner>>,
}

impl Do {
    pub fn new(id: impl Into<String>, runners: Vec<Arc<dyn Runner>>) -> Self {
        Do {
            id: id.into(),
            runners,
        }
    }

    /// Run every child and key the results by child ID. This is what the
    /// agent consumes directly; the `Runner` impl wraps it into one Op.
    pub async fn run_all(&self) -> HashMap<String, Op> {
        debug!(id = %self.id, children = self.runners.len(), "fanning out");
        let mut handles = Vec::with_capacity(self.runners.len());
        for runner in &self.runners {
            let runner = Arc::clone(runner);
            let id = runner.id();
            handles.push((id, tokio::spawn(async move { runner.run().await })));
        }

        let mut ops = HashMap::with_capacity(handles.len());
        let (ids, joins): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (id, joined) in ids.into_iter().zip(join_all(joins).await) {
            let op = match joined {
                Ok(op) => op,
                Err(err) => Op::unknown(
                    id.clone(),
                    None,
                    CollectError::ChildFailed {
                        parent: self.id.clone(),
                        child: id.clone(),
                        reason: err.to_string(),
                    },
                    json!({}),
                    Utc::now(),
                ),
            };
            ops.insert(id, op);
        }
        ops
    }
}

#[async_trait]
impl Runner for Do {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        let ops = self.run_all().await;
        let result = serde_json::to_value(&ops).ok();
        Op::success(self.id(), result, self.params(), start)
    }

    fn params(&self) -> Value {
        json!({ "runners": self.runners.iter().map(|r| r.id()).collect::<Vec<_>>() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Status;
    use crate::runner::testutil::FixedRunner;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_full_join_waits_for_the_slowest() {
        let delays = [10u64, 80, 30, 50, 20];
        let runners: Vec<Arc<dyn Runner>> = delays
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                Arc::new(FixedRunner::sleeping(
                    &format!("runner-{i}"),
                    Duration::from_millis(*ms),
                )) as Arc<dyn Runner>
            })
            .collect();

        let started = Instant::now();
        let ops = Do::new("fanout", runners).run_all().await;
        assert_eq!(ops.len(), 5);
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert!(ops.values().all(|op| op.status == Status::Success));
    }

    #[tokio::test]
    async fn test_child_failure_does_not_fail_the_composite() {
        let runners: Vec<Arc<dyn Runner>> = vec![
            Arc::new(FixedRunner::ok("good")),
            Arc::new(FixedRunner::failing("bad")),
        ];
        let composite = Do::new("fanout", runners);
        let op = composite.run().await;
        assert_eq!(op.status, Status::Success);

        let nested = op.result.unwrap();
        assert_eq!(nested["good"]["status"], "success");
        assert_eq!(nested["bad"]["status"], "fail");
    }

    #[tokio::test]
    async fn test_results_keyed_by_child_id() {
        let runners: Vec<Arc<dyn Runner>> = vec![
            Arc::new(FixedRunner::ok("a")),
            Arc::new(FixedRunner::ok("b")),
        ];
        let ops = Do::new("fanout", runners).run_all().await;
        assert!(ops.contains_key("a"));
        assert!(ops.contains_key("b"));
        assert_eq!(ops["a"].id, "a");
    }
}
