// Immutable result model for executed runners

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::CollectError;

/// Terminal outcome of a unit of work. Assigned exactly once, never revised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The work completed and the result is trustworthy
    Success,
    /// A known, conclusive error
    Fail,
    /// The result is indeterminate - side effects may or may not have landed
    Unknown,
    /// Intentionally not run (unsupported platform, missing binary/service)
    Skip,
    /// The deadline expired before the work resolved
    Timeout,
    /// The run was canceled from outside
    Canceled,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Success => "success",
            Status::Fail => "fail",
            Status::Unknown => "unknown",
            Status::Skip => "skip",
            Status::Timeout => "timeout",
            Status::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// Record of one runner execution: built once when `run()` returns, then
/// frozen. The structured `error` stays in-process; `err_string` is its
/// serializable mirror so the JSON artifact alone is enough to diagnose a
/// failure.
#[derive(Debug, Serialize)]
pub struct Op {
    pub id: String,
    pub result: Option<Value>,
    pub status: Status,
    #[serde(skip)]
    pub error: Option<CollectError>,
    #[serde(rename = "error")]
    pub err_string: String,
    pub params: Value,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Op {
    fn new(
        id: String,
        status: Status,
        result: Option<Value>,
        error: Option<CollectError>,
        params: Value,
        start: DateTime<Utc>,
    ) -> Self {
        let err_string = error.as_ref().map(|e| e.to_string()).unwrap_or_default();
        Op {
            id,
            result,
            status,
            error,
            err_string,
            params,
            start,
            end: Utc::now(),
        }
    }

    pub fn success(id: String, result: Option<Value>, params: Value, start: DateTime<Utc>) -> Self {
        Op::new(id, Status::Success, result, None, params, start)
    }

    pub fn fail(
        id: String,
        result: Option<Value>,
        error: CollectError,
        params: Value,
        start: DateTime<Utc>,
    ) -> Self {
        Op::new(id, Status::Fail, result, Some(error), params, start)
    }

    pub fn unknown(
        id: String,
        result: Option<Value>,
        error: CollectError,
        params: Value,
        start: DateTime<Utc>,
    ) -> Self {
        Op::new(id, Status::Unknown, result, Some(error), params, start)
    }

    pub fn skip(id: String, error: CollectError, params: Value, start: DateTime<Utc>) -> Self {
        Op::new(id, Status::Skip, None, Some(error), params, start)
    }

    pub fn timeout(id: String, params: Value, start: DateTime<Utc>) -> Self {
        Op::new(
            id,
            Status::Timeout,
            None,
            Some(CollectError::DeadlineExceeded),
            params,
            start,
        )
    }

    pub fn canceled(id: String, params: Value, start: DateTime<Utc>) -> Self {
        Op::new(
            id,
            Status::Canceled,
            None,
            Some(CollectError::Canceled),
            params,
            start,
        )
    }
}

/// Per-status tallies for one product, used in the manifest and the
/// terminal recap.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusCounts {
    pub success: usize,
    pub fail: usize,
    pub unknown: usize,
    pub skip: usize,
    pub timeout: usize,
    pub canceled: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Success => self.success += 1,
            Status::Fail => self.fail += 1,
            Status::Unknown => self.unknown += 1,
            Status::Skip => self.skip += 1,
            Status::Timeout => self.timeout += 1,
            Status::Canceled => self.canceled += 1,
        }
    }

    pub fn tally(ops: &HashMap<String, Op>) -> Self {
        let mut counts = StatusCounts::default();
        for op in ops.values() {
            counts.record(op.status);
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.success + self.fail + self.unknown + self.skip + self.timeout + self.canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_err_string_mirrors_error() {
        let ok = Op::success("id".to_string(), None, json!({}), Utc::now());
        assert!(ok.error.is_none());
        assert!(ok.err_string.is_empty());

        let failed = Op::fail(
            "id".to_string(),
            None,
            CollectError::CommandExit { code: 2 },
            json!({}),
            Utc::now(),
        );
        assert!(failed.error.is_some());
        assert_eq!(failed.err_string, "command exited with status 2");
    }

    #[test]
    fn test_structured_error_excluded_from_json() {
        let op = Op::skip(
            "uname -a".to_string(),
            CollectError::BinaryNotFound("uname".to_string()),
            json!({"command": "uname -a"}),
            Utc::now(),
        );
        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(encoded["status"], "skip");
        assert_eq!(encoded["error"], "binary not found: uname");
        assert_eq!(encoded["result"], Value::Null);
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.record(Status::Success);
        counts.record(Status::Success);
        counts.record(Status::Skip);
        counts.record(Status::Timeout);
        assert_eq!(counts.success, 2);
        assert_eq!(counts.skip, 1);
        assert_eq!(counts.timeout, 1);
        assert_eq!(counts.fail, 0);
        assert_eq!(counts.total(), 4);
    }
}
