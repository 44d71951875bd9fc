// Journald log runner - probe the journal, then extract a unit's window

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::exec::{exec, ExecError};
use super::Runner;
use crate::error::CollectError;
use crate::op::Op;
use crate::redact::{self, Redact};

/// journalctl prints this when it has nothing for a unit; on a host where
/// the unit never ran it is the only signal the name is wrong.
const NO_ENTRIES: &str = "No entries";

/// Extracts a systemd unit's journal over `[since, until)` into the
/// destination directory. journald itself missing is `Skip`; journald
/// present but blind to the unit is `Fail`.
#[derive(Debug)]
pub struct JournaldLog {
    unit: String,
    dest_dir: PathBuf,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    redactions: Vec<Redact>,
    cancel: CancellationToken,
    program: String,
}

impl JournaldLog {
    pub fn new(
        unit: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        redactions: Vec<Redact>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectError> {
        let unit = unit.into();
        if unit.is_empty() {
            return Err(CollectError::EmptyField("unit name"));
        }
        if let (Some(s), Some(u)) = (since, until) {
            if s >= u {
                return Err(CollectError::InvalidWindow { since: s, until: u });
            }
        }
        Ok(JournaldLog {
            unit,
            dest_dir: dest_dir.into(),
            since,
            until,
            redactions,
            cancel,
            program: "journalctl".to_string(),
        })
    }

    #[cfg(test)]
    fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn extract_args(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string(), "-u".to_string(), self.unit.clone()];
        if let Some(since) = self.since {
            args.push("--since".to_string());
            args.push(journal_time(since));
        }
        if let Some(until) = self.until {
            args.push("--until".to_string());
            args.push(journal_time(until));
        }
        args.push("--no-pager".to_string());
        args
    }

    async fn probe(&self) -> Result<(), Op> {
        let start = Utc::now();
        let boots = vec!["--list-boots".to_string()];
        match exec(&self.program, &boots, &self.cancel).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                let reason = out.stderr.lines().next().unwrap_or("journal unreadable");
                return Err(Op::skip(
                    self.id(),
                    CollectError::BackendUnavailable(reason.to_string()),
                    self.params(),
                    start,
                ));
            }
            Err(ExecError::NotFound(program)) => {
                return Err(Op::skip(
                    self.id(),
                    CollectError::BinaryNotFound(program),
                    self.params(),
                    start,
                ));
            }
            Err(ExecError::Canceled) => {
                return Err(Op::canceled(self.id(), self.params(), start));
            }
            Err(ExecError::Io(err)) => {
                return Err(Op::unknown(
                    self.id(),
                    None,
                    CollectError::Io(err),
                    self.params(),
                    start,
                ));
            }
        }

        let peek = vec![
            "-u".to_string(),
            self.unit.clone(),
            "-n".to_string(),
            "1".to_string(),
            "--no-pager".to_string(),
        ];
        match exec(&self.program, &peek, &self.cancel).await {
            Ok(out) if out.success() && !out.stdout.contains(NO_ENTRIES) => Ok(()),
            Ok(_) => Err(Op::fail(
                self.id(),
                None,
                CollectError::ServiceNotFound(self.unit.clone()),
                self.params(),
                start,
            )),
            Err(ExecError::Canceled) => Err(Op::canceled(self.id(), self.params(), start)),
            Err(ExecError::NotFound(program)) => Err(Op::skip(
                self.id(),
                CollectError::BinaryNotFound(program),
                self.params(),
                start,
            )),
            Err(ExecError::Io(err)) => Err(Op::unknown(
                self.id(),
                None,
                CollectError::Io(err),
                self.params(),
                start,
            )),
        }
    }
}

/// journalctl's `--since`/`--until` take systemd.time stamps, not RFC 3339.
fn journal_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[async_trait]
impl Runner for JournaldLog {
    fn id(&self) -> String {
        format!("journald {}", self.unit)
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        if let Err(op) = self.probe().await {
            return op;
        }

        let args = self.extract_args();
        debug!(unit = %self.unit, "extracting journal");
        let out = match exec(&self.program, &args, &self.cancel).await {
            Ok(out) => out,
            Err(ExecError::Canceled) => return Op::canceled(self.id(), self.params(), start),
            Err(ExecError::NotFound(program)) => {
                return Op::skip(
                    self.id(),
                    CollectError::BinaryNotFound(program),
                    self.params(),
                    start,
                )
            }
            Err(ExecError::Io(err)) => {
                return Op::unknown(self.id(), None, CollectError::Io(err), self.params(), start)
            }
        };
        if !out.success() {
            let raw = json!({ "stderr": out.stderr, "rc": out.exit_code });
            return Op::unknown(
                self.id(),
                Some(raw),
                CollectError::CommandExit {
                    code: out.exit_code,
                },
                self.params(),
                start,
            );
        }

        let scrubbed = redact::apply(&self.redactions, &out.stdout);
        if let Err(source) = tokio::fs::create_dir_all(&self.dest_dir).await {
            let err = CollectError::CreateDir {
                path: self.dest_dir.clone(),
                source,
            };
            return Op::fail(self.id(), None, err, self.params(), start);
        }
        let dest = self.dest_dir.join(format!("journald-{}.log", self.unit));
        if let Err(source) = tokio::fs::write(&dest, scrubbed.as_bytes()).await {
            let err = CollectError::CopyFile {
                path: dest.clone(),
                source,
            };
            return Op::fail(self.id(), None, err, self.params(), start);
        }

        let result = json!({
            "log_file": dest.display().to_string(),
            "bytes": scrubbed.len(),
        });
        Op::success(self.id(), Some(result), self.params(), start)
    }

    fn params(&self) -> Value {
        json!({
            "unit": self.unit,
            "dest_dir": self.dest_dir.display().to_string(),
            "since": self.since,
            "until": self.until,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Status;
    use chrono::TimeZone;

    #[test]
    fn test_extract_args_carry_the_window() {
        let since = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 8, 4, 0, 0, 0).unwrap();
        let runner = JournaldLog::new(
            "vault",
            "/tmp/dest",
            Some(since),
            Some(until),
            Vec::new(),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            runner.extract_args(),
            vec![
                "-x",
                "-u",
                "vault",
                "--since",
                "2026-08-01 00:00:00 UTC",
                "--until",
                "2026-08-04 00:00:00 UTC",
                "--no-pager",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_journalctl_is_skip() {
        let op = JournaldLog::new(
            "vault",
            "/tmp/dest",
            None,
            None,
            Vec::new(),
            CancellationToken::new(),
        )
        .unwrap()
        .with_program("not-a-real-journalctl-xyz")
        .run()
        .await;
        assert_eq!(op.status, Status::Skip);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let until = Utc::now();
        let since = until + chrono::Duration::hours(1);
        let err = JournaldLog::new(
            "vault",
            "/tmp/dest",
            Some(since),
            Some(until),
            Vec::new(),
            CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CollectError::InvalidWindow { .. }));
    }
}
