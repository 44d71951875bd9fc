// Docker log runner - probe the daemon, then extract container logs

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

/// Extracts one container's logs since a point in time into the
/// destination directory. Probes before extracting: a missing or
/// unreachable daemon is `Skip`, an unknown container is `Fail`.
#[derive(Debug)]
pub struct DockerLog {
    container: String,
    dest_dir: PathBuf,
    since: Option<DateTime<Utc>>,
    redactions: Vec<Redact>,
    cancel: CancellationToken,
    program: String,
}

impl DockerLog {
    pub fn new(
        container: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        since: Option<DateTime<Utc>>,
        redactions: Vec<Redact>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectError> {
        let container = container.into();
        if container.is_empty() {
            return Err(CollectError::EmptyField("container name"));
        }
        Ok(DockerLog {
            container,
            dest_dir: dest_dir.into(),
            since,
            redactions,
            cancel,
            program: "docker".to_string(),
        })
    }

    /// Use a docker-compatible CLI (podman, nerdctl) instead.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn log_args(&self) -> Vec<String> {
        let mut args = vec!["logs".to_string()];
        if let Some(since) = self.since {
            args.push("--since".to_string());
            args.push(since.to_rfc3339());
        }
        args.push(self.container.clone());
        args
    }

    async fn probe(&self) -> Result<(), Op> {
        let start = Utc::now();
        let version = vec!["version".to_string()];
        match exec(&self.program, &version, &self.cancel).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                let reason = out.stderr.lines().next().unwrap_or("daemon unreachable");
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

        let inspect = vec![
            "container".to_string(),
            "inspect".to_string(),
            self.container.clone(),
        ];
        match exec(&self.program, &inspect, &self.cancel).await {
            Ok(out) if out.success() => Ok(()),
            Ok(_) => Err(Op::fail(
                self.id(),
                None,
                CollectError::ServiceNotFound(self.container.clone()),
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

#[async_trait]
impl Runner for DockerLog {
    fn id(&self) -> String {
        format!("docker logs {}", self.container)
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        if let Err(op) = self.probe().await {
            return op;
        }

        let args = self.log_args();
        debug!(container = %self.container, "extracting docker logs");
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

        // docker interleaves app logs across stdout and stderr
        let mut text = out.stdout;
        text.push_str(&out.stderr);
        let scrubbed = redact::apply(&self.redactions, &text);
        if let Err(source) = tokio::fs::create_dir_all(&self.dest_dir).await {
            let err = CollectError::CreateDir {
                path: self.dest_dir.clone(),
                source,
            };
            return Op::fail(self.id(), None, err, self.params(), start);
        }
        let dest = self.dest_dir.join(format!("docker-{}.log", self.container));
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
            "container": self.container,
            "dest_dir": self.dest_dir.display().to_string(),
            "since": self.since,
        })
    }
}
