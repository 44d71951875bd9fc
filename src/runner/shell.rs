// Shell runner - execute through /bin/sh -c
// This allows shell features like variable expansion, pipes, and redirects

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::exec::{exec, ExecError};
use super::Runner;
use crate::error::CollectError;
use crate::op::Op;
use crate::redact::{self, Redact};

const SHELL_PATH: &str = "/bin/sh";

/// Runs one command line through a real subshell. Anything `/bin/sh`
/// accepts is fair game; output is captured and redacted the same way
/// [`super::Command`] does it.
#[derive(Debug)]
pub struct Shell {
    command: String,
    redactions: Vec<Redact>,
    cancel: CancellationToken,
}

impl Shell {
    pub fn new(
        command: impl Into<String>,
        redactions: Vec<Redact>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(CollectError::EmptyField("shell command"));
        }
        Ok(Shell {
            command,
            redactions,
            cancel,
        })
    }
}

#[async_trait]
impl Runner for Shell {
    fn id(&self) -> String {
        self.command.clone()
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        debug!(command = %self.command, "running shell command");
        let args = vec!["-c".to_string(), self.command.clone()];
        match exec(SHELL_PATH, &args, &self.cancel).await {
            Ok(out) => {
                let stdout = redact::apply(&self.redactions, &out.stdout).into_owned();
                let stderr = redact::apply(&self.redactions, &out.stderr).into_owned();
                let result = json!({ "stdout": stdout, "stderr": stderr, "rc": out.exit_code });
                if out.success() {
                    Op::success(self.id(), Some(result), self.params(), start)
                } else {
                    Op::unknown(
                        self.id(),
                        Some(result),
                        CollectError::CommandExit {
                            code: out.exit_code,
                        },
                        self.params(),
                        start,
                    )
                }
            }
            Err(ExecError::NotFound(program)) => Op::skip(
                self.id(),
                CollectError::BinaryNotFound(program),
                self.params(),
                start,
            ),
            Err(ExecError::Canceled) => Op::canceled(self.id(), self.params(), start),
            Err(ExecError::Io(err)) => Op::unknown(
                self.id(),
                None,
                CollectError::Io(err),
                self.params(),
                start,
            ),
        }
    }

    fn params(&self) -> Value {
        json!({ "command": self.command, "shell": SHELL_PATH })
    }
}
