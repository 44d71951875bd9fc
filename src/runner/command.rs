// Command runner - execute a program directly, no shell in between

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::exec::{exec, ExecError};
use super::Runner;
use crate::error::CollectError;
use crate::op::Op;
use crate::redact::{self, Redact};

/// Characters that mean the caller wanted a shell. Rejected here so a
/// half-working pipeline never silently runs as literal arguments.
const SHELL_CONTROL: &[char] = &['|', '`', ';', '&', '<', '>', '$'];

/// How a command's stdout is interpreted before it lands in the Op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Keep stdout as captured text
    String,
    /// Decode stdout as JSON; a decode failure keeps the raw text
    Json,
}

/// Runs one program with a fixed argument vector. Pipes, redirects, and
/// substitutions are not supported - use [`super::Shell`] for those.
#[derive(Debug)]
pub struct Command {
    command: String,
    program: String,
    args: Vec<String>,
    format: OutputFormat,
    redactions: Vec<Redact>,
    cancel: CancellationToken,
}

impl Command {
    pub fn new(
        command: impl Into<String>,
        format: OutputFormat,
        redactions: Vec<Redact>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectError> {
        let command = command.into();
        if let Some(c) = command.chars().find(|c| SHELL_CONTROL.contains(c)) {
            return Err(CollectError::CommandParse {
                command,
                reason: format!("shell control character '{c}' needs a shell runner"),
            });
        }
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next().ok_or(CollectError::CommandParse {
            command: command.clone(),
            reason: "empty command line".to_string(),
        })?;
        let args = parts.collect();
        Ok(Command {
            command,
            program,
            args,
            format,
            redactions,
            cancel,
        })
    }

    fn finish(&self, out: super::exec::ExecOutput, start: chrono::DateTime<Utc>) -> Op {
        let stdout = redact::apply(&self.redactions, &out.stdout).into_owned();
        let stderr = redact::apply(&self.redactions, &out.stderr).into_owned();
        let decoded = if out.success() && self.format == OutputFormat::Json {
            Some(serde_json::from_str::<Value>(&stdout))
        } else {
            None
        };
        let raw = json!({ "stdout": stdout, "stderr": stderr, "rc": out.exit_code });

        if !out.success() {
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

        match decoded {
            Some(Ok(value)) => Op::success(self.id(), Some(value), self.params(), start),
            Some(Err(err)) => Op::unknown(
                self.id(),
                Some(raw),
                CollectError::JsonDecode(err),
                self.params(),
                start,
            ),
            None => Op::success(self.id(), Some(raw), self.params(), start),
        }
    }
}

#[async_trait]
impl Runner for Command {
    fn id(&self) -> String {
        self.command.clone()
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        debug!(command = %self.command, "running command");
        match exec(&self.program, &self.args, &self.cancel).await {
            Ok(out) => self.finish(out, start),
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
        json!({ "command": self.command, "format": self.format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Status;
    use std::time::Duration;

    fn command(line: &str, format: OutputFormat) -> Command {
        Command::new(line, format, Vec::new(), CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_rejects_shell_control_characters() {
        for line in ["cat /etc/passwd | grep root", "echo `id`", "ls > /tmp/x"] {
            let err = Command::new(
                line,
                OutputFormat::String,
                Vec::new(),
                CancellationToken::new(),
            )
            .unwrap_err();
            assert!(matches!(err, CollectError::CommandParse { .. }), "{line}");
        }
    }

    #[test]
    fn test_rejects_empty_command() {
        let err = Command::new(
            "   ",
            OutputFormat::String,
            Vec::new(),
            CancellationToken::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty command line"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_skip_not_fail() {
        let op = command("not-a-real-binary-xyz --version", OutputFormat::String)
            .run()
            .await;
        assert_eq!(op.status, Status::Skip);
        assert_eq!(op.err_string, "binary not found: not-a-real-binary-xyz");
    }

    #[tokio::test]
    async fn test_success_captures_stdout() {
        let op = command("echo hello world", OutputFormat::String).run().await;
        assert_eq!(op.status, Status::Success);
        let result = op.result.unwrap();
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "hello world");
        assert_eq!(result["rc"], 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unknown_with_output_kept() {
        let op = command("ls /definitely-not-a-path-xyz", OutputFormat::String)
            .run()
            .await;
        assert_eq!(op.status, Status::Unknown);
        assert!(op.err_string.starts_with("command exited with status"));
        let result = op.result.unwrap();
        assert!(!result["stderr"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_format_decodes_stdout() {
        let op = command(r#"echo {"port": 8200}"#, OutputFormat::Json).run().await;
        assert_eq!(op.status, Status::Success);
        assert_eq!(op.result.unwrap()["port"], 8200);
    }

    #[tokio::test]
    async fn test_json_parse_failure_keeps_raw_text() {
        let op = command("echo not-json-at-all", OutputFormat::Json).run().await;
        assert_eq!(op.status, Status::Unknown);
        assert!(op.err_string.starts_with("output is not valid JSON"));
        let result = op.result.unwrap();
        assert_eq!(result["stdout"].as_str().unwrap().trim(), "not-json-at-all");
    }

    #[tokio::test]
    async fn test_output_is_redacted() {
        let redactions = vec![Redact::new("secret", None, None).unwrap()];
        let runner = Command::new(
            "echo the secret word",
            OutputFormat::String,
            redactions,
            CancellationToken::new(),
        )
        .unwrap();
        let op = runner.run().await;
        let stdout = op.result.unwrap()["stdout"].as_str().unwrap().to_string();
        assert_eq!(stdout.trim(), "the <REDACTED> word");
    }

    #[tokio::test]
    async fn test_cancellation_mid_flight() {
        let cancel = CancellationToken::new();
        let runner = Command::new(
            "sleep 30",
            OutputFormat::String,
            Vec::new(),
            cancel.clone(),
        )
        .unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let op = runner.run().await;
        assert_eq!(op.status, Status::Canceled);
        assert_eq!(op.err_string, "context canceled");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_params_snapshot() {
        let runner = command("uname -a", OutputFormat::String);
        assert_eq!(
            runner.params(),
            json!({ "command": "uname -a", "format": "string" })
        );
    }
}
