// Cancellation-aware subprocess execution shared by command-backed runners

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as ProcessCommand;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub(crate) struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub(crate) enum ExecError {
    /// The program is not on PATH
    NotFound(String),
    /// The token ended the run; the child has been killed and reaped
    Canceled,
    Io(std::io::Error),
}

/// Spawn `program` with `args`, capture both streams, and race the wait
/// against the cancellation token. On cancellation the child is killed,
/// not abandoned; `kill_on_drop` covers the paths where the future itself
/// is dropped mid-wait.
pub(crate) async fn exec(
    program: &str,
    args: &[String],
    cancel: &CancellationToken,
) -> Result<ExecOutput, ExecError> {
    if cancel.is_cancelled() {
        return Err(ExecError::Canceled);
    }

    let mut child = ProcessCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ExecError::NotFound(program.to_string())
            } else {
                ExecError::Io(e)
            }
        })?;

    let stdout_task = child.stdout.take().map(|s| tokio::spawn(slurp(s)));
    let stderr_task = child.stderr.take().map(|s| tokio::spawn(slurp(s)));

    let status = tokio::select! {
        res = child.wait() => res.map_err(ExecError::Io)?,
        () = cancel.cancelled() => {
            if let Err(err) = child.kill().await {
                warn!(program, error = %err, "failed to kill canceled process");
            }
            let _ = child.wait().await;
            return Err(ExecError::Canceled);
        }
    };

    Ok(ExecOutput {
        stdout: collect(stdout_task).await,
        stderr: collect(stderr_task).await,
        exit_code: status.code().unwrap_or(-1),
    })
}

async fn slurp<R>(mut reader: R) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    }
}
