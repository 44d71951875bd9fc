// Copy runner - harvest files matching a name pattern and time window

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glob::Pattern;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::Runner;
use crate::error::CollectError;
use crate::op::Op;
use crate::redact::{self, Redact};

/// Copies files under a source path into the destination directory,
/// keeping the relative layout. The final component of the source may be
/// a glob (`*.log`); matches are filtered by modification time into
/// `[since, until)`. With redactions configured the copy goes line by
/// line through the chain; otherwise it is byte-identical.
#[derive(Debug)]
pub struct Copy {
    src: String,
    root: PathBuf,
    pattern: Pattern,
    dest_dir: PathBuf,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    redactions: Vec<Redact>,
    cancel: CancellationToken,
}

impl Copy {
    pub fn new(
        src: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        redactions: Vec<Redact>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectError> {
        let src = src.into();
        if src.is_empty() {
            return Err(CollectError::EmptyField("copy source"));
        }
        let dest_dir = dest_dir.into();
        if dest_dir.as_os_str().is_empty() {
            return Err(CollectError::EmptyField("copy destination"));
        }
        if let (Some(s), Some(u)) = (since, until) {
            if s >= u {
                return Err(CollectError::InvalidWindow { since: s, until: u });
            }
        }

        // A glob only makes sense in the final component; everything above
        // it is the walk root.
        let path = Path::new(&src);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (root, raw_pattern) = if name.contains(['*', '?', '[']) {
            (
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
                name,
            )
        } else {
            (path.to_path_buf(), "*".to_string())
        };
        let pattern =
            Pattern::new(&raw_pattern).map_err(|source| CollectError::InvalidPattern {
                pattern: raw_pattern,
                source,
            })?;

        Ok(Copy {
            src,
            root,
            pattern,
            dest_dir,
            since,
            until,
            redactions,
            cancel,
        })
    }

    fn in_window(&self, modified: DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if modified < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if modified >= until {
                return false;
            }
        }
        true
    }

    async fn copy_one(&self, src: &Path, dest: &Path) -> Result<(), CollectError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CollectError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        if self.redactions.is_empty() {
            tokio::fs::copy(src, dest)
                .await
                .map_err(|source| CollectError::CopyFile {
                    path: src.to_path_buf(),
                    source,
                })?;
            return Ok(());
        }

        let raw = tokio::fs::read(src)
            .await
            .map_err(|source| CollectError::CopyFile {
                path: src.to_path_buf(),
                source,
            })?;
        let text = String::from_utf8_lossy(&raw);
        let mut scrubbed = String::with_capacity(text.len());
        for line in text.lines() {
            scrubbed.push_str(&redact::apply(&self.redactions, line));
            scrubbed.push('\n');
        }
        tokio::fs::write(dest, scrubbed)
            .await
            .map_err(|source| CollectError::CopyFile {
                path: dest.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl Runner for Copy {
    fn id(&self) -> String {
        format!("copy {}", self.src)
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        if self.cancel.is_cancelled() {
            return Op::canceled(self.id(), self.params(), start);
        }

        if let Err(source) = tokio::fs::create_dir_all(&self.dest_dir).await {
            let err = CollectError::CreateDir {
                path: self.dest_dir.clone(),
                source,
            };
            return Op::fail(self.id(), None, err, self.params(), start);
        }

        let mut copied: Vec<String> = Vec::new();
        for entry in WalkDir::new(&self.root) {
            if self.cancel.is_cancelled() {
                return Op::canceled(self.id(), self.params(), start);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let err = CollectError::WalkSource {
                        path: self.root.clone(),
                        source,
                    };
                    let partial = json!({ "copied": copied, "count": copied.len() });
                    return Op::fail(self.id(), Some(partial), err, self.params(), start);
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.pattern.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(modified) => DateTime::<Utc>::from(modified),
                None => {
                    warn!(path = %entry.path().display(), "no modification time, skipping");
                    continue;
                }
            };
            if !self.in_window(modified) {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let dest = self.dest_dir.join(rel);
            debug!(src = %entry.path().display(), dest = %dest.display(), "copying");
            if let Err(err) = self.copy_one(entry.path(), &dest).await {
                let partial = json!({ "copied": copied, "count": copied.len() });
                return Op::fail(self.id(), Some(partial), err, self.params(), start);
            }
            copied.push(dest.display().to_string());
        }

        let result = json!({ "copied": copied, "count": copied.len() });
        Op::success(self.id(), Some(result), self.params(), start)
    }

    fn params(&self) -> Value {
        json!({
            "src": self.src,
            "dest_dir": self.dest_dir.display().to_string(),
            "since": self.since,
            "until": self.until,
        })
    }
}
