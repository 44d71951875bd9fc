// HTTP runner - GET a product API path through an injected client

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Runner;
use crate::client::ApiClient;
use crate::error::CollectError;
use crate::op::Op;
use crate::redact::{self, Redact};

/// Fetches one API path and stores the redacted JSON body. A non-2xx
/// response is a conclusive `Fail`; a transport error leaves the outcome
/// `Unknown` (the server may have acted before the connection died).
#[derive(Debug)]
pub struct HttpGet {
    client: Arc<ApiClient>,
    path: String,
    redactions: Vec<Redact>,
    cancel: CancellationToken,
}

impl HttpGet {
    pub fn new(
        client: Arc<ApiClient>,
        path: impl Into<String>,
        redactions: Vec<Redact>,
        cancel: CancellationToken,
    ) -> Result<Self, CollectError> {
        let path = path.into();
        if path.is_empty() {
            return Err(CollectError::EmptyField("request path"));
        }
        Ok(HttpGet {
            client,
            path,
            redactions,
            cancel,
        })
    }
}

#[async_trait]
impl Runner for HttpGet {
    fn id(&self) -> String {
        format!("GET {}", self.path)
    }

    async fn run(&self) -> Op {
        let start = Utc::now();
        if self.cancel.is_cancelled() {
            return Op::canceled(self.id(), self.params(), start);
        }
        debug!(path = %self.path, "fetching");

        let fetched = tokio::select! {
            fetched = self.client.get(&self.path) => fetched,
            () = self.cancel.cancelled() => {
                return Op::canceled(self.id(), self.params(), start);
            }
        };

        match fetched {
            Ok(mut body) => {
                redact::apply_value(&self.redactions, &mut body);
                Op::success(self.id(), Some(body), self.params(), start)
            }
            Err(err @ CollectError::UnexpectedStatus { .. }) => {
                Op::fail(self.id(), None, err, self.params(), start)
            }
            Err(err) => Op::unknown(self.id(), None, err, self.params(), start),
        }
    }

    fn params(&self) -> Value {
        json!({ "path": self.path, "base_url": self.client.base_url() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Status;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a random local port.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut discard = [0u8; 1024];
            let _ = socket.read(&mut discard).await;
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    fn getter(base: String, path: &str, redactions: Vec<Redact>) -> HttpGet {
        HttpGet::new(
            Arc::new(ApiClient::new(base)),
            path,
            redactions,
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ok_response_is_redacted_json() {
        let base = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"cluster": "secret-east", "nodes": 3}"#,
        )
        .await;
        let redactions = vec![Redact::new("secret", None, None).unwrap()];
        let op = getter(base, "/v1/status", redactions).run().await;
        assert_eq!(op.status, Status::Success);
        assert_eq!(
            op.result.unwrap(),
            json!({"cluster": "<REDACTED>-east", "nodes": 3})
        );
    }

    #[tokio::test]
    async fn test_non_2xx_is_fail() {
        let base = one_shot_server("HTTP/1.1 503 Service Unavailable", "{}").await;
        let op = getter(base, "/v1/status", Vec::new()).run().await;
        assert_eq!(op.status, Status::Fail);
        assert!(op.err_string.contains("unexpected HTTP status 503"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_unknown() {
        // nothing is listening here
        let op = getter("http://127.0.0.1:1".to_string(), "/v1/status", Vec::new())
            .run()
            .await;
        assert_eq!(op.status, Status::Unknown);
        assert!(op.err_string.starts_with("request failed"));
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = HttpGet::new(
            Arc::new(ApiClient::new("http://localhost")),
            "",
            Vec::new(),
            CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CollectError::EmptyField(_)));
    }
}
