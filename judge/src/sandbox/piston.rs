//! Piston HTTP client
//!
//! Posts programs to `{base_url}/execute`. Status codes are mapped here and
//! nowhere else.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ExecuteRequest, ExecuteResponse, Sandbox, SandboxError};

/// Public Piston instance used when nothing else is configured
pub const DEFAULT_PISTON_URL: &str = "https://emkc.org/api/v2/piston";

const USER_AGENT: &str = concat!("dsa-judge/", env!("CARGO_PKG_VERSION"));

/// Sandbox backed by a Piston-compatible HTTP service
#[derive(Debug, Clone)]
pub struct PistonClient {
    client: reqwest::Client,
    base_url: String,
}

impl PistonClient {
    /// Create a client for the service rooted at `base_url`.
    ///
    /// No client-side request timeout is set; the service bounds execution.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SandboxError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SandboxError::Transport {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn execute_url(&self) -> String {
        format!("{}/execute", self.base_url)
    }
}

#[async_trait]
impl Sandbox for PistonClient {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, SandboxError> {
        let url = self.execute_url();
        debug!(
            "Posting {} program to {} ({} bytes stdin)",
            request.language,
            url,
            request.stdin.len()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!("Sandbox request to {} failed: {}", url, e);
                SandboxError::Transport {
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Sandbox returned HTTP {}: {}", status.as_u16(), body);
            return Err(SandboxError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| SandboxError::InvalidResponse {
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{SourceFile, ANY_VERSION};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ExecuteRequest {
        ExecuteRequest {
            language: "python".into(),
            version: ANY_VERSION.into(),
            files: vec![SourceFile {
                name: Some("main.py".into()),
                content: "print(input())".into(),
            }],
            stdin: "hello\n".into(),
        }
    }

    #[tokio::test]
    async fn test_execute_posts_request_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v2/piston/execute"))
            .and(body_partial_json(serde_json::json!({
                "language": "python",
                "version": "*",
                "stdin": "hello\n",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "language": "python",
                "version": "3.10.0",
                "run": {"stdout": "hello\n", "stderr": "", "code": 0, "signal": null}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PistonClient::new(format!("{}/api/v2/piston/", server.uri())).unwrap();
        let response = client.execute(&request()).await.unwrap();

        assert_eq!(response.run.unwrap().stdout.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn test_execute_maps_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "runtime is unknown"})),
            )
            .mount(&server)
            .await;

        let client = PistonClient::new(server.uri()).unwrap();
        let err = client.execute(&request()).await.unwrap_err();

        match err {
            SandboxError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("runtime is unknown"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_rejects_non_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = PistonClient::new(server.uri()).unwrap();
        let err = client.execute(&request()).await.unwrap_err();
        assert!(matches!(err, SandboxError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_execute_unreachable_service() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = PistonClient::new(format!("http://127.0.0.1:{}", port)).unwrap();
        let err = client.execute(&request()).await.unwrap_err();
        assert!(matches!(err, SandboxError::Transport { .. }));
    }
}
