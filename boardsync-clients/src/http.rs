//! Shared JSON-over-HTTP plumbing for both store clients.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;

use boardsync_core::config::HttpConfig;
use boardsync_core::StoreError;

/// Longest we are willing to sleep on a single rate-limit response.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Error bodies are truncated to this many bytes before they reach logs and
/// reports.
const MAX_ERROR_BODY: usize = 2048;

/// A base URL, a fixed header set and a retry budget.
///
/// Cheap to clone; the `ureq` agent shares its connection pool between
/// clones.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    base: String,
    headers: Vec<(String, String)>,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(base: &str, headers: Vec<(String, String)>, config: &HttpConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();
        Self {
            agent,
            base: base.trim_end_matches('/').to_owned(),
            headers,
            max_retries: config.max_retries,
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, StoreError> {
        let query = query
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect();
        self.send("GET", path, query, None)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, StoreError> {
        self.send("POST", path, Vec::new(), Some(body))
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, StoreError> {
        self.send("PATCH", path, Vec::new(), Some(body))
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.send("DELETE", path, Vec::new(), None).await.map(|_| ())
    }

    /// Runs the blocking request on tokio's blocking pool. `None` means the
    /// response had no body.
    async fn send(
        &self,
        method: &'static str,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Option<Value>, StoreError> {
        let client = self.clone();
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || client.send_blocking(method, &path, &query, body.as_ref()))
            .await
            .map_err(|err| StoreError::Transport(format!("request task failed: {err}")))?
    }

    fn send_blocking(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>, StoreError> {
        let url = format!("{}{}", self.base, path);
        let mut attempt = 0u32;
        loop {
            let mut request = self.agent.request(method, &url);
            for (name, value) in &self.headers {
                request = request.set(name, value);
            }
            for (key, value) in query {
                request = request.query(key, value);
            }
            let result = match body {
                Some(body) => request.send_json(body),
                None => request.call(),
            };

            match result {
                Ok(response) => return read_json(response),
                Err(err) => match classify(method, path, err) {
                    StoreError::RateLimited { retry_after_secs } if attempt < self.max_retries => {
                        attempt += 1;
                        let wait = backoff(retry_after_secs, attempt);
                        tracing::warn!(
                            method,
                            path,
                            attempt,
                            wait_secs = wait.as_secs(),
                            "rate limited, retrying"
                        );
                        std::thread::sleep(wait);
                    }
                    err => {
                        tracing::debug!(method, path, error = %err, "request failed");
                        return Err(err);
                    }
                },
            }
        }
    }
}

/// `Retry-After` when the server sent one, otherwise exponential from one
/// second. Both capped at [`MAX_BACKOFF`].
fn backoff(retry_after_secs: Option<u64>, attempt: u32) -> Duration {
    let wait = match retry_after_secs {
        Some(secs) => Duration::from_secs(secs),
        None => Duration::from_secs(1u64 << attempt.saturating_sub(1).min(6)),
    };
    wait.min(MAX_BACKOFF)
}

fn classify(method: &str, path: &str, err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(status, response) => {
            let retry_after_secs = response
                .header("retry-after")
                .and_then(|value| value.trim().parse::<u64>().ok());
            let exhausted = response.header("x-ratelimit-remaining") == Some("0");
            let body = read_error_body(response);
            match status {
                429 => StoreError::RateLimited { retry_after_secs },
                403 if exhausted => StoreError::RateLimited { retry_after_secs },
                404 => StoreError::NotFound {
                    what: format!("{method} {path}"),
                },
                _ => StoreError::Http { status, body },
            }
        }
        ureq::Error::Transport(transport) => StoreError::Transport(transport.to_string()),
    }
}

fn read_json(response: ureq::Response) -> Result<Option<Value>, StoreError> {
    let text = response
        .into_string()
        .map_err(|err| StoreError::Decode(format!("reading response body: {err}")))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text)?))
}

fn read_error_body(response: ureq::Response) -> String {
    let mut buf = Vec::new();
    let _ = response
        .into_reader()
        .take(MAX_ERROR_BODY as u64)
        .read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer, max_retries: u32) -> HttpClient {
        HttpClient::new(
            &server.uri(),
            vec![("Authorization".into(), "Bearer t0ken".into())],
            &HttpConfig {
                timeout_secs: 5,
                max_retries,
            },
        )
    }

    #[test]
    fn backoff_prefers_retry_after_and_caps() {
        assert_eq!(backoff(Some(3), 1), Duration::from_secs(3));
        assert_eq!(backoff(Some(600), 1), MAX_BACKOFF);
        assert_eq!(backoff(None, 1), Duration::from_secs(1));
        assert_eq!(backoff(None, 3), Duration::from_secs(4));
        assert_eq!(backoff(None, 30), MAX_BACKOFF);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sends_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things"))
            .and(query_param("page", "2"))
            .and(header("Authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server, 0)
            .get("/things", &[("page", "2".to_string())])
            .await
            .expect("get");
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retries_after_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let value = client(&server, 3)
            .post("/things", json!({}))
            .await
            .expect("post");
        assert_eq!(value["id"], 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_retries_surface_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("Retry-After", "0"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server, 1).get("/x", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::RateLimited {
                retry_after_secs: Some(0)
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn maps_status_codes() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("kaput"))
            .mount(&server)
            .await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let http = client(&server, 0);
        assert!(matches!(
            http.get("/missing", &[]).await,
            Err(StoreError::NotFound { .. })
        ));
        match http.get("/broken", &[]).await {
            Err(StoreError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "kaput");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
        http.delete("/empty").await.expect("delete");
    }
}
