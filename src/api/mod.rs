//! HTTP client for the bot-manager backend.
//!
//! The backend answers every control endpoint with the same envelope,
//! `{"status": "success" | "warning" | "error", "message": "..."}`, on
//! error responses too. A non-2xx answer with a parseable body is a
//! backend verdict, not a transport failure.

pub mod types;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub use types::{DashboardConfig, ReplyMode, TaskConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("permintaan ke backend gagal: {0}")]
    Http(#[from] reqwest::Error),
    #[error("balasan backend tidak dikenali (HTTP {status}): {body}")]
    Unexpected { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Warning,
    Error,
}

/// Envelope returned by all control endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub status: ResponseStatus,
    pub message: String,
    /// Only `/refresh_pesan` fills this in.
    #[serde(default)]
    pub info: Option<MessageCacheInfo>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// State of the backend's pesan.txt cache. The backend also reports a
/// last-refresh timestamp; only the line count is displayed.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCacheInfo {
    #[serde(default)]
    pub count: u64,
}

pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { base_url, client }
    }

    /// The live log feed endpoint, for the stream transport.
    pub fn logs_url(&self) -> String {
        self.url("/logs")
    }

    /// Persist the full dashboard config.
    pub async fn save_config(&self, config: &DashboardConfig) -> Result<ApiResponse, ApiError> {
        self.post("/save_config", Some(config)).await
    }

    pub async fn start_task(&self, task_id: &str) -> Result<ApiResponse, ApiError> {
        self.post("/start_bot", Some(&json!({ "task_id": task_id }))).await
    }

    pub async fn stop_task(&self, task_id: &str) -> Result<ApiResponse, ApiError> {
        self.post("/stop_bot", Some(&json!({ "task_id": task_id }))).await
    }

    /// Ask the backend to reload its pesan.txt message cache.
    pub async fn refresh_messages(&self) -> Result<ApiResponse, ApiError> {
        self.post::<()>("/refresh_pesan", None).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ApiError> {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<ApiResponse>(&bytes) {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ApiError::Unexpected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_save_config_posts_full_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/save_config")
                .json_body_partial(r#"{"discord_tokens": ["tok.abc"]}"#);
            then.status(200)
                .json_body(json!({"status": "success", "message": "Perubahan disimpan!"}));
        });

        let client = BackendClient::new(server.base_url());
        let config = DashboardConfig {
            discord_tokens: vec!["tok.abc".into()],
            ..Default::default()
        };
        let response = client.save_config(&config).await.unwrap();

        mock.assert();
        assert!(response.is_success());
        assert_eq!(response.message, "Perubahan disimpan!");
    }

    #[tokio::test]
    async fn test_start_task_sends_task_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/start_bot")
                .json_body(json!({"task_id": "task_7"}));
            then.status(200)
                .json_body(json!({"status": "success", "message": "Tugas berhasil dimulai."}));
        });

        let client = BackendClient::new(server.base_url());
        let response = client.start_task("task_7").await.unwrap();

        mock.assert();
        assert_eq!(response.status, ResponseStatus::Success);
    }

    #[tokio::test]
    async fn test_backend_error_body_is_a_verdict_not_a_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/stop_bot");
            then.status(404)
                .json_body(json!({"status": "error", "message": "Tugas tidak sedang berjalan."}));
        });

        let client = BackendClient::new(server.base_url());
        let response = client.stop_task("task_x").await.unwrap();

        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.message, "Tugas tidak sedang berjalan.");
    }

    #[tokio::test]
    async fn test_refresh_messages_reads_cache_info() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/refresh_pesan");
            then.status(200).json_body(json!({
                "status": "success",
                "message": "pesan.txt di-refresh.",
                "info": {"count": 42, "last_refresh": 1754524800.0}
            }));
        });

        let client = BackendClient::new(server.base_url());
        let response = client.refresh_messages().await.unwrap();

        let info = response.info.expect("info missing");
        assert_eq!(info.count, 42);
    }

    #[tokio::test]
    async fn test_non_json_body_is_unexpected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/start_bot");
            then.status(502).body("Bad Gateway");
        });

        let client = BackendClient::new(server.base_url());
        let err = client.start_task("task_1").await.unwrap_err();

        match err {
            ApiError::Unexpected { status, body } => {
                assert_eq!(status, 502);
                assert!(body.contains("Bad Gateway"));
            }
            other => panic!("expected Unexpected, got {:?}", other),
        }
    }
}
