//! Fetching the source card for a DNI.
//!
//! The upstream answers `GET <endpoint>?<dni_param>=<dni>` in one of two
//! shapes:
//!
//! | Response | Handling |
//! |---|---|
//! | `Content-Type: image/*` | body is the card |
//! | JSON with `urls.FILE` | the card is downloaded from that URL |
//!
//! Anything else is an error. Every request carries the configured timeout;
//! there are no retries.

use crate::config::UpstreamConfig;
use crate::types::Dni;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("could not build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("upstream JSON has no urls.FILE entry to download the image from")]
    MissingFileUrl,
    #[error("upstream returned neither an image nor JSON (content type {content_type:?})")]
    UnexpectedContent { content_type: String },
}

/// Source of card images.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Image bytes for `dni`.
    async fn fetch(&self, dni: &Dni) -> Result<Vec<u8>, UpstreamError>;
}

/// reqwest-backed [`Upstream`].
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    endpoint: String,
    dni_param: String,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Self::with_timeout(config, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(config: &UpstreamConfig, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            dni_param: config.dni_param.clone(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        debug!("Downloading card from {url}");
        let response = self.get(url, &[]).await?;
        let bytes = response.bytes().await.map_err(|e| request_error(url, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, dni: &Dni) -> Result<Vec<u8>, UpstreamError> {
        info!("Requesting card for {dni} from {}", self.endpoint);
        let response = self
            .get(&self.endpoint, &[(self.dni_param.as_str(), dni.as_str())])
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response
            .bytes()
            .await
            .map_err(|e| request_error(&self.endpoint, e))?;

        if content_type.starts_with("image/") {
            return Ok(body.to_vec());
        }
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(json) => {
                let url = file_url(&json).ok_or(UpstreamError::MissingFileUrl)?;
                self.download(url).await
            }
            Err(_) => Err(UpstreamError::UnexpectedContent { content_type }),
        }
    }
}

/// `urls.FILE` of an upstream JSON descriptor.
pub fn file_url(json: &serde_json::Value) -> Option<&str> {
    json.pointer("/urls/FILE")
        .and_then(serde_json::Value::as_str)
        .filter(|url| !url.is_empty())
}

fn request_error(url: &str, e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout {
            url: url.to_string(),
        }
    } else {
        UpstreamError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock upstream that records every requested DNI.
    /// Returns `MissingFileUrl` when no image is set.
    #[derive(Default)]
    pub struct MockUpstream {
        pub image: Option<Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockUpstream {
        pub fn serving(image: Vec<u8>) -> Self {
            Self {
                image: Some(image),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn get_requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Upstream for MockUpstream {
        async fn fetch(&self, dni: &Dni) -> Result<Vec<u8>, UpstreamError> {
            self.requests.lock().unwrap().push(dni.to_string());
            self.image.clone().ok_or(UpstreamError::MissingFileUrl)
        }
    }

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn upstream_at(base: &str) -> HttpUpstream {
        HttpUpstream::new(&UpstreamConfig {
            endpoint: format!("{base}/api/agv"),
            ..UpstreamConfig::default()
        })
        .unwrap()
    }

    fn dni() -> Dni {
        Dni::parse("12345678").unwrap()
    }

    #[test]
    fn file_url_requires_non_empty_string() {
        let ok = serde_json::json!({"urls": {"FILE": "http://x/card.png"}});
        assert_eq!(file_url(&ok), Some("http://x/card.png"));
        assert_eq!(file_url(&serde_json::json!({"urls": {"FILE": ""}})), None);
        assert_eq!(file_url(&serde_json::json!({"urls": {"FILE": 3}})), None);
        assert_eq!(file_url(&serde_json::json!({"dni": "1234"})), None);
    }

    #[tokio::test]
    async fn image_response_is_returned_directly() {
        let app = Router::new().route(
            "/api/agv",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("dni").map(String::as_str), Some("12345678"));
                ([(header::CONTENT_TYPE, "image/png")], PNG_MAGIC)
            }),
        );
        let base = serve(app).await;
        assert_eq!(upstream_at(&base).fetch(&dni()).await.unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn json_response_downloads_file_url() {
        let app = Router::new()
            .route(
                "/api/agv",
                get(|axum::extract::Host(host): axum::extract::Host| async move {
                    Json(serde_json::json!({
                        "dni": "12345678",
                        "urls": {"FILE": format!("http://{host}/files/card.png")}
                    }))
                }),
            )
            .route(
                "/files/card.png",
                get(|| async { ([(header::CONTENT_TYPE, "image/png")], PNG_MAGIC) }),
            );
        let base = serve(app).await;
        assert_eq!(upstream_at(&base).fetch(&dni()).await.unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn json_without_file_url_is_reported() {
        let app = Router::new().route(
            "/api/agv",
            get(|| async { Json(serde_json::json!({"dni": "1234"})) }),
        );
        let base = serve(app).await;
        let err = upstream_at(&base).fetch(&dni()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingFileUrl));
        assert!(err.to_string().contains("urls.FILE"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let app = Router::new().route(
            "/api/agv",
            get(|| async { (StatusCode::BAD_GATEWAY, "down").into_response() }),
        );
        let base = serve(app).await;
        let err = upstream_at(&base).fetch(&dni()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn failing_file_download_is_reported() {
        let app = Router::new().route(
            "/api/agv",
            get(|axum::extract::Host(host): axum::extract::Host| async move {
                Json(serde_json::json!({"urls": {"FILE": format!("http://{host}/missing.png")}}))
            }),
        );
        let base = serve(app).await;
        let err = upstream_at(&base).fetch(&dni()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn non_json_text_is_unexpected() {
        let app = Router::new().route("/api/agv", get(|| async { "<html>oops</html>" }));
        let base = serve(app).await;
        let err = upstream_at(&base).fetch(&dni()).await.unwrap_err();
        match err {
            UpstreamError::UnexpectedContent { content_type } => {
                assert!(content_type.starts_with("text/plain"));
            }
            other => panic!("expected unexpected content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let app = Router::new().route(
            "/api/agv",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let base = serve(app).await;
        let upstream = HttpUpstream::with_timeout(
            &UpstreamConfig {
                endpoint: format!("{base}/api/agv"),
                ..UpstreamConfig::default()
            },
            Duration::from_millis(300),
        )
        .unwrap();
        let err = upstream.fetch(&dni()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout { .. }));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = upstream_at(&format!("http://{addr}"))
            .fetch(&dni())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Network { .. }));
    }
}
