//! Handling for requests the gateway does not serve itself.

use crate::config::CatchallConfig;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::header,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use service_core::error::AppError;
use service_core::observability::trace_context::inject_trace_context;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn forward(&self, req: Request) -> Response;
}

/// Answers every request with 404 `not found`.
pub struct NotFoundFallback;

#[async_trait]
impl FallbackHandler for NotFoundFallback {
    async fn forward(&self, _req: Request) -> Response {
        AppError::NotFound("not found".to_string()).into_response()
    }
}

/// Forwards requests unchanged to the legacy upstream.
pub struct LegacyProxy {
    client: reqwest::Client,
    upstream: String,
}

impl LegacyProxy {
    pub fn new(upstream: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("failed to build proxy client: {}", e)))?;

        Ok(Self {
            client,
            upstream: upstream.into().trim_end_matches('/').to_string(),
        })
    }

    async fn proxy(&self, req: Request) -> Result<Response, AppError> {
        let (parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.upstream, path_and_query);

        let body = body
            .collect()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read request body: {}", e)))?
            .to_bytes();

        let mut headers = parts.headers.clone();
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        inject_trace_context(&mut headers);

        tracing::debug!(method = %parts.method, url = %url, "Forwarding to legacy upstream");

        let upstream = self
            .client
            .request(parts.method.clone(), &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::BadGateway(format!("legacy upstream unreachable: {}", e)))?;

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| AppError::BadGateway(format!("legacy upstream response failed: {}", e)))?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        for (name, value) in upstream_headers.iter() {
            if name != header::TRANSFER_ENCODING && name != header::CONNECTION {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl FallbackHandler for LegacyProxy {
    async fn forward(&self, req: Request) -> Response {
        match self.proxy(req).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }
}

/// Select the fallback from configuration.
pub fn from_config(config: &CatchallConfig) -> Result<Arc<dyn FallbackHandler>, AppError> {
    match (&config.upstream_url, config.disabled) {
        (Some(upstream), false) => {
            tracing::info!(upstream = %upstream, "Catch-all forwards to legacy upstream");
            Ok(Arc::new(LegacyProxy::new(upstream.clone())?))
        }
        _ => {
            tracing::info!(disabled = config.disabled, "Catch-all answers 404");
            Ok(Arc::new(NotFoundFallback))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use service_core::error::MessageResponse;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_not_found_fallback() {
        let response = NotFoundFallback
            .forward(Request::builder().uri("/anything").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: MessageResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, MessageResponse::new("not found"));
    }

    #[tokio::test]
    async fn test_legacy_proxy_forwards_method_path_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users"))
            .and(query_param("sortOrder", "asc"))
            .and(body_string(r#"{"users":["alice"]}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let proxy = LegacyProxy::new(server.uri()).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/users?sortOrder=asc")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"users":["alice"]}"#))
            .unwrap();

        let response = proxy.forward(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"[]");
    }

    #[tokio::test]
    async fn test_disabled_catchall_ignores_upstream() {
        let handler = from_config(&CatchallConfig {
            disabled: true,
            upstream_url: Some("http://legacy".into()),
        })
        .unwrap();
        let response = handler
            .forward(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let proxy = LegacyProxy::new("http://127.0.0.1:1").unwrap();
        let response = proxy
            .forward(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
