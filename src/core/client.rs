use super::types::{ChatRequest, ChatResponse, Health, Product, ProductList};
use super::{ChatBackend, ChatOutcome};
use crate::config::BackendConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<Health> {
        let response = self
            .client
            .get(self.endpoint("/api/health"))
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        let response = self
            .client
            .get(self.endpoint("/api/products"))
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let list: ProductList = serde_json::from_str(&body)?;
        tracing::debug!("[BackendClient] Fetched {} products", list.products.len());
        Ok(list.products)
    }
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        tracing::debug!(
            "[BackendClient] POST /api/chat (history={}, previous_products={}, image={})",
            request.history.len(),
            request.previous_products.len(),
            request.image_base64.is_some()
        );

        let response = self
            .client
            .post(self.endpoint("/api/chat"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let retry_after = parse_retry_after(response.headers());
            let detail = error_detail(&response.text().await.unwrap_or_default());
            tracing::warn!(
                "[BackendClient] Backend warming up (retry after {:?})",
                retry_after
            );
            return Ok(ChatOutcome::WarmingUp {
                retry_after,
                detail,
            });
        }

        if !status.is_success() {
            let detail = error_detail(&response.text().await.unwrap_or_default());
            tracing::warn!(
                "[BackendClient] API returned error status {}: {:?}",
                status,
                detail
            );
            return Ok(ChatOutcome::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&body)?;
        tracing::debug!(
            "[BackendClient] intent={} products={}",
            chat_response.intent,
            chat_response.products.len()
        );
        Ok(ChatOutcome::Completed(chat_response))
    }
}

/// `Retry-After` in delta-seconds form; anything else is ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pull `detail` out of an error body. Validation errors carry a structured
/// detail, which is passed on as compact JSON.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
