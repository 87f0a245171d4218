use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace};

use super::ChatTransport;
use crate::agent::types::{ChatRequest, ChatResponse};
use crate::error::{Result, TransportError};

/// Path the proxy serves chat requests on
pub const REQUEST_PATH: &str = "/api/v1/openai/request";

/// Transport talking to a remote toolrelay proxy instead of a provider
pub struct ProxyTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyTransport {
    pub fn new(base_url: &str, verify_ssl: bool, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(TransportError::Http)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatTransport for ProxyTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        trace!("Proxy request: model={}, {} messages", request.model, request.messages.len());
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}{}", self.base_url, REQUEST_PATH))
            .json(request)
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body }.into());
        }

        let chat_response: ChatResponse = response.json().await.map_err(TransportError::Http)?;
        debug!(
            "Proxy answered {} messages in {:.2}s",
            chat_response.messages.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(chat_response)
    }
}
