use crate::domain::ports::{ByteStream, ConfigProvider, StreamSource};
use crate::utils::error::{CondenserError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

/// Streaming POST against `/api/v1/graphs/{graph}/threads/{thread}/stream`.
pub struct HttpStreamSource {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl HttpStreamSource {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        // 只限制連線時間，串流本身可能持續很久
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds()))
            .build()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/x-ndjson"));
        for (name, value) in config.headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                CondenserError::InvalidConfigValueError {
                    field: "headers".to_string(),
                    value: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                CondenserError::InvalidConfigValueError {
                    field: "headers".to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(name, value);
        }
        if let Some(token) = config.api_token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| CondenserError::config("api_token contains invalid characters"))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        Ok(Self {
            client,
            url: stream_url(config.base_url(), config.graph_id(), config.thread_id()),
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub fn stream_url(base_url: &str, graph_id: &str, thread_id: &str) -> String {
    format!(
        "{}/api/v1/graphs/{}/threads/{}/stream",
        base_url.trim_end_matches('/'),
        graph_id,
        thread_id
    )
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn open(&self, body: serde_json::Value) -> Result<ByteStream> {
        tracing::debug!("POST {} {}", self.url, body);
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Stream response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CondenserError::BackendStatusError {
                status: status.as_u16(),
                body,
            });
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| CondenserError::stream(e.to_string())));
        Ok(chunks.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_trims_trailing_slash() {
        assert_eq!(
            stream_url("http://localhost:2024/", "default", "abc"),
            "http://localhost:2024/api/v1/graphs/default/threads/abc/stream"
        );
    }
}
