//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint that speaks the `/chat/completions` format,
//! which covers OpenAI itself and OpenRouter. Rate limits and server errors
//! are retried with exponential backoff (1s, then 2s); a `Retry-After` header
//! on a 429 replaces the backoff step, up to `MAX_RETRY_AFTER`.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::providers::factory::{OpenAiConfig, OpenRouterConfig};
use crate::providers::{LlmMessage, LlmProvider, ProviderError};

const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<serde_json::Value>,
}

/// Settings shared by every OpenAI-compatible backend
pub trait OpenAiCompatibleConfig: Send + Sync {
    fn api_key(&self) -> &str;
    fn base_url(&self) -> &str;
    fn default_model(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
}

impl OpenAiCompatibleConfig for OpenAiConfig {
    fn api_key(&self) -> &str {
        &self.api_key
    }
    fn base_url(&self) -> &str {
        &self.base_url
    }
    fn default_model(&self) -> &str {
        &self.default_model
    }
    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

impl OpenAiCompatibleConfig for OpenRouterConfig {
    fn api_key(&self) -> &str {
        &self.api_key
    }
    fn base_url(&self) -> &str {
        &self.base_url
    }
    fn default_model(&self) -> &str {
        &self.default_model
    }
    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

#[derive(Debug, Clone)]
pub struct GenericOpenAiProvider {
    api_key: String,
    base_url: String,
    default_model: String,
    provider_name: &'static str,
    timeout_seconds: u64,
    /// Base delay between retries; one second in production
    backoff_unit: Duration,
    client: Client,
}

impl GenericOpenAiProvider {
    /// Creates a provider, failing if the HTTP client cannot be built
    pub fn try_new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        provider_name: &'static str,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url: String = base_url.into();
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            provider_name,
            timeout_seconds,
            backoff_unit: Duration::from_secs(1),
            client,
        })
    }

    pub fn try_from_config<C: OpenAiCompatibleConfig>(
        config: &C,
        provider_name: &'static str,
    ) -> Result<Self, ProviderError> {
        Self::try_new(
            config.api_key(),
            config.base_url(),
            config.default_model(),
            provider_name,
            config.timeout_seconds(),
        )
    }

    #[cfg(test)]
    fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    fn build_request(&self, messages: Vec<LlmMessage>, model: &str) -> OpenAiRequest {
        let messages = messages
            .into_iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content),
            })
            .collect();

        OpenAiRequest {
            model: model.to_string(),
            messages,
        }
    }

    fn parse_response(&self, response: OpenAiResponse) -> Result<String, ProviderError> {
        if let Some(error) = response.error {
            let code = error
                .code
                .map(|c| match c {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .or(error.error_type)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ProviderError::reply(format!("{} ({})", error.message, code)));
        }

        if let Some(usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::reply("no choices returned"))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// Wait before the next attempt: the server's hint if it gave one,
    /// otherwise exponential backoff
    fn retry_delay(&self, error: &ProviderError, attempt: u32) -> Duration {
        match error {
            ProviderError::RateLimited {
                retry_after: Some(seconds),
            } => Duration::from_secs(*seconds).min(MAX_RETRY_AFTER),
            _ => self.backoff_unit * 2_u32.pow(attempt - 1),
        }
    }

    async fn make_request_with_retry(
        &self,
        request: &OpenAiRequest,
    ) -> Result<OpenAiResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt = attempt, url = %url, provider = %self.provider_name, "Making chat completion request");

            let mut request_builder = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key));

            if self.provider_name == "openrouter" {
                request_builder = request_builder.header("X-Title", "diaschat");
            }

            let result = request_builder.json(request).send().await;

            let provider_error = match result {
                Ok(resp) => {
                    let status = resp.status();
                    debug!(status = %status, "Received response");

                    if status == StatusCode::OK {
                        return resp.json::<OpenAiResponse>().await.map_err(|e| {
                            ProviderError::reply(format!("failed to parse response: {}", e))
                        });
                    }

                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok());
                    let body = resp.text().await.unwrap_or_default();
                    classify_status(status, &body, retry_after)
                }
                Err(e) => {
                    error!(error = %e, "Request failed");
                    if e.is_timeout() {
                        ProviderError::Timeout {
                            seconds: self.timeout_seconds,
                        }
                    } else if e.is_connect() {
                        ProviderError::network(format!("connection failed: {}", e))
                    } else {
                        ProviderError::network(format!("request failed: {}", e))
                    }
                }
            };

            if attempt >= MAX_ATTEMPTS || !provider_error.is_retryable() {
                return Err(provider_error);
            }

            let delay = self.retry_delay(&provider_error, attempt);
            warn!(
                attempt = attempt,
                max_attempts = MAX_ATTEMPTS,
                delay_ms = delay.as_millis() as u64,
                error = %provider_error,
                "Retrying chat completion request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Maps a non-200 status to an error
fn classify_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::auth(format!("status {}: {}", status.as_u16(), body))
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        status => ProviderError::Status {
            status: status.as_u16(),
            message: body.to_string(),
        },
    }
}

#[async_trait::async_trait]
impl LlmProvider for GenericOpenAiProvider {
    async fn chat(&self, messages: Vec<LlmMessage>, model: &str) -> Result<String, ProviderError> {
        info!(
            model = model,
            provider = %self.provider_name,
            message_count = messages.len(),
            "Sending chat request"
        );

        let request = self.build_request(messages, model);
        let response = self.make_request_with_retry(&request).await?;
        let content = self.parse_response(response)?;

        info!(
            content_length = content.len(),
            "Received reply from {}", self.provider_name
        );

        Ok(content)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn provider_name(&self) -> &'static str {
        self.provider_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use mockito::Server;

    const COMPLETIONS: &str = "/v1/chat/completions";

    fn create_test_provider(base_url: &str) -> GenericOpenAiProvider {
        GenericOpenAiProvider::try_new("test-key", base_url, "test-model", "openai", 5)
            .unwrap()
            .with_backoff_unit(Duration::from_millis(1))
    }

    fn reply_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        })
        .to_string()
    }

    fn ping() -> Vec<LlmMessage> {
        vec![LlmMessage::new(Role::User, "ping")]
    }

    #[test]
    fn test_provider_creation_from_config() {
        let config = OpenRouterConfig {
            default_model: "meta/llama".to_string(),
            ..OpenRouterConfig::new("key")
        };
        let provider = GenericOpenAiProvider::try_from_config(&config, "openrouter").unwrap();
        assert_eq!(provider.provider_name(), "openrouter");
        assert_eq!(provider.default_model(), "meta/llama");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = create_test_provider("https://api.example.com/v1/");
        assert_eq!(provider.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_build_request() {
        let provider = create_test_provider("https://api.example.com/v1");
        let messages = vec![
            LlmMessage::new(Role::User, "Hello"),
            LlmMessage::new(Role::Assistant, "Hi"),
        ];

        let json = serde_json::to_value(provider.build_request(messages, "gpt-x")).unwrap();

        assert_eq!(json["model"], "gpt-x");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_parse_response_api_error() {
        let provider = create_test_provider("https://api.example.com/v1");
        let response: OpenAiResponse = serde_json::from_str(
            r#"{"error":{"message":"Invalid API key","type":"authentication_error","code":401}}"#,
        )
        .unwrap();

        let err = provider.parse_response(response).unwrap_err();
        assert!(matches!(err, ProviderError::Reply { .. }));
        assert!(err.to_string().contains("Invalid API key (401)"));
    }

    #[test]
    fn test_parse_response_no_choices() {
        let provider = create_test_provider("https://api.example.com/v1");
        let response: OpenAiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();

        let err = provider.parse_response(response).unwrap_err();
        assert!(err.to_string().contains("no choices returned"));
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::UNAUTHORIZED, "", None).is_auth_error());
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "", Some(7)),
            ProviderError::RateLimited {
                retry_after: Some(7)
            }
        );
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad", None).is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "", None).is_retryable());
    }

    #[test]
    fn test_retry_delay_honours_retry_after() {
        let provider = create_test_provider("https://api.example.com/v1");

        let hinted = ProviderError::RateLimited {
            retry_after: Some(4),
        };
        assert_eq!(provider.retry_delay(&hinted, 1), Duration::from_secs(4));

        let excessive = ProviderError::RateLimited {
            retry_after: Some(3600),
        };
        assert_eq!(provider.retry_delay(&excessive, 1), MAX_RETRY_AFTER);

        let unhinted = ProviderError::RateLimited { retry_after: None };
        assert_eq!(provider.retry_delay(&unhinted, 1), Duration::from_millis(1));
        assert_eq!(
            provider.retry_delay(&ProviderError::network("reset"), 2),
            Duration::from_millis(2)
        );
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS)
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply_body("pong"))
            .expect(1)
            .create_async()
            .await;
        let provider = create_test_provider(&format!("{}/v1", server.url()));

        let content = provider.chat(ping(), "test-model").await.unwrap();

        assert_eq!(content, "pong");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_auth_failure_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS)
            .with_status(401)
            .with_body(r#"{"error":"bad key"}"#)
            .expect(1)
            .create_async()
            .await;
        let provider = create_test_provider(&format!("{}/v1", server.url()));

        let err = provider.chat(ping(), "test-model").await.unwrap_err();

        assert!(err.is_auth_error());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_retries_server_error() {
        let mut server = Server::new_async().await;
        let unavailable = server
            .mock("POST", COMPLETIONS)
            .with_status(503)
            .with_body("unavailable")
            .expect(1)
            .create_async()
            .await;
        let recovered = server
            .mock("POST", COMPLETIONS)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply_body("recovered"))
            .expect(1)
            .create_async()
            .await;
        let provider = create_test_provider(&format!("{}/v1", server.url()));

        let content = provider.chat(ping(), "test-model").await.unwrap();

        assert_eq!(content, "recovered");
        unavailable.assert_async().await;
        recovered.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_rate_limit_gives_up() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS)
            .with_status(429)
            .with_body("slow down")
            .expect(3)
            .create_async()
            .await;
        let provider = create_test_provider(&format!("{}/v1", server.url()));

        let err = provider.chat(ping(), "test-model").await.unwrap_err();

        assert_eq!(err, ProviderError::RateLimited { retry_after: None });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_rate_limit_reads_retry_after() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("POST", COMPLETIONS)
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(1)
            .create_async()
            .await;
        let answered = server
            .mock("POST", COMPLETIONS)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply_body("after the wait"))
            .expect(1)
            .create_async()
            .await;
        let provider = create_test_provider(&format!("{}/v1", server.url()));

        let content = provider.chat(ping(), "test-model").await.unwrap();

        assert_eq!(content, "after the wait");
        limited.assert_async().await;
        answered.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_client_error_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", COMPLETIONS)
            .with_status(400)
            .with_body("unknown model")
            .expect(1)
            .create_async()
            .await;
        let provider = create_test_provider(&format!("{}/v1", server.url()));

        let err = provider.chat(ping(), "nope").await.unwrap_err();

        assert_eq!(
            err,
            ProviderError::Status {
                status: 400,
                message: "unknown model".to_string()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = create_test_provider(&format!("http://{}/v1", addr));
        let err = provider.chat(ping(), "test-model").await.unwrap_err();

        assert!(matches!(err, ProviderError::Network { .. }));
    }
}
