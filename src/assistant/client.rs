//! HTTP client for an OpenAI-compatible Assistants v2 API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::assistant::api::AssistantApi;
use crate::assistant::retry::{RetryPolicy, parse_retry_after, retry_backoff_delay};
use crate::assistant::types::{
    Assistant, AssistantSpec, Message, MessageRole, Run, Thread, ToolOutcome,
};
use crate::config::AssistantConfig;
use crate::error::AssistantError;
use crate::tools::redaction::truncate_body;

const MAX_LOGGED_BODY: usize = 2000;
const MESSAGE_PAGE_SIZE: u32 = 20;

/// Assistants API client over `reqwest`.
pub struct OpenAiAssistantClient {
    client: Client,
    config: AssistantConfig,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

impl OpenAiAssistantClient {
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AssistantError::RequestFailed {
                endpoint: config.base_url.clone(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        if base.ends_with("/v1") {
            format!("{}/{}", base, path)
        } else {
            format!("{}/v1/{}", base, path)
        }
    }

    async fn send<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        policy: RetryPolicy,
    ) -> Result<R, AssistantError> {
        let url = self.api_url(path);
        let max_retries = self.config.max_retries;

        for attempt in 0..=max_retries {
            tracing::debug!(%method, url = %url, attempt = attempt + 1, "Assistant API request");

            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(self.config.api_key.expose_secret())
                .header("OpenAI-Beta", "assistants=v2");
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    if attempt < max_retries && policy.retries_transport_error(&e) {
                        let delay = retry_backoff_delay(attempt);
                        tracing::warn!(
                            "Assistant API request error (attempt {}/{}), retrying in {:?}: {}",
                            attempt + 1,
                            max_retries + 1,
                            delay,
                            e,
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AssistantError::RequestFailed {
                        endpoint: path.to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let text = response.text().await.unwrap_or_default();

            if tracing::enabled!(tracing::Level::DEBUG) {
                tracing::debug!(status = %status, body = %truncate(&text), "Assistant API response");
            }

            if !status.is_success() {
                let code = status.as_u16();
                if policy.retries_status(code) && attempt < max_retries {
                    let delay = retry_after.unwrap_or_else(|| retry_backoff_delay(attempt));
                    tracing::warn!(
                        "Assistant API returned HTTP {} (attempt {}/{}), retrying in {:?}",
                        code,
                        attempt + 1,
                        max_retries + 1,
                        delay,
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                if code == 429 {
                    return Err(AssistantError::RateLimited(retry_after));
                }
                return Err(AssistantError::Api {
                    endpoint: path.to_string(),
                    status: code,
                    body: truncate(&text),
                });
            }

            return serde_json::from_str(&text).map_err(|e| AssistantError::InvalidResponse {
                endpoint: path.to_string(),
                reason: format!("{e}. Raw: {}", truncate(&text)),
            });
        }

        Err(AssistantError::RequestFailed {
            endpoint: path.to_string(),
            reason: "retry loop exited unexpectedly".to_string(),
        })
    }
}

fn truncate(text: &str) -> String {
    truncate_body(text, MAX_LOGGED_BODY)
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        self.send(
            Method::GET,
            &format!("threads/{thread_id}/runs/{run_id}"),
            None,
            RetryPolicy::Idempotent,
        )
        .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutcome],
    ) -> Result<Run, AssistantError> {
        let body = serde_json::json!({ "tool_outputs": outputs });
        self.send(
            Method::POST,
            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            Some(&body),
            RetryPolicy::NotIdempotent,
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, AssistantError> {
        let list: ListResponse<Message> = self
            .send(
                Method::GET,
                &format!("threads/{thread_id}/messages?order=desc&limit={MESSAGE_PAGE_SIZE}"),
                None,
                RetryPolicy::Idempotent,
            )
            .await?;
        Ok(list.data)
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        text: &str,
    ) -> Result<Message, AssistantError> {
        let body = serde_json::json!({ "role": role, "content": text });
        self.send(
            Method::POST,
            &format!("threads/{thread_id}/messages"),
            Some(&body),
            RetryPolicy::NotIdempotent,
        )
        .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        self.send(
            Method::POST,
            &format!("threads/{thread_id}/runs/{run_id}/cancel"),
            None,
            RetryPolicy::Idempotent,
        )
        .await
    }

    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        self.send(
            Method::POST,
            "threads",
            Some(&serde_json::json!({})),
            RetryPolicy::NotIdempotent,
        )
        .await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, AssistantError> {
        self.send(
            Method::GET,
            &format!("threads/{thread_id}"),
            None,
            RetryPolicy::Idempotent,
        )
        .await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<Run, AssistantError> {
        let body = serde_json::json!({ "assistant_id": assistant_id });
        self.send(
            Method::POST,
            &format!("threads/{thread_id}/runs"),
            Some(&body),
            RetryPolicy::NotIdempotent,
        )
        .await
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantError> {
        let body = serde_json::to_value(spec).map_err(|e| AssistantError::InvalidResponse {
            endpoint: "assistants".to_string(),
            reason: format!("Failed to encode assistant spec: {e}"),
        })?;
        self.send(
            Method::POST,
            "assistants",
            Some(&body),
            RetryPolicy::NotIdempotent,
        )
        .await
    }
}
