//! Web fact-checking tool backed by Google Custom Search.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::ToolsConfig;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};

/// Number of search results kept as evidence.
const EVIDENCE_LIMIT: usize = 3;

const NO_EVIDENCE_REPORT: &str =
    "No web evidence found for fact-checking. Please try a different statement.";

/// Looks a statement up on the web and returns the top hits as evidence.
pub struct VerifyStatementTool {
    client: Client,
    search_url: String,
    api_key: Option<SecretString>,
    engine_id: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
struct SearchItem {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

impl VerifyStatementTool {
    pub fn new(config: &ToolsConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            search_url: config.google_cse_url.clone(),
            api_key: config.google_cse_api_key.clone(),
            engine_id: config.google_cse_id.clone(),
            timeout: config.timeout,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, ToolError> {
        let (Some(api_key), Some(engine_id)) = (&self.api_key, &self.engine_id) else {
            return Err(ToolError::NotConfigured(
                "GOOGLE_CSE_API_KEY and GOOGLE_CSE_ID must be set".to_string(),
            ));
        };

        let limit = EVIDENCE_LIMIT.to_string();
        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("key", api_key.expose_secret()),
                ("cx", engine_id.as_str()),
                ("q", query),
                ("num", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::ExternalService(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExternalService(format!(
                "search returned HTTP {status}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExternalService(format!("invalid search response: {e}")))?;

        let mut items = body.items;
        items.truncate(EVIDENCE_LIMIT);
        Ok(items)
    }
}

fn build_report(items: &[SearchItem]) -> serde_json::Value {
    if items.is_empty() {
        return serde_json::json!({
            "report": NO_EVIDENCE_REPORT,
            "evidence": [],
        });
    }

    let evidence_block = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. {}\n   URL: {}\n   Snippet: {}",
                i + 1,
                item.title,
                item.link,
                item.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let links: Vec<&str> = items.iter().map(|item| item.link.as_str()).collect();
    serde_json::json!({
        "report": format!("Fact-checking completed.\n\nEvidence:\n{evidence_block}"),
        "evidence": links,
    })
}

#[async_trait]
impl Tool for VerifyStatementTool {
    fn name(&self) -> &str {
        "verify_statement"
    }

    fn description(&self) -> &str {
        "Fact-check a statement using Google search and return a summary and evidence URLs."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "statement": {
                    "type": "string",
                    "description": "The statement to verify."
                }
            },
            "required": ["statement"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let statement = require_str(&params, "statement")?.trim();
        if statement.is_empty() {
            return Err(ToolError::InvalidParameters(
                "'statement' must not be empty".to_string(),
            ));
        }

        let items = self.search(statement).await?;
        tracing::debug!(results = items.len(), "Fact-check search finished");

        Ok(ToolOutput::success(build_report(&items), start.elapsed()))
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}
