//! Podcast lookup in a MongoDB catalogue.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Client;
use mongodb::bson::{Bson, Document, doc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::ToolsConfig;
use crate::tools::tool::{Tool, ToolError, ToolOutput, parse_params};

const COLLECTION: &str = "podcasts";
const RESULT_LIMIT: i64 = 10;

/// Database used when the connection string does not name one.
const FALLBACK_DATABASE: &str = "test";

static PODCAST_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)fetch me (.+) podcast details").unwrap());

/// Finds podcasts whose title or description mention a name from the prompt.
///
/// The client is connected on first use and reused afterwards.
pub struct FetchPodcastDetailsTool {
    mongo_url: Option<SecretString>,
    client: OnceCell<Client>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    prompt: String,
}

/// Build the catalogue filter for a natural-language prompt.
///
/// `fetch me <name> podcast details` matches `<name>` case-insensitively
/// against title or description. Any other prompt matches every podcast.
pub(crate) fn podcast_query(prompt: &str) -> Document {
    let Some(name) = PODCAST_NAME
        .captures(prompt)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
    else {
        return Document::new();
    };

    // The name is matched literally, not as a pattern.
    let pattern = regex::escape(name);
    doc! {
        "$or": [
            { "title": { "$regex": pattern.as_str(), "$options": "i" } },
            { "description": { "$regex": pattern.as_str(), "$options": "i" } },
        ]
    }
}

/// Relaxed extended JSON with `_id` rendered as a plain hex string.
fn podcast_json(mut document: Document) -> serde_json::Value {
    if let Ok(id) = document.get_object_id("_id") {
        document.insert("_id", id.to_hex());
    }
    Bson::Document(document).into_relaxed_extjson()
}

fn mongo_error(e: mongodb::error::Error) -> ToolError {
    ToolError::ExternalService(format!("MongoDB error: {e}"))
}

impl FetchPodcastDetailsTool {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            mongo_url: config.mongo_url.clone(),
            client: OnceCell::new(),
            timeout: config.timeout,
        }
    }

    async fn client(&self) -> Result<&Client, ToolError> {
        let Some(url) = &self.mongo_url else {
            return Err(ToolError::NotConfigured(
                "MONGO_URL not set in environment".to_string(),
            ));
        };

        self.client
            .get_or_try_init(|| async {
                Client::with_uri_str(url.expose_secret())
                    .await
                    .map_err(mongo_error)
            })
            .await
    }

    async fn find(&self, filter: Document) -> Result<Vec<serde_json::Value>, ToolError> {
        let client = self.client().await?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(FALLBACK_DATABASE));

        let cursor = database
            .collection::<Document>(COLLECTION)
            .find(filter)
            .limit(RESULT_LIMIT)
            .await
            .map_err(mongo_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(mongo_error)?;

        Ok(documents.into_iter().map(podcast_json).collect())
    }
}

#[async_trait]
impl Tool for FetchPodcastDetailsTool {
    fn name(&self) -> &str {
        "fetch_podcast_details"
    }

    fn description(&self) -> &str {
        "Fetch podcast details from MongoDB using a natural language prompt."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "A natural language prompt describing the podcast data to fetch."
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let args: FetchArgs = parse_params(params)?;

        let filter = podcast_query(&args.prompt);
        tracing::debug!(filter = %filter, "Querying podcast catalogue");
        let podcasts = self.find(filter).await?;
        tracing::debug!(results = podcasts.len(), "Podcast query finished");

        Ok(ToolOutput::success(
            serde_json::Value::Array(podcasts),
            start.elapsed(),
        ))
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}
