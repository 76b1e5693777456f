//! IPFS pinning through the Pinata API.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::config::ToolsConfig;
use crate::tools::redaction::truncate_body;
use crate::tools::tool::{Tool, ToolError, ToolOutput, parse_params};

/// Longest Pinata error body quoted back to the assistant.
const MAX_ERROR_BODY: usize = 500;

/// Uploads a server-side file to IPFS and returns its content hash.
pub struct UploadToIpfsTool {
    client: Client,
    api_url: String,
    gateway_url: String,
    api_key: Option<SecretString>,
    secret_api_key: Option<SecretString>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct UploadArgs {
    #[serde(rename = "filePath")]
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

impl UploadToIpfsTool {
    pub fn new(config: &ToolsConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_url: config.pinata_api_url.trim_end_matches('/').to_string(),
            gateway_url: config.pinata_gateway_url.trim_end_matches('/').to_string(),
            api_key: config.pinata_api_key.clone(),
            secret_api_key: config.pinata_secret_api_key.clone(),
            timeout: config.timeout,
        }
    }

    async fn pin_file(&self, path: &Path) -> Result<String, ToolError> {
        let (Some(api_key), Some(secret_api_key)) = (&self.api_key, &self.secret_api_key) else {
            return Err(ToolError::NotConfigured(
                "Pinata API keys not set in environment".to_string(),
            ));
        };

        let unreadable = |e: std::io::Error| {
            ToolError::ExecutionFailed(format!("cannot read {}: {e}", path.display()))
        };
        let file = tokio::fs::File::open(path).await.map_err(unreadable)?;
        let length = file.metadata().await.map_err(unreadable)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        tracing::debug!(file = %file_name, bytes = length, "Pinning file to IPFS");

        // Streamed from disk; the length lets the form carry a Content-Length.
        let body = Body::wrap_stream(ReaderStream::new(file));
        let form = Form::new().part(
            "file",
            Part::stream_with_length(body, length).file_name(file_name),
        );
        let response = self
            .client
            .post(format!("{}/pinning/pinFileToIPFS", self.api_url))
            .header("pinata_api_key", api_key.expose_secret())
            .header("pinata_secret_api_key", secret_api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ToolError::ExternalService(format!("upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExternalService(format!(
                "Pinata returned HTTP {status}: {}",
                truncate_body(&body, MAX_ERROR_BODY)
            )));
        }

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExternalService(format!("invalid Pinata response: {e}")))?;
        Ok(pinned.ipfs_hash)
    }
}

#[async_trait]
impl Tool for UploadToIpfsTool {
    fn name(&self) -> &str {
        "upload_to_ipfs"
    }

    fn description(&self) -> &str {
        "Upload a file to IPFS via Pinata. Accepts any file type."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The path to the file to upload (on the server)."
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let args: UploadArgs = parse_params(params)?;

        let hash = self.pin_file(Path::new(&args.file_path)).await?;
        let url = format!("{}/{}", self.gateway_url, hash);

        Ok(ToolOutput::success(
            serde_json::json!({ "ipfsHash": hash, "url": url }),
            start.elapsed(),
        ))
    }

    fn execution_timeout(&self) -> Duration {
        self.timeout
    }
}
