//! HTTP processing client.
//!
//! A call has two steps when the item's file is stored locally:
//! 1. `POST {base_url}/api/upload` with the file as multipart field `file`,
//!    answered by `{"file_id": "..."}`
//! 2. `GET {base_url}/api/process/{file_id}`, answered by
//!    `{"msg": "...", "flowchart": [...]}`
//!
//! Without a stored file only step 2 is issued, with the item id. Non-2xx
//! answers become [`ProcessingError::Application`] carrying the service's
//! `msg`. Generated views are served by the service at
//! `{base_url}/flowchart/{file_id}_{ordinal}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use super::error::ProcessingError;
use super::traits::ProcessingClient;
use super::types::{ErrorBody, ProcessingRequest, ProcessingResult, UploadBody};
use crate::config::ProcessingConfig;

/// Route the service serves generated views under.
const VIEW_ROUTE: &str = "flowchart";

/// Processing client talking to the remote service over HTTP.
pub struct HttpProcessingClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl HttpProcessingClient {
    /// Create a new client from config.
    pub fn new(config: &ProcessingConfig) -> Result<Self, ProcessingError> {
        let client = Client::builder()
            .user_agent(concat!("qform/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .build()?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/api/upload", self.base_url)
    }

    fn process_url(&self, remote_id: &str) -> String {
        format!(
            "{}/api/process/{}",
            self.base_url,
            urlencoding::encode(remote_id)
        )
    }

    fn view_prefix(&self, remote_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            VIEW_ROUTE,
            urlencoding::encode(remote_id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    /// Send the stored file and return the id the service assigned to it.
    async fn upload(
        &self,
        request: &ProcessingRequest,
        path: &Path,
    ) -> Result<String, ProcessingError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ProcessingError::LocalFile(format!("{}: {}", path.display(), e)))?;

        debug!(
            "Uploading {} ({} bytes) for item {}",
            request.file_name,
            bytes.len(),
            request.id
        );

        let part = Part::bytes(bytes).file_name(request.file_name.clone());
        let form = Form::new().part("file", part);
        let response = self
            .authorized(self.client.post(self.upload_url()))
            .multipart(form)
            .send()
            .await?;

        let body: UploadBody = check_status(response).await?.json().await.map_err(|e| {
            ProcessingError::InvalidResponse(format!("Failed to parse upload response: {}", e))
        })?;
        Ok(body.file_id)
    }

    /// Turn each reported view into a location a browser can fetch.
    ///
    /// The service reports its own file paths; those are replaced by the
    /// route that serves them.
    fn resolve_views(&self, remote_id: &str, result: &mut ProcessingResult) {
        let prefix = self.view_prefix(remote_id);
        result.flowcharts = result
            .flowcharts
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| {
                if entry.starts_with("http://") || entry.starts_with("https://") {
                    entry.clone()
                } else {
                    format!("{}_{}", prefix, ordinal)
                }
            })
            .collect();
        result.view_url_prefix = Some(prefix);
    }
}

/// Map non-2xx answers to [`ProcessingError::Application`].
async fn check_status(response: Response) -> Result<Response, ProcessingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.msg)
        .unwrap_or(body);
    Err(ProcessingError::Application {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProcessingClient for HttpProcessingClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn process_item(
        &self,
        request: &ProcessingRequest,
    ) -> Result<ProcessingResult, ProcessingError> {
        let remote_id = match &request.path {
            Some(path) => self.upload(request, path).await?,
            None => request.id.to_string(),
        };

        let url = self.process_url(&remote_id);
        debug!("Processing request: {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;
        let mut result = check_status(response)
            .await?
            .json::<ProcessingResult>()
            .await
            .map_err(|e| {
                ProcessingError::InvalidResponse(format!(
                    "Failed to parse processing response: {}",
                    e
                ))
            })?;

        self.resolve_views(&remote_id, &mut result);
        Ok(result)
    }
}
