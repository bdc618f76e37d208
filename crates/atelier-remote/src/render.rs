//! Try-on render service over HTTP (`/run` + `/status/{id}`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::debug;

use atelier_core::{
    ImageRef, JobId, JobStatus, PollReport, RenderRequest, RenderService, ToolError, ToolId,
};

use crate::error::{check_status, RemoteError, RemoteResult};
use crate::USER_AGENT_VALUE;

pub const DEFAULT_RENDER_URL: &str = "https://api.fashn.ai/v1";
pub const DEFAULT_MODEL_NAME: &str = "tryon-v1.6";

/// Connection settings for [`HttpRenderService`].
#[derive(Debug, Clone)]
pub struct RenderServiceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub timeout: Duration,
}

impl RenderServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_RENDER_URL.to_string(),
            api_key: api_key.into(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct RunBody<'a> {
    model_name: &'a str,
    inputs: RunInputs<'a>,
}

#[derive(Debug, Serialize)]
struct RunInputs<'a> {
    model_image: &'a str,
    garment_image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bottom_image: Option<&'a str>,
    seed: u32,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// [`RenderService`] backed by a run/status HTTP API with bearer auth.
#[derive(Debug, Clone)]
pub struct HttpRenderService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    timeout_ms: u64,
}

impl HttpRenderService {
    pub fn new(config: RenderServiceConfig) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model_name: config.model_name,
            timeout_ms: config.timeout.as_millis() as u64,
        })
    }

    async fn run(&self, request: &RenderRequest) -> RemoteResult<JobId> {
        let garment = request
            .items
            .first()
            .ok_or(RemoteError::MissingField("garment_image"))?;
        let body = RunBody {
            model_name: &self.model_name,
            inputs: RunInputs {
                model_image: request.base_image.as_str(),
                garment_image: garment.as_str(),
                bottom_image: request.items.get(1).map(ImageRef::as_str),
                seed: request.variation,
            },
        };

        let url = format!("{}/run", self.base_url);
        debug!(url = %url, variation = request.variation, "submitting render job");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let run: RunResponse = check_status(response).await?.json().await?;

        run.id
            .filter(|id| !id.is_empty())
            .map(JobId::new)
            .ok_or(RemoteError::MissingField("id"))
    }

    async fn status(&self, job_id: &JobId) -> RemoteResult<PollReport> {
        let url = format!("{}/status/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status: StatusResponse = check_status(response).await?.json().await?;
        debug!(job_id = %job_id, status = %status.status, "render job status");
        Ok(poll_report(status))
    }
}

fn poll_report(response: StatusResponse) -> PollReport {
    let outputs = || {
        response
            .output
            .iter()
            .flatten()
            .map(|url| ImageRef::new(url.as_str()))
            .collect::<Vec<_>>()
    };

    match parse_status(&response.status) {
        JobStatus::Completed => PollReport::completed(outputs()),
        JobStatus::Failed => PollReport::failed(
            error_text(response.error.as_ref()).unwrap_or_else(|| "unknown".to_string()),
        ),
        JobStatus::Canceled => PollReport::canceled(error_text(response.error.as_ref())),
        JobStatus::Pending => PollReport::pending(),
        JobStatus::Running => PollReport::running(),
    }
}

/// Upstream status string to [`JobStatus`]; unknown strings are `running`.
pub fn parse_status(status: &str) -> JobStatus {
    match status.to_ascii_lowercase().as_str() {
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "canceled" | "cancelled" => JobStatus::Canceled,
        "pending" | "starting" | "in_queue" => JobStatus::Pending,
        _ => JobStatus::Running,
    }
}

fn error_text(error: Option<&serde_json::Value>) -> Option<String> {
    match error? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(
            other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

#[async_trait]
impl RenderService for HttpRenderService {
    async fn submit(&self, request: &RenderRequest) -> Result<JobId, ToolError> {
        self.run(request)
            .await
            .map_err(|e| e.into_tool_error(ToolId::SubmitRenderJob, self.timeout_ms))
    }

    async fn poll(&self, job_id: &JobId) -> Result<PollReport, ToolError> {
        self.status(job_id)
            .await
            .map_err(|e| e.into_tool_error(ToolId::PollRenderJob, self.timeout_ms))
    }
}
