//! External tool seams and the closed dispatch table.
//!
//! Every external capability the round uses is one variant of [`ToolId`] and
//! one async trait. [`ToolBox`] maps each id to a registered handler, bounds
//! every call with a timeout and reports missing handlers or unknown tool
//! names as [`ToolError::Unavailable`] instead of silently doing nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::{
    Category, Evaluation, ImageRef, Item, JobId, PollReport, RenderRequest, ToolError,
};
use crate::obs;

/// Closed set of tools the orchestrator can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    SearchCatalog,
    FetchWardrobe,
    SubmitRenderJob,
    PollRenderJob,
    EvaluateCandidate,
}

impl ToolId {
    pub const ALL: [ToolId; 5] = [
        ToolId::SearchCatalog,
        ToolId::FetchWardrobe,
        ToolId::SubmitRenderJob,
        ToolId::PollRenderJob,
        ToolId::EvaluateCandidate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::SearchCatalog => "search_catalog",
            ToolId::FetchWardrobe => "fetch_wardrobe",
            ToolId::SubmitRenderJob => "submit_render_job",
            ToolId::PollRenderJob => "poll_render_job",
            ToolId::EvaluateCandidate => "evaluate_candidate",
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolId {
    type Err = ToolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|id| id.as_str() == name)
            .ok_or_else(|| ToolError::unavailable(name, "unknown tool"))
    }
}

/// Filters forwarded to a catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub color_palette: Vec<String>,
    pub limit: usize,
}

/// One catalog search descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub category: Category,
    pub query: String,
    pub filters: SearchFilters,
}

/// Item catalog. Ranking is the catalog's business; results come back best first.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Provenance tag stamped on items from this source.
    fn source(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Item>, ToolError>;
}

/// The player's own wardrobe.
#[async_trait]
pub trait Wardrobe: Send + Sync + 'static {
    async fn fetch(&self, categories: &[Category]) -> Result<Vec<Item>, ToolError>;
}

/// Asynchronous try-on render service.
#[async_trait]
pub trait RenderService: Send + Sync + 'static {
    async fn submit(&self, request: &RenderRequest) -> Result<JobId, ToolError>;

    async fn poll(&self, job_id: &JobId) -> Result<PollReport, ToolError>;
}

/// Lightweight outfit evaluator.
#[async_trait]
pub trait Evaluator: Send + Sync + 'static {
    async fn evaluate(
        &self,
        theme: &str,
        items: &[Item],
        rendered: &[ImageRef],
    ) -> Result<Evaluation, ToolError>;
}

/// A typed tool request.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Search the catalog registered at position `source`.
    SearchCatalog { source: usize, query: SearchQuery },
    FetchWardrobe { categories: Vec<Category> },
    SubmitRenderJob(RenderRequest),
    PollRenderJob(JobId),
    EvaluateCandidate {
        theme: String,
        items: Vec<Item>,
        rendered: Vec<ImageRef>,
    },
}

impl ToolCall {
    pub fn tool_id(&self) -> ToolId {
        match self {
            ToolCall::SearchCatalog { .. } => ToolId::SearchCatalog,
            ToolCall::FetchWardrobe { .. } => ToolId::FetchWardrobe,
            ToolCall::SubmitRenderJob(_) => ToolId::SubmitRenderJob,
            ToolCall::PollRenderJob(_) => ToolId::PollRenderJob,
            ToolCall::EvaluateCandidate { .. } => ToolId::EvaluateCandidate,
        }
    }
}

/// A typed tool response, one variant per [`ToolId`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Items(Vec<Item>),
    Wardrobe(Vec<Item>),
    Submitted(JobId),
    Polled(PollReport),
    Evaluated(Evaluation),
}

/// Dispatch table from [`ToolId`] to registered handlers.
#[derive(Clone)]
pub struct ToolBox {
    catalogs: Vec<Arc<dyn Catalog>>,
    wardrobe: Option<Arc<dyn Wardrobe>>,
    render: Option<Arc<dyn RenderService>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    call_timeout: Duration,
}

impl Default for ToolBox {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBox")
            .field("catalogs", &self.catalog_sources())
            .field("wardrobe", &self.wardrobe.is_some())
            .field("render", &self.render.is_some())
            .field("evaluator", &self.evaluator.is_some())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ToolBox {
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

    /// An empty table; every call fails as unavailable until handlers are added.
    pub fn new() -> Self {
        Self {
            catalogs: Vec::new(),
            wardrobe: None,
            render: None,
            evaluator: None,
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Add a catalog. Catalogs are searched in registration order and earlier
    /// ones rank first.
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalogs.push(catalog);
        self
    }

    pub fn with_wardrobe(mut self, wardrobe: Arc<dyn Wardrobe>) -> Self {
        self.wardrobe = Some(wardrobe);
        self
    }

    pub fn with_render_service(mut self, render: Arc<dyn RenderService>) -> Self {
        self.render = Some(render);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn catalog_sources(&self) -> Vec<&str> {
        self.catalogs.iter().map(|c| c.source()).collect()
    }

    pub fn has_handler(&self, tool: ToolId) -> bool {
        match tool {
            ToolId::SearchCatalog => !self.catalogs.is_empty(),
            ToolId::FetchWardrobe => self.wardrobe.is_some(),
            ToolId::SubmitRenderJob | ToolId::PollRenderJob => self.render.is_some(),
            ToolId::EvaluateCandidate => self.evaluator.is_some(),
        }
    }

    /// Dispatch one typed call to its handler.
    pub async fn invoke(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
        match call {
            ToolCall::SearchCatalog { source, query } => self
                .search_catalog(source, &query)
                .await
                .map(ToolOutput::Items),
            ToolCall::FetchWardrobe { categories } => self
                .fetch_wardrobe(&categories)
                .await
                .map(ToolOutput::Wardrobe),
            ToolCall::SubmitRenderJob(request) => self
                .submit_render_job(&request)
                .await
                .map(ToolOutput::Submitted),
            ToolCall::PollRenderJob(job_id) => self
                .poll_render_job(&job_id)
                .await
                .map(ToolOutput::Polled),
            ToolCall::EvaluateCandidate {
                theme,
                items,
                rendered,
            } => self
                .evaluate_candidate(&theme, &items, &rendered)
                .await
                .map(ToolOutput::Evaluated),
        }
    }

    pub async fn search_catalog(
        &self,
        source: usize,
        query: &SearchQuery,
    ) -> Result<Vec<Item>, ToolError> {
        let catalog = self
            .catalogs
            .get(source)
            .ok_or_else(|| missing_handler(ToolId::SearchCatalog))?;
        self.timed(ToolId::SearchCatalog, catalog.search(query)).await
    }

    pub async fn fetch_wardrobe(&self, categories: &[Category]) -> Result<Vec<Item>, ToolError> {
        let wardrobe = self
            .wardrobe
            .as_ref()
            .ok_or_else(|| missing_handler(ToolId::FetchWardrobe))?;
        self.timed(ToolId::FetchWardrobe, wardrobe.fetch(categories))
            .await
    }

    pub async fn submit_render_job(&self, request: &RenderRequest) -> Result<JobId, ToolError> {
        let render = self
            .render
            .as_ref()
            .ok_or_else(|| missing_handler(ToolId::SubmitRenderJob))?;
        self.timed(ToolId::SubmitRenderJob, render.submit(request))
            .await
    }

    pub async fn poll_render_job(&self, job_id: &JobId) -> Result<PollReport, ToolError> {
        let render = self
            .render
            .as_ref()
            .ok_or_else(|| missing_handler(ToolId::PollRenderJob))?;
        self.timed(ToolId::PollRenderJob, render.poll(job_id)).await
    }

    pub async fn evaluate_candidate(
        &self,
        theme: &str,
        items: &[Item],
        rendered: &[ImageRef],
    ) -> Result<Evaluation, ToolError> {
        let evaluator = self
            .evaluator
            .as_ref()
            .ok_or_else(|| missing_handler(ToolId::EvaluateCandidate))?;
        self.timed(
            ToolId::EvaluateCandidate,
            evaluator.evaluate(theme, items, rendered),
        )
        .await
    }

    async fn timed<T, F>(&self, tool: ToolId, call: F) -> Result<T, ToolError>
    where
        F: std::future::Future<Output = Result<T, ToolError>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: tool.as_str().to_string(),
                timeout_ms: self.call_timeout.as_millis() as u64,
            }),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => obs::emit_tool_finished(tool.as_str(), duration_ms, None),
            Err(e) => obs::emit_tool_finished(tool.as_str(), duration_ms, Some(e)),
        }
        result
    }
}

fn missing_handler(tool: ToolId) -> ToolError {
    ToolError::unavailable(tool.as_str(), "no handler registered")
}
