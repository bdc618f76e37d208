//! In-memory fakes for the tool traits (testing and offline runs).
//!
//! Provides `StaticCatalog`, `StaticWardrobe`, `ScriptedRenderService` and
//! `FixedEvaluator`. The render fake counts submissions, polls and jobs in
//! flight so tests can check the render ceiling from the service's side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    Category, Evaluation, ImageRef, Item, JobId, JobStatus, PaletteHint, PollReport, RenderRequest,
    ToolError,
};
use crate::tools::{Catalog, Evaluator, RenderService, SearchQuery, ToolId, Wardrobe};

// ---------------------------------------------------------------------------
// StaticCatalog
// ---------------------------------------------------------------------------

/// Catalog returning a fixed item list filtered by category.
#[derive(Debug)]
pub struct StaticCatalog {
    source: String,
    items: Vec<Item>,
    latency: Duration,
    failure: Option<String>,
    searches: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(source: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            source: source.into(),
            items,
            latency: Duration::ZERO,
            failure: None,
            searches: AtomicUsize::new(0),
        }
    }

    /// Every search fails as unavailable with `reason`.
    pub fn failing(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new(source, Vec::new())
        }
    }

    /// Sleep this long (tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    fn source(&self) -> &str {
        &self.source
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Item>, ToolError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(reason) = &self.failure {
            return Err(ToolError::unavailable(
                ToolId::SearchCatalog.as_str(),
                reason.clone(),
            ));
        }
        Ok(self
            .items
            .iter()
            .filter(|item| item.category == query.category)
            .take(query.filters.limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// StaticWardrobe
// ---------------------------------------------------------------------------

/// Wardrobe holding a fixed item list.
#[derive(Debug, Default)]
pub struct StaticWardrobe {
    items: Vec<Item>,
}

impl StaticWardrobe {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl Wardrobe for StaticWardrobe {
    async fn fetch(&self, categories: &[Category]) -> Result<Vec<Item>, ToolError> {
        Ok(self
            .items
            .iter()
            .filter(|item| categories.contains(&item.category))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// ScriptedRenderService
// ---------------------------------------------------------------------------

/// How every job of a [`ScriptedRenderService`] behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderScript {
    /// `running` until the given poll, then `completed`.
    CompleteAfter { polls: u32, images: usize },
    /// Completion poll chosen per variation, as `(variation, polls)` pairs.
    /// Each job completes with one image named after its variation;
    /// unlisted variations never finish.
    CompleteByVariation { schedule: Vec<(u32, u32)> },
    /// Submission fails as unavailable.
    Reject { reason: String },
    /// `running` forever.
    NeverFinish,
    /// `failed` on the first poll.
    Fail { reason: String },
    /// `canceled` on the first poll.
    Cancel,
}

#[derive(Debug, Default)]
struct JobTrack {
    variation: u32,
    polls: u32,
    settled: bool,
}

/// Render service that follows a [`RenderScript`] and records what it saw.
#[derive(Debug)]
pub struct ScriptedRenderService {
    script: RenderScript,
    poll_errors: u32,
    poll_latency: Duration,
    jobs: Mutex<HashMap<String, JobTrack>>,
    submits: AtomicUsize,
    polls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRenderService {
    pub fn new(script: RenderScript) -> Self {
        Self {
            script,
            poll_errors: 0,
            poll_latency: Duration::ZERO,
            jobs: Mutex::new(HashMap::new()),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Jobs complete with one image on their `polls`-th status poll.
    pub fn completing_after(polls: u32) -> Self {
        Self::new(RenderScript::CompleteAfter { polls, images: 1 })
    }

    /// See [`RenderScript::CompleteByVariation`].
    pub fn completing_by_variation(schedule: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self::new(RenderScript::CompleteByVariation {
            schedule: schedule.into_iter().collect(),
        })
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::new(RenderScript::Reject {
            reason: reason.into(),
        })
    }

    pub fn never_finishing() -> Self {
        Self::new(RenderScript::NeverFinish)
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(RenderScript::Fail {
            reason: reason.into(),
        })
    }

    /// The first `count` polls of every job fail as unavailable.
    pub fn with_poll_errors(mut self, count: u32) -> Self {
        self.poll_errors = count;
        self
    }

    /// Every poll call takes this long (tokio clock).
    pub fn with_poll_latency(mut self, latency: Duration) -> Self {
        self.poll_latency = latency;
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Accepted jobs that have not reported a terminal status yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Polls seen by one job.
    pub fn polls_for(&self, job_id: &JobId) -> u32 {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(job_id.as_str())
            .map(|track| track.polls)
            .unwrap_or(0)
    }

    fn settle(&self, job_id: &JobId) {
        let mut jobs = self
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(track) = jobs.get_mut(job_id.as_str()) {
            if !track.settled {
                track.settled = true;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl RenderService for ScriptedRenderService {
    async fn submit(&self, request: &RenderRequest) -> Result<JobId, ToolError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        if let RenderScript::Reject { reason } = &self.script {
            return Err(ToolError::unavailable(
                ToolId::SubmitRenderJob.as_str(),
                reason.clone(),
            ));
        }

        let job_id = JobId::new(format!("job-{n}"));
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                job_id.as_str().to_string(),
                JobTrack {
                    variation: request.variation,
                    ..JobTrack::default()
                },
            );
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &JobId) -> Result<PollReport, ToolError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if !self.poll_latency.is_zero() {
            tokio::time::sleep(self.poll_latency).await;
        }

        let (attempt, variation) = {
            let mut jobs = self
                .jobs
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(track) = jobs.get_mut(job_id.as_str()) else {
                return Err(ToolError::InvalidInput {
                    tool: ToolId::PollRenderJob.as_str().to_string(),
                    reason: format!("unknown job {job_id}"),
                });
            };
            track.polls += 1;
            (track.polls, track.variation)
        };

        if attempt <= self.poll_errors {
            return Err(ToolError::unavailable(
                ToolId::PollRenderJob.as_str(),
                "status endpoint unreachable",
            ));
        }

        let report = match &self.script {
            RenderScript::CompleteAfter { polls, images } if attempt >= *polls => {
                PollReport::completed(
                    (0..*images)
                        .map(|i| ImageRef::new(format!("/renders/{job_id}-{i}.png")))
                        .collect(),
                )
            }
            RenderScript::CompleteByVariation { schedule } => {
                match schedule.iter().find(|(v, _)| *v == variation) {
                    Some((_, polls)) if attempt >= *polls => PollReport::completed(vec![
                        ImageRef::new(format!("/renders/variation-{variation}.png")),
                    ]),
                    _ => PollReport::running(),
                }
            }
            RenderScript::CompleteAfter { .. } | RenderScript::NeverFinish => PollReport::running(),
            RenderScript::Fail { reason } => PollReport::failed(reason.clone()),
            RenderScript::Cancel => PollReport::canceled(Some("canceled upstream".to_string())),
            RenderScript::Reject { reason } => PollReport::failed(reason.clone()),
        };

        let empty_completion =
            report.status == JobStatus::Completed && report.output_images.is_empty();
        if report.status.is_terminal() && !empty_completion {
            self.settle(job_id);
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// FixedEvaluator
// ---------------------------------------------------------------------------

/// Evaluator answering with a fixed palette hint, or always failing.
#[derive(Debug)]
pub struct FixedEvaluator {
    hint: Option<PaletteHint>,
    calls: AtomicUsize,
}

impl FixedEvaluator {
    pub fn new(hint: PaletteHint) -> Self {
        Self {
            hint: Some(hint),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            hint: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for FixedEvaluator {
    async fn evaluate(
        &self,
        theme: &str,
        items: &[Item],
        rendered: &[ImageRef],
    ) -> Result<Evaluation, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.hint {
            Some(palette_hint) => Ok(Evaluation {
                palette_hint,
                notes: format!(
                    "{} item(s), {} image(s) for '{theme}'",
                    items.len(),
                    rendered.len()
                ),
            }),
            None => Err(ToolError::unavailable(
                ToolId::EvaluateCandidate.as_str(),
                "evaluator offline",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SearchFilters;

    fn request() -> RenderRequest {
        RenderRequest::new(
            ImageRef::from("/base.png"),
            vec![ImageRef::from("/top.png")],
            11,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn static_catalog_filters_by_category_and_limit() {
        let catalog = StaticCatalog::new(
            "test",
            vec![
                Item::new("t1", "Tee", Category::Top, "/t1.png"),
                Item::new("t2", "Shirt", Category::Top, "/t2.png"),
                Item::new("b1", "Chinos", Category::Bottom, "/b1.png"),
            ],
        );
        let query = SearchQuery {
            category: Category::Top,
            query: "top".to_string(),
            filters: SearchFilters {
                color_palette: vec![],
                limit: 1,
            },
        };

        let items = catalog.search(&query).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "t1");
        assert_eq!(catalog.searches(), 1);
    }

    #[tokio::test]
    async fn scripted_job_completes_on_requested_poll() {
        let render = ScriptedRenderService::completing_after(2);
        let job = render.submit(&request()).await.unwrap();
        assert_eq!(render.in_flight(), 1);

        assert_eq!(render.poll(&job).await.unwrap().status, JobStatus::Running);
        let report = render.poll(&job).await.unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.output_images.len(), 1);
        assert_eq!(render.in_flight(), 0);
        assert_eq!(render.polls_for(&job), 2);
    }

    #[tokio::test]
    async fn injected_poll_errors_come_first() {
        let render = ScriptedRenderService::failing("bad garment").with_poll_errors(1);
        let job = render.submit(&request()).await.unwrap();

        assert!(render.poll(&job).await.is_err());
        let report = render.poll(&job).await.unwrap();
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.error_reason.as_deref(), Some("bad garment"));
        assert_eq!(render.in_flight(), 0);
    }

    #[tokio::test]
    async fn rejected_submissions_are_counted() {
        let render = ScriptedRenderService::rejecting("quota exceeded");
        assert!(render.submit(&request()).await.is_err());
        assert_eq!(render.submits(), 1);
        assert_eq!(render.max_in_flight(), 0);
    }

    #[tokio::test]
    async fn failing_evaluator_reports_unavailable() {
        let evaluator = FixedEvaluator::failing();
        let err = evaluator.evaluate("t", &[], &[]).await.unwrap_err();
        assert_eq!(err.tool(), "evaluate_candidate");
        assert_eq!(evaluator.calls(), 1);
    }
}
