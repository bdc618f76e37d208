//! Phase controller: PLAN → GATHER → TRYON → PICK → DONE.
//!
//! The controller owns the round state (budget, entity cache, candidates) and
//! is the only writer to it. GATHER and TRYON fan out through the
//! [`Dispatcher`]; every task writes its own positional slot and the
//! controller merges the slots once the batch is done. No phase fails the
//! round: tool failures become log lines and the round always ends with a
//! PICK result.

use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, Instrument};

use super::budget::RoundBudget;
use super::envelope::{
    FinalSelection, GatherResult, PhaseEnvelope, PhaseReport, PlanResult, TryOnResult,
};
use super::events::{EventDetail, EventEmitter, EventKind, RoundEvent};
use crate::cache::EntityCache;
use crate::config::RoundConfig;
use crate::dispatch::{Dispatcher, TaskOutcome};
use crate::domain::{
    Candidate, Category, Evaluation, ImageRef, Item, Outfit, OutfitId, Phase, RenderRequest,
    Result, RoundError, ToolError,
};
use crate::obs;
use crate::palette::{infer_palette, plan_queries};
use crate::poller::{JobOutcome, JobPoller, PollPolicy};
use crate::ranker;
use crate::tools::{ToolBox, ToolCall, ToolId, ToolOutput};

/// Provenance stamped on wardrobe items that arrive without one.
const WARDROBE_SOURCE: &str = "wardrobe";

/// What the round is asked to dress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundRequest {
    pub theme: String,
    pub base_image: ImageRef,
}

impl RoundRequest {
    pub fn new(theme: impl Into<String>, base_image: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            base_image: ImageRef::new(base_image),
        }
    }
}

/// Everything a finished round produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub run_id: String,
    pub reports: Vec<PhaseEnvelope>,
    pub selection: FinalSelection,
    pub duration_ms: u64,
}

impl RoundOutcome {
    /// Phases that produced an envelope, in order.
    pub fn phases(&self) -> Vec<Phase> {
        self.reports.iter().map(|r| r.phase).collect()
    }
}

#[derive(Debug)]
struct RoundState {
    phase: Phase,
    budget: RoundBudget,
    cache: EntityCache,
    candidates: Vec<Candidate>,
}

/// Progress lines of one phase, mirrored onto the event stream.
struct PhaseLog {
    phase: Phase,
    events: EventEmitter,
    lines: Vec<String>,
}

impl PhaseLog {
    fn new(phase: Phase, events: &EventEmitter) -> Self {
        Self {
            phase,
            events: events.clone(),
            lines: Vec::new(),
        }
    }

    fn push(&mut self, kind: EventKind, message: impl Into<String>) {
        self.push_with(kind, message, EventDetail::default());
    }

    fn push_with(&mut self, kind: EventKind, message: impl Into<String>, detail: EventDetail) {
        let message = message.into();
        self.events
            .publish_with(self.phase, kind, message.clone(), detail);
        self.lines.push(message);
    }
}

/// What one GATHER slot was asked to do.
enum GatherSlot {
    Search { source: String, category: Category },
    Wardrobe,
}

/// One TRYON slot, keyed by outfit position and variation.
struct RenderSlot {
    outfit: usize,
    variation: u32,
}

/// Drives one round through its phases.
pub struct RoundController {
    run_id: String,
    request: RoundRequest,
    config: RoundConfig,
    tools: ToolBox,
    poller: JobPoller,
    render_slots: Arc<Semaphore>,
    events: EventEmitter,
    state: RoundState,
}

impl std::fmt::Debug for RoundController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundController")
            .field("run_id", &self.run_id)
            .field("request", &self.request)
            .field("phase", &self.state.phase)
            .field("tools", &self.tools)
            .finish()
    }
}

impl RoundController {
    /// Start a round. The budget starts counting now.
    pub fn new(request: RoundRequest, config: RoundConfig, tools: ToolBox) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        let tools = tools.with_call_timeout(config.tool_timeout());
        Self {
            events: EventEmitter::new(run_id.clone(), None),
            poller: JobPoller::new(PollPolicy::from(&config)),
            render_slots: Arc::new(Semaphore::new(config.render_concurrency.max(1))),
            state: RoundState {
                phase: Phase::Init,
                budget: RoundBudget::start(config.round_duration()),
                cache: EntityCache::new(),
                candidates: Vec::new(),
            },
            run_id,
            request,
            config,
            tools,
        }
    }

    /// Publish every progress event on `sink` as well.
    pub fn with_event_sink(mut self, sink: UnboundedSender<RoundEvent>) -> Self {
        self.events = EventEmitter::new(self.run_id.clone(), Some(sink));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn cache(&self) -> &EntityCache {
        &self.state.cache
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.state.candidates
    }

    pub fn budget(&self) -> &RoundBudget {
        &self.state.budget
    }

    /// Run every phase in order and return the envelopes and final pick.
    pub async fn run(self) -> Result<RoundOutcome> {
        let span = obs::round_span(&self.run_id, &self.request.theme);
        self.run_phases().instrument(span).await
    }

    async fn run_phases(mut self) -> Result<RoundOutcome> {
        obs::emit_round_started(
            &self.run_id,
            &self.request.theme,
            self.config.round_duration_ms,
        );
        self.events.publish(
            Phase::Init,
            EventKind::System,
            format!(
                "round started: theme='{}', budget {}s",
                self.request.theme,
                self.config.round_duration().as_secs()
            ),
        );

        let mut reports: Vec<PhaseEnvelope> = Vec::with_capacity(4);

        let plan = self.plan()?;
        let gather = self.gather(&plan.result).await?;
        reports.push(plan.into());

        let tryon = if gather.result.skip_tryon {
            None
        } else {
            Some(self.tryon(&gather.result).await?)
        };
        reports.push(gather.into());

        let pick = match &tryon {
            Some(report) => self.pick(&report.result)?,
            None => self.pick(&TryOnResult::skipped())?,
        };
        if let Some(report) = tryon {
            reports.push(report.into());
        }
        let selection = pick.result.clone();
        reports.push(pick.into());

        self.finish(&selection)?;

        Ok(RoundOutcome {
            run_id: self.run_id,
            reports,
            selection,
            duration_ms: self.state.budget.elapsed().as_millis() as u64,
        })
    }

    /// PLAN: palette intent and one search per category. No external calls.
    pub fn plan(&mut self) -> Result<PhaseReport<PlanResult>> {
        self.advance(Phase::Plan)?;
        let mut log = PhaseLog::new(Phase::Plan, &self.events);
        log.push(
            EventKind::PhaseStart,
            format!("planning for theme '{}'", self.request.theme),
        );

        let palette = infer_palette(&self.request.theme);
        log.push(
            EventKind::Thought,
            format!("palette intent: {}", palette.join(", ")),
        );

        let queries = plan_queries(&palette, self.config.search_limit);
        for query in &queries {
            log.push(
                EventKind::Thought,
                format!("{} search: '{}'", query.category, query.query),
            );
        }
        log.push(
            EventKind::PhaseResult,
            format!("planned {} searches", queries.len()),
        );

        let result = PlanResult {
            theme: self.request.theme.clone(),
            palette,
            queries,
        };
        Ok(self.report(log, result))
    }

    /// GATHER: all searches plus one wardrobe fetch as one unbounded batch,
    /// merged into the cache, then the shortlist and the budget check.
    pub async fn gather(&mut self, plan: &PlanResult) -> Result<PhaseReport<GatherResult>> {
        self.advance(Phase::Gather)?;
        let mut log = PhaseLog::new(Phase::Gather, &self.events);
        log.push(EventKind::PhaseStart, "gathering catalog and wardrobe items");

        let sources: Vec<String> = self
            .tools
            .catalog_sources()
            .into_iter()
            .map(str::to_string)
            .collect();
        // With no catalog registered the searches still go out and fail as unavailable.
        let source_count = sources.len().max(1);

        let mut slots = Vec::new();
        let mut calls = Vec::new();
        for source in 0..source_count {
            let source_name = sources
                .get(source)
                .cloned()
                .unwrap_or_else(|| "catalog".to_string());
            for query in &plan.queries {
                log.push_with(
                    EventKind::ToolStart,
                    format!("search '{}' for {} in {}", query.query, query.category, source_name),
                    EventDetail::tool(ToolId::SearchCatalog.as_str()),
                );
                slots.push(GatherSlot::Search {
                    source: source_name.clone(),
                    category: query.category,
                });
                calls.push(ToolCall::SearchCatalog {
                    source,
                    query: query.clone(),
                });
            }
        }
        log.push_with(
            EventKind::ToolStart,
            "fetch wardrobe",
            EventDetail::tool(ToolId::FetchWardrobe.as_str()),
        );
        slots.push(GatherSlot::Wardrobe);
        calls.push(ToolCall::FetchWardrobe {
            categories: Category::ALL.to_vec(),
        });

        let tasks: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let tools = self.tools.clone();
                async move {
                    let tool = call.tool_id();
                    let started = Instant::now();
                    let result = tools.invoke(call).await;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    match result {
                        Ok(output) => Ok((output, duration_ms)),
                        Err(error) => Err((tool, error, duration_ms)),
                    }
                }
            })
            .collect();
        let outcomes = Dispatcher::unbounded().run(tasks).await;

        for (slot, outcome) in slots.into_iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Succeeded((output, duration_ms)) => {
                    self.merge_gathered(&mut log, slot, output, duration_ms)
                }
                TaskOutcome::Failed((tool, error, duration_ms)) => log.push_with(
                    EventKind::ToolError,
                    error.to_string(),
                    EventDetail::tool(tool.as_str()).with_duration_ms(duration_ms),
                ),
                TaskOutcome::Aborted(reason) => log.push(
                    EventKind::ToolError,
                    format!("gather task aborted: {reason}"),
                ),
            }
        }

        let outfits = self.shortlist(&mut log);
        let variations = self.config.variations.clone();

        let remaining = self.state.budget.remaining();
        let skip_tryon = self
            .state
            .budget
            .is_below(self.config.early_exit_threshold());
        if skip_tryon {
            obs::emit_budget_skip(
                &self.run_id,
                remaining.as_millis() as u64,
                self.config.early_exit_threshold_ms,
            );
            log.push(
                EventKind::System,
                format!(
                    "only {}s left in round; skipping TRYON",
                    remaining.as_secs()
                ),
            );
        }

        log.push_with(
            EventKind::PhaseResult,
            format!(
                "{} outfit(s) shortlisted from {} cached item(s), variations {:?}",
                outfits.len(),
                self.state.cache.len(),
                variations
            ),
            EventDetail::default().with_context(json!({
                "outfits": outfits.iter().map(|o| o.id().as_str()).collect::<Vec<_>>(),
                "remaining_ms": remaining.as_millis() as u64,
                "skip_tryon": skip_tryon,
            })),
        );

        let result = GatherResult {
            outfits,
            variations,
            items_cached: self.state.cache.len(),
            remaining_ms: remaining.as_millis() as u64,
            skip_tryon,
        };
        Ok(self.report(log, result))
    }

    fn merge_gathered(
        &mut self,
        log: &mut PhaseLog,
        slot: GatherSlot,
        output: ToolOutput,
        duration_ms: u64,
    ) {
        match (slot, output) {
            (GatherSlot::Search { source, category }, ToolOutput::Items(items)) => {
                let found = items.len();
                let items = stamp_provenance(items, &source);
                let added = self.state.cache.register_ranked(category, items);
                log.push_with(
                    EventKind::ToolResult,
                    format!("{found} {category} result(s) from {source}, {added} new"),
                    EventDetail::tool(ToolId::SearchCatalog.as_str()).with_duration_ms(duration_ms),
                );
            }
            (GatherSlot::Wardrobe, ToolOutput::Wardrobe(items)) => {
                let found = items.len();
                let items = stamp_provenance(items, WARDROBE_SOURCE);
                let added = self.state.cache.register_wardrobe(items);
                log.push_with(
                    EventKind::ToolResult,
                    format!("{found} wardrobe item(s), {added} new"),
                    EventDetail::tool(ToolId::FetchWardrobe.as_str()).with_duration_ms(duration_ms),
                );
            }
            (_, other) => {
                debug!(output = ?other, "unexpected tool output for gather slot");
                log.push(EventKind::ToolError, "unexpected tool output");
            }
        }
    }

    /// At most one top+bottom outfit and one dress outfit, from the
    /// first-ranked item of each category.
    fn shortlist(&self, log: &mut PhaseLog) -> Vec<Outfit> {
        let cache = &self.state.cache;
        let mut picks: Vec<Vec<&Item>> = Vec::with_capacity(2);

        match (
            cache.first_ranked(Category::Top),
            cache.first_ranked(Category::Bottom),
        ) {
            (Some(top), Some(bottom)) => picks.push(vec![top, bottom]),
            (top, bottom) => log.push(
                EventKind::Thought,
                format!(
                    "no top+bottom outfit: top {}, bottom {}",
                    found_label(top),
                    found_label(bottom)
                ),
            ),
        }
        match cache.first_ranked(Category::Dress) {
            Some(dress) => picks.push(vec![dress]),
            None => log.push(EventKind::Thought, "no dress outfit: dress missing"),
        }

        let mut outfits = Vec::with_capacity(picks.len());
        for items in picks {
            let id = OutfitId::new(format!("outfit-{}", outfits.len() + 1));
            match Outfit::new(id, &items) {
                Ok(outfit) => {
                    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
                    log.push(
                        EventKind::Thought,
                        format!("{}: {}", outfit.id(), titles.join(" + ")),
                    );
                    outfits.push(outfit);
                }
                Err(error) => log.push(EventKind::System, error.to_string()),
            }
        }
        outfits
    }

    /// TRYON: one render job per (outfit, variation) under the round-wide
    /// render ceiling, then one evaluation per outfit with an accepted job.
    pub async fn tryon(&mut self, gather: &GatherResult) -> Result<PhaseReport<TryOnResult>> {
        self.advance(Phase::TryOn)?;
        let mut log = PhaseLog::new(Phase::TryOn, &self.events);
        log.push(
            EventKind::PhaseStart,
            format!(
                "rendering {} outfit(s) x {} variation(s)",
                gather.outfits.len(),
                gather.variations.len()
            ),
        );

        let outfit_items: Vec<Vec<Item>> = gather
            .outfits
            .iter()
            .map(|outfit| {
                outfit
                    .item_ids()
                    .iter()
                    .filter_map(|id| self.state.cache.resolve(id).cloned())
                    .collect()
            })
            .collect();

        let mut slots = Vec::new();
        let mut tasks = Vec::new();
        for (index, (outfit, items)) in gather.outfits.iter().zip(&outfit_items).enumerate() {
            let images: Vec<ImageRef> = items.iter().map(|item| item.image.clone()).collect();
            for &variation in &gather.variations {
                let Some(request) =
                    RenderRequest::new(self.request.base_image.clone(), images.clone(), variation)
                else {
                    log.push_with(
                        EventKind::ToolError,
                        format!("{}: cannot render {} item(s)", outfit.id(), images.len()),
                        EventDetail::tool(ToolId::SubmitRenderJob.as_str()),
                    );
                    continue;
                };
                log.push_with(
                    EventKind::ToolStart,
                    format!("render {} variation {}", outfit.id(), variation),
                    EventDetail::tool(ToolId::SubmitRenderJob.as_str()),
                );
                slots.push(RenderSlot {
                    outfit: index,
                    variation,
                });
                let poller = self.poller;
                let tools = self.tools.clone();
                tasks.push(async move { Ok::<_, Infallible>(poller.run(&tools, request).await) });
            }
        }

        let jobs_attempted = tasks.len();
        let outcomes = Dispatcher::shared(Arc::clone(&self.render_slots))
            .run(tasks)
            .await;

        let mut accepted = vec![0usize; gather.outfits.len()];
        let mut images: Vec<Vec<ImageRef>> = vec![Vec::new(); gather.outfits.len()];
        let mut jobs_completed = 0;
        for (slot, outcome) in slots.into_iter().zip(outcomes) {
            let outfit_id = gather.outfits[slot.outfit].id();
            let outcome = match outcome {
                TaskOutcome::Succeeded(outcome) => outcome,
                TaskOutcome::Failed(never) => match never {},
                TaskOutcome::Aborted(reason) => {
                    log.push(
                        EventKind::ToolError,
                        format!("{outfit_id} variation {}: task aborted: {reason}", slot.variation),
                    );
                    continue;
                }
            };

            if outcome.was_submitted() {
                accepted[slot.outfit] += 1;
            }
            let context = job_context(outfit_id, slot.variation, &outcome);
            match outcome.into_result() {
                Ok(job) => {
                    jobs_completed += 1;
                    log.push_with(
                        EventKind::ToolResult,
                        format!(
                            "{outfit_id} variation {}: {} image(s) after {} poll(s)",
                            slot.variation,
                            job.output_images().len(),
                            job.polls()
                        ),
                        EventDetail::tool(ToolId::PollRenderJob.as_str())
                            .with_duration_ms(job.latency_ms())
                            .with_context(context),
                    );
                    images[slot.outfit].extend(job.output_images().iter().cloned());
                }
                Err(error) => {
                    let tool = match &error {
                        RoundError::ToolUnavailable(_) => ToolId::SubmitRenderJob,
                        _ => ToolId::PollRenderJob,
                    };
                    log.push_with(
                        EventKind::ToolError,
                        format!("{outfit_id} variation {}: {error}", slot.variation),
                        EventDetail::tool(tool.as_str()).with_context(context),
                    );
                }
            }
        }
        let jobs_accepted: usize = accepted.iter().sum();

        let evaluated: Vec<usize> = (0..gather.outfits.len())
            .filter(|&i| accepted[i] > 0)
            .collect();
        let evaluations = self
            .evaluate(&mut log, &evaluated, &outfit_items, &images)
            .await;

        let mut candidates = Vec::with_capacity(evaluated.len());
        for (index, evaluation) in evaluated.into_iter().zip(evaluations) {
            candidates.push(Candidate::new(
                gather.outfits[index].id().clone(),
                outfit_items[index].clone(),
                std::mem::take(&mut images[index]),
                evaluation,
            ));
        }
        if candidates.is_empty() {
            log.push(EventKind::System, RoundError::NoCandidates.to_string());
        }
        self.state.candidates = candidates.clone();

        log.push_with(
            EventKind::PhaseResult,
            format!(
                "{} candidate(s); {jobs_completed}/{jobs_attempted} render job(s) completed",
                candidates.len()
            ),
            EventDetail::default().with_context(json!({
                "jobs_attempted": jobs_attempted,
                "jobs_accepted": jobs_accepted,
                "jobs_completed": jobs_completed,
            })),
        );

        let result = TryOnResult {
            candidates,
            jobs_attempted,
            jobs_accepted,
            jobs_completed,
        };
        Ok(self.report(log, result))
    }

    async fn evaluate(
        &self,
        log: &mut PhaseLog,
        outfits: &[usize],
        outfit_items: &[Vec<Item>],
        images: &[Vec<ImageRef>],
    ) -> Vec<Option<Evaluation>> {
        let tasks: Vec<_> = outfits
            .iter()
            .map(|&index| {
                let tools = self.tools.clone();
                let theme = self.request.theme.clone();
                let items = outfit_items[index].clone();
                let rendered = images[index].clone();
                async move {
                    tools
                        .evaluate_candidate(&theme, &items, &rendered)
                        .await
                }
            })
            .collect();

        Dispatcher::unbounded()
            .run(tasks)
            .await
            .into_iter()
            .map(|outcome| match outcome {
                TaskOutcome::Succeeded(evaluation) => {
                    log.push_with(
                        EventKind::ToolResult,
                        evaluation.summary(),
                        EventDetail::tool(ToolId::EvaluateCandidate.as_str()),
                    );
                    Some(evaluation)
                }
                TaskOutcome::Failed(error) => {
                    log_tool_error(log, &error);
                    None
                }
                TaskOutcome::Aborted(reason) => {
                    log.push(
                        EventKind::ToolError,
                        format!("evaluation aborted: {reason}"),
                    );
                    None
                }
            })
            .collect()
    }

    /// PICK: rank the candidates, or fall back to the base image.
    pub fn pick(&mut self, tryon: &TryOnResult) -> Result<PhaseReport<FinalSelection>> {
        self.advance(Phase::Pick)?;
        let mut log = PhaseLog::new(Phase::Pick, &self.events);
        log.push(
            EventKind::PhaseStart,
            format!(
                "ranking {} candidate(s) with {}s left",
                tryon.candidates.len(),
                self.state.budget.remaining().as_secs()
            ),
        );

        for candidate in &tryon.candidates {
            log.push(
                EventKind::Thought,
                format!(
                    "{} scores {} ({})",
                    candidate.outfit_id,
                    ranker::score(candidate),
                    candidate.summary
                ),
            );
        }

        let selection = match ranker::select_best(&tryon.candidates) {
            Some(best) => {
                let selection = FinalSelection::from_candidate(
                    &tryon.candidates[best.index],
                    best.score,
                    &self.request.base_image,
                );
                log.push(
                    EventKind::PhaseResult,
                    format!(
                        "picked {} with score {}",
                        tryon.candidates[best.index].outfit_id, best.score
                    ),
                );
                selection
            }
            None => {
                let error = RoundError::NoCandidates;
                log.push_with(
                    EventKind::PhaseResult,
                    format!("{error}; falling back to base image"),
                    EventDetail::default().with_context(json!({ "error": error.kind() })),
                );
                FinalSelection::fallback(&self.request.base_image)
            }
        };
        Ok(self.report(log, selection))
    }

    fn finish(&mut self, selection: &FinalSelection) -> Result<()> {
        self.advance(Phase::Done)?;
        let duration_ms = self.state.budget.elapsed().as_millis() as u64;
        obs::emit_round_finished(
            &self.run_id,
            duration_ms,
            self.state.candidates.len(),
            selection.is_fallback(),
        );
        self.events.publish(
            Phase::Done,
            EventKind::System,
            format!("round finished in {duration_ms}ms"),
        );
        Ok(())
    }

    fn advance(&mut self, next: Phase) -> Result<()> {
        let from = self.state.phase;
        if !from.can_advance_to(next) {
            return Err(RoundError::PhaseOutOfOrder { from, to: next });
        }
        self.state.phase = next;
        Ok(())
    }

    fn report<T>(&self, log: PhaseLog, result: T) -> PhaseReport<T> {
        obs::emit_phase_finished(
            &self.run_id,
            log.phase.as_str(),
            log.lines.len(),
            self.state.budget.remaining_ms(),
        );
        PhaseReport {
            phase: log.phase,
            log: log.lines,
            result,
        }
    }
}

fn stamp_provenance(items: Vec<Item>, source: &str) -> Vec<Item> {
    items
        .into_iter()
        .map(|item| match item.provenance {
            Some(_) => item,
            None => item.with_provenance(source),
        })
        .collect()
}

fn found_label(item: Option<&Item>) -> &'static str {
    if item.is_some() {
        "found"
    } else {
        "missing"
    }
}

fn job_context(outfit_id: &OutfitId, variation: u32, outcome: &JobOutcome) -> serde_json::Value {
    match outcome.job() {
        Some(job) => json!({
            "outfit_id": outfit_id.as_str(),
            "variation": variation,
            "job_id": job.id.as_str(),
            "status": job.status().as_str(),
            "polls": job.polls(),
        }),
        None => json!({
            "outfit_id": outfit_id.as_str(),
            "variation": variation,
        }),
    }
}

fn log_tool_error(log: &mut PhaseLog, error: &ToolError) {
    log.push_with(
        EventKind::ToolError,
        error.to_string(),
        EventDetail::tool(error.tool()),
    );
}
