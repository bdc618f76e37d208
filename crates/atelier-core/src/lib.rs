//! Atelier Core Library
//!
//! Phase-sequenced orchestration of a time-boxed outfit selection round:
//! plan searches from a theme, gather items, render try-ons under a global
//! concurrency ceiling, and pick the best candidate.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod fakes;
pub mod local;
pub mod obs;
pub mod palette;
pub mod poller;
pub mod ranker;
pub mod round;
pub mod telemetry;
pub mod tools;

pub use cache::EntityCache;
pub use config::{ConfigError, RoundConfig};
pub use dispatch::{Dispatcher, TaskOutcome};

pub use domain::{
    Candidate, Category, Evaluation, ImageRef, Item, ItemId, JobId, JobStatus, Outfit,
    OutfitError, OutfitId, OutfitShape, PaletteHint, Phase, PollReport, RenderJob, RenderRequest,
    Result, RoundError, ToolError,
};

pub use local::{LocalCloset, LocalEvaluator};
pub use palette::{infer_palette, plan_queries};
pub use poller::{JobOutcome, JobPoller, PollPolicy};
pub use ranker::{score, select_best, Ranked};
pub use telemetry::init_tracing;

pub use round::{
    EventKind, FinalSelection, GatherResult, PhaseEnvelope, PhasePayload, PhaseReport, PlanResult,
    RoundController, RoundEvent, RoundOutcome, RoundRequest, TryOnResult,
};

pub use tools::{
    Catalog, Evaluator, RenderService, SearchFilters, SearchQuery, ToolBox, ToolCall, ToolId,
    ToolOutput, Wardrobe,
};

/// Crate version, as recorded in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
