//! Error taxonomy for rounds and tool calls.

use super::item::Category;
use super::phase::Phase;
use super::render::JobId;

/// Failure of a single external tool call.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{tool}' unavailable: {reason}")]
    Unavailable { tool: String, reason: String },

    #[error("tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("invalid input for tool '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },
}

impl ToolError {
    pub fn unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            Self::Unavailable { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::InvalidInput { tool, .. } => tool,
        }
    }
}

/// Outfit construction errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum OutfitError {
    #[error("outfit {outfit_id} has no items")]
    Empty { outfit_id: String },

    #[error("outfit {outfit_id} has invalid category combination {categories:?}")]
    InvalidCategories {
        outfit_id: String,
        categories: Vec<Category>,
    },
}

/// Round-level error taxonomy.
///
/// Only `PhaseOutOfOrder` is ever returned to a caller; the other kinds are
/// recovered inside the phase that produced them and surface as log lines.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RoundError {
    #[error("tool unavailable: {0}")]
    ToolUnavailable(#[from] ToolError),

    #[error("render job {job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },

    #[error("render job {job_id} timed out after {attempts} poll attempts")]
    JobTimeout { job_id: JobId, attempts: u32 },

    #[error("no candidates: no renders available")]
    NoCandidates,

    #[error("phase {to} cannot follow {from}")]
    PhaseOutOfOrder { from: Phase, to: Phase },
}

impl RoundError {
    /// Stable snake_case label for logs and event context.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolUnavailable(_) => "tool_unavailable",
            Self::JobFailed { .. } => "job_failed",
            Self::JobTimeout { .. } => "job_timeout",
            Self::NoCandidates => "no_candidates",
            Self::PhaseOutOfOrder { .. } => "phase_out_of_order",
        }
    }
}

/// Result type for round operations.
pub type Result<T> = std::result::Result<T, RoundError>;
