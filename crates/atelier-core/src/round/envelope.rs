//! Per-phase result envelopes.

use serde::Serialize;

use crate::domain::{Candidate, ImageRef, Item, Outfit, OutfitId, Phase};
use crate::tools::SearchQuery;

/// Reason attached to the PICK fallback selection.
pub const NO_RENDERS_AVAILABLE: &str = "no renders available";

/// PLAN output: palette intent and one search per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanResult {
    pub theme: String,
    pub palette: Vec<String>,
    pub queries: Vec<SearchQuery>,
}

/// GATHER output: the shortlist and the render variations to try.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatherResult {
    pub outfits: Vec<Outfit>,
    pub variations: Vec<u32>,
    /// Items known to the entity cache after merging.
    pub items_cached: usize,
    /// Budget left when the early-exit check ran.
    pub remaining_ms: u64,
    /// Set when the budget check failed; the round goes straight to PICK.
    pub skip_tryon: bool,
}

/// TRYON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TryOnResult {
    pub candidates: Vec<Candidate>,
    pub jobs_attempted: usize,
    pub jobs_accepted: usize,
    pub jobs_completed: usize,
}

impl TryOnResult {
    /// Result used for PICK when TRYON was skipped.
    pub fn skipped() -> Self {
        Self {
            candidates: Vec::new(),
            jobs_attempted: 0,
            jobs_accepted: 0,
            jobs_completed: 0,
        }
    }
}

/// PICK output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalSelection {
    /// `None` for the fallback selection.
    pub outfit_id: Option<OutfitId>,
    pub items: Vec<Item>,
    pub preview_image: ImageRef,
    pub reason: String,
    pub score: Option<u32>,
}

impl FinalSelection {
    pub fn from_candidate(candidate: &Candidate, score: u32, base_image: &ImageRef) -> Self {
        Self {
            outfit_id: Some(candidate.outfit_id.clone()),
            items: candidate.items.clone(),
            preview_image: candidate
                .images
                .first()
                .cloned()
                .unwrap_or_else(|| base_image.clone()),
            reason: candidate.summary.clone(),
            score: Some(score),
        }
    }

    /// Deterministic selection referencing only the base image.
    pub fn fallback(base_image: &ImageRef) -> Self {
        Self {
            outfit_id: None,
            items: Vec::new(),
            preview_image: base_image.clone(),
            reason: NO_RENDERS_AVAILABLE.to_string(),
            score: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.outfit_id.is_none()
    }
}

/// Typed phase output: the phase, its progress lines and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport<T> {
    pub phase: Phase,
    pub log: Vec<String>,
    pub result: T,
}

/// Result of any phase, for heterogeneous envelope lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PhasePayload {
    Plan(PlanResult),
    Gather(GatherResult),
    TryOn(TryOnResult),
    Pick(FinalSelection),
}

/// Serializable `{phase, log, result}` envelope.
pub type PhaseEnvelope = PhaseReport<PhasePayload>;

macro_rules! impl_into_envelope {
    ($result:ty, $variant:ident) => {
        impl From<PhaseReport<$result>> for PhaseEnvelope {
            fn from(report: PhaseReport<$result>) -> Self {
                PhaseReport {
                    phase: report.phase,
                    log: report.log,
                    result: PhasePayload::$variant(report.result),
                }
            }
        }
    };
}

impl_into_envelope!(PlanResult, Plan);
impl_into_envelope!(GatherResult, Gather);
impl_into_envelope!(TryOnResult, TryOn);
impl_into_envelope!(FinalSelection, Pick);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Evaluation, PaletteHint};

    #[test]
    fn fallback_uses_base_image_only() {
        let base = ImageRef::from("/static/model.png");
        let selection = FinalSelection::fallback(&base);
        assert!(selection.is_fallback());
        assert_eq!(selection.preview_image, base);
        assert!(selection.items.is_empty());
        assert_eq!(selection.reason, "no renders available");
    }

    #[test]
    fn candidate_without_images_previews_base_image() {
        let base = ImageRef::from("/static/model.png");
        let candidate = Candidate::new(
            OutfitId::new("outfit-2"),
            vec![Item::new("d1", "Linen Dress", Category::Dress, "/d1.png")],
            vec![],
            Some(Evaluation {
                palette_hint: PaletteHint::Cohesive,
                notes: "0 try-on image(s)".to_string(),
            }),
        );

        let selection = FinalSelection::from_candidate(&candidate, 2, &base);
        assert_eq!(selection.outfit_id, Some(OutfitId::new("outfit-2")));
        assert_eq!(selection.preview_image, base);
        assert_eq!(selection.reason, "cohesive; 0 try-on image(s)");
        assert_eq!(selection.score, Some(2));
    }

    #[test]
    fn envelope_serializes_phase_log_and_result() {
        let report = PhaseReport {
            phase: Phase::Pick,
            log: vec!["picked".to_string()],
            result: FinalSelection::fallback(&ImageRef::from("/base.png")),
        };
        let envelope: PhaseEnvelope = report.into();
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["phase"], "PICK");
        assert_eq!(json["log"][0], "picked");
        assert_eq!(json["result"]["preview_image"], "/base.png");
    }
}
