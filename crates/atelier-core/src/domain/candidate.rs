//! Candidates: outfits with their renders and evaluation, ready for ranking.

use serde::{Deserialize, Serialize};

use super::item::{ImageRef, Item};
use super::outfit::OutfitId;

/// Coarse color-harmony classification returned by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteHint {
    Cohesive,
    Mixed,
    Busy,
}

impl PaletteHint {
    pub fn as_str(self) -> &'static str {
        match self {
            PaletteHint::Cohesive => "cohesive",
            PaletteHint::Mixed => "mixed",
            PaletteHint::Busy => "busy",
        }
    }
}

impl std::fmt::Display for PaletteHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluator response for one outfit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub palette_hint: PaletteHint,
    pub notes: String,
}

impl Evaluation {
    pub fn summary(&self) -> String {
        format!("{}; {}", self.palette_hint, self.notes)
    }
}

/// Summary used when the evaluator could not be reached for an outfit.
pub const EVALUATION_UNAVAILABLE: &str = "evaluation unavailable";

/// An outfit together with everything TRYON learned about it.
///
/// The resolved items travel with the candidate so PICK never has to map an
/// outfit identifier back to items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub outfit_id: OutfitId,
    pub items: Vec<Item>,
    /// Rendered images of every successful job, in job submission order.
    pub images: Vec<ImageRef>,
    pub evaluation: Option<Evaluation>,
    pub summary: String,
}

impl Candidate {
    pub fn new(
        outfit_id: OutfitId,
        items: Vec<Item>,
        images: Vec<ImageRef>,
        evaluation: Option<Evaluation>,
    ) -> Self {
        let summary = evaluation
            .as_ref()
            .map(Evaluation::summary)
            .unwrap_or_else(|| EVALUATION_UNAVAILABLE.to_string());
        Self {
            outfit_id,
            items,
            images,
            evaluation,
            summary,
        }
    }

    pub fn palette_hint(&self) -> Option<PaletteHint> {
        self.evaluation.as_ref().map(|e| e.palette_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_combines_hint_and_notes() {
        let candidate = Candidate::new(
            OutfitId::new("outfit-1"),
            vec![],
            vec![],
            Some(Evaluation {
                palette_hint: PaletteHint::Mixed,
                notes: "two colors clash".to_string(),
            }),
        );
        assert_eq!(candidate.summary, "mixed; two colors clash");
        assert_eq!(candidate.palette_hint(), Some(PaletteHint::Mixed));
    }

    #[test]
    fn missing_evaluation_has_placeholder_summary() {
        let candidate = Candidate::new(OutfitId::new("outfit-1"), vec![], vec![], None);
        assert_eq!(candidate.summary, EVALUATION_UNAVAILABLE);
        assert_eq!(candidate.palette_hint(), None);
    }
}
