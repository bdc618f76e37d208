//! Candidate ranking.
//!
//! Pure and deterministic: the same candidate list always yields the same
//! pick, and equal scores go to the candidate that came first.

use serde::Serialize;

use crate::domain::{Candidate, PaletteHint};

/// Score of one candidate together with its position in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ranked {
    pub index: usize,
    pub score: u32,
}

/// Palette bonus plus one point per rendered image.
pub fn score(candidate: &Candidate) -> u32 {
    let palette = match candidate.palette_hint() {
        Some(PaletteHint::Cohesive) => 2,
        Some(PaletteHint::Mixed) => 1,
        Some(PaletteHint::Busy) | None => 0,
    };
    palette + candidate.images.len() as u32
}

/// Highest-scoring candidate; `None` for an empty list.
pub fn select_best(candidates: &[Candidate]) -> Option<Ranked> {
    candidates
        .iter()
        .enumerate()
        .fold(None, |best: Option<Ranked>, (index, candidate)| {
            let score = score(candidate);
            match best {
                Some(current) if current.score >= score => Some(current),
                _ => Some(Ranked { index, score }),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Evaluation, ImageRef, OutfitId};

    fn candidate(id: &str, hint: Option<PaletteHint>, images: usize) -> Candidate {
        Candidate::new(
            OutfitId::new(id),
            vec![],
            (0..images)
                .map(|i| ImageRef::new(format!("/out/{id}-{i}.png")))
                .collect(),
            hint.map(|palette_hint| Evaluation {
                palette_hint,
                notes: String::new(),
            }),
        )
    }

    #[test]
    fn score_adds_palette_bonus_and_image_count() {
        assert_eq!(score(&candidate("a", Some(PaletteHint::Cohesive), 2)), 4);
        assert_eq!(score(&candidate("b", Some(PaletteHint::Mixed), 2)), 3);
        assert_eq!(score(&candidate("c", Some(PaletteHint::Busy), 2)), 2);
        assert_eq!(score(&candidate("d", None, 0)), 0);
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn highest_score_wins() {
        let candidates = vec![
            candidate("a", Some(PaletteHint::Busy), 1),
            candidate("b", Some(PaletteHint::Cohesive), 1),
            candidate("c", Some(PaletteHint::Mixed), 1),
        ];
        assert_eq!(select_best(&candidates), Some(Ranked { index: 1, score: 3 }));
    }

    #[test]
    fn ties_go_to_first_candidate_on_every_call() {
        let candidates = vec![
            candidate("a", Some(PaletteHint::Mixed), 2),
            candidate("b", Some(PaletteHint::Cohesive), 1),
            candidate("c", Some(PaletteHint::Busy), 3),
        ];
        for _ in 0..5 {
            assert_eq!(select_best(&candidates), Some(Ranked { index: 0, score: 3 }));
        }
    }
}
