//! Color-count evaluator.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::{Evaluation, ImageRef, Item, PaletteHint, ToolError};
use crate::tools::Evaluator;

/// Classifies an outfit by how many distinct color tags its items carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEvaluator;

impl LocalEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(items: &[Item]) -> PaletteHint {
        let colors: BTreeSet<String> = items
            .iter()
            .flat_map(|item| item.colors.iter().map(|c| c.trim().to_lowercase()))
            .filter(|c| !c.is_empty())
            .collect();

        match colors.len() {
            n if n > 4 => PaletteHint::Busy,
            n if n > 2 => PaletteHint::Mixed,
            _ => PaletteHint::Cohesive,
        }
    }
}

#[async_trait]
impl Evaluator for LocalEvaluator {
    async fn evaluate(
        &self,
        theme: &str,
        items: &[Item],
        rendered: &[ImageRef],
    ) -> Result<Evaluation, ToolError> {
        let palette_hint = Self::classify(items);
        Ok(Evaluation {
            palette_hint,
            notes: format!(
                "{} try-on image(s); theme='{theme}'. Colors are {palette_hint}.",
                rendered.len()
            ),
        })
    }
}
