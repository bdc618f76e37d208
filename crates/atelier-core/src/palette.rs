//! Theme → palette classifier and search planner.
//!
//! A keyword heuristic. Pure, no external calls.

use crate::domain::Category;
use crate::tools::{SearchFilters, SearchQuery};

const WARM_KEYWORDS: [&str; 3] = ["summer", "beach", "rooftop"];
const FORMAL_KEYWORDS: [&str; 3] = ["winter", "formal", "evening"];

const WARM_PALETTE: [&str; 3] = ["navy", "white", "tan"];
const FORMAL_PALETTE: [&str; 3] = ["black", "charcoal", "white"];

/// Ordered palette intent for a theme. Always three colors.
pub fn infer_palette(theme: &str) -> Vec<String> {
    let lowered = theme.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    let palette = if contains_any(&WARM_KEYWORDS) {
        WARM_PALETTE
    } else if contains_any(&FORMAL_KEYWORDS) {
        FORMAL_PALETTE
    } else {
        WARM_PALETTE
    };
    palette.iter().map(|c| (*c).to_string()).collect()
}

/// One search descriptor per category, in [`Category::ALL`] order.
pub fn plan_queries(palette: &[String], limit: usize) -> Vec<SearchQuery> {
    let color = |i: usize| palette.get(i).map(String::as_str).unwrap_or_default();

    Category::ALL
        .into_iter()
        .map(|category| {
            let query = match category {
                Category::Top => format!("best {} summer top", color(0)),
                Category::Bottom => format!("{} casual pants", color(2)),
                Category::Dress => format!("{} dress", color(1)),
            };
            SearchQuery {
                category,
                query: query.trim().to_string(),
                filters: SearchFilters {
                    color_palette: palette.to_vec(),
                    limit,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summer_themes_get_warm_palette() {
        assert_eq!(infer_palette("Summer Rooftop Party"), vec!["navy", "white", "tan"]);
        assert_eq!(infer_palette("BEACH day"), vec!["navy", "white", "tan"]);
    }

    #[test]
    fn formal_themes_get_dark_palette() {
        assert_eq!(infer_palette("Winter Gala"), vec!["black", "charcoal", "white"]);
        assert_eq!(infer_palette("formal evening"), vec!["black", "charcoal", "white"]);
    }

    #[test]
    fn warm_keywords_take_precedence() {
        assert_eq!(infer_palette("Summer Evening"), vec!["navy", "white", "tan"]);
    }

    #[test]
    fn unknown_theme_defaults_to_warm_palette() {
        assert_eq!(infer_palette("Cyberpunk"), vec!["navy", "white", "tan"]);
    }

    #[test]
    fn queries_cover_each_category_once() {
        let palette = infer_palette("Summer Rooftop Party");
        let queries = plan_queries(&palette, 10);

        let categories: Vec<Category> = queries.iter().map(|q| q.category).collect();
        assert_eq!(categories, Category::ALL.to_vec());
        assert_eq!(queries[0].query, "best navy summer top");
        assert_eq!(queries[1].query, "tan casual pants");
        assert_eq!(queries[2].query, "white dress");
        assert!(queries.iter().all(|q| q.filters.limit == 10));
        assert!(queries.iter().all(|q| q.filters.color_palette == palette));
    }
}
