//! Offline tool implementations: a filesystem closet and a color-count
//! evaluator.

pub mod closet;
pub mod evaluator;

pub use closet::{LocalCloset, CLOSET_SOURCE};
pub use evaluator::LocalEvaluator;
