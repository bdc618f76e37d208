//! Domain models for Atelier.
//!
//! - `Item`: a garment with category, image and optional metadata
//! - `Outfit`: a validated combination of items
//! - `RenderJob`: an asynchronous try-on render
//! - `Candidate`: an outfit with its renders and evaluation
//! - `Phase`: the round state machine labels

pub mod candidate;
pub mod error;
pub mod item;
pub mod outfit;
pub mod phase;
pub mod render;

pub use candidate::{Candidate, Evaluation, PaletteHint, EVALUATION_UNAVAILABLE};
pub use error::{OutfitError, Result, RoundError, ToolError};
pub use item::{Category, ImageRef, Item, ItemId};
pub use outfit::{Outfit, OutfitId, OutfitShape};
pub use phase::Phase;
pub use render::{JobId, JobStatus, PollReport, RenderJob, RenderRequest};
