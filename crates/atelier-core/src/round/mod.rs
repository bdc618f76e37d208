//! One time-boxed round: budget, progress events, phase envelopes and the
//! phase controller that ties them together.

pub mod budget;
pub mod controller;
pub mod envelope;
pub mod events;

pub use budget::RoundBudget;
pub use controller::{RoundController, RoundOutcome, RoundRequest};
pub use envelope::{
    FinalSelection, GatherResult, PhaseEnvelope, PhasePayload, PhaseReport, PlanResult,
    TryOnResult, NO_RENDERS_AVAILABLE,
};
pub use events::{EventDetail, EventEmitter, EventKind, RoundEvent};
