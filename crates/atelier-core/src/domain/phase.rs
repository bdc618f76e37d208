//! Round phases.

use serde::{Deserialize, Serialize};

/// Phases of a round, in execution order.
///
/// `Init` only labels start-up event lines; the controller state machine
/// begins at `Plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Init,
    Plan,
    Gather,
    #[serde(rename = "TRYON")]
    TryOn,
    Pick,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::Plan => "PLAN",
            Phase::Gather => "GATHER",
            Phase::TryOn => "TRYON",
            Phase::Pick => "PICK",
            Phase::Done => "DONE",
        }
    }

    /// Whether the state machine may move from `self` to `next`.
    ///
    /// Transitions are strictly forward. GATHER may jump to PICK when the
    /// budget runs short, and any phase may short-circuit to DONE.
    pub fn can_advance_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Init, Phase::Plan)
            | (Phase::Plan, Phase::Gather)
            | (Phase::Gather, Phase::TryOn)
            | (Phase::Gather, Phase::Pick)
            | (Phase::TryOn, Phase::Pick) => true,
            (from, Phase::Done) => from != Phase::Done,
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_are_allowed() {
        assert!(Phase::Plan.can_advance_to(Phase::Gather));
        assert!(Phase::Gather.can_advance_to(Phase::Pick));
        assert!(Phase::Pick.can_advance_to(Phase::Done));
        assert!(!Phase::TryOn.can_advance_to(Phase::Gather));
        assert!(!Phase::Plan.can_advance_to(Phase::TryOn));
        assert!(!Phase::Done.can_advance_to(Phase::Done));
    }

    #[test]
    fn tryon_serializes_as_single_word() {
        assert_eq!(serde_json::to_string(&Phase::TryOn).unwrap(), "\"TRYON\"");
        assert_eq!(Phase::TryOn.to_string(), "TRYON");
    }
}
