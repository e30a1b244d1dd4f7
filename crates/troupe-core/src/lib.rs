//! Deterministic turn orchestration for an ambient group chat.
//!
//! Everything here is pure and synchronous. The seed and the clock are
//! explicit arguments, nothing is stored across turns, and the same
//! request with the same seed always yields the same envelope.
//! Transport, persistence, and wall-clock time belong to the layers
//! above this crate.

pub mod analysis;
pub mod assembler;
pub mod guard;
pub mod pacing;
pub mod planner;
pub mod policy;
pub mod rng;
pub mod roster;
pub mod validate;
pub mod voice;

pub use analysis::{ContentGrade, TriggerAnalysis};
pub use assembler::assemble_turn;
pub use planner::{plan_turn, PlanTrace, PlannedAction, PlannedKind, PlannerOutcome, TurnPlan};
pub use policy::SelectionPolicy;
pub use roster::{default_roster, Roster, RosterError};
pub use validate::{validate_request, ValidationError};
pub use voice::{CharacterVoice, ScriptedVoice, VoiceContext};

use contracts::{TurnEnvelope, TurnRequest};

/// Run one full turn: lenient gang resolution, planning, voicing,
/// pacing, assembly. Gang ids missing from the roster are skipped;
/// strict validation is the caller's boundary concern.
pub fn orchestrate_turn(
    request: &TurnRequest,
    roster: &Roster,
    policy: &SelectionPolicy,
    voice: &dyn CharacterVoice,
    seed: u64,
) -> TurnEnvelope {
    orchestrate_with_trace(request, roster, policy, voice, seed).0
}

/// Like [`orchestrate_turn`], additionally returning the planner trace.
pub fn orchestrate_with_trace(
    request: &TurnRequest,
    roster: &Roster,
    policy: &SelectionPolicy,
    voice: &dyn CharacterVoice,
    seed: u64,
) -> (TurnEnvelope, PlanTrace) {
    let gang = roster.filter_known(&request.active_gang_ids);
    let outcome = plan_turn(request, &gang, policy, seed);
    let envelope = assemble_turn(request, &gang, &outcome.plan, voice, policy, seed);
    (envelope, outcome.trace)
}
