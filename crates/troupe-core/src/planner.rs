//! Turn planning: who responds this turn, in what order, doing what.
//!
//! Selection is an integer scoring pass over the active gang. Each member
//! gets a factor breakdown (mode base, trigger content grade, question and
//! mention bonuses, archetype chattiness, silence boost, burst damping,
//! seeded jitter); members at or above the respond threshold act, capped
//! by the mode's breadth. The pipeline per turn is fixed:
//! score, rank, select, assign event kinds.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use contracts::{Archetype, Character, ChatMode, TurnRequest};
use serde::Serialize;

use crate::analysis::{self, ContentGrade, TriggerAnalysis};
use crate::policy::SelectionPolicy;
use crate::rng::{character_seed, deterministic_priority, sample_range, sample_weighted};

/// Canonical response kinds a responder can be assigned. Exactly one per
/// responder per turn; the typing indicator before a message is pacing
/// metadata, not a second action.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlannedKind {
    Message,
    Reaction,
    StatusUpdate,
    NicknameUpdate,
    TypingGhost,
}

/// One responder's slot, in presentation order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlannedAction {
    pub character_id: String,
    pub kind: PlannedKind,
}

/// Integer score with its named factor breakdown.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub character_id: String,
    pub score: i64,
    pub factors: BTreeMap<String, i64>,
}

/// Planner diagnostics surfaced by tests and the CLI `plan` command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanTrace {
    pub seed: u64,
    pub mode: ChatMode,
    pub grade: ContentGrade,
    pub scores: Vec<ScoreBreakdown>,
    /// True when nobody cleared the threshold and the top scorer was
    /// drafted for a minimal acknowledgment instead.
    pub fallback_acknowledgment: bool,
}

/// Ordered response plan for one turn, pre-voice and pre-delay.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TurnPlan {
    pub actions: Vec<PlannedAction>,
    /// Character ids acting this turn, in presentation order.
    pub responders: Vec<String>,
    /// Addressable id reactions point at, when the window has a trigger.
    pub reaction_target: Option<String>,
}

impl TurnPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlannerOutcome {
    pub plan: TurnPlan,
    pub trace: PlanTrace,
}

/// Plan one turn. Pure and total over well-typed input: an empty gang
/// yields an empty plan, never an error.
pub fn plan_turn(
    request: &TurnRequest,
    gang: &[&Character],
    policy: &SelectionPolicy,
    seed: u64,
) -> PlannerOutcome {
    let analysis = analysis::analyze(&request.messages, gang);

    let scores: Vec<ScoreBreakdown> = gang
        .iter()
        .map(|character| score_member(character, request, &analysis, policy, seed))
        .collect();

    let mut ranked: Vec<usize> = (0..gang.len()).collect();
    ranked.sort_by_key(|&index| {
        (
            Reverse(scores[index].score),
            deterministic_priority(seed, &gang[index].id),
        )
    });

    let mut selected: Vec<usize> = ranked
        .iter()
        .copied()
        .filter(|&index| scores[index].score >= policy.respond_threshold)
        .collect();
    selected.truncate(policy.max_responders(request.chat_mode));

    let mut fallback = false;
    if selected.is_empty() {
        if let Some(&top) = ranked.first() {
            selected.push(top);
            fallback = true;
        }
    }

    let reaction_target = analysis.trigger_target.clone();

    let mut actions = Vec::with_capacity(selected.len());
    for (rank, &index) in selected.iter().enumerate() {
        let character = gang[index];
        let cseed = character_seed(seed, &character.id);
        let kind = if fallback {
            minimal_acknowledgment(cseed)
        } else if rank == 0 && !policy.low_cost_mode {
            // The strongest responder actually speaks. Low cost mode
            // skips this rule since its kind table bans full messages.
            PlannedKind::Message
        } else {
            draw_kind(cseed, character.archetype, policy, reaction_target.is_some())
        };
        actions.push(PlannedAction {
            character_id: character.id.clone(),
            kind,
        });
    }

    let responders = actions
        .iter()
        .map(|action| action.character_id.clone())
        .collect();

    PlannerOutcome {
        plan: TurnPlan {
            actions,
            responders,
            reaction_target,
        },
        trace: PlanTrace {
            seed,
            mode: request.chat_mode,
            grade: analysis.grade,
            scores,
            fallback_acknowledgment: fallback,
        },
    }
}

fn score_member(
    character: &Character,
    request: &TurnRequest,
    analysis: &TriggerAnalysis,
    policy: &SelectionPolicy,
    seed: u64,
) -> ScoreBreakdown {
    let cseed = character_seed(seed, &character.id);

    let mode_base = policy.mode_base(request.chat_mode);
    let content_grade = policy.grade_factor(analysis.grade);
    let question_bonus = if analysis.is_question {
        policy.question_bonus
    } else {
        0
    };
    let mention = if analysis.mentioned.iter().any(|id| id == &character.id) {
        policy.mention_bonus
    } else if !analysis.mentioned.is_empty() {
        -policy.other_mention_penalty
    } else {
        0
    };
    let chattiness = policy.archetype_bias(character.archetype);
    let silence_boost = policy.silence_boost(request.silent_turns);
    let burst_damping = -policy.burst_damping(request.burst_count);
    let jitter = sample_range(cseed, 40, -policy.jitter_spread, policy.jitter_spread);

    let score = mode_base
        + content_grade
        + question_bonus
        + mention
        + chattiness
        + silence_boost
        + burst_damping
        + jitter;

    let mut factors = BTreeMap::new();
    factors.insert("mode_base".to_string(), mode_base);
    factors.insert("content_grade".to_string(), content_grade);
    factors.insert("question_bonus".to_string(), question_bonus);
    factors.insert("mention".to_string(), mention);
    factors.insert("chattiness".to_string(), chattiness);
    factors.insert("silence_boost".to_string(), silence_boost);
    factors.insert("burst_damping".to_string(), burst_damping);
    factors.insert("jitter".to_string(), jitter);

    ScoreBreakdown {
        character_id: character.id.clone(),
        score,
        factors,
    }
}

fn draw_kind(
    cseed: u64,
    archetype: Archetype,
    policy: &SelectionPolicy,
    has_reaction_target: bool,
) -> PlannedKind {
    let weights = policy.kind_weights_for(archetype);
    let kind = match sample_weighted(cseed, 41, &weights) {
        0 => PlannedKind::Message,
        1 => PlannedKind::Reaction,
        2 => PlannedKind::StatusUpdate,
        3 => PlannedKind::NicknameUpdate,
        _ => PlannedKind::TypingGhost,
    };

    // Zero-total weight tables collapse to index zero, which low cost
    // mode is not allowed to produce.
    if kind == PlannedKind::Message && policy.low_cost_mode {
        return PlannedKind::StatusUpdate;
    }
    // Nothing to react to: the draw degrades to a presence signal.
    if kind == PlannedKind::Reaction && !has_reaction_target {
        return PlannedKind::StatusUpdate;
    }
    kind
}

fn minimal_acknowledgment(cseed: u64) -> PlannedKind {
    if sample_range(cseed, 42, 0, 1) == 0 {
        PlannedKind::TypingGhost
    } else {
        PlannedKind::StatusUpdate
    }
}
