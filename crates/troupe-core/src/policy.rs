//! Tunable selection and pacing policy.
//!
//! Every threshold the planner consults lives here as data: integer score
//! points for selection, milliseconds for pacing. Deployments override the
//! defaults with a JSON file; absent fields keep their documented default.

use contracts::{Archetype, ChatMode};
use serde::{Deserialize, Serialize};

use crate::analysis::ContentGrade;

/// Index order of event-kind weight tables:
/// message, reaction, status_update, nickname_update, typing_ghost.
pub const KIND_TABLE_LEN: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionPolicy {
    // --- selection bases ---
    /// Entourage keeps the circle tight.
    #[serde(default = "default_entourage_base")]
    pub entourage_base: i64,
    /// Ecosystem invites the wider roster in.
    #[serde(default = "default_ecosystem_base")]
    pub ecosystem_base: i64,

    // --- trigger content factors ---
    #[serde(default = "default_grade_low")]
    pub grade_low: i64,
    #[serde(default = "default_grade_short")]
    pub grade_short: i64,
    #[serde(default = "default_grade_medium")]
    pub grade_medium: i64,
    #[serde(default = "default_grade_substantive")]
    pub grade_substantive: i64,
    #[serde(default = "default_question_bonus")]
    pub question_bonus: i64,

    // --- mentions ---
    #[serde(default = "default_mention_bonus")]
    pub mention_bonus: i64,
    /// Applied when the trigger names somebody else.
    #[serde(default = "default_other_mention_penalty")]
    pub other_mention_penalty: i64,

    // --- conversation pressure ---
    #[serde(default = "default_silence_boost_per_turn")]
    pub silence_boost_per_turn: i64,
    #[serde(default = "default_silence_boost_cap")]
    pub silence_boost_cap: i64,
    #[serde(default = "default_burst_damping_per_message")]
    pub burst_damping_per_message: i64,
    #[serde(default = "default_burst_damping_cap")]
    pub burst_damping_cap: i64,

    // --- jitter and thresholds ---
    /// Seeded jitter is drawn from [-spread, spread].
    #[serde(default = "default_jitter_spread")]
    pub jitter_spread: i64,
    /// Members scoring at or above this respond.
    #[serde(default = "default_respond_threshold")]
    pub respond_threshold: i64,
    #[serde(default = "default_max_responders_entourage")]
    pub max_responders_entourage: usize,
    #[serde(default = "default_max_responders_ecosystem")]
    pub max_responders_ecosystem: usize,

    // --- event-kind weights for non-leading responders ---
    #[serde(default = "default_kind_weights")]
    pub kind_weights: [u32; KIND_TABLE_LEN],

    // --- pacing (milliseconds) ---
    #[serde(default = "default_read_delay_min_ms")]
    pub read_delay_min_ms: i64,
    #[serde(default = "default_read_delay_max_ms")]
    pub read_delay_max_ms: i64,
    /// Extra offset per responder rank so replies land staggered.
    #[serde(default = "default_rank_stagger_ms")]
    pub rank_stagger_ms: u64,
    #[serde(default = "default_typing_ms_per_char")]
    pub typing_ms_per_char: u64,
    #[serde(default = "default_typing_min_ms")]
    pub typing_min_ms: u64,
    #[serde(default = "default_typing_max_ms")]
    pub typing_max_ms: u64,
    #[serde(default = "default_ghost_duration_min_ms")]
    pub ghost_duration_min_ms: i64,
    #[serde(default = "default_ghost_duration_max_ms")]
    pub ghost_duration_max_ms: i64,
    /// Hard bound on the whole plan; schedules past this are rescaled.
    #[serde(default = "default_max_plan_ms")]
    pub max_plan_ms: u64,
    /// Reserved headroom under the bound for post-scale ordering fixups.
    #[serde(default = "default_plan_margin_ms")]
    pub plan_margin_ms: u64,

    // --- cost controls ---
    /// Caps responders at one and biases acknowledgments toward kinds
    /// that need no model call.
    #[serde(default)]
    pub low_cost_mode: bool,
}

impl SelectionPolicy {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn mode_base(&self, mode: ChatMode) -> i64 {
        match mode {
            ChatMode::Entourage => self.entourage_base,
            ChatMode::Ecosystem => self.ecosystem_base,
        }
    }

    pub fn grade_factor(&self, grade: ContentGrade) -> i64 {
        match grade {
            ContentGrade::Low => self.grade_low,
            ContentGrade::Short => self.grade_short,
            ContentGrade::Medium => self.grade_medium,
            ContentGrade::Substantive => self.grade_substantive,
        }
    }

    /// Chattiness bias per archetype. Lurkers hold back, hype men do not.
    pub fn archetype_bias(&self, archetype: Archetype) -> i64 {
        match archetype {
            Archetype::Hypeman => 8,
            Archetype::Gremlin => 4,
            Archetype::Softie => 2,
            Archetype::Realist => 0,
            Archetype::Lurker => -10,
        }
    }

    pub fn silence_boost(&self, silent_turns: u32) -> i64 {
        (i64::from(silent_turns) * self.silence_boost_per_turn).min(self.silence_boost_cap)
    }

    pub fn burst_damping(&self, burst_count: u32) -> i64 {
        (i64::from(burst_count) * self.burst_damping_per_message).min(self.burst_damping_cap)
    }

    pub fn max_responders(&self, mode: ChatMode) -> usize {
        if self.low_cost_mode {
            return 1;
        }
        match mode {
            ChatMode::Entourage => self.max_responders_entourage,
            ChatMode::Ecosystem => self.max_responders_ecosystem,
        }
    }

    /// Event-kind weights for a non-leading responder, adjusted for the
    /// archetype. In low-cost mode the message column zeroes out so
    /// acknowledgments stay free of model calls.
    pub fn kind_weights_for(&self, archetype: Archetype) -> [u32; KIND_TABLE_LEN] {
        let [message, reaction, status, nickname, ghost] = self.kind_weights;
        let mut table = match archetype {
            Archetype::Hypeman => [message + 20, reaction + 10, status, nickname, ghost],
            Archetype::Realist => [message, reaction, status, nickname, ghost],
            Archetype::Gremlin => [message, reaction + 15, status, nickname + 6, ghost],
            Archetype::Softie => [message, reaction + 10, status + 10, nickname, ghost],
            Archetype::Lurker => [
                message / 3,
                reaction,
                status + 15,
                nickname,
                ghost + 12,
            ],
        };
        if self.low_cost_mode {
            table[0] = 0;
        }
        table
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            entourage_base: default_entourage_base(),
            ecosystem_base: default_ecosystem_base(),
            grade_low: default_grade_low(),
            grade_short: default_grade_short(),
            grade_medium: default_grade_medium(),
            grade_substantive: default_grade_substantive(),
            question_bonus: default_question_bonus(),
            mention_bonus: default_mention_bonus(),
            other_mention_penalty: default_other_mention_penalty(),
            silence_boost_per_turn: default_silence_boost_per_turn(),
            silence_boost_cap: default_silence_boost_cap(),
            burst_damping_per_message: default_burst_damping_per_message(),
            burst_damping_cap: default_burst_damping_cap(),
            jitter_spread: default_jitter_spread(),
            respond_threshold: default_respond_threshold(),
            max_responders_entourage: default_max_responders_entourage(),
            max_responders_ecosystem: default_max_responders_ecosystem(),
            kind_weights: default_kind_weights(),
            read_delay_min_ms: default_read_delay_min_ms(),
            read_delay_max_ms: default_read_delay_max_ms(),
            rank_stagger_ms: default_rank_stagger_ms(),
            typing_ms_per_char: default_typing_ms_per_char(),
            typing_min_ms: default_typing_min_ms(),
            typing_max_ms: default_typing_max_ms(),
            ghost_duration_min_ms: default_ghost_duration_min_ms(),
            ghost_duration_max_ms: default_ghost_duration_max_ms(),
            max_plan_ms: default_max_plan_ms(),
            plan_margin_ms: default_plan_margin_ms(),
            low_cost_mode: false,
        }
    }
}

fn default_entourage_base() -> i64 { 10 }
fn default_ecosystem_base() -> i64 { 22 }
fn default_grade_low() -> i64 { -18 }
fn default_grade_short() -> i64 { 0 }
fn default_grade_medium() -> i64 { 10 }
fn default_grade_substantive() -> i64 { 20 }
fn default_question_bonus() -> i64 { 12 }
fn default_mention_bonus() -> i64 { 30 }
fn default_other_mention_penalty() -> i64 { 10 }
fn default_silence_boost_per_turn() -> i64 { 6 }
fn default_silence_boost_cap() -> i64 { 24 }
fn default_burst_damping_per_message() -> i64 { 7 }
fn default_burst_damping_cap() -> i64 { 28 }
fn default_jitter_spread() -> i64 { 6 }
fn default_respond_threshold() -> i64 { 20 }
fn default_max_responders_entourage() -> usize { 2 }
fn default_max_responders_ecosystem() -> usize { 4 }
fn default_kind_weights() -> [u32; KIND_TABLE_LEN] { [50, 25, 15, 2, 8] }
fn default_read_delay_min_ms() -> i64 { 400 }
fn default_read_delay_max_ms() -> i64 { 1_400 }
fn default_rank_stagger_ms() -> u64 { 650 }
fn default_typing_ms_per_char() -> u64 { 35 }
fn default_typing_min_ms() -> u64 { 800 }
fn default_typing_max_ms() -> u64 { 4_200 }
fn default_ghost_duration_min_ms() -> i64 { 900 }
fn default_ghost_duration_max_ms() -> i64 { 2_400 }
fn default_max_plan_ms() -> u64 { 12_000 }
fn default_plan_margin_ms() -> u64 { 250 }
