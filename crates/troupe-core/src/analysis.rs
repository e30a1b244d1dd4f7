//! Trigger analysis: what the latest user message looks like, and who it
//! talks to. Feeds the selection scoring in the planner.

use contracts::{Character, ChatMessage};
use serde::Serialize;

/// Content weight of the triggering user message, graded from bare
/// acknowledgements up to substantive prose.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ContentGrade {
    Low,
    Short,
    Medium,
    Substantive,
}

/// Everything the planner wants to know about the trigger.
#[derive(Debug, Clone)]
pub struct TriggerAnalysis {
    pub grade: ContentGrade,
    pub is_question: bool,
    /// Roster ids the trigger mentions by name or id.
    pub mentioned: Vec<String>,
    /// Addressable id of the triggering user message, for reactions.
    pub trigger_target: Option<String>,
}

const LOW_CONTENT_WORDS: &[&str] = &[
    "yo", "ok", "okay", "k", "kk", "lol", "lmao", "hey", "hi", "sup", "yes", "no", "ya", "yeah",
    "nah", "hm", "hmm", "heh", "bet", "word",
];

const SHORT_MAX_CHARS: usize = 20;
const MEDIUM_MAX_CHARS: usize = 80;

/// Grade a trigger's content by lexicon and trimmed length.
pub fn grade_content(content: &str) -> ContentGrade {
    let trimmed = content.trim();
    let folded = trimmed.to_lowercase();
    let stripped: String = folded
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    if trimmed.is_empty()
        || stripped.trim().len() <= 3
        || LOW_CONTENT_WORDS.contains(&stripped.trim())
    {
        return ContentGrade::Low;
    }
    if trimmed.chars().count() <= SHORT_MAX_CHARS {
        return ContentGrade::Short;
    }
    if trimmed.chars().count() <= MEDIUM_MAX_CHARS {
        return ContentGrade::Medium;
    }
    ContentGrade::Substantive
}

/// Analyze the most recent user message in the window. A window with no
/// user message grades `Low`: there is nothing to answer, so selection
/// leans on the minimal-acknowledgment fallback.
pub fn analyze(messages: &[ChatMessage], gang: &[&Character]) -> TriggerAnalysis {
    let trigger = messages.iter().rev().find(|message| message.is_user());

    let Some(trigger) = trigger else {
        return TriggerAnalysis {
            grade: ContentGrade::Low,
            is_question: false,
            mentioned: Vec::new(),
            trigger_target: None,
        };
    };

    let folded = trigger.content.to_lowercase();
    let mentioned = gang
        .iter()
        .filter(|character| {
            folded.contains(&character.name.to_lowercase()) || folded.contains(&character.id)
        })
        .map(|character| character.id.clone())
        .collect();

    TriggerAnalysis {
        grade: grade_content(&trigger.content),
        is_question: trigger.content.contains('?'),
        mentioned,
        trigger_target: Some(trigger.addressable_id().to_string()),
    }
}
