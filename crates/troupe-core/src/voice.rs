//! Character voice seam and the deterministic scripted backend.
//!
//! The orchestrator owns who speaks, when, and how; a voice backend owns
//! the words. A live language-model client implements [`CharacterVoice`]
//! outside this crate; the scripted backend here serves tests, the CLI,
//! and requests carrying `x-mock-ai: true`.

use contracts::{Archetype, Character};

use crate::rng::sample_range;

/// Inputs a backend may draw on when voicing a line.
#[derive(Debug, Clone, Copy)]
pub struct VoiceContext<'a> {
    pub user_name: &'a str,
    pub user_nickname: Option<&'a str>,
    pub trigger_content: Option<&'a str>,
    pub is_question: bool,
}

impl<'a> VoiceContext<'a> {
    /// The name characters actually call the user.
    pub fn address_name(&self) -> &'a str {
        self.user_nickname.unwrap_or(self.user_name)
    }
}

/// What-to-say seam. Implementations must be pure for a given
/// (character, seed) pair so plans stay reproducible.
pub trait CharacterVoice {
    fn message(&self, character: &Character, context: &VoiceContext<'_>, seed: u64) -> String;
    fn emoji(&self, character: &Character, seed: u64) -> String;
    fn status(&self, character: &Character, seed: u64) -> String;
    fn nickname(&self, character: &Character, user_name: &str, seed: u64) -> String;
}

/// Deterministic scripted voice: seeded picks from per-archetype pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedVoice;

fn lines(archetype: Archetype) -> &'static [&'static str] {
    match archetype {
        Archetype::Hypeman => &[
            "LETS GOOO",
            "{user} SAID WHAT NEEDED SAYING",
            "massive. huge. historic.",
            "say less, I'm already hyped",
            "THIS is the energy we needed today",
        ],
        Archetype::Realist => &[
            "counterpoint: maybe",
            "let's think this through for one second",
            "I mean, sure, with caveats",
            "that tracks, mostly",
            "citation needed, {user}",
        ],
        Archetype::Gremlin => &[
            "hehehehe",
            "and what if we made it worse",
            "no thoughts, only vibes",
            "brb breaking something in {user}'s honor",
            "chaos vote: yes",
        ],
        Archetype::Softie => &[
            "aww, love this for you",
            "how are you feeling about it, {user}?",
            "proud of you, genuinely",
            "sending good energy your way",
            "ok but take care of yourself too",
        ],
        Archetype::Lurker => &["seen", "mm", "noted", "k", "."],
    }
}

fn answers(archetype: Archetype) -> &'static [&'static str] {
    match archetype {
        Archetype::Hypeman => &["YES. absolutely yes", "do it. DO IT"],
        Archetype::Realist => &["depends on the details", "short answer: probably"],
        Archetype::Gremlin => &["flip a coin, trust nothing", "the fun answer is yes"],
        Archetype::Softie => &["whatever feels right to you, {user}", "I think you already know"],
        Archetype::Lurker => &["yeah", "nope"],
    }
}

fn emojis(archetype: Archetype) -> &'static [&'static str] {
    match archetype {
        Archetype::Hypeman => &["🔥", "💯", "🚀"],
        Archetype::Realist => &["🤔", "👍", "🫡"],
        Archetype::Gremlin => &["😈", "🤡", "👀"],
        Archetype::Softie => &["💖", "🥹", "🫶"],
        Archetype::Lurker => &["👀", "💤"],
    }
}

fn statuses(archetype: Archetype) -> &'static [&'static str] {
    match archetype {
        Archetype::Hypeman => &["warming up the caps lock", "hyping from the sidelines"],
        Archetype::Realist => &["reading the room", "weighing in shortly"],
        Archetype::Gremlin => &["scheming", "up to something"],
        Archetype::Softie => &["here for you", "listening"],
        Archetype::Lurker => &["lurking", "around"],
    }
}

fn nicknames(archetype: Archetype) -> &'static [&'static str] {
    match archetype {
        Archetype::Hypeman => &["{name} the Legend", "BIG {name}"],
        Archetype::Realist => &["{name}, allegedly", "exhibit {name}"],
        Archetype::Gremlin => &["{name}.exe", "{name} (derogatory)"],
        Archetype::Softie => &["sweet {name}", "{name} 💕"],
        Archetype::Lurker => &["{name}, I guess"],
    }
}

fn pick(pool: &'static [&'static str], seed: u64, stream: u64) -> &'static str {
    let index = sample_range(seed, stream, 0, pool.len() as i64 - 1) as usize;
    pool[index]
}

impl CharacterVoice for ScriptedVoice {
    fn message(&self, character: &Character, context: &VoiceContext<'_>, seed: u64) -> String {
        let pool = if context.is_question {
            answers(character.archetype)
        } else {
            lines(character.archetype)
        };
        pick(pool, seed, 60).replace("{user}", context.address_name())
    }

    fn emoji(&self, character: &Character, seed: u64) -> String {
        pick(emojis(character.archetype), seed, 61).to_string()
    }

    fn status(&self, character: &Character, seed: u64) -> String {
        pick(statuses(character.archetype), seed, 62).to_string()
    }

    fn nickname(&self, character: &Character, user_name: &str, seed: u64) -> String {
        pick(nicknames(character.archetype), seed, 63).replace("{name}", user_name)
    }
}
