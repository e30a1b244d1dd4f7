//! Character roster: the built-in cast, JSON overrides, and gang
//! resolution for one turn.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{Archetype, Character};

/// Lookup wrapper over the character list. Built once at startup;
/// characters never mutate at runtime.
#[derive(Debug, Clone)]
pub struct Roster {
    characters: Vec<Character>,
    by_id: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub enum RosterError {
    Empty,
    DuplicateId(String),
    Parse(serde_json::Error),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "roster must contain at least one character"),
            Self::DuplicateId(id) => write!(f, "duplicate character id: {id}"),
            Self::Parse(err) => write!(f, "roster parse error: {err}"),
        }
    }
}

impl std::error::Error for RosterError {}

impl From<serde_json::Error> for RosterError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl Roster {
    pub fn new(characters: Vec<Character>) -> Result<Self, RosterError> {
        if characters.is_empty() {
            return Err(RosterError::Empty);
        }

        let mut by_id = BTreeMap::new();
        for (index, character) in characters.iter().enumerate() {
            if by_id.insert(character.id.clone(), index).is_some() {
                return Err(RosterError::DuplicateId(character.id.clone()));
            }
        }

        Ok(Self { characters, by_id })
    }

    /// Parse a roster override file (a JSON array of characters).
    pub fn from_json_str(raw: &str) -> Result<Self, RosterError> {
        let characters: Vec<Character> = serde_json::from_str(raw)?;
        Self::new(characters)
    }

    pub fn get(&self, id: &str) -> Option<&Character> {
        self.by_id.get(id).map(|index| &self.characters[*index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Resolve a turn's `activeGangIds`: duplicates collapse preserving
    /// first occurrence, unknown ids are dropped. Strict rejection of
    /// unknown ids happens during request validation, before planning.
    pub fn filter_known(&self, ids: &[String]) -> Vec<&Character> {
        let mut gang = Vec::new();
        let mut seen = BTreeMap::new();
        for id in ids {
            if seen.insert(id.as_str(), ()).is_some() {
                continue;
            }
            if let Some(character) = self.get(id) {
                gang.push(character);
            }
        }
        gang
    }
}

/// The built-in cast. Deployments can replace it with a JSON file; the
/// ids here are what the stock web client sends in `activeGangIds`.
pub fn default_roster() -> Vec<Character> {
    vec![
        Character {
            id: "rico".to_string(),
            name: "Rico".to_string(),
            voice: "all-gas hype man, caps lock energy, zero chill".to_string(),
            archetype: Archetype::Hypeman,
            color: "#f97316".to_string(),
        },
        Character {
            id: "sage".to_string(),
            name: "Sage".to_string(),
            voice: "dry voice of reason, measured, quietly funny".to_string(),
            archetype: Archetype::Realist,
            color: "#60a5fa".to_string(),
        },
        Character {
            id: "pixel".to_string(),
            name: "Pixel".to_string(),
            voice: "chaos gremlin, derails threads, typos on purpose".to_string(),
            archetype: Archetype::Gremlin,
            color: "#a78bfa".to_string(),
        },
        Character {
            id: "juno".to_string(),
            name: "Juno".to_string(),
            voice: "warm and earnest, checks in on everyone".to_string(),
            archetype: Archetype::Softie,
            color: "#f472b6".to_string(),
        },
        Character {
            id: "moss".to_string(),
            name: "Moss".to_string(),
            voice: "mostly lurks, deadpan one-liners when it counts".to_string(),
            archetype: Archetype::Lurker,
            color: "#34d399".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roster_has_unique_ids() {
        let roster = Roster::new(default_roster()).expect("default roster is valid");
        assert_eq!(roster.len(), 5);
        assert!(!roster.is_empty());
        assert!(roster.contains("rico"));
        assert!(roster.contains("moss"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut characters = default_roster();
        characters.push(characters[0].clone());
        let err = Roster::new(characters).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateId(id) if id == "rico"));
    }

    #[test]
    fn filter_known_drops_unknowns_and_collapses_duplicates() {
        let roster = Roster::new(default_roster()).expect("roster");
        let gang = roster.filter_known(&[
            "nobody".to_string(),
            "juno".to_string(),
            "sage".to_string(),
            "juno".to_string(),
        ]);
        let ids: Vec<&str> = gang.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["juno", "sage"]);
    }

    #[test]
    fn roster_parses_from_json_override() {
        let raw = r##"[
            {"id": "ash", "name": "Ash", "voice": "terse", "archetype": "realist", "color": "#888888"}
        ]"##;
        let roster = Roster::from_json_str(raw).expect("parse");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("ash").map(|c| c.archetype), Some(Archetype::Realist));
    }
}
