//! v1 cross-boundary contracts shared by the turn orchestrator, API server,
//! and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod serde_u64_string;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Reserved speaker id for the human participant in a conversation.
pub const USER_SPEAKER: &str = "user";

/// Message ids longer than this are truncated during sanitization.
pub const MAX_MESSAGE_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Immutable roster entry for one AI character.
///
/// Characters are defined at process start and never mutate at runtime;
/// a turn request references them by `id` through `activeGangIds`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    pub id: String,
    pub name: String,
    /// Free-form personality descriptor handed to the voice backend.
    pub voice: String,
    pub archetype: Archetype,
    /// Hex accent color clients use for this character's bubbles.
    pub color: String,
}

/// Closed set of character archetypes. The archetype biases how chatty a
/// character is and which acknowledgment kinds it favors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Hypeman,
    Realist,
    Gremlin,
    Softie,
    Lurker,
}

// ---------------------------------------------------------------------------
// Conversation history
// ---------------------------------------------------------------------------

/// One turn of conversation, authored by the user or by a character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    /// `"user"` or a roster character id.
    pub speaker: String,
    pub content: String,
    /// Epoch milliseconds. Accepts a JSON number or a decimal string.
    #[serde(with = "serde_u64_string")]
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_client_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
}

impl ChatMessage {
    pub fn is_user(&self) -> bool {
        self.speaker == USER_SPEAKER
    }

    /// The id clients use to address this message: the client-assigned id
    /// when present, otherwise the canonical one.
    pub fn addressable_id(&self) -> &str {
        self.client_message_id.as_deref().unwrap_or(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Turn request
// ---------------------------------------------------------------------------

/// Conversation register for one turn. `Ecosystem` broadens participation
/// across the roster; `Entourage` narrows it to a tighter in-group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Entourage,
    Ecosystem,
}

impl ChatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entourage => "entourage",
            Self::Ecosystem => "ecosystem",
        }
    }
}

/// Ephemeral input to one orchestration call, the body of `POST /api/chat`.
///
/// `silent_turns` and `burst_count` are caller-supplied rolling counters;
/// the core stores nothing across turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub messages: Vec<ChatMessage>,
    pub active_gang_ids: Vec<String>,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_nickname: Option<String>,
    /// Consecutive turns with no AI reply. Biases toward breaking silence.
    #[serde(default)]
    pub silent_turns: u32,
    /// Recent rapid-fire user messages. Dampens responder count.
    #[serde(default)]
    pub burst_count: u32,
    pub chat_mode: ChatMode,
    /// Reproducibility seed. Accepts a JSON number or string; when absent
    /// the server derives one from the arrival clock, so replays need an
    /// explicit seed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_u64_string::option"
    )]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Response events
// ---------------------------------------------------------------------------

/// One unit of orchestrator output, replayed by the client at
/// `t = delay` milliseconds after the envelope arrives.
///
/// Within one character's events delays are non-decreasing, and a
/// `typing_ghost` announcing a `message` strictly precedes that message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    Message {
        character: String,
        delay: u64,
        content: String,
    },
    Reaction {
        character: String,
        delay: u64,
        emoji: String,
        target_message_id: String,
    },
    StatusUpdate {
        character: String,
        delay: u64,
        status: String,
    },
    NicknameUpdate {
        character: String,
        delay: u64,
        /// The new nickname the character bestows on the user.
        nickname: String,
    },
    TypingGhost {
        character: String,
        delay: u64,
        /// How long the indicator stays visible, in milliseconds.
        duration: u64,
    },
}

impl ResponseEvent {
    pub fn character(&self) -> &str {
        match self {
            Self::Message { character, .. }
            | Self::Reaction { character, .. }
            | Self::StatusUpdate { character, .. }
            | Self::NicknameUpdate { character, .. }
            | Self::TypingGhost { character, .. } => character,
        }
    }

    pub fn delay(&self) -> u64 {
        match self {
            Self::Message { delay, .. }
            | Self::Reaction { delay, .. }
            | Self::StatusUpdate { delay, .. }
            | Self::NicknameUpdate { delay, .. }
            | Self::TypingGhost { delay, .. } => *delay,
        }
    }

    /// Wire name of this event's type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Reaction { .. } => "reaction",
            Self::StatusUpdate { .. } => "status_update",
            Self::NicknameUpdate { .. } => "nickname_update",
            Self::TypingGhost { .. } => "typing_ghost",
        }
    }
}

/// Complete reply to one user turn.
///
/// The `events` key is always present and always an array, including on
/// rejected (400) and throttled (429) responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnEnvelope {
    pub events: Vec<ResponseEvent>,
    pub responders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl TurnEnvelope {
    pub fn new(events: Vec<ResponseEvent>, responders: Vec<String>) -> Self {
        Self {
            events,
            responders,
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            responders: Vec::new(),
            error: None,
        }
    }

    /// Error envelope with the contractual empty-but-present `events` array.
    pub fn rejected(error: ApiError) -> Self {
        Self {
            events: Vec::new(),
            responders: Vec::new(),
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    QuotaExceeded,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(
        default,
        rename = "retryAfterSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            retry_after_seconds: None,
        }
    }

    pub fn quota_exceeded(retry_after_seconds: u64) -> Self {
        Self {
            code: ErrorCode::QuotaExceeded,
            message: "rate limit exceeded".to_string(),
            details: None,
            retry_after_seconds: Some(retry_after_seconds),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{:?}: {} ({details})", self.code, self.message),
            None => write!(f, "{:?}: {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_event_uses_internal_type_tag() {
        let event = ResponseEvent::Reaction {
            character: "rico".to_string(),
            delay: 450,
            emoji: "🔥".to_string(),
            target_message_id: "m1".to_string(),
        };

        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "reaction");
        assert_eq!(value["character"], "rico");
        assert_eq!(value["delay"], 450);
        assert_eq!(value["emoji"], "🔥");
        assert_eq!(value["target_message_id"], "m1");
    }

    #[test]
    fn rejected_envelope_always_carries_events_array() {
        let envelope = TurnEnvelope::rejected(ApiError::new(
            ErrorCode::ValidationError,
            "messages must not be empty",
            None,
        ));

        let value = serde_json::to_value(&envelope).expect("serialize");
        assert!(value["events"].is_array());
        assert_eq!(value["events"].as_array().map(Vec::len), Some(0));
        assert_eq!(value["error"]["code"], "validation_error");
    }

    #[test]
    fn quota_error_surfaces_retry_after_seconds_in_camel_case() {
        let error = ApiError::quota_exceeded(42);
        let value = serde_json::to_value(&error).expect("serialize");
        assert_eq!(value["retryAfterSeconds"], 42);
    }

    #[test]
    fn turn_request_round_trips_camel_case_fields() {
        let raw = r#"{
            "messages": [
                {"id": "m1", "speaker": "user", "content": "yo", "created_at": 1700000000000}
            ],
            "activeGangIds": ["rico", "sage"],
            "userName": "Dee",
            "silentTurns": 2,
            "burstCount": 0,
            "chatMode": "entourage",
            "seed": "1337"
        }"#;

        let request: TurnRequest = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(request.active_gang_ids, vec!["rico", "sage"]);
        assert_eq!(request.seed, Some(1337));
        assert_eq!(request.chat_mode, ChatMode::Entourage);
        assert!(request.user_nickname.is_none());

        let encoded = serde_json::to_value(&request).expect("serialize");
        assert!(encoded.get("activeGangIds").is_some());
        assert!(encoded.get("silentTurns").is_some());
        assert!(encoded.get("active_gang_ids").is_none());
    }

    #[test]
    fn chat_message_created_at_accepts_number_or_string() {
        let from_number: ChatMessage = serde_json::from_str(
            r#"{"id": "m1", "speaker": "user", "content": "hi", "created_at": 1700000000000}"#,
        )
        .expect("numeric created_at");
        let from_string: ChatMessage = serde_json::from_str(
            r#"{"id": "m1", "speaker": "user", "content": "hi", "created_at": "1700000000000"}"#,
        )
        .expect("string created_at");

        assert_eq!(from_number.created_at, from_string.created_at);
    }

    #[test]
    fn addressable_id_prefers_client_message_id() {
        let message = ChatMessage {
            id: "srv-9".to_string(),
            speaker: USER_SPEAKER.to_string(),
            content: "hello".to_string(),
            created_at: 0,
            client_message_id: Some("c-1".to_string()),
            reply_to_client_message_id: None,
            reaction: None,
        };
        assert_eq!(message.addressable_id(), "c-1");
    }
}
