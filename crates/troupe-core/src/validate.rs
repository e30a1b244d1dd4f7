//! Request validation and id sanitizing ahead of planning.
//!
//! Validation rejects requests that are structurally unusable. Inputs
//! that are merely odd (a blank user name, a nickname made of spaces)
//! pass through and degrade gracefully further down the pipeline.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use contracts::{TurnRequest, MAX_MESSAGE_ID_LEN, USER_SPEAKER};

use crate::roster::Roster;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyHistory,
    EmptyGang,
    UnknownGangId(String),
    UnknownSpeaker { message_id: String, speaker: String },
    DuplicateMessageId(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyHistory => write!(f, "message history is empty"),
            ValidationError::EmptyGang => write!(f, "active gang is empty"),
            ValidationError::UnknownGangId(id) => {
                write!(f, "active gang references unknown character '{id}'")
            }
            ValidationError::UnknownSpeaker {
                message_id,
                speaker,
            } => write!(
                f,
                "message '{message_id}' has unknown speaker '{speaker}'"
            ),
            ValidationError::DuplicateMessageId(id) => {
                write!(f, "duplicate message id '{id}'")
            }
        }
    }
}

impl Error for ValidationError {}

/// Strip control characters and truncate to the id length cap. Applied
/// to every id-like field before it can round-trip into an event.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .take(MAX_MESSAGE_ID_LEN)
        .collect()
}

/// Validate a turn request against the full roster and return a
/// sanitized copy. Speakers are checked against the whole roster, not
/// the active gang, since history may predate a gang change.
pub fn validate_request(
    request: &TurnRequest,
    roster: &Roster,
) -> Result<TurnRequest, ValidationError> {
    if request.messages.is_empty() {
        return Err(ValidationError::EmptyHistory);
    }
    if request.active_gang_ids.is_empty() {
        return Err(ValidationError::EmptyGang);
    }
    for id in &request.active_gang_ids {
        if !roster.contains(id) {
            return Err(ValidationError::UnknownGangId(id.clone()));
        }
    }

    let mut sanitized = request.clone();
    let mut seen = BTreeSet::new();

    for message in &mut sanitized.messages {
        message.id = sanitize_id(&message.id);
        if let Some(ref cid) = message.client_message_id {
            message.client_message_id = Some(sanitize_id(cid));
        }
        if let Some(ref rid) = message.reply_to_client_message_id {
            message.reply_to_client_message_id = Some(sanitize_id(rid));
        }

        if message.speaker != USER_SPEAKER && !roster.contains(&message.speaker) {
            return Err(ValidationError::UnknownSpeaker {
                message_id: message.id.clone(),
                speaker: message.speaker.clone(),
            });
        }
        if !seen.insert(message.id.clone()) {
            return Err(ValidationError::DuplicateMessageId(message.id.clone()));
        }
    }

    Ok(sanitized)
}
