//! Envelope assembly: voice the planned actions, sequence their delays,
//! and materialize the final event list.
//!
//! Messages are announced by a typing indicator event carrying the same
//! typing window the sequencer charged for them. Assembly is total: any
//! internal inconsistency degrades to a minimal single-status envelope
//! rather than failing the turn.

use std::collections::BTreeMap;

use contracts::{Character, ResponseEvent, TurnEnvelope, TurnRequest};

use crate::pacing::{sequence_delays, PacedSlot, SequenceItem};
use crate::planner::{PlannedKind, TurnPlan};
use crate::policy::SelectionPolicy;
use crate::rng::character_seed;
use crate::voice::{CharacterVoice, VoiceContext};

/// Materialize a plan into a wire envelope. Events come out sorted by
/// delay; responders mirror the plan's presentation order.
pub fn assemble_turn(
    request: &TurnRequest,
    gang: &[&Character],
    plan: &TurnPlan,
    voice: &dyn CharacterVoice,
    policy: &SelectionPolicy,
    seed: u64,
) -> TurnEnvelope {
    if plan.is_empty() {
        return TurnEnvelope::empty();
    }

    let by_id: BTreeMap<&str, &Character> = gang
        .iter()
        .map(|character| (character.id.as_str(), *character))
        .collect();

    let trigger = request.messages.iter().rev().find(|m| m.is_user());
    let context = VoiceContext {
        user_name: &request.user_name,
        user_nickname: request.user_nickname.as_deref(),
        trigger_content: trigger.map(|m| m.content.as_str()),
        is_question: trigger.map(|m| m.content.contains('?')).unwrap_or(false),
    };

    // Message content renders first since typing windows charge by length.
    let mut contents: Vec<Option<String>> = Vec::with_capacity(plan.actions.len());
    let mut items: Vec<SequenceItem<'_>> = Vec::with_capacity(plan.actions.len());
    for action in &plan.actions {
        let Some(character) = by_id.get(action.character_id.as_str()) else {
            return degraded_envelope(gang, voice, seed);
        };
        let content = match action.kind {
            PlannedKind::Message => Some(voice.message(
                character,
                &context,
                character_seed(seed, &character.id),
            )),
            _ => None,
        };
        items.push(SequenceItem {
            character_id: &action.character_id,
            kind: action.kind,
            content_len: content
                .as_deref()
                .map(|text| text.chars().count())
                .unwrap_or(0),
        });
        contents.push(content);
    }

    let slots = sequence_delays(&items, policy, seed);

    let mut events = Vec::with_capacity(plan.actions.len() + 1);
    for ((action, slot), content) in plan.actions.iter().zip(&slots).zip(contents) {
        let character_id = action.character_id.clone();
        let Some(character) = by_id.get(character_id.as_str()) else {
            return degraded_envelope(gang, voice, seed);
        };
        let cseed = character_seed(seed, &character_id);

        match (action.kind, *slot) {
            (
                PlannedKind::Message,
                PacedSlot::Announced {
                    ghost_delay,
                    typing_ms,
                    message_delay,
                },
            ) => {
                events.push(ResponseEvent::TypingGhost {
                    character: character_id.clone(),
                    delay: ghost_delay,
                    duration: typing_ms,
                });
                events.push(ResponseEvent::Message {
                    character: character_id,
                    delay: message_delay,
                    content: content.unwrap_or_default(),
                });
            }
            (PlannedKind::Reaction, PacedSlot::Single { delay }) => {
                match plan.reaction_target.clone() {
                    Some(target_message_id) => events.push(ResponseEvent::Reaction {
                        character: character_id,
                        delay,
                        emoji: voice.emoji(character, cseed),
                        target_message_id,
                    }),
                    // The planner already degrades targetless reactions;
                    // this covers hand-built plans.
                    None => events.push(ResponseEvent::StatusUpdate {
                        character: character_id,
                        delay,
                        status: voice.status(character, cseed),
                    }),
                }
            }
            (PlannedKind::StatusUpdate, PacedSlot::Single { delay }) => {
                events.push(ResponseEvent::StatusUpdate {
                    character: character_id,
                    delay,
                    status: voice.status(character, cseed),
                });
            }
            (PlannedKind::NicknameUpdate, PacedSlot::Single { delay }) => {
                events.push(ResponseEvent::NicknameUpdate {
                    character: character_id,
                    delay,
                    nickname: voice.nickname(character, &request.user_name, cseed),
                });
            }
            (PlannedKind::TypingGhost, PacedSlot::Ghost { delay, duration }) => {
                events.push(ResponseEvent::TypingGhost {
                    character: character_id,
                    delay,
                    duration,
                });
            }
            _ => return degraded_envelope(gang, voice, seed),
        }
    }

    events.sort_by_key(ResponseEvent::delay);

    if !envelope_consistent(&events, &by_id, policy) {
        return degraded_envelope(gang, voice, seed);
    }

    TurnEnvelope::new(events, plan.responders.clone())
}

/// Final coherence gate before an envelope leaves the core.
fn envelope_consistent(
    events: &[ResponseEvent],
    by_id: &BTreeMap<&str, &Character>,
    policy: &SelectionPolicy,
) -> bool {
    if events.is_empty() {
        return false;
    }
    for event in events {
        if event.delay() > policy.max_plan_ms {
            return false;
        }
        if !by_id.contains_key(event.character()) {
            return false;
        }
    }
    // A character's typing indicator must start before their message.
    for event in events {
        if let ResponseEvent::Message {
            character, delay, ..
        } = event
        {
            let ghost = events.iter().find_map(|other| match other {
                ResponseEvent::TypingGhost {
                    character: ghost_character,
                    delay: ghost_delay,
                    ..
                } if ghost_character == character => Some(*ghost_delay),
                _ => None,
            });
            if let Some(ghost_delay) = ghost {
                if ghost_delay >= *delay {
                    return false;
                }
            }
        }
    }
    true
}

/// Minimal envelope when assembly cannot honor the plan: the first gang
/// member posts a status at offset zero. With no gang at all there is
/// nothing to say.
fn degraded_envelope(
    gang: &[&Character],
    voice: &dyn CharacterVoice,
    seed: u64,
) -> TurnEnvelope {
    let Some(first) = gang.first() else {
        return TurnEnvelope::empty();
    };
    let event = ResponseEvent::StatusUpdate {
        character: first.id.clone(),
        delay: 0,
        status: voice.status(first, character_seed(seed, &first.id)),
    };
    TurnEnvelope::new(vec![event], vec![first.id.clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{plan_turn, PlannedAction};
    use crate::roster::{default_roster, Roster};
    use crate::voice::ScriptedVoice;
    use contracts::{Archetype, ChatMessage, ChatMode, USER_SPEAKER};

    fn request(content: &str) -> TurnRequest {
        TurnRequest {
            messages: vec![ChatMessage {
                id: "m1".to_string(),
                speaker: USER_SPEAKER.to_string(),
                content: content.to_string(),
                created_at: 1_700_000_000_000,
                client_message_id: Some("c1".to_string()),
                reply_to_client_message_id: None,
                reaction: None,
            }],
            active_gang_ids: vec![
                "rico".to_string(),
                "sage".to_string(),
                "pixel".to_string(),
                "juno".to_string(),
                "moss".to_string(),
            ],
            user_name: "Dee".to_string(),
            user_nickname: None,
            silent_turns: 0,
            burst_count: 0,
            chat_mode: ChatMode::Ecosystem,
            seed: None,
        }
    }

    const SUBSTANTIVE: &str = "so my landlord finally fixed the heater after three weeks and \
        now the apartment is basically a sauna, I cannot win this year";

    #[test]
    fn happy_path_produces_a_sorted_consistent_envelope() {
        let roster = Roster::new(default_roster()).expect("roster");
        let req = request(SUBSTANTIVE);
        let gang = roster.filter_known(&req.active_gang_ids);
        let policy = SelectionPolicy::default();
        let outcome = plan_turn(&req, &gang, &policy, 17);

        let envelope = assemble_turn(&req, &gang, &outcome.plan, &ScriptedVoice, &policy, 17);
        assert!(!envelope.events.is_empty());
        assert!(envelope.error.is_none());
        assert_eq!(envelope.responders, outcome.plan.responders);

        let delays: Vec<u64> = envelope.events.iter().map(ResponseEvent::delay).collect();
        let mut sorted = delays.clone();
        sorted.sort_unstable();
        assert_eq!(delays, sorted, "events must be sorted by delay");

        for event in &envelope.events {
            assert!(event.delay() <= policy.max_plan_ms);
        }
    }

    #[test]
    fn every_message_is_announced_by_an_earlier_ghost() {
        let roster = Roster::new(default_roster()).expect("roster");
        let req = request(SUBSTANTIVE);
        let gang = roster.filter_known(&req.active_gang_ids);
        let policy = SelectionPolicy::default();

        for seed in [1_u64, 23, 456] {
            let outcome = plan_turn(&req, &gang, &policy, seed);
            let envelope =
                assemble_turn(&req, &gang, &outcome.plan, &ScriptedVoice, &policy, seed);

            for event in &envelope.events {
                if let ResponseEvent::Message {
                    character, delay, ..
                } = event
                {
                    let ghost_delay = envelope.events.iter().find_map(|other| match other {
                        ResponseEvent::TypingGhost {
                            character: c,
                            delay: d,
                            ..
                        } if c == character => Some(*d),
                        _ => None,
                    });
                    let ghost_delay = ghost_delay
                        .unwrap_or_else(|| panic!("message from {character} without a ghost"));
                    assert!(ghost_delay < *delay, "seed {seed}: ghost must lead message");
                }
            }
        }
    }

    #[test]
    fn one_canonical_action_per_responder() {
        let roster = Roster::new(default_roster()).expect("roster");
        let req = request(SUBSTANTIVE);
        let gang = roster.filter_known(&req.active_gang_ids);
        let policy = SelectionPolicy::default();
        let outcome = plan_turn(&req, &gang, &policy, 31);
        let envelope = assemble_turn(&req, &gang, &outcome.plan, &ScriptedVoice, &policy, 31);

        let mut canonical: BTreeMap<&str, usize> = BTreeMap::new();
        for event in &envelope.events {
            if !matches!(event, ResponseEvent::TypingGhost { .. }) {
                *canonical.entry(event.character()).or_default() += 1;
            }
        }
        for (character, count) in canonical {
            assert_eq!(count, 1, "{character} got {count} canonical events");
        }
    }

    #[test]
    fn reaction_points_at_the_trigger_client_id() {
        let gang_owned = vec![
            Character {
                id: "ada".to_string(),
                name: "Ada".to_string(),
                voice: "dry".to_string(),
                archetype: Archetype::Realist,
                color: "#808080".to_string(),
            },
            Character {
                id: "bee".to_string(),
                name: "Bee".to_string(),
                voice: "dry".to_string(),
                archetype: Archetype::Realist,
                color: "#909090".to_string(),
            },
        ];
        let gang: Vec<&Character> = gang_owned.iter().collect();
        let mut req = request(SUBSTANTIVE);
        req.active_gang_ids = vec!["ada".to_string(), "bee".to_string()];

        let mut policy = SelectionPolicy::default();
        policy.respond_threshold = -1_000;
        policy.kind_weights = [0, 100, 0, 0, 0];

        let outcome = plan_turn(&req, &gang, &policy, 12);
        assert_eq!(outcome.plan.reaction_target.as_deref(), Some("c1"));

        let envelope = assemble_turn(&req, &gang, &outcome.plan, &ScriptedVoice, &policy, 12);
        let reaction = envelope
            .events
            .iter()
            .find_map(|event| match event {
                ResponseEvent::Reaction {
                    target_message_id, ..
                } => Some(target_message_id.clone()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no reaction in {:?}", envelope.events));
        assert_eq!(reaction, "c1");
    }

    #[test]
    fn empty_plan_yields_an_empty_envelope() {
        let req = request("hello");
        let plan = TurnPlan {
            actions: Vec::new(),
            responders: Vec::new(),
            reaction_target: None,
        };
        let envelope = assemble_turn(
            &req,
            &[],
            &plan,
            &ScriptedVoice,
            &SelectionPolicy::default(),
            1,
        );
        assert!(envelope.events.is_empty());
        assert!(envelope.responders.is_empty());
        assert!(envelope.error.is_none());
    }

    #[test]
    fn plan_outside_the_gang_degrades_to_a_status() {
        let roster = Roster::new(default_roster()).expect("roster");
        let req = request(SUBSTANTIVE);
        let gang = roster.filter_known(&req.active_gang_ids);
        let plan = TurnPlan {
            actions: vec![PlannedAction {
                character_id: "zorp".to_string(),
                kind: PlannedKind::Message,
            }],
            responders: vec!["zorp".to_string()],
            reaction_target: None,
        };

        let envelope = assemble_turn(
            &req,
            &gang,
            &plan,
            &ScriptedVoice,
            &SelectionPolicy::default(),
            2,
        );
        assert_eq!(envelope.events.len(), 1);
        assert!(matches!(
            envelope.events[0],
            ResponseEvent::StatusUpdate { ref character, delay: 0, .. } if character == "rico"
        ));
    }
}
