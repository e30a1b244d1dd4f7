use std::sync::Arc;
use std::thread;
use std::time::Instant;

use contracts::{
    Archetype, Character, ChatMessage, ChatMode, ResponseEvent, TurnRequest, USER_SPEAKER,
};
use troupe_core::guard::{LoginCheck, LoginGuard, LoginPolicy, RateLimiter};
use troupe_core::validate::{validate_request, ValidationError};
use troupe_core::{default_roster, orchestrate_turn, Roster, ScriptedVoice, SelectionPolicy};

const PERF_SMOKE_MAX_MS: u128 = 4_000;

fn full_roster() -> Roster {
    Roster::new(default_roster()).expect("default roster is valid")
}

fn base_request() -> TurnRequest {
    TurnRequest {
        messages: vec![ChatMessage {
            id: "m1".to_string(),
            speaker: USER_SPEAKER.to_string(),
            content: "someone talk me out of buying a third mechanical keyboard".to_string(),
            created_at: 1_700_000_000_000,
            client_message_id: Some("c1".to_string()),
            reply_to_client_message_id: None,
            reaction: None,
        }],
        active_gang_ids: vec!["rico".to_string(), "sage".to_string(), "pixel".to_string()],
        user_name: "Dee".to_string(),
        user_nickname: None,
        silent_turns: 0,
        burst_count: 0,
        chat_mode: ChatMode::Ecosystem,
        seed: None,
    }
}

#[test]
fn concurrent_checks_on_one_key_lose_no_counts() {
    let limiter = Arc::new(RateLimiter::in_memory(10_000, 60_000));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let limiter = Arc::clone(&limiter);
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                limiter.check("shared", 1_000);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }

    // 4000 prior checks plus this one must all be visible.
    let decision = limiter.check("shared", 1_000);
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 10_000 - 4_001);
}

#[test]
fn concurrent_checks_on_disjoint_keys_stay_independent() {
    let limiter = Arc::new(RateLimiter::in_memory(600, 60_000));
    let mut handles = Vec::new();
    for worker in 0..4 {
        let limiter = Arc::clone(&limiter);
        handles.push(thread::spawn(move || {
            let key = format!("worker-{worker}");
            for _ in 0..500 {
                assert!(limiter.check(&key, 0).allowed);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }

    for worker in 0..4 {
        let key = format!("worker-{worker}");
        let decision = limiter.check(&key, 0);
        assert_eq!(decision.remaining, 600 - 501, "key {key} leaked counts");
    }
}

#[test]
fn concurrent_login_failures_still_produce_one_lockout() {
    let guard = Arc::new(LoginGuard::new(LoginPolicy::default_policy()));
    let mut handles = Vec::new();
    for _ in 0..5 {
        let guard = Arc::clone(&guard);
        handles.push(thread::spawn(move || {
            guard.record_failure("attacker", 1_000);
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }

    match guard.check("attacker", 1_000) {
        LoginCheck::Locked { retry_after_ms } => assert_eq!(retry_after_ms, 900_000),
        other => panic!("expected lockout after five failures, got {other:?}"),
    }
}

#[test]
fn lockout_walks_down_to_zero_then_resets() {
    let guard = LoginGuard::new(LoginPolicy::default_policy());
    for _ in 0..5 {
        guard.record_failure("key", 0);
    }

    let mut previous = u64::MAX;
    for now in [1_u64, 250_000, 500_000, 899_999] {
        match guard.check("key", now) {
            LoginCheck::Locked { retry_after_ms } => {
                assert!(retry_after_ms < previous, "retry must shrink as time passes");
                previous = retry_after_ms;
            }
            other => panic!("still locked at {now}, got {other:?}"),
        }
    }

    assert_eq!(
        guard.check("key", 900_000),
        LoginCheck::Allowed {
            failures_in_window: 0
        }
    );
    // History was cleared with the expired lock, so failures restart.
    guard.record_failure("key", 900_001);
    assert_eq!(
        guard.check("key", 900_002),
        LoginCheck::Allowed {
            failures_in_window: 1
        }
    );
}

#[test]
fn rate_window_rolls_over_cleanly_under_load() {
    let limiter = RateLimiter::in_memory(5, 1_000);
    for i in 0..5 {
        assert!(limiter.check("k", i).allowed);
    }
    assert!(!limiter.check("k", 900).allowed);

    // New window: full allowance again.
    for i in 0..5 {
        assert!(limiter.check("k", 1_000 + i).allowed);
    }
    assert!(!limiter.check("k", 1_900).allowed);
}

#[test]
fn rejected_requests_name_the_offending_field() {
    let roster = full_roster();

    let mut no_history = base_request();
    no_history.messages.clear();
    assert_eq!(
        validate_request(&no_history, &roster),
        Err(ValidationError::EmptyHistory)
    );

    let mut ghost_gang = base_request();
    ghost_gang.active_gang_ids = vec!["rico".to_string(), "nobody".to_string()];
    assert_eq!(
        validate_request(&ghost_gang, &roster),
        Err(ValidationError::UnknownGangId("nobody".to_string()))
    );

    let mut duplicate = base_request();
    let mut copy = duplicate.messages[0].clone();
    copy.speaker = "rico".to_string();
    duplicate.messages.push(copy);
    assert_eq!(
        validate_request(&duplicate, &roster),
        Err(ValidationError::DuplicateMessageId("m1".to_string()))
    );
}

#[test]
fn sanitized_ids_flow_through_to_reaction_targets() {
    // Two realists so the second responder reliably draws a reaction.
    let roster = Roster::new(vec![
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
    ])
    .expect("roster");

    let mut request = base_request();
    request.active_gang_ids = vec!["ada".to_string(), "bee".to_string()];
    request.messages[0].client_message_id = Some("c\u{0007}lean\n-1".to_string());

    let mut policy = SelectionPolicy::default();
    policy.respond_threshold = -1_000;
    policy.kind_weights = [0, 100, 0, 0, 0];

    let sanitized = validate_request(&request, &roster).expect("valid");
    let envelope = orchestrate_turn(&sanitized, &roster, &policy, &ScriptedVoice, 4);

    let target = envelope
        .events
        .iter()
        .find_map(|event| match event {
            ResponseEvent::Reaction {
                target_message_id, ..
            } => Some(target_message_id.clone()),
            _ => None,
        })
        .expect("reaction event present");
    assert_eq!(target, "clean-1", "control characters must not round-trip");
}

#[test]
fn perf_smoke_thousand_turns_under_threshold() {
    let roster = full_roster();
    let policy = SelectionPolicy::default();
    let request = base_request();

    let start = Instant::now();
    let mut events_total = 0_usize;
    for seed in 0..1_000_u64 {
        let envelope = orchestrate_turn(&request, &roster, &policy, &ScriptedVoice, seed);
        events_total += envelope.events.len();
    }

    assert!(events_total >= 1_000, "every turn must emit something");
    let elapsed = start.elapsed().as_millis();
    assert!(
        elapsed < PERF_SMOKE_MAX_MS,
        "1000 turns took {elapsed}ms, budget {PERF_SMOKE_MAX_MS}ms"
    );
}
