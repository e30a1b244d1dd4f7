//! Service facade over the turn orchestrator: rate guarding, request
//! validation, seed resolution, and the axum HTTP server.

mod server;

use std::fmt;

use contracts::{TurnEnvelope, TurnRequest};
use troupe_core::guard::{MemoryCounterStore, RateLimiter, CHAT_LIMIT, CHAT_WINDOW_MS};
use troupe_core::rng::{mix_seed, stable_id_hash};
use troupe_core::{
    default_roster, orchestrate_turn, validate_request, CharacterVoice, Roster, RosterError,
    ScriptedVoice, SelectionPolicy, ValidationError,
};

pub use server::{serve, ServerError};

const ROSTER_PATH_ENV: &str = "TROUPE_ROSTER_PATH";
const POLICY_PATH_ENV: &str = "TROUPE_POLICY_PATH";

/// Per-request facts the transport layer resolves before a turn runs.
#[derive(Debug, Clone)]
pub struct TurnContext<'a> {
    /// Client key for rate accounting.
    pub rate_key: &'a str,
    /// Forces the deterministic scripted voice backend.
    pub mock_ai: bool,
    /// Wall clock in unix milliseconds.
    pub now_ms: u64,
}

/// Why a turn was refused before orchestration ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRejection {
    RateLimited { retry_after_seconds: u64 },
    Invalid(ValidationError),
}

impl fmt::Display for TurnRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRejection::RateLimited {
                retry_after_seconds,
            } => write!(f, "rate limited, retry in {retry_after_seconds}s"),
            TurnRejection::Invalid(err) => write!(f, "invalid request: {err}"),
        }
    }
}

impl std::error::Error for TurnRejection {}

/// One orchestrator instance: roster, policy, voice backends, and the
/// chat rate limiter. Methods take `&self`; the limiter synchronizes
/// internally, so the service shares freely across handlers.
pub struct ChatService {
    roster: Roster,
    policy: SelectionPolicy,
    voice: Box<dyn CharacterVoice + Send + Sync>,
    mock_voice: ScriptedVoice,
    limiter: RateLimiter<MemoryCounterStore>,
}

impl ChatService {
    pub fn new(roster: Roster, policy: SelectionPolicy) -> Self {
        Self::with_voice(roster, policy, Box::new(ScriptedVoice))
    }

    /// Service with a custom production voice backend. The mock backend
    /// selected by `x-mock-ai` stays scripted regardless.
    pub fn with_voice(
        roster: Roster,
        policy: SelectionPolicy,
        voice: Box<dyn CharacterVoice + Send + Sync>,
    ) -> Self {
        Self {
            roster,
            policy,
            voice,
            mock_voice: ScriptedVoice,
            limiter: RateLimiter::in_memory(CHAT_LIMIT, CHAT_WINDOW_MS),
        }
    }

    /// Built-in roster and default policy.
    pub fn with_defaults() -> Result<Self, RosterError> {
        Ok(Self::new(
            Roster::new(default_roster())?,
            SelectionPolicy::default(),
        ))
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Guard, validate, and orchestrate one turn. A request without an
    /// explicit seed gets one derived from the clock and the rate key.
    pub fn handle_turn(
        &self,
        request: &TurnRequest,
        context: &TurnContext<'_>,
    ) -> Result<TurnEnvelope, TurnRejection> {
        let decision = self.limiter.check(context.rate_key, context.now_ms);
        if !decision.allowed {
            return Err(TurnRejection::RateLimited {
                retry_after_seconds: decision.retry_after_seconds(context.now_ms),
            });
        }

        let sanitized = validate_request(request, &self.roster).map_err(TurnRejection::Invalid)?;
        let seed = sanitized
            .seed
            .unwrap_or_else(|| mix_seed(context.now_ms, stable_id_hash(context.rate_key)));

        let voice: &dyn CharacterVoice = if context.mock_ai {
            &self.mock_voice
        } else {
            self.voice.as_ref()
        };

        Ok(orchestrate_turn(
            &sanitized,
            &self.roster,
            &self.policy,
            voice,
            seed,
        ))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Roster(RosterError),
    Policy(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config file error: {err}"),
            ConfigError::Roster(err) => write!(f, "roster config error: {err}"),
            ConfigError::Policy(err) => write!(f, "policy config error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Roster from the `TROUPE_ROSTER_PATH` JSON file, else the built-ins.
pub fn roster_from_env() -> Result<Roster, ConfigError> {
    match env_path(ROSTER_PATH_ENV) {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Roster::from_json_str(&text).map_err(ConfigError::Roster)
        }
        None => Roster::new(default_roster()).map_err(ConfigError::Roster),
    }
}

/// Policy from the `TROUPE_POLICY_PATH` JSON file, else defaults.
pub fn policy_from_env() -> Result<SelectionPolicy, ConfigError> {
    match env_path(POLICY_PATH_ENV) {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            SelectionPolicy::from_json_str(&text).map_err(ConfigError::Policy)
        }
        None => Ok(SelectionPolicy::default()),
    }
}

fn env_path(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|path| !path.trim().is_empty())
}
