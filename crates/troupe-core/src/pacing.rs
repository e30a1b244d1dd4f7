//! Delay sequencing: turn an ordered action list into millisecond
//! offsets that feel like people picking up their phones.
//!
//! Every delay is an absolute offset from plan start. Each rank gets a
//! seeded read delay plus a fixed stagger, messages pay a typing window
//! proportional to their length, and the whole schedule is compressed
//! proportionally when it would overrun the plan ceiling.

use crate::planner::PlannedKind;
use crate::policy::SelectionPolicy;
use crate::rng::{character_seed, sample_range};

/// Input slot for the sequencer, one per planned action in rank order.
#[derive(Debug, Clone, Copy)]
pub struct SequenceItem<'a> {
    pub character_id: &'a str,
    pub kind: PlannedKind,
    /// Rendered content length in chars. Zero for non-message kinds.
    pub content_len: usize,
}

/// Scheduled offsets for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacedSlot {
    /// A message announced by a typing indicator. The indicator fires at
    /// `ghost_delay`, runs for `typing_ms`, and the message lands at
    /// `message_delay`, strictly after the indicator starts.
    Announced {
        ghost_delay: u64,
        typing_ms: u64,
        message_delay: u64,
    },
    /// A standalone event with a single offset.
    Single { delay: u64 },
    /// A typing indicator that never resolves into a message.
    Ghost { delay: u64, duration: u64 },
}

impl PacedSlot {
    /// Latest offset this slot occupies, used for the overrun check.
    fn end(&self) -> u64 {
        match *self {
            PacedSlot::Announced { message_delay, .. } => message_delay,
            PacedSlot::Single { delay } => delay,
            PacedSlot::Ghost { delay, duration } => delay.saturating_add(duration),
        }
    }
}

/// Sequence delays for a ranked action list. Output order matches input
/// order; every offset is bounded by the policy's plan ceiling.
pub fn sequence_delays(
    items: &[SequenceItem<'_>],
    policy: &SelectionPolicy,
    seed: u64,
) -> Vec<PacedSlot> {
    let mut slots = Vec::with_capacity(items.len());

    for (rank, item) in items.iter().enumerate() {
        let cseed = character_seed(seed, item.character_id);
        let read_delay =
            sample_range(cseed, 3, policy.read_delay_min_ms, policy.read_delay_max_ms) as u64;
        let base = read_delay + policy.rank_stagger_ms * rank as u64;

        let slot = match item.kind {
            PlannedKind::Message => {
                let typing_ms = typing_window(item.content_len, policy);
                PacedSlot::Announced {
                    ghost_delay: base,
                    typing_ms,
                    message_delay: base + typing_ms,
                }
            }
            PlannedKind::TypingGhost => {
                let duration = sample_range(
                    cseed,
                    8,
                    policy.ghost_duration_min_ms,
                    policy.ghost_duration_max_ms,
                ) as u64;
                PacedSlot::Ghost {
                    delay: base,
                    duration,
                }
            }
            PlannedKind::Reaction | PlannedKind::StatusUpdate | PlannedKind::NicknameUpdate => {
                PacedSlot::Single { delay: base }
            }
        };
        slots.push(slot);
    }

    compress_overrun(&mut slots, policy);
    slots
}

/// Typing time for a message of `content_len` chars, clamped to the
/// policy window.
pub fn typing_window(content_len: usize, policy: &SelectionPolicy) -> u64 {
    let raw = content_len as u64 * policy.typing_ms_per_char;
    raw.clamp(policy.typing_min_ms, policy.typing_max_ms)
}

/// Proportionally rescale every offset when the schedule would overrun
/// `max_plan_ms`, leaving `plan_margin_ms` of headroom so the ghost to
/// message ordering can be restored after integer truncation.
fn compress_overrun(slots: &mut [PacedSlot], policy: &SelectionPolicy) {
    let max_end = slots.iter().map(PacedSlot::end).max().unwrap_or(0);
    if max_end <= policy.max_plan_ms {
        return;
    }

    let target = policy.max_plan_ms.saturating_sub(policy.plan_margin_ms);
    let scale = |value: u64| value * target / max_end;

    for slot in slots.iter_mut() {
        match slot {
            PacedSlot::Announced {
                ghost_delay,
                typing_ms,
                message_delay,
            } => {
                *ghost_delay = scale(*ghost_delay);
                *message_delay = scale(*message_delay);
                if *message_delay <= *ghost_delay {
                    *message_delay = *ghost_delay + 1;
                }
                *typing_ms = *message_delay - *ghost_delay;
            }
            PacedSlot::Single { delay } => {
                *delay = scale(*delay);
            }
            PacedSlot::Ghost { delay, duration } => {
                *delay = scale(*delay);
                let headroom = target.saturating_sub(*delay);
                *duration = (*duration).min(headroom).max(1);
            }
        }
    }
}
