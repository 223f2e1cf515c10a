//! Keystroke-to-metric computation and throttled progress emission.
//!
//! [`ProgressEngine`] turns the local input buffer into live statistics
//! (words per minute, accuracy, error count, percent complete) on every
//! keystroke, detects completion by strict string equality against the
//! target text, and decides when an outbound progress publish is allowed.
//!
//! Throttling only gates the *network* side effect: the locally computed
//! stats are always current, and the completion publish bypasses the
//! throttle entirely so the final update can never be dropped.
//!
//! All text measurements are in Unicode scalar values, not bytes — target
//! texts are routinely non-ASCII.

use std::time::{Duration, Instant};

use crate::protocol::StatsPayload;
use crate::room::RoomPhase;

/// Lower bound on the publish interval.
pub const MIN_PUBLISH_INTERVAL: Duration = Duration::from_millis(400);

/// Default minimum interval between non-terminal progress publishes.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

// ── Stats ───────────────────────────────────────────────────────────

/// Latest computed statistics for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStats {
    /// Words per minute, one word = five correct characters.
    pub wpm: u32,
    /// Correct characters as a share of characters typed, `0..=100`.
    pub accuracy: u8,
    /// Mismatches within the compared range plus overrun past the target.
    pub error_count: u32,
    /// Percent complete, `0..=100`; 100 only on strict equality.
    pub percent: u8,
}

impl Default for LiveStats {
    fn default() -> Self {
        Self {
            wpm: 0,
            accuracy: 100,
            error_count: 0,
            percent: 0,
        }
    }
}

impl LiveStats {
    /// Wire form of these stats for a `PLAYER_PROGRESS` publish.
    pub fn to_payload(self, username: Option<String>) -> StatsPayload {
        StatsPayload {
            wpm: self.wpm,
            accuracy: self.accuracy,
            error_count: self.error_count,
            progress: Some(self.percent),
            username,
        }
    }
}

/// Result of feeding one keystroke state into the engine.
#[derive(Debug, Clone, Copy)]
pub struct InputOutcome {
    /// The input now equals the target text exactly.
    pub completed: bool,
    /// Stats as of this keystroke (always current, never throttled).
    pub stats: LiveStats,
    /// Whether an outbound publish is permitted for this keystroke.
    /// Always `true` when `completed`.
    pub publish: bool,
}

// ── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnginePhase {
    NotStarted,
    Running,
    Completed,
}

/// Per-keystroke metric computation plus the outbound rate limiter.
#[derive(Debug)]
pub struct ProgressEngine {
    throttle: Duration,
    phase: EnginePhase,
    started_at: Option<Instant>,
    last_publish: Option<Instant>,
    stats: LiveStats,
}

impl Default for ProgressEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLISH_INTERVAL)
    }
}

impl ProgressEngine {
    /// Create an engine with the given publish throttle. Intervals below
    /// [`MIN_PUBLISH_INTERVAL`] are clamped up to it.
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle: throttle.max(MIN_PUBLISH_INTERVAL),
            phase: EnginePhase::NotStarted,
            started_at: None,
            last_publish: None,
            stats: LiveStats::default(),
        }
    }

    /// Latest computed stats.
    pub fn stats(&self) -> LiveStats {
        self.stats
    }

    /// Whether the engine has observed a completing input.
    pub fn is_completed(&self) -> bool {
        self.phase == EnginePhase::Completed
    }

    /// Process the current input buffer against the target text.
    ///
    /// Returns `None` when the room phase is not [`RoomPhase::Playing`] or
    /// the race is already complete; no state changes in that case. The
    /// start timestamp is latched on the first qualifying call.
    pub fn on_input(
        &mut self,
        current: &str,
        target: &str,
        phase: RoomPhase,
    ) -> Option<InputOutcome> {
        self.on_input_at(current, target, phase, Instant::now())
    }

    /// [`on_input`](Self::on_input) with an explicit clock reading, so the
    /// throttle and wpm paths are deterministic under test.
    pub fn on_input_at(
        &mut self,
        current: &str,
        target: &str,
        phase: RoomPhase,
        now: Instant,
    ) -> Option<InputOutcome> {
        if phase != RoomPhase::Playing || self.phase == EnginePhase::Completed {
            return None;
        }
        if self.phase == EnginePhase::NotStarted {
            self.started_at = Some(now);
            self.phase = EnginePhase::Running;
        }

        let completed = current == target;
        self.stats = self.compute(current, target, completed, now);
        if completed {
            self.phase = EnginePhase::Completed;
        }

        let publish = completed || self.last_publish.is_none_or(|t| now - t >= self.throttle);
        if publish {
            self.last_publish = Some(now);
        } else {
            tracing::trace!("progress publish throttled, local stats still updated");
        }

        Some(InputOutcome {
            completed,
            stats: self.stats,
            publish,
        })
    }

    /// Clear the start timestamp, stats, and throttle clock. Called on room
    /// reset/leave and before a fresh match.
    pub fn reset(&mut self) {
        self.phase = EnginePhase::NotStarted;
        self.started_at = None;
        self.last_publish = None;
        self.stats = LiveStats::default();
    }

    fn compute(&self, current: &str, target: &str, completed: bool, now: Instant) -> LiveStats {
        let current_len = current.chars().count();
        let target_len = target.chars().count();

        let correct = current
            .chars()
            .zip(target.chars())
            .filter(|(c, t)| c == t)
            .count();
        let compared = current_len.min(target_len);
        let overrun = current_len.saturating_sub(target_len);
        let error_count = u32::try_from((compared - correct) + overrun).unwrap_or(u32::MAX);

        let accuracy = if current_len == 0 {
            100
        } else {
            ratio_percent(correct, current_len)
        };

        let wpm = match self.started_at {
            Some(start) if now > start => {
                let minutes = (now - start).as_secs_f64() / 60.0;
                let words = correct as f64 / 5.0;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    (words / minutes).round().max(0.0) as u32
                }
            }
            _ => 0,
        };

        // Percent is the lesser of the length-based and correctness-based
        // shares; 100 is reserved for strict equality so a same-length but
        // wrong input can never read as finished.
        let percent = if completed {
            100
        } else if target_len == 0 {
            0
        } else {
            let by_length = ratio_percent(compared, target_len);
            let by_correctness = ratio_percent(correct, target_len);
            by_length.min(by_correctness).min(99)
        };

        LiveStats {
            wpm,
            accuracy,
            error_count,
            percent,
        }
    }
}

/// `round(numerator / denominator * 100)` in integer arithmetic.
fn ratio_percent(numerator: usize, denominator: usize) -> u8 {
    debug_assert!(denominator > 0);
    let scaled = (numerator as u64 * 100 + denominator as u64 / 2) / denominator as u64;
    u8::try_from(scaled.min(100)).unwrap_or(100)
}
