use tokio::time::{Duration, Instant};

use crate::types::CadenceConfig;

/// A freshly armed round timer. The actor that owns the session spawns a
/// sleeper for `window` and tags the resulting tick with `generation`;
/// ticks carrying an older generation are stale and must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arm {
    pub generation: u64,
    pub window: Duration,
}

/// Window length for round `n` (n >= 1): the configured starting window,
/// shaved by `decay_ms` per elapsed round, floored at `min_ms`. Saturating,
/// so an aggressive decay can never produce a negative or sub-floor window.
pub fn window_for(config: &CadenceConfig, round: u32) -> Duration {
    let shaved = config
        .round0_ms
        .saturating_sub(config.decay_ms.saturating_mul(u64::from(round.saturating_sub(1))));
    Duration::from_millis(shaved.max(config.min_ms))
}

/// Round counter and timer bookkeeping for one session.
///
/// The cadence never sleeps itself; it only says how long the next window is
/// and which generation a tick must carry to still count. Pausing remembers
/// the unelapsed part of the current window so `resume` arms the remainder,
/// not a full window.
#[derive(Debug)]
pub struct Cadence {
    config: CadenceConfig,
    round: u32,
    generation: u64,
    deadline: Option<Instant>,
    remaining: Option<Duration>,
}

impl Cadence {
    pub fn new() -> Self {
        Self {
            config: CadenceConfig::default(),
            round: 0,
            generation: 0,
            deadline: None,
            remaining: None,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Installs the config for a new game and rewinds the round counter.
    /// Nothing is armed until the first `advance`.
    pub fn configure(&mut self, config: CadenceConfig) {
        self.config = config;
        self.round = 0;
        self.cancel();
    }

    /// Moves to the next round and arms its window.
    pub fn advance(&mut self) -> Arm {
        self.round += 1;
        self.remaining = None;
        self.arm(window_for(&self.config, self.round))
    }

    /// Cancels the pending tick and remembers how much of the current window
    /// was left, so `resume` can pick up where the round was interrupted.
    pub fn pause(&mut self) {
        let now = Instant::now();
        self.remaining = Some(
            self.deadline
                .map(|deadline| deadline.saturating_duration_since(now))
                .unwrap_or_default(),
        );
        self.generation += 1;
        self.deadline = None;
    }

    /// Re-arms the remainder of the interrupted window. No-op unless paused.
    pub fn resume(&mut self) -> Option<Arm> {
        let remaining = self.remaining.take()?;
        Some(self.arm(remaining))
    }

    /// Cancels any pending tick. Idempotent; the round counter is untouched
    /// so a finished game still shows its last round.
    pub fn stop(&mut self) {
        self.cancel();
    }

    /// Stop plus rewind to round 0, for a session reset.
    pub fn reset(&mut self) {
        self.cancel();
        self.round = 0;
    }

    /// Whether a tick with this generation is the one currently armed.
    pub fn accepts(&self, generation: u64) -> bool {
        self.deadline.is_some() && generation == self.generation
    }

    fn arm(&mut self, window: Duration) -> Arm {
        self.generation += 1;
        self.deadline = Some(Instant::now() + window);
        Arm {
            generation: self.generation,
            window,
        }
    }

    fn cancel(&mut self) {
        self.generation += 1;
        self.deadline = None;
        self.remaining = None;
    }
}
