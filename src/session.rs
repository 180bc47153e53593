use crate::cadence::{Arm, Cadence};
use crate::types::{CadenceConfig, Phase};

/// The authoritative session state machine.
///
/// Owns the phase, the active command and the cadence; every entry point is
/// synchronous and returns what (if anything) the caller must arm, so all
/// timer side effects stay on the actor that serializes mutations. Actions
/// that are not valid for the current phase leave the state untouched.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    current_cmd: String,
    config: Option<CadenceConfig>,
    cadence: Cadence,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Lobby,
            current_cmd: String::new(),
            config: None,
            cadence: Cadence::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.cadence.round()
    }

    pub fn current_cmd(&self) -> &str {
        &self.current_cmd
    }

    pub fn config(&self) -> Option<CadenceConfig> {
        self.config
    }

    /// Locks in the config and enters RUNNING. Only valid from LOBBY, so a
    /// duplicate start click cannot restart a live game; returns whether the
    /// transition happened. The first round is not armed here — the caller
    /// decides between advancing and an immediate end condition.
    pub fn begin(&mut self, config: CadenceConfig) -> bool {
        if self.phase != Phase::Lobby {
            return false;
        }
        self.config = Some(config);
        self.cadence.configure(config);
        self.current_cmd.clear();
        self.phase = Phase::Running;
        true
    }

    /// Installs the command for the next round and arms its window.
    /// Only meaningful while RUNNING.
    pub fn advance_round(&mut self, cmd: String) -> Arm {
        self.current_cmd = cmd;
        self.cadence.advance()
    }

    /// RUNNING -> PAUSED, holding on to the unelapsed window time.
    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.cadence.pause();
        self.phase = Phase::Paused;
        true
    }

    /// PAUSED -> RUNNING, re-arming the remainder of the interrupted round.
    pub fn resume(&mut self) -> Option<Arm> {
        if self.phase != Phase::Paused {
            return None;
        }
        self.phase = Phase::Running;
        self.cadence.resume()
    }

    /// RUNNING -> DONE once the end condition is met. The round and command
    /// keep their final values for display.
    pub fn finish(&mut self) {
        self.cadence.stop();
        self.phase = Phase::Done;
    }

    /// Back to a fresh LOBBY from any phase: round 0, no command, no config,
    /// any pending tick cancelled.
    pub fn reset(&mut self) {
        self.cadence.reset();
        self.config = None;
        self.current_cmd.clear();
        self.phase = Phase::Lobby;
    }

    /// Whether a timer tick with this generation is current and the session
    /// is actually running. Stale ticks (cancelled, paused or reset since
    /// they were armed) are discarded by the caller.
    pub fn accepts_tick(&self, generation: u64) -> bool {
        self.phase == Phase::Running && self.cadence.accepts(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    fn test_config() -> CadenceConfig {
        CadenceConfig {
            round0_ms: 2500,
            decay_ms: 150,
            min_ms: 800,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn begin_only_works_from_lobby() {
        let mut session = Session::new();
        assert!(session.begin(test_config()));
        assert_eq!(session.phase(), Phase::Running);
        let arm = session.advance_round("SHAKE".to_string());
        assert_eq!(session.round(), 1);

        // duplicate start click: everything stays put
        assert!(!session.begin(CadenceConfig {
            round0_ms: 99,
            decay_ms: 1,
            min_ms: 1,
        }));
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(session.round(), 1);
        assert_eq!(session.config(), Some(test_config()));
        assert!(session.accepts_tick(arm.generation));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_bracket_running_only() {
        let mut session = Session::new();

        // pause in LOBBY is a no-op
        assert!(!session.pause());
        assert_eq!(session.phase(), Phase::Lobby);

        session.begin(test_config());
        let armed = session.advance_round("MINE".to_string());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(session.pause());
        assert_eq!(session.phase(), Phase::Paused);
        assert!(!session.accepts_tick(armed.generation));

        // resume re-arms the remaining 1500ms of the 2500ms window
        let resumed = session.resume().expect("was paused");
        assert_eq!(resumed.window, Duration::from_millis(1500));
        assert_eq!(session.phase(), Phase::Running);
        assert!(session.accepts_tick(resumed.generation));

        // resume while already running is a no-op
        assert!(session.resume().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_to_a_fresh_lobby_from_any_phase() {
        let mut session = Session::new();
        session.begin(test_config());
        let armed = session.advance_round("PLACE".to_string());
        session.pause();

        session.reset();
        assert_eq!(session.phase(), Phase::Lobby);
        assert_eq!(session.round(), 0);
        assert_eq!(session.current_cmd(), "");
        assert_eq!(session.config(), None);
        assert!(!session.accepts_tick(armed.generation));

        // and again from DONE
        session.begin(test_config());
        session.advance_round("SHAKE".to_string());
        session.finish();
        assert_eq!(session.phase(), Phase::Done);
        session.reset();
        assert_eq!(session.phase(), Phase::Lobby);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_keeps_the_final_round_on_display() {
        let mut session = Session::new();
        session.begin(test_config());
        session.advance_round("SHAKE".to_string());
        let last = session.advance_round("MINE".to_string());
        session.finish();

        assert_eq!(session.phase(), Phase::Done);
        assert_eq!(session.round(), 2);
        assert_eq!(session.current_cmd(), "MINE");
        assert!(!session.accepts_tick(last.generation));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generations_are_rejected() {
        let mut session = Session::new();
        session.begin(test_config());
        let first = session.advance_round("SHAKE".to_string());
        let second = session.advance_round("MINE".to_string());

        assert!(!session.accepts_tick(first.generation));
        assert!(session.accepts_tick(second.generation));
    }
}
