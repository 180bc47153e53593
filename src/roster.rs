use crate::types::{ActionError, Player};

/// The set of players known to the current session.
///
/// Entries are keyed by `block_id` and live for the whole session: a
/// disconnect only clears `connected`, so a block that drops and comes back
/// keeps its name and score.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_mut(&mut self, block_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.block_id == block_id)
    }

    pub fn get(&self, block_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.block_id == block_id)
    }

    /// Creates or reactivates the entry for `block_id`. A returning block is
    /// only marked connected; its score survives the reconnect.
    pub fn join(&mut self, block_id: &str, default_name: &str) {
        if let Some(player) = self.find_mut(block_id) {
            player.connected = true;
            return;
        }
        self.players.push(Player {
            block_id: block_id.to_string(),
            name: default_name.to_string(),
            score: 0,
            in_game: true,
            connected: true,
            reported: false,
            successful: false,
        });
    }

    /// Marks the entry disconnected. The entry itself is retained.
    pub fn leave(&mut self, block_id: &str) {
        if let Some(player) = self.find_mut(block_id) {
            player.connected = false;
        }
    }

    /// Sets a player's display name. The name is trimmed; empty input is
    /// rejected rather than stored. Phase guarding is the session's job.
    pub fn rename(&mut self, block_id: &str, name: &str) -> Result<(), ActionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ActionError::InvalidInput("empty name"));
        }
        let player = self
            .find_mut(block_id)
            .ok_or_else(|| ActionError::NotFound(block_id.to_string()))?;
        player.name = name.to_string();
        Ok(())
    }

    /// Applies an externally computed score change, clamping at zero.
    pub fn apply_score_delta(&mut self, block_id: &str, delta: i64) -> Result<i64, ActionError> {
        let player = self
            .find_mut(block_id)
            .ok_or_else(|| ActionError::NotFound(block_id.to_string()))?;
        player.score = (player.score + delta).max(0);
        Ok(player.score)
    }

    /// Records a block's report for the active round. Only the first report
    /// per round counts; a successful one is worth a point. Returns whether
    /// anything changed.
    pub fn mark_report(&mut self, block_id: &str, success: bool) -> bool {
        let Some(player) = self.find_mut(block_id) else {
            return false;
        };
        if !player.connected || !player.in_game || player.reported {
            return false;
        }
        player.reported = true;
        player.successful = success;
        if success {
            let _ = self.apply_score_delta(block_id, 1);
        }
        true
    }

    /// Marks every connected player in game with a fresh score, ready for
    /// round 1.
    pub fn begin_game(&mut self) {
        for player in &mut self.players {
            player.in_game = player.connected;
            player.score = 0;
            player.reported = false;
            player.successful = false;
        }
    }

    /// Clears the per-round report flags ahead of a new round.
    pub fn clear_round_flags(&mut self) {
        for player in &mut self.players {
            player.reported = false;
            player.successful = false;
        }
    }

    /// Eliminates every in-game player that did not report success this round.
    pub fn eliminate_silent(&mut self) {
        for player in &mut self.players {
            if player.in_game && !player.successful {
                player.in_game = false;
            }
        }
    }

    /// Number of players still in the game.
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.in_game).count()
    }

    /// Immutable copy of the roster in insertion order. Any sorting is a
    /// presentation concern of the observers.
    pub fn snapshot(&self) -> Vec<Player> {
        self.players.clone()
    }

    /// Zeroes scores and puts everyone back in game; connection status,
    /// block ids and names are preserved.
    pub fn reset_all(&mut self) {
        for player in &mut self.players {
            player.score = 0;
            player.in_game = true;
            player.reported = false;
            player.successful = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_inserts_with_defaults() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        let p = roster.get("b-01").unwrap();
        assert_eq!(p.name, "b-01");
        assert_eq!(p.score, 0);
        assert!(p.in_game);
        assert!(p.connected);
    }

    #[test]
    fn rejoin_keeps_score_and_name() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        roster.rename("b-01", "Ada").unwrap();
        roster.apply_score_delta("b-01", 3).unwrap();
        roster.leave("b-01");
        assert!(!roster.get("b-01").unwrap().connected);

        roster.join("b-01", "b-01");
        let p = roster.get("b-01").unwrap();
        assert!(p.connected);
        assert_eq!(p.name, "Ada");
        assert_eq!(p.score, 3);
        assert_eq!(roster.snapshot().len(), 1);
    }

    #[test]
    fn rename_trims_and_rejects_empty() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        roster.rename("b-01", "  Ada  ").unwrap();
        assert_eq!(roster.get("b-01").unwrap().name, "Ada");

        assert_eq!(
            roster.rename("b-01", "   "),
            Err(ActionError::InvalidInput("empty name"))
        );
        assert_eq!(roster.get("b-01").unwrap().name, "Ada");

        assert_eq!(
            roster.rename("b-99", "Bob"),
            Err(ActionError::NotFound("b-99".to_string()))
        );
    }

    #[test]
    fn score_delta_clamps_at_zero() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        assert_eq!(roster.apply_score_delta("b-01", 2).unwrap(), 2);
        assert_eq!(roster.apply_score_delta("b-01", -5).unwrap(), 0);
    }

    #[test]
    fn first_report_per_round_wins() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        assert!(roster.mark_report("b-01", true));
        assert!(!roster.mark_report("b-01", true));
        assert_eq!(roster.get("b-01").unwrap().score, 1);

        roster.clear_round_flags();
        assert!(roster.mark_report("b-01", false));
        let p = roster.get("b-01").unwrap();
        assert!(p.reported);
        assert!(!p.successful);
        assert_eq!(p.score, 1);
    }

    #[test]
    fn reports_from_eliminated_or_disconnected_players_are_ignored() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        roster.join("b-02", "b-02");
        roster.leave("b-01");
        assert!(!roster.mark_report("b-01", true));

        roster.clear_round_flags();
        roster.eliminate_silent();
        assert!(!roster.mark_report("b-02", true));
        assert!(!roster.mark_report("b-99", true));
    }

    #[test]
    fn eliminate_silent_keeps_successful_players() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        roster.join("b-02", "b-02");
        roster.mark_report("b-01", true);
        roster.mark_report("b-02", false);
        roster.eliminate_silent();
        assert!(roster.get("b-01").unwrap().in_game);
        assert!(!roster.get("b-02").unwrap().in_game);
        assert_eq!(roster.alive_count(), 1);
    }

    #[test]
    fn begin_game_only_fields_connected_players() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        roster.join("b-02", "b-02");
        roster.leave("b-02");
        roster.apply_score_delta("b-01", 4).unwrap();

        roster.begin_game();
        assert!(roster.get("b-01").unwrap().in_game);
        assert_eq!(roster.get("b-01").unwrap().score, 0);
        assert!(!roster.get("b-02").unwrap().in_game);
    }

    #[test]
    fn reset_all_zeroes_scores_and_preserves_connection() {
        let mut roster = Roster::new();
        roster.join("b-01", "b-01");
        roster.join("b-02", "b-02");
        roster.rename("b-02", "Bob").unwrap();
        roster.apply_score_delta("b-01", 7).unwrap();
        roster.leave("b-01");
        roster.eliminate_silent();

        roster.reset_all();
        let p1 = roster.get("b-01").unwrap();
        let p2 = roster.get("b-02").unwrap();
        assert_eq!(p1.score, 0);
        assert!(p1.in_game);
        assert!(!p1.connected);
        assert_eq!(p2.name, "Bob");
        assert!(p2.connected);
    }
}
