use serde::{Deserialize, Deserializer, Serialize};

/// Top-level session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    Running,
    Paused,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "LOBBY"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// A player block in the session roster.
///
/// `block_id` is assigned by the device at first connection and never changes;
/// `reported`/`successful` are per-round flags cleared when a new round starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub block_id: String,
    pub name: String,
    pub score: i64,
    pub in_game: bool,
    pub connected: bool,
    pub reported: bool,
    pub successful: bool,
}

/// Round timing settings, fixed for the lifetime of one started game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CadenceConfig {
    pub round0_ms: u64,
    pub decay_ms: u64,
    pub min_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            round0_ms: 2500,
            decay_ms: 150,
            min_ms: 800,
        }
    }
}

/// Server configuration loaded from game.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default)]
    pub defaults: CadenceConfig,
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            defaults: CadenceConfig::default(),
            commands: default_commands(),
        }
    }
}

pub fn default_commands() -> Vec<String> {
    ["SHAKE", "MINE", "PLACE"].map(String::from).to_vec()
}

/// Errors from player and session actions. All of these are handled locally:
/// they degrade to a no-op and a warning, never a dropped connection.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("no player with block id {0}")]
    NotFound(String),
    #[error("action not allowed in phase {0}")]
    InvalidState(Phase),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Messages sent from clients to the server via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMsg {
    /// An observer (web console) identifying itself.
    #[serde(rename_all = "camelCase")]
    WebHello {
        #[serde(default)]
        client_type: Option<String>,
    },
    /// A player device identifying itself with its stable block id.
    #[serde(rename_all = "camelCase")]
    BlockHello { block_id: String },
    /// A player device reporting the outcome of the active round.
    Report { success: bool },
    /// An administrative intent from the console.
    Admin(AdminAction),
}

/// Administrative actions, tagged by the `action` field inside an
/// `{type:"admin"}` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AdminAction {
    #[serde(rename_all = "camelCase")]
    Start {
        #[serde(default, deserialize_with = "lenient_ms")]
        round0_ms: Option<u64>,
        #[serde(default, deserialize_with = "lenient_ms")]
        decay_ms: Option<u64>,
        #[serde(default, deserialize_with = "lenient_ms")]
        min_ms: Option<u64>,
    },
    Pause,
    Resume,
    Reset,
    #[serde(rename_all = "camelCase")]
    Rename { block_id: String, name: String },
}

/// Accepts anything in a millisecond field and keeps only positive numbers,
/// so a console sending junk falls back to defaults instead of losing the
/// whole `start`.
fn lenient_ms<'de, D>(de: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(de)?;
    Ok(value
        .as_f64()
        .filter(|ms| ms.is_finite() && *ms >= 1.0)
        .map(|ms| ms as u64))
}

/// Messages sent from the server to clients via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMsg {
    /// Full state snapshot, broadcast to every observer on every change.
    #[serde(rename_all = "camelCase")]
    State {
        phase: Phase,
        round: u32,
        current_cmd: String,
        players: Vec<Player>,
    },
    /// Per-round command notification, sent only to in-game blocks.
    #[serde(rename_all = "camelCase")]
    Round { round: u32, cmd: String, window_ms: u64 },
}
