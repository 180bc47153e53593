use std::fs;
use std::path::{Path, PathBuf};

use crate::types::GameConfig;

/// Resolves a path relative to the config directory.
fn config_path(sub: &str) -> PathBuf {
    let base = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
    Path::new(&base).join(sub)
}

/// Initialize the config directory with defaults if missing.
pub fn init() {
    let base = config_path("");
    if !base.exists() {
        fs::create_dir_all(&base).expect("Failed to create config directory");
    }

    let game_path = config_path("game.json");
    if !game_path.exists() {
        let defaults = GameConfig::default();
        fs::write(
            &game_path,
            serde_json::to_string_pretty(&defaults).expect("Failed to serialize defaults"),
        )
        .expect("Failed to write default game.json");
    }
}

/// Load the game configuration. A missing or unparsable file falls back to
/// defaults with a logged warning; a misconfigured server should still host
/// a playable game.
pub fn load_game_config() -> GameConfig {
    let path = config_path("game.json");
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}, using defaults", path.display(), e);
            return GameConfig::default();
        }
    };
    match serde_json::from_str(&data) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
            GameConfig::default()
        }
    }
}
