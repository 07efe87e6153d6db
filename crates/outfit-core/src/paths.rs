use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const APP_DIR: &str = "outfit";
pub const CONFIG_FILE: &str = "config.yaml";
/// Fixed name of the persisted bearer token.
pub const TOKEN_FILE: &str = "auth_token";

pub const STATE_DIR_ENV: &str = "OUTFIT_STATE_DIR";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Default config file: `<config dir>/outfit/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Resolve the directory holding persisted client state.
///
/// Priority:
/// 1. `OUTFIT_STATE_DIR`
/// 2. `<data dir>/outfit`
/// 3. `~/.outfit`
pub fn default_state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    if let Some(data) = dirs::data_dir() {
        return Ok(data.join(APP_DIR));
    }
    dirs::home_dir()
        .map(|h| h.join(format!(".{APP_DIR}")))
        .ok_or(CoreError::StateDirNotFound)
}

pub fn token_path(state_dir: &Path) -> PathBuf {
    state_dir.join(TOKEN_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_path_uses_fixed_name() {
        let p = token_path(Path::new("/tmp/outfit"));
        assert_eq!(p, PathBuf::from("/tmp/outfit/auth_token"));
    }

    #[test]
    fn default_config_path_ends_with_config_yaml() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("outfit/config.yaml"));
        }
    }
}
