use crate::error::{CoreError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ReconnectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on one WebSocket handshake; a stalled attempt counts as failed.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// SocialConfig
// ---------------------------------------------------------------------------

/// OAuth client identifiers for social sign-in. An empty id disables the
/// provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialConfig {
    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub apple_client_id: String,
    #[serde(default)]
    pub facebook_app_id: String,
    /// Origin the provider redirects back to, e.g. `https://app.example.com`.
    #[serde(default = "default_redirect_base")]
    pub redirect_base: String,
}

fn default_redirect_base() -> String {
    "http://localhost:5173".to_string()
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub social: SocialConfig,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            timeout_secs: default_timeout_secs(),
            state_dir: None,
            reconnect: ReconnectConfig::default(),
            social: SocialConfig {
                redirect_base: default_redirect_base(),
                ..SocialConfig::default()
            },
        }
    }
}

impl Config {
    /// Resolve the effective configuration.
    ///
    /// Priority (later wins):
    /// 1. Built-in localhost defaults
    /// 2. YAML file at `explicit`, or the default config path if it exists
    /// 3. `OUTFIT_*` environment variables
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::load(path)?,
            None => match paths::default_config_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        cfg.apply_env_from(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Overlay environment values. `lookup` abstracts `std::env::var` so the
    /// overlay can be exercised without touching the process environment.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OUTFIT_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("OUTFIT_WS_URL") {
            self.ws_url = v;
        }
        if let Some(v) = get("OUTFIT_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %v, "ignoring non-numeric OUTFIT_TIMEOUT_SECS"),
            }
        }
        if let Some(v) = get(paths::STATE_DIR_ENV) {
            self.state_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("OUTFIT_GOOGLE_CLIENT_ID") {
            self.social.google_client_id = v;
        }
        if let Some(v) = get("OUTFIT_APPLE_CLIENT_ID") {
            self.social.apple_client_id = v;
        }
        if let Some(v) = get("OUTFIT_FACEBOOK_APP_ID") {
            self.social.facebook_app_id = v;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory for the persisted token: explicit setting or platform default.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_state_dir(),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("api_url '{}' must start with http:// or https://", self.api_url),
            });
        }

        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("ws_url '{}' must start with ws:// or wss://", self.ws_url),
            });
        }

        if self.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "timeout_secs is 0; every request will time out".to_string(),
            });
        }

        if self.reconnect.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "reconnect.max_attempts is 0; the live channel will never reconnect"
                    .to_string(),
            });
        }

        if self.reconnect.connect_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "reconnect.connect_timeout_ms is 0; no live connection can open"
                    .to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_fall_back_to_localhost() {
        let cfg = Config::default();
        assert_eq!(cfg.api_url, "http://localhost:3000/api");
        assert_eq!(cfg.ws_url, "ws://localhost:3000/ws");
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.reconnect.max_attempts, 5);
        assert_eq!(cfg.reconnect.base_delay(), Duration::from_secs(1));
        assert_eq!(cfg.reconnect.connect_timeout(), Duration::from_secs(10));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str("api_url: https://api.example.com\n").unwrap();
        assert_eq!(cfg.api_url, "https://api.example.com");
        assert_eq!(cfg.ws_url, "ws://localhost:3000/ws");
        assert_eq!(cfg.timeout_secs, 10);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut cfg = Config::default();
        cfg.timeout_secs = 3;
        cfg.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("OUTFIT_API_URL", "https://prod.example.com/api"),
            ("OUTFIT_TIMEOUT_SECS", "25"),
            ("OUTFIT_STATE_DIR", "/var/lib/outfit"),
            ("OUTFIT_WS_URL", "   "),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api_url, "https://prod.example.com/api");
        assert_eq!(cfg.timeout_secs, 25);
        assert_eq!(cfg.state_dir, Some(PathBuf::from("/var/lib/outfit")));
        // Blank values are ignored.
        assert_eq!(cfg.ws_url, "ws://localhost:3000/ws");
    }

    #[test]
    fn bad_timeout_env_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_env_from(|k| (k == "OUTFIT_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(cfg.timeout_secs, 10);
    }

    #[test]
    fn validate_flags_bad_schemes() {
        let cfg = Config {
            api_url: "ftp://x".into(),
            ws_url: "http://x".into(),
            timeout_secs: 0,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert_eq!(
            warnings.iter().filter(|w| w.level == WarnLevel::Error).count(),
            2
        );
    }

    #[test]
    fn explicit_state_dir_wins() {
        let cfg = Config {
            state_dir: Some(PathBuf::from("/tmp/state")),
            ..Config::default()
        };
        assert_eq!(cfg.state_dir().unwrap(), PathBuf::from("/tmp/state"));
    }
}
