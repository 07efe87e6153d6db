use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("no state directory available: set OUTFIT_STATE_DIR or HOME")]
    StateDirNotFound,

    #[error("invalid query key segment: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
