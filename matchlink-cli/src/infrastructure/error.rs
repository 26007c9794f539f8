use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid player: {0}")]
    Player(#[from] matchlink_core::PlayerError),

    #[error("P2P error: {0}")]
    P2P(#[from] matchlink_p2p::P2PError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Rosters diverged: {0}")]
    RosterDivergence(String),
}

impl CliError {
    pub fn config_not_found(path: PathBuf) -> Self {
        CliError::ConfigFileNotFound { path }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
