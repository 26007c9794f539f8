use crate::infrastructure::error::{CliError, Result};
use matchlink_p2p::SessionConfig;
use std::path::Path;
use tracing::info;

/// Read a `SessionConfig` from JSON; missing fields keep their defaults
pub fn load_session_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    if !path.exists() {
        return Err(CliError::config_not_found(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path)?;
    let config: SessionConfig = serde_json::from_str(&raw)?;
    validate(&config)?;

    info!("⚙️  Loaded session config from {}", path.display());
    Ok(config)
}

pub fn validate(config: &SessionConfig) -> Result<()> {
    if config.sequence_window == 0 {
        return Err(CliError::InvalidConfig(
            "sequence_window must be at least 1".to_string(),
        ));
    }
    if config.sequence_history == 0 {
        return Err(CliError::InvalidConfig(
            "sequence_history must be at least 1".to_string(),
        ));
    }
    if config.event_passes == 0 {
        return Err(CliError::InvalidConfig(
            "event_passes must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("matchlink-{}-{}.json", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_no_path_gives_defaults() {
        let config = load_session_config(None).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let path = temp_file("partial", r#"{ "ping_interval_ms": 250 }"#);
        let config = load_session_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.ping_interval_ms, 250);
        assert_eq!(config.sequence_window, SessionConfig::default().sequence_window);
    }

    #[test]
    fn test_missing_file() {
        let result = load_session_config(Some(Path::new("/definitely/not/here.json")));
        assert!(matches!(result, Err(CliError::ConfigFileNotFound { .. })));
    }

    #[test]
    fn test_zero_window_rejected() {
        let path = temp_file("zero-window", r#"{ "sequence_window": 0 }"#);
        let result = load_session_config(Some(&path));
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(CliError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json() {
        let path = temp_file("malformed", "{ not json");
        let result = load_session_config(Some(&path));
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(CliError::Json(_))));
    }
}
