//! Runtime tunables for the command-line front end.
//!
//! Client behaviour comes from [`ClientConfig::from_env`]; this module adds
//! the values only the binary cares about and folds command-line flags on top.
//! Every value has a compile-time default and an environment override.

use std::path::PathBuf;

use chess_client::ClientConfig;

/// Default directory for the daily rolling log file.
const DEFAULT_LOG_DIR: &str = "logs";

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "chesstty";

/// Get the directory log files are written to.
///
/// Priority:
/// 1. `CHESSTTY_LOG_DIR` env variable if set
/// 2. `logs` relative to the working directory as fallback
pub fn get_log_dir() -> PathBuf {
    if let Ok(path) = std::env::var("CHESSTTY_LOG_DIR") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_LOG_DIR)
}

/// Overrides given on the command line. `None` keeps the environment value.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub server: Option<String>,
    pub max_retries: Option<u32>,
    pub data_dir: Option<PathBuf>,
    pub no_resume: bool,
    pub auto_rotate: bool,
}

/// Build the client configuration: defaults, then environment, then flags.
///
/// Resuming needs a place for the resume file, so a missing data directory
/// falls back to the per-user default unless `no_resume` is set.
pub fn client_config(overrides: &Overrides) -> ClientConfig {
    let mut config = ClientConfig::from_env().with_auto_rotate(overrides.auto_rotate);
    if let Some(server) = &overrides.server {
        config = config.with_server_addr(server.clone());
    }
    if let Some(max) = overrides.max_retries {
        config.retry.max_attempts = max.max(1);
    }
    let data_dir = if overrides.no_resume {
        None
    } else {
        overrides
            .data_dir
            .clone()
            .or(config.data_dir.take())
            .or_else(|| Some(chess_client::config::default_data_dir()))
    };
    config.with_data_dir(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() {
        let path = get_log_dir();
        match std::env::var("CHESSTTY_LOG_DIR") {
            Ok(val) => assert_eq!(path, PathBuf::from(val)),
            Err(_) => assert_eq!(path, PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }

    #[test]
    fn test_flags_override_environment() {
        let config = client_config(&Overrides {
            server: Some("10.0.0.2:9000".into()),
            max_retries: Some(0),
            data_dir: Some(PathBuf::from("/tmp/chesstty-test")),
            no_resume: false,
            auto_rotate: true,
        });
        assert_eq!(config.server_addr, "10.0.0.2:9000");
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/chesstty-test")));
        assert!(config.auto_rotate);
    }

    #[test]
    fn test_no_resume_drops_data_dir() {
        let config = client_config(&Overrides {
            data_dir: Some(PathBuf::from("/tmp/x")),
            no_resume: true,
            ..Overrides::default()
        });
        assert_eq!(config.data_dir, None);
    }
}
