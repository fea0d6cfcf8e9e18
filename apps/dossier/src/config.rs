//! # Application Configuration
//!
//! `dossier.toml` holds the engine and server settings:
//!
//! ```toml
//! [engine]
//! chain_window_days = 14
//! enabled_kinds = ["reply", "chain", "context", "case_sequence"]
//! context_slack_days = 0
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! cors_origins = ["http://localhost:3000"]
//! writes_per_minute = 30
//! ```
//!
//! Priority: CLI flags > config file > defaults. The write key is a secret
//! and only read from the environment, see [`crate::api::API_KEY_ENV`].

use dossier_core::{DossierError, EdgeKind, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "dossier.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API, `["*"]` for any.
    pub cors_origins: Vec<String>,
    /// Loads, recomputations and exports accepted per minute. 0 disables
    /// the throttle.
    pub writes_per_minute: u32,
}

/// Default write budget. A recompute over a large archive takes seconds.
const DEFAULT_WRITES_PER_MINUTE: u32 = 30;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: ["localhost", "127.0.0.1"]
                .iter()
                .flat_map(|host| [3000, 8080].map(|port| format!("http://{}:{}", host, port)))
                .collect(),
            writes_per_minute: DEFAULT_WRITES_PER_MINUTE,
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, DossierError> {
        toml::from_str(text).map_err(|e| DossierError::InvalidConfig(e.to_string()))
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, DossierError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            DossierError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(DossierError::InvalidConfig(format!(
                "config file exceeds {} bytes",
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| DossierError::IoError(format!("Read config: {}", e)))?;
        Self::from_toml(&text)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicitly named file must exist. Without one, `dossier.toml` in
    /// the working directory is used when present, defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DossierError> {
        match explicit {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::from_file(path)
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    tracing::info!("Loading configuration from {:?}", default_path);
                    Self::from_file(default_path)
                } else {
                    tracing::debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply command-line overrides. `None` keeps the file value.
    #[must_use]
    pub fn with_overrides(mut self, window: Option<u32>, kinds: Option<Vec<EdgeKind>>) -> Self {
        if let Some(days) = window {
            self.engine.chain_window_days = days;
        }
        if let Some(kinds) = kinds {
            self.engine.enabled_kinds = kinds.into_iter().collect();
        }
        self
    }

    /// Reject invalid settings before any work starts.
    pub fn validate(&self) -> Result<(), DossierError> {
        self.engine.validate()?;
        if self.server.host.trim().is_empty() {
            return Err(DossierError::InvalidConfig(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.cors_origins.iter().any(|o| o.trim().is_empty()) {
            return Err(DossierError::InvalidConfig(
                "server.cors_origins must not contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of edge kinds, e.g. `chain,reply`.
pub fn parse_kinds(list: &str) -> Result<Vec<EdgeKind>, DossierError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.engine.chain_window_days, 14);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [engine]
            chain_window_days = 30
            enabled_kinds = ["chain"]

            [server]
            port = 9000
            "#,
        )
        .expect("parse");
        assert_eq!(config.engine.chain_window_days, 30);
        assert!(config.engine.is_enabled(EdgeKind::Chain));
        assert!(!config.engine.is_enabled(EdgeKind::Reply));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result = AppConfig::from_toml("[engine]\nwindow = 3\n");
        assert!(matches!(result, Err(DossierError::InvalidConfig(_))));
    }

    #[test]
    fn overrides_win() {
        let config = AppConfig::default()
            .with_overrides(Some(7), Some(vec![EdgeKind::Reply, EdgeKind::Chain]));
        assert_eq!(config.engine.chain_window_days, 7);
        assert_eq!(config.engine.enabled_kinds.len(), 2);

        let unchanged = AppConfig::default().with_overrides(None, None);
        assert_eq!(unchanged, AppConfig::default());
    }

    #[test]
    fn validate_rejects_bad_window() {
        let config = AppConfig::default().with_overrides(Some(0), None);
        assert!(config.validate().is_err());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn kinds_list() {
        let kinds = parse_kinds("chain, reply").expect("parse");
        assert_eq!(kinds, vec![EdgeKind::Chain, EdgeKind::Reply]);
        assert!(parse_kinds("chain,bogus").is_err());
    }

    #[test]
    fn server_access_settings() {
        let defaults = ServerConfig::default();
        assert_eq!(defaults.writes_per_minute, 30);
        assert!(defaults.cors_origins.contains(&"http://localhost:8080".to_string()));
        assert_eq!(defaults.cors_origins.len(), 4);

        let config = AppConfig::from_toml(
            "[server]\ncors_origins = [\"*\"]\nwrites_per_minute = 0\n",
        )
        .expect("parse");
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.server.writes_per_minute, 0);
        assert!(config.validate().is_ok());

        let blank = AppConfig::from_toml("[server]\ncors_origins = [\" \"]\n").expect("parse");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dossier.toml");
        std::fs::write(&path, "[engine]\ncontext_slack_days = 3\n").expect("write");
        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.engine.context_slack_days, 3);

        let missing = dir.path().join("absent.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }
}
