//! User configuration (`~/.config/fwsync/config.toml`).
//!
//! ```toml
//! [connection]
//! endpoint = "https://nsxmanager.example.com"
//! username = "admin"
//! password = "secret"
//! insecure = false
//! timeout_secs = 30
//!
//! [engine]
//! poll_attempts = 3
//! poll_interval_ms = 0
//! policy_revision = "double"
//!
//! [state]
//! path = "~/.local/state/fwsync/state.toml"
//! ```

use anyhow::{Context, Result, bail};
use nsxkit::HttpOptions;
use reconcile::{EngineOptions, PollOptions, RevisionPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub engine: EngineConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub insecure: bool,
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            username: None,
            password: None,
            insecure: false,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub policy_revision: RevisionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 3,
            poll_interval_ms: 0,
            policy_revision: RevisionPolicy::Double,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (paths::config_file()?, false),
        };

        if !path.exists() {
            if explicit {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Command line and environment win over the file.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if overrides.endpoint.is_some() {
            self.connection.endpoint = overrides.endpoint;
        }
        if overrides.username.is_some() {
            self.connection.username = overrides.username;
        }
        if overrides.password.is_some() {
            self.connection.password = overrides.password;
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            poll: PollOptions {
                attempts: self.engine.poll_attempts,
                interval: Duration::from_millis(self.engine.poll_interval_ms),
            },
            policy_revision: self.engine.policy_revision,
        }
    }

    pub fn http_options(&self) -> Result<HttpOptions> {
        let connection = &self.connection;
        let endpoint = connection
            .endpoint
            .clone()
            .context("No manager endpoint configured (set connection.endpoint or FWSYNC_ENDPOINT)")?;
        let username = connection
            .username
            .clone()
            .context("No username configured (set connection.username or FWSYNC_USERNAME)")?;
        Ok(HttpOptions {
            endpoint,
            username,
            password: connection.password.clone().unwrap_or_default(),
            insecure: connection.insecure,
            timeout: Duration::from_secs(connection.timeout_secs),
        })
    }

    /// Where applied state is kept.
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state.path {
            Some(path) => Ok(paths::expand(path)),
            None => paths::state_file(),
        }
    }

    /// This configuration as TOML with the password masked.
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.connection.password.is_some() {
            shown.connection.password = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        let options = config.engine_options();
        assert_eq!(options.poll.attempts, 3);
        assert_eq!(options.poll.interval, Duration::ZERO);
        assert_eq!(options.policy_revision, RevisionPolicy::Double);
        assert_eq!(config.connection.timeout_secs, 30);
    }

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
            [connection]
            endpoint = "https://nsx.example.com"
            username = "admin"
            password = "pw"
            insecure = true
            timeout_secs = 5

            [engine]
            poll_attempts = 10
            poll_interval_ms = 250
            policy_revision = "increment"

            [state]
            path = "/tmp/fwsync-state.toml"
            "#,
        )
        .unwrap();

        let http = config.http_options().unwrap();
        assert_eq!(http.endpoint, "https://nsx.example.com");
        assert!(http.insecure);
        assert_eq!(http.timeout, Duration::from_secs(5));

        let engine = config.engine_options();
        assert_eq!(engine.poll.attempts, 10);
        assert_eq!(engine.poll.interval, Duration::from_millis(250));
        assert_eq!(engine.policy_revision, RevisionPolicy::Increment);
        assert_eq!(config.state_path().unwrap(), PathBuf::from("/tmp/fwsync-state.toml"));
    }

    #[test]
    fn test_unknown_keys_and_policies_rejected() {
        assert!(Config::parse("[engine]\npoll_atempts = 3\n").is_err());
        assert!(Config::parse("[engine]\npolicy_revision = \"triple\"\n").is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::parse("[connection]\nendpoint = \"https://a\"\nusername = \"u\"\n").unwrap();
        config.apply_overrides(Overrides {
            endpoint: Some("https://b".into()),
            username: None,
            password: Some("pw".into()),
        });
        assert_eq!(config.connection.endpoint.as_deref(), Some("https://b"));
        assert_eq!(config.connection.username.as_deref(), Some("u"));
        assert_eq!(config.connection.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_missing_endpoint_is_an_error() {
        let err = Config::default().http_options().unwrap_err();
        assert!(err.to_string().contains("FWSYNC_ENDPOINT"));
    }

    #[test]
    fn test_display_masks_password() {
        let mut config = Config::default();
        config.connection.password = Some("hunter2".into());
        let shown = config.to_display_toml().unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\npoll_attempts = 1").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.poll_attempts, 1);

        let missing = file.path().with_extension("missing");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
