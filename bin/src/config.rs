//! CLI configuration.
//!
//! Settings are layered, lowest precedence first: built-in defaults, the JSON
//! config file, `TICKWIRE_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tickwire_lib::prelude::*;

/// Environment variable overriding the domain.
pub(crate) const ENV_DOMAIN: &str = "TICKWIRE_DOMAIN";
/// Environment variable overriding the access token.
pub(crate) const ENV_ACCESS_TOKEN: &str = "TICKWIRE_ACCESS_TOKEN";
/// Environment variable overriding the account id.
pub(crate) const ENV_ACCOUNT_ID: &str = "TICKWIRE_ACCOUNT_ID";

/// Effective CLI settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// API environment.
    pub(crate) domain: Domain,
    /// Bearer token for practice and live domains.
    pub(crate) access_token: Option<String>,
    /// Default account for price streams.
    pub(crate) account_id: Option<String>,
    /// Dispatch heartbeats to the output.
    pub(crate) emit_heartbeats: bool,
    /// Connection establishment timeout.
    pub(crate) connect_timeout_secs: Option<u64>,
    /// Idle read timeout.
    pub(crate) read_timeout_secs: Option<u64>,
}

impl Config {
    /// Returns the platform config file location.
    ///
    /// - Linux: `~/.config/tickwire/config.json`
    /// - macOS: `~/Library/Application Support/tickwire/config.json`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\tickwire\config\config.json`
    pub(crate) fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tickwire").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads the config file.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// read if present and built-in defaults are used otherwise.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Applies `TICKWIRE_*` overrides read through `lookup`.
    pub(crate) fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(domain) = lookup(ENV_DOMAIN) {
            self.domain = domain
                .parse()
                .with_context(|| format!("Invalid {ENV_DOMAIN}"))?;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(account) = lookup(ENV_ACCOUNT_ID) {
            self.account_id = Some(account);
        }
        Ok(())
    }

    /// Returns the validated client identity.
    pub(crate) fn client(&self) -> Result<Client> {
        let client = Client::new(self.domain, self.access_token.clone());
        client
            .validate()
            .with_context(|| format!("Cannot connect to the {} domain", self.domain))?;
        Ok(client)
    }

    /// Returns the transport settings.
    pub(crate) fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            connect_timeout: self
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            read_timeout: self
                .read_timeout_secs
                .map_or(defaults.read_timeout, Duration::from_secs),
            ..defaults
        }
    }
}
