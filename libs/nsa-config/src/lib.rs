//! Agent configuration (spec §6): recognized keys, loaded from a TOML
//! file with `NSA_`-prefixed environment variable overrides.

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,

    pub network_name: String,
    pub nrm_map_file: PathBuf,

    pub database: String,
    #[serde(default)]
    pub database_user: Option<String>,
    #[serde(default)]
    pub database_password: Option<String>,

    #[serde(default)]
    pub peers: Vec<String>,

    pub backend: BackendConfig,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_fetcher_poll_interval_secs")]
    pub fetcher_poll_interval_secs: u64,

    #[serde(default = "default_reserve_hold_timeout_secs")]
    pub reserve_hold_timeout_secs: u64,
}

/// The chosen connection manager plus its manager-specific keys (spec
/// §4.6's Connection Manager is pluggable; only the identity of the
/// implementation and a free-form settings bag are the core's concern).
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub manager_type: String,
    #[serde(default)]
    pub settings: std::collections::HashMap<String, String>,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("./nsa-agent.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fetcher_poll_interval_secs() -> u64 {
    300
}

fn default_reserve_hold_timeout_secs() -> u64 {
    600
}

impl AgentConfig {
    /// Loads from `base_path` (default `config/nsa-agent.toml`) with
    /// `NSA_`-prefixed environment variables taking precedence, mirroring
    /// the teacher's `ServiceConfig::load`.
    pub fn load(base_path: Option<&Path>) -> Result<Self> {
        let base = base_path.unwrap_or_else(|| Path::new("config/nsa-agent.toml"));

        let builder = Config::builder()
            .add_source(File::from(base).required(true))
            .add_source(Environment::with_prefix("NSA").separator("_").try_parsing(true));

        let config = builder.build().context("failed to build agent configuration")?;
        let agent_config: AgentConfig = config.try_deserialize().context("failed to deserialize agent configuration")?;

        tracing::info!(
            network_name = %agent_config.network_name,
            host = %agent_config.host,
            port = agent_config.port,
            "loaded agent configuration"
        );

        Ok(agent_config)
    }

    pub fn nsa_urn(&self) -> String {
        nsa_types::nsa_urn(&self.network_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_toml() -> &'static str {
        r#"
host = "0.0.0.0"
port = 9080
network_name = "example"
nrm_map_file = "/etc/nsa/topology.json"
database = "postgres://localhost/nsa"
peers = ["https://peer-a.example/discovery", "https://peer-b.example/discovery"]

[backend]
type = "dud"
"#
    }

    #[test]
    fn loads_required_keys_and_applies_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nsa-agent.toml");
        fs::write(&path, sample_toml()).unwrap();

        let config = AgentConfig::load(Some(&path)).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9080);
        assert_eq!(config.network_name, "example");
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.backend.manager_type, "dud");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reserve_hold_timeout_secs, 600);
        assert!(!config.tls);
    }

    #[test]
    fn nsa_urn_uses_canonical_form() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nsa-agent.toml");
        fs::write(&path, sample_toml()).unwrap();

        let config = AgentConfig::load(Some(&path)).unwrap();
        assert_eq!(config.nsa_urn(), "urn:ogf:network:example:nsa");
    }

    #[test]
    fn env_override_takes_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nsa-agent.toml");
        fs::write(&path, sample_toml()).unwrap();

        std::env::set_var("NSA_PORT", "7000");
        let config = AgentConfig::load(Some(&path)).unwrap();
        std::env::remove_var("NSA_PORT");

        assert_eq!(config.port, 7000);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nsa-agent.toml");
        fs::write(&path, "host = \"0.0.0.0\"\n").unwrap();

        assert!(AgentConfig::load(Some(&path)).is_err());
    }
}
