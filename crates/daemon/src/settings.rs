//! Daemon settings
//!
//! Sources, lowest precedence first: built-in defaults, the optional TOML file
//! named by `OHQ_CONFIG`, then `OHQ_*` environment variables
//! (`OHQ_DB_PATH`, `OHQ_RPC_PORT`, `OHQ_STAFF_UIDS=900,901`, ...).

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use ohq_core::domain::{QueueConfig, UserId};
use serde::Deserialize;

const ENV_PREFIX: &str = "OHQ";
const CONFIG_FILE_ENV: &str = "OHQ_CONFIG";

const DEFAULT_DB_PATH: &str = "~/.ohq/queue.db";
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9640;
const DEFAULT_AVG_SERVICE_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    /// Non-persistent; state is lost on shutdown
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub store: StoreKind,
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub enabled: bool,
    pub avg_service_minutes: i64,
    #[serde(default)]
    pub staff_uids: Vec<UserId>,
    pub reconcile_on_startup: bool,
}

impl DaemonConfig {
    /// Load from `OHQ_CONFIG` (if set) and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::from_sources(file.as_deref(), ENV_PREFIX)
    }

    pub fn from_sources(file: Option<&str>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("store", "sqlite")?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("rpc_host", DEFAULT_RPC_HOST)?
            .set_default("rpc_port", i64::from(DEFAULT_RPC_PORT))?
            .set_default("enabled", true)?
            .set_default("avg_service_minutes", DEFAULT_AVG_SERVICE_MINUTES)?
            .set_default("reconcile_on_startup", true)?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config: DaemonConfig = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("staff_uids"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.avg_service_minutes < 0 {
            anyhow::bail!(
                "avg_service_minutes must not be negative (got {})",
                self.avg_service_minutes
            );
        }
        if let Some(uid) = self.staff_uids.iter().find(|uid| **uid <= 0) {
            anyhow::bail!("staff_uids must be positive user ids (got {})", uid);
        }
        Ok(())
    }

    /// `db_path` with `~` expanded
    pub fn expanded_db_path(&self) -> String {
        shellexpand::tilde(&self.db_path).into_owned()
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.enabled, self.avg_service_minutes * 60 * 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Prefix no test process sets, so only defaults and files apply
    const UNUSED_PREFIX: &str = "OHQ_CONFIG_TEST_UNSET";

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::from_sources(None, UNUSED_PREFIX).unwrap();
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.rpc_host, "127.0.0.1");
        assert_eq!(config.rpc_port, 9640);
        assert!(config.enabled);
        assert!(config.reconcile_on_startup);
        assert!(config.staff_uids.is_empty());
        assert_eq!(config.queue_config().avg_service_ms, 600_000);
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("ohq_config_{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "store = \"memory\"\nrpc_port = 9700\nenabled = false\navg_service_minutes = 5\nstaff_uids = [900, 901]"
        )
        .unwrap();

        let config = DaemonConfig::from_sources(path.to_str(), UNUSED_PREFIX).unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.rpc_port, 9700);
        assert_eq!(config.staff_uids, vec![900, 901]);

        let queue = config.queue_config();
        assert!(!queue.enabled);
        assert_eq!(queue.avg_service_ms, 300_000);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rejects_bad_staff_uid() {
        let path = std::env::temp_dir().join(format!("ohq_bad_staff_{}.toml", std::process::id()));
        std::fs::write(&path, "staff_uids = [0]\n").unwrap();

        assert!(DaemonConfig::from_sources(path.to_str(), UNUSED_PREFIX).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DaemonConfig::from_sources(Some("/nonexistent/ohq.toml"), UNUSED_PREFIX).is_err());
    }
}
