//! nodepool.toml configuration parser.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodepoolConfig {
    /// Directory holding `nodepool.redb`.
    pub data_dir: PathBuf,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub membership: MembershipConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MembershipConfig {
    /// Heartbeat age after which a node counts as gone.
    pub dead_timeout_secs: u64,
}

impl Default for NodepoolConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/nodepool"),
            log_filter: "info,nodepool=debug".to_string(),
            membership: MembershipConfig::default(),
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            dead_timeout_secs: 30,
        }
    }
}

impl NodepoolConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: NodepoolConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("nodepool.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let config: NodepoolConfig = toml::from_str(r#"data_dir = "/tmp/np""#).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/np"));
        assert_eq!(config.membership.dead_timeout_secs, 30);
        assert_eq!(config.log_filter, "info,nodepool=debug");
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
data_dir = "/srv/nodepool"
log_filter = "warn"

[membership]
dead_timeout_secs = 5
"#;
        let config: NodepoolConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.membership.dead_timeout_secs, 5);
        assert_eq!(config.db_path(), PathBuf::from("/srv/nodepool/nodepool.redb"));
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = NodepoolConfig::load(None).unwrap();
        assert_eq!(config, NodepoolConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodepool.toml");
        std::fs::write(&path, "[membership]\ndead_timeout_secs = 12\n").unwrap();

        let config = NodepoolConfig::from_file(&path).unwrap();
        assert_eq!(config.membership.dead_timeout_secs, 12);
        assert!(NodepoolConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
