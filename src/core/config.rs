use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

fn default_returns_field() -> String {
    "returns".to_string()
}

/// Names of the store collections each fetcher is bound to.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectionsConfig {
    pub quote: String,
    pub cax: String,
    pub shares: String,
    pub consensus: String,
    pub misc: String,
    pub minute: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        CollectionsConfig {
            quote: "quote".to_string(),
            cax: "cax".to_string(),
            shares: "shares".to_string(),
            consensus: "zyconsensus".to_string(),
            misc: "misc".to_string(),
            minute: "ts_5min".to_string(),
        }
    }
}

/// The role a configured collection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Quote,
    Cax,
    Shares,
    Consensus,
    Misc,
    Minute,
}

impl CollectionsConfig {
    /// Configured collections with their roles.
    pub fn entries(&self) -> [(CollectionKind, &str); 6] {
        [
            (CollectionKind::Quote, self.quote.as_str()),
            (CollectionKind::Cax, self.cax.as_str()),
            (CollectionKind::Shares, self.shares.as_str()),
            (CollectionKind::Consensus, self.consensus.as_str()),
            (CollectionKind::Misc, self.misc.as_str()),
            (CollectionKind::Minute, self.minute.as_str()),
        ]
    }

    /// Role of the collection named `name`, if it is configured.
    pub fn kind(&self, name: &str) -> Option<CollectionKind> {
        self.entries()
            .into_iter()
            .find(|(_, configured)| *configured == name)
            .map(|(kind, _)| kind)
    }
}

/// Option defaults applied when the command line doesn't set them.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FetchDefaults {
    pub reindex: bool,
    pub datetime_index: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub data_path: Option<String>,
    #[serde(default)]
    pub collections: CollectionsConfig,
    /// Stored single-day return field that `returnsN` compounds.
    #[serde(default = "default_returns_field")]
    pub returns_field: String,
    #[serde(default)]
    pub defaults: FetchDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_path: None,
            collections: CollectionsConfig::default(),
            returns_field: default_returns_field(),
            defaults: FetchDefaults::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "foresee", "orca")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("com", "foresee", "orca")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("store"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
data_path: "/var/lib/orca"
collections:
  quote: "quote_v2"
  minute: "ts_1min"
returns_field: "log_returns"
defaults:
  reindex: true
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.data_path.as_deref(), Some("/var/lib/orca"));
        assert_eq!(config.collections.quote, "quote_v2");
        assert_eq!(config.collections.minute, "ts_1min");
        // Unspecified collections keep their defaults
        assert_eq!(config.collections.cax, "cax");
        assert_eq!(config.collections.consensus, "zyconsensus");
        assert_eq!(config.returns_field, "log_returns");
        assert!(config.defaults.reindex);
        assert!(!config.defaults.datetime_index);
        assert_eq!(
            config.data_path().unwrap(),
            PathBuf::from("/var/lib/orca")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.data_path.is_none());
        assert_eq!(config.collections, CollectionsConfig::default());
        assert_eq!(config.returns_field, "returns");
        assert_eq!(config.defaults, FetchDefaults::default());
    }

    #[test]
    fn test_collection_kind_follows_configured_names() {
        let yaml_str = r#"
collections:
  shares: "shares_v2"
  consensus: "consensus_daily"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        let names = &config.collections;
        assert_eq!(names.kind("shares_v2"), Some(CollectionKind::Shares));
        assert_eq!(names.kind("consensus_daily"), Some(CollectionKind::Consensus));
        assert_eq!(names.kind("shares"), None);
        assert_eq!(names.kind("zyconsensus"), None);
        assert_eq!(names.kind("ts_5min"), Some(CollectionKind::Minute));
    }
}
