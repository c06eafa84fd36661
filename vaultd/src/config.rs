//! TOML on-disk configuration, deserialized with `serde` and converted into
//! the `collaborators::Config` shape the orchestrator's reload paths expect.

use collaborators::{
    Config, FilterConfig, RetentionActionConfig, RetentionPolicyConfig, RouteConfig, RouteDestination, VaultConfig,
};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
}

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub filters: Vec<FileFilter>,
    #[serde(default)]
    pub routes: Vec<FileRoute>,
    #[serde(default)]
    pub vaults: Vec<FileVault>,
    pub ingest_channel_size: Option<usize>,
    pub scheduler_concurrency: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct FileFilter {
    pub id: Uuid,
    pub expr: String,
}

#[derive(Debug, Deserialize)]
pub struct FileRoute {
    pub id: Uuid,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub filter_id: Option<Uuid>,
    #[serde(default)]
    pub destinations: Vec<FileDestination>,
}

#[derive(Debug, Deserialize)]
pub struct FileDestination {
    pub vault_id: Uuid,
    #[serde(default)]
    pub node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileVault {
    pub id: Uuid,
    pub name: String,
    pub filter_id: Option<Uuid>,
    pub rotation_cron: Option<String>,
    /// Rotation record-count threshold for the workspace's in-memory
    /// collaborator; a real `ChunkManager` would read this from its own
    /// storage-specific configuration instead.
    pub rotation_record_limit: Option<u64>,
    #[serde(default)]
    pub retention: Vec<FileRetentionRule>,
}

#[derive(Debug, Deserialize)]
pub struct FileRetentionRule {
    pub older_than: String,
    pub action: FileRetentionAction,
    pub destination: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRetentionAction {
    Expire,
    Migrate,
}

fn default_true() -> bool {
    true
}

pub fn load(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

impl From<FileConfig> for Config {
    fn from(file: FileConfig) -> Self {
        Config {
            filters: file
                .filters
                .into_iter()
                .map(|f| FilterConfig { id: f.id, expr: f.expr })
                .collect(),
            routes: file
                .routes
                .into_iter()
                .map(|r| RouteConfig {
                    id: r.id,
                    enabled: r.enabled,
                    filter_id: r.filter_id,
                    destinations: r
                        .destinations
                        .into_iter()
                        .map(|d| RouteDestination {
                            vault_id: d.vault_id,
                            node_id: d.node_id,
                        })
                        .collect(),
                })
                .collect(),
            vaults: file
                .vaults
                .into_iter()
                .map(|v| VaultConfig {
                    id: v.id,
                    name: v.name,
                    filter_id: v.filter_id,
                    rotation_cron: v.rotation_cron,
                    retention: v
                        .retention
                        .into_iter()
                        .map(|r| RetentionPolicyConfig {
                            older_than: r.older_than,
                            action: match r.action {
                                FileRetentionAction::Expire => RetentionActionConfig::Expire,
                                FileRetentionAction::Migrate => RetentionActionConfig::Migrate {
                                    destination: r.destination.expect("migrate rule must name a destination"),
                                },
                            },
                        })
                        .collect(),
                })
                .collect(),
            ingest_channel_size: file.ingest_channel_size,
            scheduler_concurrency: file.scheduler_concurrency,
        }
    }
}
