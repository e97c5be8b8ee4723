//! [GuildConfigStore] backed by a single TOML file.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::instrument;

use super::GuildConfig;
use super::GuildConfigStore;
use crate::error::StoreError;
use crate::serenity::GuildId;

/// Layout of the file on disk, one `[[guild]]` table per guild.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GuildConfigFile {
    #[serde(default, rename = "guild")]
    guilds: Vec<GuildConfig>,
}

/// Keeps every config in memory and rewrites the whole file on each upsert.
#[derive(Debug)]
pub struct TomlStore {
    path: PathBuf,
    configs: RwLock<HashMap<GuildId, GuildConfig>>,
}

impl TomlStore {
    /// Load the store from `path`. A missing file is an empty store.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let configs = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No guild config file yet, starting empty.");
                HashMap::new()
            }
            Err(e) => return Err(StoreError::IoError(e)),
        };

        tracing::info!("Loaded {} guild config(s).", configs.len());

        Ok(Self {
            path,
            configs: RwLock::new(configs),
        })
    }

    /// Write every config to disk. Writes a sibling file first, then renames it over the old one.
    async fn persist(&self, configs: &HashMap<GuildId, GuildConfig>) -> Result<(), StoreError> {
        let mut guilds: Vec<GuildConfig> = configs.values().cloned().collect();
        guilds.sort_by_key(|c| c.guild_id);

        let content = toml::to_string_pretty(&GuildConfigFile { guilds })?;

        let tmp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn parse(content: &str) -> Result<HashMap<GuildId, GuildConfig>, StoreError> {
    let to_toml = toml::Deserializer::new(content);
    let file: GuildConfigFile =
        serde_path_to_error::deserialize(to_toml).map_err(|e| StoreError::Malformed {
            reason: e.to_string(),
        })?;

    // Later duplicates win, keeping one config per guild.
    Ok(file
        .guilds
        .into_iter()
        .map(|config| (config.guild_id, config))
        .collect())
}

#[async_trait]
impl GuildConfigStore for TomlStore {
    async fn find(&self, guild_id: GuildId) -> Result<Option<GuildConfig>, StoreError> {
        Ok(self.configs.read().await.get(&guild_id).cloned())
    }

    #[instrument(skip(self), fields(guild = %config.guild_id))]
    async fn upsert(&self, config: GuildConfig) -> Result<(), StoreError> {
        // Held while writing so concurrent upserts hit the disk in order.
        let mut configs = self.configs.write().await;
        configs.insert(config.guild_id, config);
        self.persist(&configs).await?;
        tracing::debug!("Saved guild config.");
        Ok(())
    }
}
