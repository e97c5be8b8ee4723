//! In-memory [ChannelProvider] for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use super::ChannelInfo;
use super::ChannelProvider;
use super::Overwrite;
use crate::error::ProviderError;
use crate::serenity;
use crate::serenity::{ChannelId, GuildId, Permissions, UserId};

#[derive(Debug, Clone)]
pub struct FakeChannel {
    pub guild: GuildId,
    pub name: String,
    pub parent: Option<ChannelId>,
    pub is_category: bool,
    /// The `@everyone` permission overwrite.
    pub everyone: Overwrite,
}

#[derive(Debug)]
pub struct FakeState {
    next_id: u64,
    pub channels: HashMap<ChannelId, FakeChannel>,
    /// Which channel each connected member is in.
    pub voice: HashMap<UserId, ChannelId>,
    pub created: Vec<ChannelId>,
    pub delete_attempts: usize,
    pub fail_create: bool,
    pub fail_move: bool,
    /// Deletes answer "not found" as if someone else deleted the channel first.
    pub vanish_on_delete: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            next_id: 10_000,
            channels: HashMap::new(),
            voice: HashMap::new(),
            created: Vec::new(),
            delete_attempts: 0,
            fail_create: false,
            fail_move: false,
            vanish_on_delete: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeChannels {
    state: Mutex<FakeState>,
}

impl FakeChannels {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_category(&self, guild: GuildId, id: ChannelId, name: &str) {
        self.insert(guild, id, name, None, true);
    }

    pub fn add_voice(&self, guild: GuildId, id: ChannelId, name: &str, parent: Option<ChannelId>) {
        self.insert(guild, id, name, parent, false);
    }

    fn insert(&self, guild: GuildId, id: ChannelId, name: &str, parent: Option<ChannelId>, is_category: bool) {
        let channel = FakeChannel {
            guild,
            name: name.to_string(),
            parent,
            is_category,
            everyone: Overwrite::default(),
        };
        self.state().channels.insert(id, channel);
    }

    /// Deny `permission` to `@everyone`, like a private category does.
    pub fn deny_everyone(&self, id: ChannelId, permission: Permissions) {
        if let Some(channel) = self.state().channels.get_mut(&id) {
            channel.everyone = channel.everyone.with(permission, false);
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<FakeChannel> {
        self.state().channels.get(&id).cloned()
    }

    /// Simulates a channel being deleted by hand.
    pub fn remove_channel(&self, id: ChannelId) {
        let mut state = self.state();
        state.channels.remove(&id);
        state.voice.retain(|_, channel| *channel != id);
    }

    pub fn connect(&self, user: UserId, channel: ChannelId) {
        self.state().voice.insert(user, channel);
    }

    /// Returns the channel the member was in.
    pub fn disconnect(&self, user: UserId) -> Option<ChannelId> {
        self.state().voice.remove(&user)
    }

    pub fn voice_channel(&self, user: UserId) -> Option<ChannelId> {
        self.state().voice.get(&user).copied()
    }

    pub fn created(&self) -> Vec<ChannelId> {
        self.state().created.clone()
    }

    pub fn delete_attempts(&self) -> usize {
        self.state().delete_attempts
    }
}

fn not_found(what: impl Into<String>) -> ProviderError {
    ProviderError::NotFound { what: what.into() }
}

#[async_trait]
impl ChannelProvider for FakeChannels {
    async fn category_exists(&self, guild: GuildId, category: ChannelId) -> bool {
        self.state()
            .channels
            .get(&category)
            .is_some_and(|c| c.guild == guild && c.is_category)
    }

    async fn create_voice_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
    ) -> Result<ChannelId, ProviderError> {
        let mut state = self.state();
        if state.fail_create {
            return Err(ProviderError::Discord(serenity::Error::Other("create failed")));
        }
        state.next_id += 1;
        let id = ChannelId::new(state.next_id);
        // New channels start with their category's overwrites.
        let everyone = parent
            .and_then(|parent| state.channels.get(&parent))
            .map(|parent| parent.everyone)
            .unwrap_or_default();
        let channel = FakeChannel {
            guild,
            name: name.to_string(),
            parent,
            is_category: false,
            everyone,
        };
        state.channels.insert(id, channel);
        state.created.push(id);
        Ok(id)
    }

    async fn move_member(
        &self,
        _guild: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        if state.fail_move {
            return Err(ProviderError::Discord(serenity::Error::Other("move failed")));
        }
        if !state.voice.contains_key(&user) {
            return Err(not_found("Member voice state"));
        }
        state.voice.insert(user, channel);
        Ok(())
    }

    async fn disconnect_member(&self, _guild: GuildId, user: UserId) -> Result<(), ProviderError> {
        match self.state().voice.remove(&user) {
            Some(_) => Ok(()),
            None => Err(not_found("Member voice state")),
        }
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.delete_attempts += 1;
        if state.vanish_on_delete {
            state.channels.remove(&channel);
            return Err(not_found("Channel"));
        }
        match state.channels.remove(&channel) {
            Some(_) => {
                state.voice.retain(|_, c| *c != channel);
                Ok(())
            }
            None => Err(not_found("Channel")),
        }
    }

    async fn rename_channel(&self, channel: ChannelId, name: &str) -> Result<(), ProviderError> {
        match self.state().channels.get_mut(&channel) {
            Some(c) => {
                c.name = name.to_string();
                Ok(())
            }
            None => Err(not_found("Channel")),
        }
    }

    async fn set_everyone_permission(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        permission: Permissions,
        allowed: bool,
    ) -> Result<(), ProviderError> {
        match self.state().channels.get_mut(&channel) {
            Some(c) => {
                c.everyone = c.everyone.with(permission, allowed);
                Ok(())
            }
            None => Err(not_found("Channel")),
        }
    }

    async fn voice_members(&self, guild: GuildId, channel: ChannelId) -> Option<Vec<UserId>> {
        let state = self.state();
        let exists = state.channels.get(&channel).is_some_and(|c| c.guild == guild);
        exists.then(|| {
            let mut members: Vec<UserId> = state
                .voice
                .iter()
                .filter(|(_, c)| **c == channel)
                .map(|(user, _)| *user)
                .collect();
            members.sort();
            members
        })
    }

    async fn voice_channel_of(&self, _guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.voice_channel(user)
    }

    async fn channel_info(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelInfo> {
        self.state()
            .channels
            .get(&channel)
            .filter(|c| c.guild == guild)
            .map(|c| ChannelInfo {
                name: c.name.clone(),
                parent: c.parent,
            })
    }
}
