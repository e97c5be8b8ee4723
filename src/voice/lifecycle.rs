//! Creation and cleanup of temporary rooms.
//!
//! - Joining a guild's hub channel creates "<name>'s Room" in the configured category
//!   and moves the member into it.
//! - Leaving a room that ends up empty schedules a deletion after a grace period.
//!   The deletion only happens if the room is still empty when the grace period ends.
//! - Arriving in a room with a pending deletion cancels it.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::instrument;

use super::naming;
use super::transition::TransitionKind;
use super::ChannelProvider;
use super::VoiceTransition;
use crate::lib::format_duration;
use crate::serenity::{ChannelId, GuildId, UserId};
use crate::store::GuildConfigStore;

/// Tunables for the room lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// How long an empty room is kept before deleting it.
    pub grace_period: Duration,
    /// Treat untracked channels that look like rooms as rooms.
    /// See [naming::looks_like_room].
    pub adopt_by_name: bool,
    /// Moving out of a room counts as leaving it.
    pub delete_on_move_out: bool,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(3000),
            adopt_by_name: true,
            delete_on_move_out: false,
        }
    }
}

/// A room created by the bot.
#[derive(Debug, Clone)]
pub struct TempRoom {
    pub guild_id: GuildId,
    pub owner: UserId,
    /// Display name of the member the room was created for.
    pub owner_name: String,
    pub parent: Option<ChannelId>,
    /// Members the owner trusts with moderating the room.
    pub coowners: HashSet<UserId>,
    pub created_at: Instant,
}

impl TempRoom {
    /// Whether `user` owns or co-owns this room.
    pub fn is_moderator(&self, user: UserId) -> bool {
        self.owner == user || self.coowners.contains(&user)
    }
}

/// What handling a [VoiceTransition] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The transition isn't one the lifecycle reacts to.
    Ignored,
    /// The guild has no hub configured.
    NotConfigured,
    /// Joined a channel other than the hub.
    NotHub,
    /// A new room was created for the member.
    Created(ChannelId),
    /// The vacated channel isn't a temporary room.
    NotTemporary,
    /// The vacated room still has this many members.
    Occupied(usize),
    /// The vacated room no longer exists.
    Gone,
    DeletionScheduled(ChannelId),
    /// An external call failed, details were logged.
    Failed,
}

/// A deletion check waiting for the grace period to pass.
#[derive(Debug)]
struct PendingDeletion {
    /// Distinguishes this timer from ones that replaced it.
    timer_id: u64,
    handle: JoinHandle<()>,
}

/// Reacts to voice transitions by creating and deleting temporary rooms.
/// Internally uses an [Arc], so it's cheap to clone.
#[derive(Debug, Clone)]
pub struct RoomManager {
    #[allow(clippy::missing_docs_in_private_items)]
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    provider: Arc<dyn ChannelProvider>,
    store: Arc<dyn GuildConfigStore>,
    settings: LifecycleSettings,
    /// Rooms created by this process.
    rooms: Mutex<HashMap<ChannelId, TempRoom>>,
    /// At most one pending deletion per channel.
    pending: Mutex<HashMap<ChannelId, PendingDeletion>>,
    next_timer_id: AtomicU64,
}

impl RoomManager {
    pub fn new(
        provider: Arc<dyn ChannelProvider>,
        store: Arc<dyn GuildConfigStore>,
        settings: LifecycleSettings,
    ) -> Self {
        let inner = Inner {
            provider,
            store,
            settings,
            rooms: Mutex::default(),
            pending: Mutex::default(),
            next_timer_id: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(super) fn provider(&self) -> &dyn ChannelProvider {
        self.inner.provider.as_ref()
    }

    /// React to a member's voice state changing.
    #[instrument(skip_all, fields(guild = %transition.guild_id, member = %transition.member.display_name))]
    pub async fn handle_transition(&self, transition: &VoiceTransition) -> Outcome {
        let kind = transition.kind();

        if let TransitionKind::Join(to) | TransitionKind::Move { to, .. } = kind {
            if self.cancel_deletion(to).await {
                tracing::debug!("Member arrived in {to}, cancelled its pending deletion.");
            }
        }

        let outcome = match kind {
            TransitionKind::Join(channel) => self.handle_join(transition, channel).await,
            TransitionKind::Leave(channel) => self.handle_leave(transition.guild_id, channel).await,
            TransitionKind::Move { from, .. } if self.inner.settings.delete_on_move_out => {
                self.handle_leave(transition.guild_id, from).await
            }
            TransitionKind::Move { .. } | TransitionKind::Stay => Outcome::Ignored,
        };

        tracing::debug!("{kind:?} -> {outcome:?}");
        outcome
    }

    /// Create a room if `channel` is the guild's hub, then move the member into it.
    async fn handle_join(&self, transition: &VoiceTransition, channel: ChannelId) -> Outcome {
        let guild = transition.guild_id;
        let provider = self.provider();

        let config = match self.inner.store.find(guild).await {
            Ok(Some(config)) => config,
            Ok(None) => return Outcome::NotConfigured,
            Err(e) => {
                tracing::error!("Couldn't read guild config: {e}");
                return Outcome::Failed;
            }
        };

        if config.hub_channel_id != Some(channel) {
            return Outcome::NotHub;
        }

        // A missing category isn't fatal, the room is just created uncategorized.
        let parent = match config.category_id {
            Some(category) if provider.category_exists(guild, category).await => Some(category),
            Some(category) => {
                tracing::warn!("Configured category {category} not found, creating room without one.");
                None
            }
            None => None,
        };

        let member = &transition.member;
        let name = naming::room_name(&member.display_name);

        let room_id = match provider.create_voice_channel(guild, &name, parent).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to create '{name}': {e}");
                return Outcome::Failed;
            }
        };

        let room = TempRoom {
            guild_id: guild,
            owner: member.id,
            owner_name: member.display_name.clone(),
            parent,
            coowners: HashSet::new(),
            created_at: Instant::now(),
        };
        self.inner.rooms.lock().await.insert(room_id, room);
        tracing::info!("Created '{name}' ({room_id}).");

        if let Err(e) = provider.move_member(guild, member.id, room_id).await {
            // Nobody will ever leave the room, so clean it up like any other empty one.
            tracing::warn!("Couldn't move {} into '{name}': {e}", member.display_name);
            self.schedule_deletion(guild, room_id).await;
        }

        Outcome::Created(room_id)
    }

    /// Schedule a deletion if `channel` is a room that is now empty.
    async fn handle_leave(&self, guild: GuildId, channel: ChannelId) -> Outcome {
        if !self.is_temporary(guild, channel).await {
            return Outcome::NotTemporary;
        }

        match self.provider().live_member_count(guild, channel).await {
            None => {
                self.forget(channel).await;
                Outcome::Gone
            }
            Some(0) => {
                self.schedule_deletion(guild, channel).await;
                Outcome::DeletionScheduled(channel)
            }
            Some(count) => Outcome::Occupied(count),
        }
    }

    /// Whether `channel` is a temporary room, tracked or adopted by its name.
    pub async fn is_temporary(&self, guild: GuildId, channel: ChannelId) -> bool {
        if self.inner.rooms.lock().await.contains_key(&channel) {
            return true;
        }
        if !self.inner.settings.adopt_by_name {
            return false;
        }
        self.provider()
            .channel_info(guild, channel)
            .await
            .is_some_and(|info| naming::looks_like_room(&info.name, info.parent))
    }

    /// Check `channel` again after the grace period, deleting it if still empty.
    /// Replaces any deletion already pending for it.
    pub async fn schedule_deletion(&self, guild: GuildId, channel: ChannelId) {
        let timer_id = self.inner.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let grace_period = self.inner.settings.grace_period;

        // Locked before spawning so the timer can't look for its entry before it exists.
        let mut pending = self.inner.pending.lock().await;

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            manager.run_deletion_check(guild, channel, timer_id).await;
        });

        let replaced = pending.insert(channel, PendingDeletion { timer_id, handle });
        if let Some(old) = replaced {
            old.handle.abort();
            tracing::debug!("Replaced pending deletion of {channel}.");
        } else {
            tracing::debug!("Deleting {channel} in {grace_period:?} if still empty.");
        }
    }

    /// Cancel the pending deletion of `channel`. Returns whether one was pending.
    pub async fn cancel_deletion(&self, channel: ChannelId) -> bool {
        match self.inner.pending.lock().await.remove(&channel) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) async fn has_pending_deletion(&self, channel: ChannelId) -> bool {
        self.inner.pending.lock().await.contains_key(&channel)
    }

    #[instrument(skip(self))]
    async fn run_deletion_check(&self, guild: GuildId, channel: ChannelId, timer_id: u64) {
        {
            let mut pending = self.inner.pending.lock().await;
            match pending.get(&channel) {
                Some(entry) if entry.timer_id == timer_id => {
                    pending.remove(&channel);
                }
                // Cancelled or replaced while waking up.
                _ => return,
            }
        }

        let provider = self.provider();
        match provider.live_member_count(guild, channel).await {
            Some(0) => match provider.delete_channel(channel).await {
                Ok(()) => {
                    let lifetime = self.forget(channel).await.map(|room| room.created_at.elapsed());
                    match lifetime {
                        Some(lifetime) => tracing::info!(
                            "Deleted empty room {channel} after {}.",
                            format_duration(&lifetime)
                        ),
                        None => tracing::info!("Deleted empty room {channel}."),
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!("Room {channel} was already deleted.");
                    self.forget(channel).await;
                }
                Err(e) => tracing::warn!("Failed to delete room {channel}: {e}"),
            },
            Some(count) => tracing::debug!("Room {channel} has {count} member(s) again, keeping it."),
            None => {
                tracing::debug!("Room {channel} no longer exists.");
                self.forget(channel).await;
            }
        }
    }

    /// A tracked room.
    pub async fn room(&self, channel: ChannelId) -> Option<TempRoom> {
        self.inner.rooms.lock().await.get(&channel).cloned()
    }

    /// The most recent tracked room `user` owns in `guild`.
    pub async fn room_owned_by(&self, guild: GuildId, user: UserId) -> Option<(ChannelId, TempRoom)> {
        let rooms = self.inner.rooms.lock().await;
        rooms
            .iter()
            .filter(|(_, room)| room.guild_id == guild && room.owner == user)
            .max_by_key(|(_, room)| room.created_at)
            .map(|(id, room)| (*id, room.clone()))
    }

    /// Give a tracked room a new owner. The old owner's co-owners are dropped.
    /// Returns `false` if the room isn't tracked.
    pub async fn set_owner(&self, channel: ChannelId, owner: UserId, owner_name: &str) -> bool {
        match self.inner.rooms.lock().await.get_mut(&channel) {
            Some(room) => {
                room.owner = owner;
                room.owner_name = owner_name.to_string();
                room.coowners.clear();
                true
            }
            None => false,
        }
    }

    /// Add a co-owner to a tracked room. Returns `false` if the room isn't tracked.
    pub async fn add_coowner(&self, channel: ChannelId, user: UserId) -> bool {
        match self.inner.rooms.lock().await.get_mut(&channel) {
            Some(room) => {
                room.coowners.insert(user);
                true
            }
            None => false,
        }
    }

    /// Stop tracking a room.
    pub async fn forget(&self, channel: ChannelId) -> Option<TempRoom> {
        self.inner.rooms.lock().await.remove(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::GuildConfig;
    use crate::voice::fake::FakeChannels;
    use crate::voice::transition::Mover;

    const GRACE: Duration = Duration::from_millis(3000);

    fn guild() -> GuildId {
        GuildId::new(1)
    }
    fn category() -> ChannelId {
        ChannelId::new(100)
    }
    fn hub() -> ChannelId {
        ChannelId::new(200)
    }
    fn general() -> ChannelId {
        ChannelId::new(300)
    }

    struct Harness {
        manager: RoomManager,
        channels: Arc<FakeChannels>,
    }

    async fn harness_with(config: Option<GuildConfig>, settings: LifecycleSettings) -> Harness {
        let channels = Arc::new(FakeChannels::default());
        channels.add_category(guild(), category(), "Rooms");
        channels.add_voice(guild(), hub(), "Join to create", Some(category()));
        channels.add_voice(guild(), general(), "General", Some(category()));

        let store = Arc::new(MemoryStore::default());
        if let Some(config) = config {
            store.upsert(config).await.unwrap();
        }

        let manager = RoomManager::new(channels.clone(), store, settings);
        Harness { manager, channels }
    }

    async fn harness() -> Harness {
        let config = GuildConfig {
            guild_id: guild(),
            hub_channel_id: Some(hub()),
            category_id: Some(category()),
        };
        harness_with(Some(config), LifecycleSettings::default()).await
    }

    fn mover(user: u64, name: &str) -> Mover {
        Mover {
            id: UserId::new(user),
            display_name: name.to_string(),
        }
    }

    impl Harness {
        /// Connect a member to `channel` and tell the manager.
        async fn join(&self, user: u64, name: &str, channel: ChannelId) -> Outcome {
            self.channels.connect(UserId::new(user), channel);
            let transition = VoiceTransition {
                guild_id: guild(),
                member: mover(user, name),
                previous: None,
                next: Some(channel),
            };
            self.manager.handle_transition(&transition).await
        }

        /// Disconnect a member and tell the manager.
        async fn leave(&self, user: u64, name: &str) -> Outcome {
            let channel = self
                .channels
                .disconnect(UserId::new(user))
                .expect("member should be connected");
            let transition = VoiceTransition {
                guild_id: guild(),
                member: mover(user, name),
                previous: Some(channel),
                next: None,
            };
            self.manager.handle_transition(&transition).await
        }

        async fn move_to(&self, user: u64, name: &str, to: ChannelId) -> Outcome {
            let from = self.channels.voice_channel(UserId::new(user));
            self.channels.connect(UserId::new(user), to);
            let transition = VoiceTransition {
                guild_id: guild(),
                member: mover(user, name),
                previous: from,
                next: Some(to),
            };
            self.manager.handle_transition(&transition).await
        }
    }

    fn created(outcome: Outcome) -> ChannelId {
        match outcome {
            Outcome::Created(id) => id,
            other => panic!("expected a room, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unconfigured_guild_never_creates_rooms() {
        let h = harness_with(None, LifecycleSettings::default()).await;

        assert_eq!(h.join(1, "M", hub()).await, Outcome::NotConfigured);
        assert!(h.channels.created().is_empty());
    }

    #[tokio::test]
    async fn joining_the_hub_creates_a_room_and_moves_the_member() {
        let h = harness().await;

        let room = created(h.join(1, "M", hub()).await);

        let info = h.channels.channel(room).unwrap();
        assert_eq!(info.name, "M's Room");
        assert_eq!(info.parent, Some(category()));
        assert_eq!(h.channels.voice_channel(UserId::new(1)), Some(room));
        assert_eq!(h.channels.created(), vec![room]);

        let tracked = h.manager.room(room).await.unwrap();
        assert_eq!(tracked.owner, UserId::new(1));
        assert_eq!(tracked.owner_name, "M");
    }

    #[tokio::test]
    async fn joining_another_channel_creates_nothing() {
        let h = harness().await;

        assert_eq!(h.join(1, "M", general()).await, Outcome::NotHub);
        assert!(h.channels.created().is_empty());
    }

    #[tokio::test]
    async fn missing_category_creates_an_uncategorized_room() {
        let config = GuildConfig {
            guild_id: guild(),
            hub_channel_id: Some(hub()),
            category_id: Some(ChannelId::new(999)),
        };
        let h = harness_with(Some(config), LifecycleSettings::default()).await;

        let room = created(h.join(1, "M", hub()).await);
        assert_eq!(h.channels.channel(room).unwrap().parent, None);
    }

    #[tokio::test]
    async fn two_members_get_two_rooms() {
        let h = harness().await;

        let first = created(h.join(1, "Alice", hub()).await);
        let second = created(h.join(2, "Bob", hub()).await);

        assert_ne!(first, second);
        assert_eq!(h.channels.channel(first).unwrap().name, "Alice's Room");
        assert_eq!(h.channels.channel(second).unwrap().name, "Bob's Room");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_is_deleted_after_the_grace_period() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);

        assert_eq!(h.leave(1, "M").await, Outcome::DeletionScheduled(room));

        tokio::time::sleep(GRACE - Duration::from_millis(1)).await;
        assert!(h.channels.channel(room).is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(h.channels.channel(room).is_none());
        assert!(h.manager.room(room).await.is_none());
        assert!(!h.manager.has_pending_deletion(room).await);
    }

    #[tokio::test(start_paused = true)]
    async fn rejoining_cancels_the_deletion() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);
        h.leave(1, "M").await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.join(1, "M", room).await;
        assert!(!h.manager.has_pending_deletion(room).await);

        tokio::time::sleep(GRACE * 2).await;
        assert!(h.channels.channel(room).is_some());
        assert_eq!(h.channels.delete_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_check_keeps_a_room_that_filled_up_again() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);
        h.leave(1, "M").await;

        // Someone connects without the manager seeing the event.
        h.channels.connect(UserId::new(2), room);

        tokio::time::sleep(GRACE * 2).await;
        assert!(h.channels.channel(room).is_some());
        assert!(h.manager.room(room).await.is_some());
    }

    #[tokio::test]
    async fn occupied_room_is_not_scheduled() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);
        h.join(2, "Friend", room).await;

        assert_eq!(h.leave(1, "M").await, Outcome::Occupied(1));
        assert!(!h.manager.has_pending_deletion(room).await);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_leaves_delete_once() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);
        h.join(2, "Friend", room).await;

        // Both gone before either event is handled.
        let transition = |user: u64| VoiceTransition {
            guild_id: guild(),
            member: mover(user, "x"),
            previous: Some(room),
            next: None,
        };
        h.channels.disconnect(UserId::new(1));
        h.channels.disconnect(UserId::new(2));

        let first = h.manager.handle_transition(&transition(1)).await;
        let second = h.manager.handle_transition(&transition(2)).await;
        assert_eq!(first, Outcome::DeletionScheduled(room));
        assert_eq!(second, Outcome::DeletionScheduled(room));

        tokio::time::sleep(GRACE * 2).await;
        assert!(h.channels.channel(room).is_none());
        assert_eq!(h.channels.delete_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn room_deleted_by_someone_else_is_not_an_error() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);
        h.leave(1, "M").await;

        h.channels.remove_channel(room);

        tokio::time::sleep(GRACE * 2).await;
        assert_eq!(h.channels.delete_attempts(), 0);
        assert!(h.manager.room(room).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_racing_with_another_delete_counts_as_done() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);
        h.leave(1, "M").await;

        // The channel still looks present, but Discord answers "Unknown Channel".
        h.channels.state().vanish_on_delete = true;

        tokio::time::sleep(GRACE * 2).await;
        assert_eq!(h.channels.delete_attempts(), 1);
        assert!(h.manager.room(room).await.is_none());
    }

    #[tokio::test]
    async fn general_channel_is_never_deleted() {
        let h = harness().await;
        h.join(1, "M", general()).await;

        assert_eq!(h.leave(1, "M").await, Outcome::NotTemporary);
        assert!(!h.manager.has_pending_deletion(general()).await);
    }

    #[tokio::test]
    async fn untracked_room_is_adopted_by_its_name() {
        let h = harness().await;
        let old_room = ChannelId::new(400);
        h.channels
            .add_voice(guild(), old_room, "Old's Room", Some(category()));
        h.join(1, "Old", old_room).await;

        assert_eq!(
            h.leave(1, "Old").await,
            Outcome::DeletionScheduled(old_room)
        );
    }

    #[tokio::test]
    async fn uncategorized_lookalike_is_not_adopted() {
        let h = harness().await;
        let lookalike = ChannelId::new(401);
        h.channels.add_voice(guild(), lookalike, "Someone's Room", None);
        h.join(1, "M", lookalike).await;

        assert_eq!(h.leave(1, "M").await, Outcome::NotTemporary);
    }

    #[tokio::test]
    async fn adoption_can_be_turned_off() {
        let config = GuildConfig {
            guild_id: guild(),
            hub_channel_id: Some(hub()),
            category_id: Some(category()),
        };
        let settings = LifecycleSettings {
            adopt_by_name: false,
            ..Default::default()
        };
        let h = harness_with(Some(config), settings).await;
        let old_room = ChannelId::new(400);
        h.channels
            .add_voice(guild(), old_room, "Old's Room", Some(category()));
        h.join(1, "Old", old_room).await;

        assert_eq!(h.leave(1, "Old").await, Outcome::NotTemporary);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_move_cleans_up_the_new_room() {
        let h = harness().await;
        h.channels.state().fail_move = true;

        let room = created(h.join(1, "M", hub()).await);
        assert!(h.manager.has_pending_deletion(room).await);

        tokio::time::sleep(GRACE * 2).await;
        assert!(h.channels.channel(room).is_none());
    }

    #[tokio::test]
    async fn failed_creation_is_dropped() {
        let h = harness().await;
        h.channels.state().fail_create = true;

        assert_eq!(h.join(1, "M", hub()).await, Outcome::Failed);
        assert!(h.channels.created().is_empty());
    }

    #[tokio::test]
    async fn moving_out_is_ignored_by_default() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);

        assert_eq!(h.move_to(1, "M", general()).await, Outcome::Ignored);
        assert!(!h.manager.has_pending_deletion(room).await);
    }

    #[tokio::test]
    async fn moving_out_can_count_as_leaving() {
        let config = GuildConfig {
            guild_id: guild(),
            hub_channel_id: Some(hub()),
            category_id: Some(category()),
        };
        let settings = LifecycleSettings {
            delete_on_move_out: true,
            ..Default::default()
        };
        let h = harness_with(Some(config), settings).await;
        let room = created(h.join(1, "M", hub()).await);

        assert_eq!(
            h.move_to(1, "M", general()).await,
            Outcome::DeletionScheduled(room)
        );
    }

    #[tokio::test]
    async fn moving_from_hub_into_the_new_room_does_nothing() {
        let h = harness().await;
        let room = created(h.join(1, "M", hub()).await);

        // The gateway reports the bot's own move as a hub -> room move.
        let transition = VoiceTransition {
            guild_id: guild(),
            member: mover(1, "M"),
            previous: Some(hub()),
            next: Some(room),
        };
        assert_eq!(
            h.manager.handle_transition(&transition).await,
            Outcome::Ignored
        );
        assert_eq!(h.channels.created().len(), 1);
    }
}
