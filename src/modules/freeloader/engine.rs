use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serenity::all::{GuildId, UserId};
use tokio::sync::Mutex;

use super::cache::GuildCache;
use super::core::{
    BanKind, BanPolicy, FreeloaderError, GuildSettings, PolicyChange, DEFAULT_TEMPBAN_DAYS,
    MAX_TEMPBAN_DAYS, MIN_TEMPBAN_DAYS, TRIGGER_PHRASE,
};
use crate::store::{GuildStore, StoreError};

/// The freeloader tracking service. Owns the durable store handle, the
/// read-through cache, and the per-guild bookkeeping shared between ban
/// execution and the expiry sweep.
pub struct Freeloader {
    store: Arc<dyn GuildStore>,
    cache: GuildCache,
    /// Freeloader sets awaiting operator confirmation, keyed by guild.
    /// Ephemeral; a process restart discards them.
    pending: DashMap<GuildId, Vec<UserId>>,
    /// Serializes temp-ban map read-modify-writes between ban execution
    /// and the expiry sweep for the same guild.
    guild_locks: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl Freeloader {
    pub async fn new(store: Arc<dyn GuildStore>) -> Result<Self, StoreError> {
        let cache = GuildCache::new();
        cache.refresh(store.as_ref()).await?;

        Ok(Self {
            store,
            cache,
            pending: DashMap::new(),
            guild_locks: DashMap::new(),
        })
    }

    /// Cached settings snapshot, defaults for unknown guilds.
    pub fn settings(&self, guild_id: GuildId) -> GuildSettings {
        self.cache.get(guild_id).unwrap_or_default()
    }

    pub(crate) async fn fetch_settings(
        &self,
        guild_id: GuildId,
    ) -> Result<GuildSettings, StoreError> {
        self.store.get(guild_id).await
    }

    pub(crate) async fn all_settings(
        &self,
    ) -> Result<HashMap<GuildId, GuildSettings>, StoreError> {
        self.store.all().await
    }

    pub(crate) async fn persist_settings(
        &self,
        guild_id: GuildId,
        settings: &GuildSettings,
    ) -> Result<(), StoreError> {
        self.store.set(guild_id, settings).await?;
        self.cache.refresh(self.store.as_ref()).await
    }

    pub(crate) fn guild_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.guild_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Begins a campaign: clears the candidate sets and raises the
    /// tracking flag.
    pub async fn start_campaign(&self, guild_id: GuildId) -> Result<(), FreeloaderError> {
        let mut settings = self.fetch_settings(guild_id).await?;

        if settings.tracking {
            return Err(FreeloaderError::AlreadyTracking);
        }

        settings.joined.clear();
        settings.triggered.clear();
        settings.tracking = true;

        self.persist_settings(guild_id, &settings).await?;

        Ok(())
    }

    /// Ends a campaign and returns the triggered set for report
    /// building. The candidate sets are kept until the next start.
    pub async fn stop_campaign(&self, guild_id: GuildId) -> Result<Vec<UserId>, FreeloaderError> {
        let mut settings = self.fetch_settings(guild_id).await?;

        if !settings.tracking {
            return Err(FreeloaderError::NotTracking);
        }

        settings.tracking = false;

        let triggered: Vec<UserId> = settings.triggered.iter().copied().collect();

        self.persist_settings(guild_id, &settings).await?;

        Ok(triggered)
    }

    /// Records a member join while a campaign is running.
    pub async fn handle_member_join(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        let Some(snapshot) = self.cache.get(guild_id) else {
            return Ok(());
        };

        if !snapshot.tracking || snapshot.joined.contains(&user_id) {
            return Ok(());
        }

        let mut settings = self.fetch_settings(guild_id).await?;

        if settings.joined.insert(user_id) {
            self.persist_settings(guild_id, &settings).await?;
        }

        Ok(())
    }

    /// Promotes a tracked joiner into the triggered set when they post
    /// the trigger phrase.
    pub async fn handle_message(
        &self,
        guild_id: GuildId,
        author_id: UserId,
        author_is_bot: bool,
        content: &str,
    ) -> Result<(), StoreError> {
        if author_is_bot || content.is_empty() {
            return Ok(());
        }

        if !content.to_lowercase().contains(TRIGGER_PHRASE) {
            return Ok(());
        }

        let Some(snapshot) = self.cache.get(guild_id) else {
            return Ok(());
        };

        if !snapshot.joined.contains(&author_id) || snapshot.triggered.contains(&author_id) {
            return Ok(());
        }

        let mut settings = self.fetch_settings(guild_id).await?;

        if settings.joined.contains(&author_id) && settings.triggered.insert(author_id) {
            self.persist_settings(guild_id, &settings).await?;
        }

        Ok(())
    }

    /// Switches the ban kind. Enabling tempban seeds the default length.
    pub async fn set_ban_kind(
        &self,
        guild_id: GuildId,
        kind: BanKind,
    ) -> Result<PolicyChange, FreeloaderError> {
        let mut settings = self.fetch_settings(guild_id).await?;

        let updated = match (kind, settings.ban_policy) {
            (BanKind::Permanent, BanPolicy::Permanent)
            | (BanKind::Temporary, BanPolicy::Temporary { .. }) => {
                return Ok(PolicyChange::Unchanged(settings.ban_policy));
            }
            (BanKind::Permanent, _) => BanPolicy::Permanent,
            (BanKind::Temporary, _) => BanPolicy::Temporary {
                days: DEFAULT_TEMPBAN_DAYS,
            },
        };

        settings.ban_policy = updated;
        self.persist_settings(guild_id, &settings).await?;

        Ok(PolicyChange::Updated(updated))
    }

    /// Sets the tempban length. Only valid while the policy is tempban.
    pub async fn set_ban_length(
        &self,
        guild_id: GuildId,
        days: u8,
    ) -> Result<(), FreeloaderError> {
        if !(MIN_TEMPBAN_DAYS..=MAX_TEMPBAN_DAYS).contains(&days) {
            return Err(FreeloaderError::InvalidBanLength);
        }

        let mut settings = self.fetch_settings(guild_id).await?;

        match settings.ban_policy {
            BanPolicy::Permanent => Err(FreeloaderError::NotTempban),
            BanPolicy::Temporary { .. } => {
                settings.ban_policy = BanPolicy::Temporary { days };
                self.persist_settings(guild_id, &settings).await?;

                Ok(())
            }
        }
    }

    /// Records a temp ban's expiry. Callers must hold the guild lock.
    pub(crate) async fn record_temp_ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        expiry: i64,
    ) -> Result<(), StoreError> {
        let mut settings = self.fetch_settings(guild_id).await?;

        settings.temp_bans.insert(user_id, expiry);

        self.persist_settings(guild_id, &settings).await
    }

    pub fn set_pending(&self, guild_id: GuildId, freeloaders: Vec<UserId>) {
        self.pending.insert(guild_id, freeloaders);
    }

    pub fn take_pending(&self, guild_id: GuildId) -> Option<Vec<UserId>> {
        self.pending.remove(&guild_id).map(|(_, freeloaders)| freeloaders)
    }
}
